//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the workflow graph model, import/export and the
/// persistence boundary.
///
/// Every mutation error is raised before any state changes, so the graph a
/// caller holds is still valid after an `Err`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ------ Mutation errors ------

    /// The type tag is not registered in the node catalog.
    #[error("unknown node type: '{0}'")]
    UnknownNodeType(String),

    /// No node with this ID exists in the graph.
    #[error("unknown node: '{0}'")]
    UnknownNode(String),

    /// The handle is not a declared output slot (or input) of the node.
    #[error("node '{node_id}' has no handle {handle:?}")]
    InvalidHandle {
        node_id: String,
        handle: Option<String>,
    },

    /// Trigger nodes cannot be the entry node.
    #[error("node '{0}' cannot be the entry node")]
    InvalidEntryNode(String),

    /// A config payload or patch was rejected for the node's type.
    #[error("invalid config for node '{node_id}': {reason}")]
    InvalidConfig {
        node_id: String,
        reason: String,
    },

    // ------ Structural validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// Two or more edges share the same ID.
    #[error("duplicate edge ID: '{0}'")]
    DuplicateEdgeId(String),

    /// An edge references a node ID that doesn't exist in the graph.
    #[error("edge '{edge_id}' references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        edge_id: String,
        node_id: String,
        side: &'static str,
    },

    // ------ Import errors ------

    /// The import document is malformed or fails validation.
    #[error("invalid import format: {0}")]
    InvalidFormat(String),

    // ------ Persistence errors ------

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    /// Someone else saved the workflow since it was loaded.
    #[error("workflow was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict { expected: i64, actual: i64 },

    /// The persistence collaborator failed; in-memory state is untouched.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl EngineError {
    /// Whether the error came from the persistence boundary rather than from
    /// the caller's input.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound(_) | Self::VersionConflict { .. } | Self::PersistenceFailure(_)
        )
    }

    pub(crate) fn from_node_error(node_id: &str, err: nodes::NodeError) -> Self {
        match err {
            nodes::NodeError::UnknownNodeType(tag) => Self::UnknownNodeType(tag),
            nodes::NodeError::InvalidConfig { reason, .. } => Self::InvalidConfig {
                node_id: node_id.to_owned(),
                reason,
            },
        }
    }

    pub(crate) fn from_db_error(workflow_id: Uuid, err: db::DbError) -> Self {
        match err {
            db::DbError::NotFound => Self::WorkflowNotFound(workflow_id),
            db::DbError::VersionConflict { expected, actual } => {
                Self::VersionConflict { expected, actual }
            }
            other => Self::PersistenceFailure(other.to_string()),
        }
    }
}
