//! Node-level error type.

use thiserror::Error;

/// Errors raised while resolving a node type or validating its configuration.
///
/// The graph model maps these onto its own taxonomy:
/// - `UnknownNodeType`: the tag is not registered in the catalog.
/// - `InvalidConfig`: the payload does not fit the shape the tag selects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// No catalog entry exists for this type tag.
    #[error("unknown node type: '{0}'")]
    UnknownNodeType(String),

    /// The configuration payload was rejected for the given type tag.
    #[error("invalid config for '{type_tag}': {reason}")]
    InvalidConfig {
        type_tag: String,
        reason: String,
    },
}

impl NodeError {
    pub(crate) fn invalid(type_tag: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            type_tag: type_tag.to_owned(),
            reason: reason.into(),
        }
    }
}
