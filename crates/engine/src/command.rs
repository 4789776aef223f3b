//! Typed editor commands.
//!
//! Canvas components never touch the graph directly: they describe what
//! the author did as an [`EditorCommand`], and the single owner of the
//! graph applies it. The `queue` crate carries these over a channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    layout::{apply_layout, LayoutConfig, LayoutDirection},
    models::{Edge, Node, Position, WorkflowGraph},
    EngineError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EditorCommand {
    AddNode {
        type_tag: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        position: Position,
    },
    DeleteNode {
        id: String,
    },
    Connect {
        source: String,
        #[serde(default)]
        source_handle: Option<String>,
        target: String,
        #[serde(default)]
        target_handle: Option<String>,
    },
    Disconnect {
        edge_id: String,
    },
    SetEntryNode {
        #[serde(default)]
        id: Option<String>,
    },
    UpdateNodeConfig {
        id: String,
        patch: Value,
    },
    UpdateNodeLabel {
        id: String,
        label: String,
    },
    MoveNode {
        id: String,
        position: Position,
    },
    AutoLayout {
        #[serde(default)]
        direction: LayoutDirection,
    },
}

/// What a successfully applied command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    NodeAdded(Node),
    NodeDeleted { removed: bool },
    EdgeAdded(Edge),
    EdgeRemoved { removed: bool },
    EntryNodeChanged(Option<String>),
    ConfigUpdated { pruned_edges: Vec<String> },
    LabelUpdated,
    NodeMoved,
    LayoutApplied,
}

impl CommandOutcome {
    /// Whether the graph content changed.
    pub fn changed_graph(&self) -> bool {
        match self {
            Self::NodeDeleted { removed } | Self::EdgeRemoved { removed } => *removed,
            _ => true,
        }
    }
}

impl EditorCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "addNode",
            Self::DeleteNode { .. } => "deleteNode",
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::SetEntryNode { .. } => "setEntryNode",
            Self::UpdateNodeConfig { .. } => "updateNodeConfig",
            Self::UpdateNodeLabel { .. } => "updateNodeLabel",
            Self::MoveNode { .. } => "moveNode",
            Self::AutoLayout { .. } => "autoLayout",
        }
    }

    /// Apply the command to `graph`. On error the graph is unchanged.
    pub fn apply(self, graph: &mut WorkflowGraph) -> Result<CommandOutcome, EngineError> {
        let outcome = match self {
            Self::AddNode {
                type_tag,
                label,
                position,
            } => CommandOutcome::NodeAdded(graph.add_node(&type_tag, label.as_deref(), position)?),
            Self::DeleteNode { id } => CommandOutcome::NodeDeleted {
                removed: graph.delete_node(&id),
            },
            Self::Connect {
                source,
                source_handle,
                target,
                target_handle,
            } => CommandOutcome::EdgeAdded(graph.connect(
                &source,
                source_handle.as_deref(),
                &target,
                target_handle.as_deref(),
            )?),
            Self::Disconnect { edge_id } => CommandOutcome::EdgeRemoved {
                removed: graph.disconnect(&edge_id),
            },
            Self::SetEntryNode { id } => CommandOutcome::EntryNodeChanged(
                graph.set_entry_node(id.as_deref())?.map(str::to_owned),
            ),
            Self::UpdateNodeConfig { id, patch } => CommandOutcome::ConfigUpdated {
                pruned_edges: graph.update_node_config(&id, &patch)?,
            },
            Self::UpdateNodeLabel { id, label } => {
                graph.update_node_label(&id, &label)?;
                CommandOutcome::LabelUpdated
            }
            Self::MoveNode { id, position } => {
                graph.move_node(&id, position)?;
                CommandOutcome::NodeMoved
            }
            Self::AutoLayout { direction } => {
                apply_layout(graph, &LayoutConfig::with_direction(direction));
                CommandOutcome::LayoutApplied
            }
        };
        Ok(outcome)
    }
}
