//! The node catalog: a static, read-only registry of every node type the
//! workflow builder can place on the canvas.
//!
//! Each entry decides three things about nodes of its type:
//! 1. The [`NodeKind`] (trigger, interactive message, terminal message).
//! 2. How many output slots the node exposes ([`OutputArity`]).
//! 3. Which configuration shape is valid for it ([`ConfigShape`]).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::NodeConfig, NodeError};

// ---------------------------------------------------------------------------
// Kind / arity / shape
// ---------------------------------------------------------------------------

/// Behavioural family of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Starts a conversation; one implicit output, never an entry node.
    Trigger,
    /// Sends buttons or a list; one output per button / list row.
    InteractiveMessage,
    /// Sends a message and ends the path; no outputs.
    TerminalMessage,
}

impl NodeKind {
    pub fn is_trigger(self) -> bool {
        matches!(self, Self::Trigger)
    }
}

/// How many output slots a node of a given type exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "count", rename_all = "camelCase")]
pub enum OutputArity {
    /// A fixed number of unnamed outputs (0 or 1 in the current catalog).
    Fixed(usize),
    /// One named output per configured button and per list row.
    DerivedFromButtonsAndRows,
}

/// Which configuration payload a type tag selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigShape {
    Trigger,
    ButtonMessage,
    ListMessage,
    Text,
    Media,
    Location,
}

/// An addressable output on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSlot {
    /// The single implicit output of a fixed-arity node; edges leave it with
    /// no `sourceHandle`.
    Default,
    /// A button or list-row output, addressed by its id.
    Named(String),
}

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// Static description of one node type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub type_tag: &'static str,
    pub kind: NodeKind,
    pub default_label: &'static str,
    pub output_arity: OutputArity,
    /// Messaging tokens charged each time the node fires.
    pub token_cost: u32,
    pub description: &'static str,
    pub config_shape: ConfigShape,
}

impl CatalogEntry {
    /// Output slots a node of this type exposes given its current config.
    pub fn output_slots(&self, config: &NodeConfig) -> Vec<OutputSlot> {
        match self.output_arity {
            OutputArity::Fixed(n) => vec![OutputSlot::Default; n],
            OutputArity::DerivedFromButtonsAndRows => config
                .slot_ids()
                .into_iter()
                .map(|id| OutputSlot::Named(id.to_owned()))
                .collect(),
        }
    }

    /// Whether an edge may leave a node of this type through `handle`.
    pub fn accepts_source_handle(&self, config: &NodeConfig, handle: Option<&str>) -> bool {
        match (self.output_arity, handle) {
            (OutputArity::Fixed(0), _) => false,
            (OutputArity::Fixed(_), None) => true,
            (OutputArity::Fixed(_), Some(_)) => false,
            (OutputArity::DerivedFromButtonsAndRows, Some(h)) => {
                config.slot_ids().contains(&h)
            }
            (OutputArity::DerivedFromButtonsAndRows, None) => false,
        }
    }
}

static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        type_tag: "firstMessageTrigger",
        kind: NodeKind::Trigger,
        default_label: "First Message",
        output_arity: OutputArity::Fixed(1),
        token_cost: 0,
        description: "Fires on the first message a contact sends in a day",
        config_shape: ConfigShape::Trigger,
    },
    CatalogEntry {
        type_tag: "keywordTrigger",
        kind: NodeKind::Trigger,
        default_label: "Keyword Match",
        output_arity: OutputArity::Fixed(1),
        token_cost: 0,
        description: "Fires when an incoming message matches one of the keywords",
        config_shape: ConfigShape::Trigger,
    },
    CatalogEntry {
        type_tag: "quickReply",
        kind: NodeKind::InteractiveMessage,
        default_label: "Quick Reply",
        output_arity: OutputArity::DerivedFromButtonsAndRows,
        token_cost: 1,
        description: "Message with up to three reply buttons",
        config_shape: ConfigShape::ButtonMessage,
    },
    CatalogEntry {
        type_tag: "listMessage",
        kind: NodeKind::InteractiveMessage,
        default_label: "List Message",
        output_arity: OutputArity::DerivedFromButtonsAndRows,
        token_cost: 1,
        description: "Message with a menu of sections and selectable rows",
        config_shape: ConfigShape::ListMessage,
    },
    CatalogEntry {
        type_tag: "message.text",
        kind: NodeKind::TerminalMessage,
        default_label: "Text Message",
        output_arity: OutputArity::Fixed(0),
        token_cost: 1,
        description: "Plain text reply",
        config_shape: ConfigShape::Text,
    },
    CatalogEntry {
        type_tag: "message.media",
        kind: NodeKind::TerminalMessage,
        default_label: "Media Message",
        output_arity: OutputArity::Fixed(0),
        token_cost: 1,
        description: "Image, video, audio or document reply",
        config_shape: ConfigShape::Media,
    },
    CatalogEntry {
        type_tag: "message.location",
        kind: NodeKind::TerminalMessage,
        default_label: "Location Message",
        output_arity: OutputArity::Fixed(0),
        token_cost: 1,
        description: "Shares a map pin",
        config_shape: ConfigShape::Location,
    },
];

/// Resolve a type tag to its catalog entry.
///
/// # Errors
/// [`NodeError::UnknownNodeType`] if the tag is not registered.
pub fn lookup(type_tag: &str) -> Result<&'static CatalogEntry, NodeError> {
    CATALOG
        .iter()
        .find(|entry| entry.type_tag == type_tag)
        .ok_or_else(|| {
            debug!(type_tag, "type tag not in catalog");
            NodeError::UnknownNodeType(type_tag.to_owned())
        })
}

/// Every registered entry, in palette order.
pub fn entries() -> &'static [CatalogEntry] {
    CATALOG
}
