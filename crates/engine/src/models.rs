//! Core domain models for the workflow graph.
//!
//! [`WorkflowGraph`] is the in-memory source of truth while a workflow is
//! being authored. Its fields are private: every change goes through the
//! mutation methods in [`crate::graph`], which keep the structural
//! invariants intact. [`WorkflowDefinition`] is the wire form stored in the
//! `definition` JSONB column of the `workflows` table.

use nodes::{CatalogEntry, NodeConfig, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::EngineError;

/// The one input handle every node has.
pub const INPUT_HANDLE: &str = "in";

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Canvas coordinate of a node's top-left corner. Presentational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub entry: &'static CatalogEntry,
    pub label: String,
    pub config: NodeConfig,
    pub position: Position,
}

impl Node {
    pub fn type_tag(&self) -> &'static str {
        self.entry.type_tag
    }

    pub fn kind(&self) -> NodeKind {
        self.entry.kind
    }

    /// Rebuild a node from its wire form, resolving the type tag and
    /// validating the config.
    pub fn from_record(record: NodeRecord) -> Result<Self, EngineError> {
        let entry = nodes::lookup(&record.node_type)
            .map_err(|e| EngineError::from_node_error(&record.id, e))?;
        let config = NodeConfig::from_value(entry, record.config)
            .map_err(|e| EngineError::from_node_error(&record.id, e))?;
        let label = record
            .label
            .unwrap_or_else(|| entry.default_label.to_owned());

        Ok(Self {
            id: record.id,
            entry,
            label,
            config,
            position: record.position,
        })
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id.clone(),
            node_type: self.type_tag().to_owned(),
            label: Some(self.label.clone()),
            config: self.config.to_value(),
            position: self.position,
        }
    }
}

/// Wire form of a node: `{ id, type, label, config, position }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub position: Position,
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from an output slot of one node to the input of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    /// Button / list-row id, or `None` for single-output nodes.
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default)]
    pub target_handle: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// The `{ nodes, edges, entryNodeId }` triple handed to the persistence
/// collaborator and read back by the execution side.
///
/// `entryNodeId` is always serialized, as `null` when unset, so a save can
/// clear the entry node explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub entry_node_id: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// Nodes, edges and the optional entry node of one workflow.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) entry_node_id: Option<String>,
    pub(crate) next_node_seq: u64,
    pub(crate) next_edge_seq: u64,
}

/// Structural equality: id counters are bookkeeping, not graph content.
impl PartialEq for WorkflowGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.edges == other.edges
            && self.entry_node_id == other.entry_node_id
    }
}

impl WorkflowGraph {
    /// An empty graph, as created alongside a new workflow record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn entry_node_id(&self) -> Option<&str> {
        self.entry_node_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Assemble a graph from parts and check every structural invariant.
    pub fn from_parts(
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        entry_node_id: Option<String>,
    ) -> Result<Self, EngineError> {
        let graph = Self {
            nodes,
            edges,
            entry_node_id,
            next_node_seq: 0,
            next_edge_seq: 0,
        };
        crate::validation::validate_graph(&graph)?;
        Ok(graph)
    }

    /// Rebuild a graph from its saved definition.
    pub fn from_definition(definition: WorkflowDefinition) -> Result<Self, EngineError> {
        let nodes = definition
            .nodes
            .into_iter()
            .map(Node::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_parts(nodes, definition.edges, definition.entry_node_id)
    }

    pub fn to_definition(&self) -> WorkflowDefinition {
        WorkflowDefinition {
            nodes: self.nodes.iter().map(Node::to_record).collect(),
            edges: self.edges.clone(),
            entry_node_id: self.entry_node_id.clone(),
        }
    }
}

/// Next `<prefix>_<n>` id for which `taken` is false, advancing `seq`.
pub(crate) fn next_free_id(prefix: &str, seq: &mut u64, taken: impl Fn(&str) -> bool) -> String {
    loop {
        *seq += 1;
        let candidate = format!("{prefix}_{seq}");
        if !taken(&candidate) {
            return candidate;
        }
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_serializes_null_entry_explicitly() {
        let definition = WorkflowGraph::new().to_definition();
        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value, json!({ "nodes": [], "edges": [], "entryNodeId": null }));
    }

    #[test]
    fn record_without_label_takes_catalog_default() {
        let record: NodeRecord = serde_json::from_value(json!({
            "id": "n1",
            "type": "listMessage",
            "position": { "x": 10.0, "y": 20.0 }
        }))
        .unwrap();

        let node = Node::from_record(record).unwrap();
        assert_eq!(node.label, "List Message");
        assert_eq!(node.position, Position::new(10.0, 20.0));
    }

    #[test]
    fn record_with_unknown_type_is_rejected() {
        let record: NodeRecord =
            serde_json::from_value(json!({ "id": "n1", "type": "carousel" })).unwrap();
        assert_eq!(
            Node::from_record(record),
            Err(EngineError::UnknownNodeType("carousel".into()))
        );
    }

    #[test]
    fn next_free_id_skips_taken_ids() {
        let mut seq = 0;
        let id = next_free_id("node", &mut seq, |c| c == "node_1" || c == "node_2");
        assert_eq!(id, "node_3");
        assert_eq!(seq, 3);
    }
}
