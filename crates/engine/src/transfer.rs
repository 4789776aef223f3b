//! Export / import of whole workflow graphs as schema-versioned JSON files.
//!
//! The export file is the interchange format between instances:
//!
//! ```json
//! {
//!   "schemaVersion": "1.0",
//!   "workflow": { "id": "...", "name": "...", "exportedAt": "2026-01-01T00:00:00Z" },
//!   "nodes": [{ "id", "type", "label", "config", "position" }],
//!   "edges": [{ "id", "source", "target", "sourceHandle", "targetHandle" }],
//!   "entryNodeId": "..." | null
//! }
//! ```
//!
//! Import is all-or-nothing: the new graph is assembled and validated on
//! the side and only swapped into the destination once it is known good.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    models::{next_free_id, Edge, Node, NodeRecord, WorkflowGraph},
    EngineError,
};

/// Version written into every export.
pub const SCHEMA_VERSION: &str = "1.0";

/// Keys an import document must carry.
const REQUIRED_KEYS: [&str; 3] = ["schemaVersion", "nodes", "edges"];

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedWorkflow {
    pub id: String,
    pub name: String,
    pub exported_at: DateTime<Utc>,
}

/// The full export file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub schema_version: String,
    pub workflow: ExportedWorkflow,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<Edge>,
    pub entry_node_id: Option<String>,
}

/// What import reads; metadata such as `workflow` is informational only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportDocument {
    schema_version: String,
    nodes: Vec<NodeRecord>,
    edges: Vec<Edge>,
    #[serde(default)]
    entry_node_id: Option<String>,
}

/// How imported nodes and edges combine with the destination graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// The imported graph becomes the whole destination graph.
    #[default]
    Replace,
    /// Imported nodes and edges are added next to the existing ones.
    Merge,
}

/// Summary of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub nodes_imported: usize,
    pub edges_imported: usize,
    /// Imported node ids that collided with the destination, and the ids
    /// they were given instead.
    pub remapped_node_ids: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Snapshot `graph` into an export document stamped with the current time.
pub fn export_graph(graph: &WorkflowGraph, workflow_id: &str, name: &str) -> ExportDocument {
    let definition = graph.to_definition();
    ExportDocument {
        schema_version: SCHEMA_VERSION.to_owned(),
        workflow: ExportedWorkflow {
            id: workflow_id.to_owned(),
            name: name.to_owned(),
            exported_at: Utc::now(),
        },
        nodes: definition.nodes,
        edges: definition.edges,
        entry_node_id: definition.entry_node_id,
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Parse `json` and import it into `destination`.
///
/// # Errors
/// [`EngineError::InvalidFormat`] for malformed JSON, a missing required
/// key, an unsupported schema version, or a document whose graph breaks a
/// structural invariant. `destination` is untouched on error.
pub fn import_str(
    destination: &mut WorkflowGraph,
    json: &str,
    mode: ImportMode,
) -> Result<ImportReport, EngineError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| EngineError::InvalidFormat(format!("malformed JSON: {e}")))?;
    import_value(destination, value, mode)
}

/// Import an already-parsed document into `destination`.
pub fn import_value(
    destination: &mut WorkflowGraph,
    value: Value,
    mode: ImportMode,
) -> Result<ImportReport, EngineError> {
    let Value::Object(fields) = &value else {
        return Err(EngineError::InvalidFormat("document must be a JSON object".into()));
    };
    for key in REQUIRED_KEYS {
        if !fields.contains_key(key) {
            return Err(EngineError::InvalidFormat(format!("missing required key '{key}'")));
        }
    }

    let document: ImportDocument =
        serde_json::from_value(value).map_err(|e| EngineError::InvalidFormat(e.to_string()))?;
    check_schema_version(&document.schema_version)?;

    let (graph, report) = assemble(destination, document, mode)?;
    info!(
        nodes = report.nodes_imported,
        edges = report.edges_imported,
        remapped = report.remapped_node_ids.len(),
        ?mode,
        "workflow graph imported"
    );
    *destination = graph;
    Ok(report)
}

fn check_schema_version(version: &str) -> Result<(), EngineError> {
    let current_major = SCHEMA_VERSION.split('.').next();
    if version.split('.').next() == current_major {
        Ok(())
    } else {
        Err(EngineError::InvalidFormat(format!(
            "unsupported schema version '{version}' (expected {SCHEMA_VERSION})"
        )))
    }
}

/// Build the post-import graph without touching `destination`.
fn assemble(
    destination: &WorkflowGraph,
    document: ImportDocument,
    mode: ImportMode,
) -> Result<(WorkflowGraph, ImportReport), EngineError> {
    let merge = mode == ImportMode::Merge;
    let invalid = |e: EngineError| EngineError::InvalidFormat(e.to_string());

    // ------------------------------------------------------------------
    // Nodes: remap ids already present in the destination.
    // ------------------------------------------------------------------
    let mut taken: HashSet<String> = destination.nodes.iter().map(|n| n.id.clone()).collect();
    let mut node_seq = destination.next_node_seq;
    let mut id_map: HashMap<String, String> = HashMap::with_capacity(document.nodes.len());
    let mut report = ImportReport::default();

    let mut nodes: Vec<Node> = if merge { destination.nodes.clone() } else { Vec::new() };
    for record in document.nodes {
        let old_id = record.id.clone();
        if id_map.contains_key(&old_id) {
            return Err(EngineError::InvalidFormat(format!(
                "duplicate node id '{old_id}' in document"
            )));
        }

        let new_id = if taken.contains(&old_id) {
            let fresh = next_free_id("node", &mut node_seq, |c| taken.contains(c));
            report.remapped_node_ids.insert(old_id.clone(), fresh.clone());
            fresh
        } else {
            old_id.clone()
        };
        taken.insert(new_id.clone());
        id_map.insert(old_id, new_id.clone());

        let node = Node::from_record(NodeRecord { id: new_id, ..record }).map_err(invalid)?;
        nodes.push(node);
        report.nodes_imported += 1;
    }

    // ------------------------------------------------------------------
    // Edges: rewrite endpoints through the id map.
    // ------------------------------------------------------------------
    let resolve = |edge_id: &str, node_id: &str| {
        id_map.get(node_id).cloned().ok_or_else(|| {
            EngineError::InvalidFormat(format!(
                "edge '{edge_id}' references node '{node_id}' which is not in the document"
            ))
        })
    };

    let mut edges: Vec<Edge> = if merge { destination.edges.clone() } else { Vec::new() };
    let mut edge_ids: HashSet<String> = edges.iter().map(|e| e.id.clone()).collect();
    let mut edge_seq = destination.next_edge_seq;
    for edge in document.edges {
        let source = resolve(&edge.id, &edge.source)?;
        let target = resolve(&edge.id, &edge.target)?;
        let id = if edge_ids.contains(&edge.id) {
            next_free_id("edge", &mut edge_seq, |c| edge_ids.contains(c))
        } else {
            edge.id
        };
        edge_ids.insert(id.clone());

        edges.push(Edge {
            id,
            source,
            target,
            ..edge
        });
        report.edges_imported += 1;
    }

    // ------------------------------------------------------------------
    // Entry node
    // ------------------------------------------------------------------
    let imported_entry = document
        .entry_node_id
        .map(|old| {
            id_map.get(&old).cloned().ok_or_else(|| {
                EngineError::InvalidFormat(format!("entry node '{old}' is not in the document"))
            })
        })
        .transpose()?;
    let entry = if merge {
        imported_entry.or_else(|| destination.entry_node_id.clone())
    } else {
        imported_entry
    };

    let mut graph = WorkflowGraph::from_parts(nodes, edges, entry).map_err(invalid)?;
    graph.next_node_seq = node_seq;
    graph.next_edge_seq = edge_seq;

    debug!(remapped = ?report.remapped_node_ids, "import assembled");
    Ok((graph, report))
}
