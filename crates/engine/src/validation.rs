//! Structural validation: run this before persisting a graph and after
//! building one from outside input (a load or an import).
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the graph.
//! 2. Edge IDs must be unique within the graph.
//! 3. Every edge must reference existing nodes (both `source` and `target`).
//! 4. An edge's `sourceHandle` must be a declared output slot of its source,
//!    and its `targetHandle` must be the single input (or absent).
//! 5. The entry node, if set, must exist and must not be a trigger.
//!
//! Cycles are allowed: conversations loop back to earlier questions.

use std::collections::{HashMap, HashSet};

use crate::{
    models::{Node, WorkflowGraph, INPUT_HANDLE},
    EngineError,
};

/// Validate every structural invariant of `graph`.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] / [`EngineError::DuplicateEdgeId`]
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::InvalidHandle`] if an edge uses an undeclared handle.
/// - [`EngineError::UnknownNode`] / [`EngineError::InvalidEntryNode`] for a
///   bad entry node.
pub fn validate_graph(graph: &WorkflowGraph) -> Result<(), EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut node_map: HashMap<&str, &Node> = HashMap::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if node_map.insert(node.id.as_str(), node).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2-4. Edges
    // -----------------------------------------------------------------------
    let mut edge_ids: HashSet<&str> = HashSet::with_capacity(graph.edges.len());
    for edge in &graph.edges {
        if !edge_ids.insert(edge.id.as_str()) {
            return Err(EngineError::DuplicateEdgeId(edge.id.clone()));
        }

        let Some(source) = node_map.get(edge.source.as_str()) else {
            return Err(EngineError::UnknownNodeReference {
                edge_id: edge.id.clone(),
                node_id: edge.source.clone(),
                side: "source",
            });
        };
        if !node_map.contains_key(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                edge_id: edge.id.clone(),
                node_id: edge.target.clone(),
                side: "target",
            });
        }

        check_source_handle(source, edge.source_handle.as_deref())?;
        check_target_handle(&edge.target, edge.target_handle.as_deref())?;
    }

    // -----------------------------------------------------------------------
    // 5. Entry node
    // -----------------------------------------------------------------------
    if let Some(entry_id) = graph.entry_node_id.as_deref() {
        let node = node_map
            .get(entry_id)
            .ok_or_else(|| EngineError::UnknownNode(entry_id.to_owned()))?;
        check_entry_candidate(node)?;
    }

    Ok(())
}

pub(crate) fn check_source_handle(source: &Node, handle: Option<&str>) -> Result<(), EngineError> {
    if source.entry.accepts_source_handle(&source.config, handle) {
        Ok(())
    } else {
        Err(EngineError::InvalidHandle {
            node_id: source.id.clone(),
            handle: handle.map(str::to_owned),
        })
    }
}

pub(crate) fn check_target_handle(target_id: &str, handle: Option<&str>) -> Result<(), EngineError> {
    match handle {
        None => Ok(()),
        Some(h) if h == INPUT_HANDLE => Ok(()),
        Some(h) => Err(EngineError::InvalidHandle {
            node_id: target_id.to_owned(),
            handle: Some(h.to_owned()),
        }),
    }
}

pub(crate) fn check_entry_candidate(node: &Node) -> Result<(), EngineError> {
    if node.kind().is_trigger() {
        return Err(EngineError::InvalidEntryNode(node.id.clone()));
    }
    Ok(())
}
