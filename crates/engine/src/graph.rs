//! The mutation protocol: every edit an author can make to a graph.
//!
//! Each method either maps a valid graph to another valid graph or returns
//! an error without touching anything. Checks run first, writes last.

use serde_json::Value;
use tracing::debug;

use crate::{
    models::{next_free_id, Edge, Node, Position, WorkflowGraph},
    validation::{check_entry_candidate, check_source_handle, check_target_handle},
    EngineError,
};

impl WorkflowGraph {
    /// Place a new node of `type_tag` on the canvas with an empty config.
    /// `label` falls back to the catalog's default label.
    ///
    /// # Errors
    /// [`EngineError::UnknownNodeType`] if the tag is not registered.
    pub fn add_node(
        &mut self,
        type_tag: &str,
        label: Option<&str>,
        position: Position,
    ) -> Result<Node, EngineError> {
        let entry = nodes::lookup(type_tag)
            .map_err(|_| EngineError::UnknownNodeType(type_tag.to_owned()))?;

        let existing = &self.nodes;
        let id = next_free_id("node", &mut self.next_node_seq, |c| {
            existing.iter().any(|n| n.id == c)
        });

        let node = Node {
            id,
            entry,
            label: label.unwrap_or(entry.default_label).to_owned(),
            config: nodes::NodeConfig::empty(entry.config_shape),
            position,
        };
        debug!(node_id = %node.id, type_tag, "node added");
        self.nodes.push(node.clone());
        Ok(node)
    }

    /// Remove a node together with every edge that starts or ends at it, and
    /// clear the entry node if it was this one.
    ///
    /// Deleting an absent node is a no-op; returns whether anything changed.
    pub fn delete_node(&mut self, node_id: &str) -> bool {
        let Some(index) = self.nodes.iter().position(|n| n.id == node_id) else {
            return false;
        };

        self.nodes.remove(index);
        let before = self.edges.len();
        self.edges
            .retain(|e| e.source != node_id && e.target != node_id);
        if self.entry_node_id.as_deref() == Some(node_id) {
            self.entry_node_id = None;
        }

        debug!(node_id, edges_removed = before - self.edges.len(), "node deleted");
        true
    }

    /// Draw an edge from an output slot of `source` to the input of `target`.
    ///
    /// Self-loops and several edges from one slot are allowed.
    ///
    /// # Errors
    /// - [`EngineError::UnknownNode`] if either endpoint is missing.
    /// - [`EngineError::InvalidHandle`] if `source_handle` is not an output
    ///   slot of `source`, or `target_handle` is not the input.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: Option<&str>,
        target: &str,
        target_handle: Option<&str>,
    ) -> Result<Edge, EngineError> {
        let source_node = self
            .node(source)
            .ok_or_else(|| EngineError::UnknownNode(source.to_owned()))?;
        if self.node(target).is_none() {
            return Err(EngineError::UnknownNode(target.to_owned()));
        }
        check_source_handle(source_node, source_handle)?;
        check_target_handle(target, target_handle)?;

        let existing = &self.edges;
        let id = next_free_id("edge", &mut self.next_edge_seq, |c| {
            existing.iter().any(|e| e.id == c)
        });

        let edge = Edge {
            id,
            source: source.to_owned(),
            source_handle: source_handle.map(str::to_owned),
            target: target.to_owned(),
            target_handle: target_handle.map(str::to_owned),
        };
        debug!(edge_id = %edge.id, source, target, "edge connected");
        self.edges.push(edge.clone());
        Ok(edge)
    }

    /// Remove one edge. Idempotent; returns whether anything changed.
    pub fn disconnect(&mut self, edge_id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != edge_id);
        before != self.edges.len()
    }

    /// Toggle the entry node: setting the current entry again clears it,
    /// `None` clears unconditionally. Returns the new entry node id.
    ///
    /// # Errors
    /// - [`EngineError::UnknownNode`] if the node does not exist.
    /// - [`EngineError::InvalidEntryNode`] if the node is a trigger.
    pub fn set_entry_node(&mut self, node_id: Option<&str>) -> Result<Option<&str>, EngineError> {
        let Some(node_id) = node_id else {
            self.entry_node_id = None;
            return Ok(None);
        };

        let node = self
            .node(node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))?;
        check_entry_candidate(node)?;

        if self.entry_node_id.as_deref() == Some(node_id) {
            self.entry_node_id = None;
        } else {
            self.entry_node_id = Some(node_id.to_owned());
        }
        Ok(self.entry_node_id.as_deref())
    }

    /// Shallow-merge `patch` into a node's config.
    ///
    /// If the new config drops a button or list row, the edges leaving
    /// through it are removed as part of the same change. Returns the ids of
    /// those edges.
    ///
    /// # Errors
    /// - [`EngineError::UnknownNode`] if the node does not exist.
    /// - [`EngineError::InvalidConfig`] if the patch or the merged config is
    ///   rejected.
    pub fn update_node_config(
        &mut self,
        node_id: &str,
        patch: &Value,
    ) -> Result<Vec<String>, EngineError> {
        let index = self.node_index(node_id)?;
        let node = &self.nodes[index];
        let merged = node
            .config
            .merge_patch(node.entry, patch)
            .map_err(|e| EngineError::from_node_error(node_id, e))?;

        self.nodes[index].config = merged;

        let node = &self.nodes[index];
        let mut pruned = Vec::new();
        self.edges.retain(|e| {
            let keep = e.source != node_id
                || node
                    .entry
                    .accepts_source_handle(&node.config, e.source_handle.as_deref());
            if !keep {
                pruned.push(e.id.clone());
            }
            keep
        });

        if !pruned.is_empty() {
            debug!(node_id, ?pruned, "edges from removed slots pruned");
        }
        Ok(pruned)
    }

    /// Rename a node.
    ///
    /// # Errors
    /// [`EngineError::UnknownNode`] if the node does not exist.
    pub fn update_node_label(&mut self, node_id: &str, label: &str) -> Result<(), EngineError> {
        let index = self.node_index(node_id)?;
        self.nodes[index].label = label.to_owned();
        Ok(())
    }

    /// Drag a node to a new position.
    ///
    /// # Errors
    /// [`EngineError::UnknownNode`] if the node does not exist.
    pub fn move_node(&mut self, node_id: &str, position: Position) -> Result<(), EngineError> {
        let index = self.node_index(node_id)?;
        self.nodes[index].position = position;
        Ok(())
    }

    fn node_index(&self, node_id: &str) -> Result<usize, EngineError> {
        self.nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.to_owned()))
    }
}
