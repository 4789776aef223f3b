//! Automatic layered layout.
//!
//! Arranges a graph into ranks along the flow direction:
//! 1. Break cycles by reversing DFS back edges (self loops are ignored).
//! 2. Rank nodes by longest path from the sources (Kahn's algorithm).
//! 3. Order each rank with barycenter sweeps, keeping the ordering with the
//!    fewest crossings between adjacent ranks.
//! 4. Assign coordinates from a fixed node box and the configured spacing.
//!
//! The result depends only on the nodes, edges and config, with ties broken
//! by node insertion order. Only positions are produced.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Edge, Node, Position, WorkflowGraph};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Flow direction of the ranks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[default]
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "TB")]
    TopBottom,
}

/// Tuning knobs for the layout pass.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    /// Assumed width of every node, regardless of rendered size.
    pub node_width: f64,
    /// Assumed height of every node, regardless of rendered size.
    pub node_height: f64,
    /// Gap between neighbouring nodes in the same rank.
    pub nodesep: f64,
    /// Gap between consecutive ranks.
    pub ranksep: f64,
    /// Number of down+up barycenter sweeps.
    pub ordering_passes: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::LeftRight,
            node_width: 260.0,
            node_height: 120.0,
            nodesep: 50.0,
            ranksep: 100.0,
            ordering_passes: 4,
        }
    }
}

impl LayoutConfig {
    pub fn with_direction(direction: LayoutDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compute a position for every node, returned in node order.
pub fn compute_layout(nodes: &[Node], edges: &[Edge], config: &LayoutConfig) -> Vec<(String, Position)> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) else {
            continue;
        };
        if s != t {
            push_unique(&mut succ[s], t);
        }
    }

    let dag = break_cycles(&succ);
    let ranks = assign_ranks(&dag);
    let layers = order_layers(&dag, &ranks, config.ordering_passes);

    let (rank_step, slot_step) = match config.direction {
        LayoutDirection::LeftRight => (
            config.node_width + config.ranksep,
            config.node_height + config.nodesep,
        ),
        LayoutDirection::TopBottom => (
            config.node_height + config.ranksep,
            config.node_width + config.nodesep,
        ),
    };
    let widest = layers.iter().map(Vec::len).max().unwrap_or(0);

    let mut positions = vec![Position::default(); nodes.len()];
    for (rank, layer) in layers.iter().enumerate() {
        // Center every rank on the widest one.
        let offset = (widest - layer.len()) as f64 * slot_step / 2.0;
        for (slot, &node) in layer.iter().enumerate() {
            let main = rank as f64 * rank_step;
            let cross = offset + slot as f64 * slot_step;
            positions[node] = match config.direction {
                LayoutDirection::LeftRight => Position::new(main, cross),
                LayoutDirection::TopBottom => Position::new(cross, main),
            };
        }
    }

    nodes
        .iter()
        .zip(positions)
        .map(|(n, p)| (n.id.clone(), p))
        .collect()
}

/// Reposition every node of `graph` in place. Nothing but positions changes.
pub fn apply_layout(graph: &mut WorkflowGraph, config: &LayoutConfig) {
    let positions = compute_layout(&graph.nodes, &graph.edges, config);
    for (node, (_, position)) in graph.nodes.iter_mut().zip(positions) {
        node.position = position;
    }
    debug!(nodes = graph.nodes.len(), direction = ?config.direction, "layout applied");
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

fn push_unique(list: &mut Vec<usize>, value: usize) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Reverse every edge that closes a cycle in a DFS started from each node in
/// insertion order. Edges into a node still on the stack are back edges.
fn break_cycles(succ: &[Vec<usize>]) -> Vec<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let n = succ.len();
    let mut mark = vec![Mark::New; n];
    let mut dag: Vec<Vec<usize>> = vec![Vec::new(); n];

    for root in 0..n {
        if mark[root] != Mark::New {
            continue;
        }
        mark[root] = Mark::Active;
        let mut stack = vec![(root, 0usize)];

        while let Some(top) = stack.last_mut() {
            let (u, next) = *top;
            if next == succ[u].len() {
                mark[u] = Mark::Done;
                stack.pop();
                continue;
            }
            top.1 += 1;

            let v = succ[u][next];
            match mark[v] {
                Mark::Active => push_unique(&mut dag[v], u),
                Mark::Done => push_unique(&mut dag[u], v),
                Mark::New => {
                    push_unique(&mut dag[u], v);
                    mark[v] = Mark::Active;
                    stack.push((v, 0));
                }
            }
        }
    }

    dag
}

/// Longest-path ranking over an acyclic adjacency list.
fn assign_ranks(dag: &[Vec<usize>]) -> Vec<usize> {
    let n = dag.len();
    let mut in_degree = vec![0usize; n];
    for targets in dag {
        for &v in targets {
            in_degree[v] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
    let mut rank = vec![0usize; n];

    while let Some(u) = queue.pop_front() {
        for &v in &dag[u] {
            rank[v] = rank[v].max(rank[u] + 1);
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push_back(v);
            }
        }
    }

    rank
}

/// Group nodes by rank and order each rank to reduce crossings.
fn order_layers(dag: &[Vec<usize>], ranks: &[usize], passes: usize) -> Vec<Vec<usize>> {
    let n = dag.len();
    let depth = ranks.iter().max().map_or(0, |r| r + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (node, &rank) in ranks.iter().enumerate() {
        layers[rank].push(node);
    }

    let mut pred: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (u, targets) in dag.iter().enumerate() {
        for &v in targets {
            pred[v].push(u);
        }
    }

    let mut best = layers.clone();
    let mut best_crossings = count_crossings(&layers, dag, ranks);

    for _ in 0..passes {
        if best_crossings == 0 {
            break;
        }
        for r in 1..depth {
            reorder(&mut layers, r, &pred);
        }
        for r in (0..depth.saturating_sub(1)).rev() {
            reorder(&mut layers, r, dag);
        }

        let crossings = count_crossings(&layers, dag, ranks);
        if crossings < best_crossings {
            best_crossings = crossings;
            best = layers.clone();
        }
    }

    best
}

/// Sort one rank by the mean slot of each node's neighbours; nodes without
/// neighbours keep their current slot as key.
fn reorder(layers: &mut [Vec<usize>], rank: usize, neighbours: &[Vec<usize>]) {
    let slot = slot_index(layers);
    let mut keyed: Vec<(f64, usize)> = layers[rank]
        .iter()
        .map(|&v| {
            let adjacent = &neighbours[v];
            let key = if adjacent.is_empty() {
                slot[&v] as f64
            } else {
                adjacent.iter().map(|u| slot[u] as f64).sum::<f64>() / adjacent.len() as f64
            };
            (key, v)
        })
        .collect();

    // Stable sort keeps insertion order on ties.
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    layers[rank] = keyed.into_iter().map(|(_, v)| v).collect();
}

fn slot_index(layers: &[Vec<usize>]) -> HashMap<usize, usize> {
    layers
        .iter()
        .flat_map(|layer| layer.iter().enumerate().map(|(i, &v)| (v, i)))
        .collect()
}

/// Crossings between edges that span exactly one rank.
fn count_crossings(layers: &[Vec<usize>], dag: &[Vec<usize>], ranks: &[usize]) -> usize {
    let slot = slot_index(layers);
    let mut by_rank: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();
    for (u, targets) in dag.iter().enumerate() {
        for &v in targets {
            if ranks[v] == ranks[u] + 1 {
                by_rank.entry(ranks[u]).or_default().push((slot[&u], slot[&v]));
            }
        }
    }

    let mut crossings = 0;
    for spans in by_rank.values() {
        for (i, a) in spans.iter().enumerate() {
            for b in &spans[i + 1..] {
                if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}
