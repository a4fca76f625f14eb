//! Directed connectivity graph over terminals and span segments
//!
//! Signal flows along edges:
//!
//! - `from_terminal -> segment` and `segment -> to_terminal` for span segment ends
//! - `terminal -> terminal` for patch connections
//! - `input -> output` inside splitters
//!
//! External links (everything except splitter wiring) are limited to one
//! incoming and one outgoing per terminal.

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Edge payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GraphEdge {
    /// Span segment end attached to a terminal
    SegmentEnd,
    /// Patch cord or splice between two terminals
    Patch { fiber_length_m: f64 },
    /// Fixed wiring inside a terminal structure
    Internal,
}

impl GraphEdge {
    #[inline]
    #[must_use]
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityGraph {
    inner: DiGraphMap<Uuid, GraphEdge>,
}

impl ConnectivityGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: Uuid) {
        self.inner.add_node(id);
    }

    #[must_use]
    pub fn contains_node(&self, id: Uuid) -> bool {
        self.inner.contains_node(id)
    }

    #[must_use]
    pub fn edge(&self, from: Uuid, to: Uuid) -> Option<GraphEdge> {
        self.inner.edge_weight(from, to).copied()
    }

    /// Whether `id` already has an external link in `direction`
    #[must_use]
    pub fn has_external(&self, id: Uuid, direction: Direction) -> bool {
        self.external_neighbor(id, direction).is_some()
    }

    /// The external neighbour of `id` in `direction`, if any
    #[must_use]
    pub fn external_neighbor(&self, id: Uuid, direction: Direction) -> Option<(Uuid, GraphEdge)> {
        if !self.inner.contains_node(id) {
            return None;
        }
        self.inner
            .edges_directed(id, direction)
            .map(|(a, b, w)| (if a == id { b } else { a }, *w))
            .find(|(_, w)| w.is_external())
    }

    /// Neighbours in `direction`; order is unspecified after removals
    #[must_use]
    pub fn neighbors(&self, id: Uuid, direction: Direction) -> Vec<(Uuid, GraphEdge)> {
        if !self.inner.contains_node(id) {
            return Vec::new();
        }
        self.inner
            .edges_directed(id, direction)
            .map(|(a, b, w)| (if a == id { b } else { a }, *w))
            .collect()
    }

    /// Whether an edge may be added without breaking the one-in/one-out rule
    #[must_use]
    pub fn can_link(&self, from: Uuid, to: Uuid) -> bool {
        from != to
            && !self.has_external(from, Direction::Outgoing)
            && !self.has_external(to, Direction::Incoming)
    }

    /// Add an edge; nodes are created on demand
    pub fn link(&mut self, from: Uuid, to: Uuid, edge: GraphEdge) {
        self.inner.add_edge(from, to, edge);
    }

    /// Remove the edge, returning its payload
    pub fn unlink(&mut self, from: Uuid, to: Uuid) -> Option<GraphEdge> {
        self.inner.remove_edge(from, to)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }
}
