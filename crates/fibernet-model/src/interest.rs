//! Route network interests
//!
//! Equipment never owns route network geometry. It pins itself to the route
//! network through an interest: either a single node, or a walk of alternating
//! node and segment ids (`node, segment, node, ..., node`).

use crate::ids::{InterestId, RouteElementId, RouteNodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Walk construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    /// A walk needs at least `node, segment, node`
    #[error("walk must contain at least 3 elements, got {len}")]
    TooShort { len: usize },

    /// A walk must start and end on a node
    #[error("walk must alternate node/segment and end on a node, got {len} elements")]
    EvenLength { len: usize },

    /// Walks are simple paths; node positions are looked up by id
    #[error("walk visits route node {node} more than once")]
    RepeatedNode { node: RouteNodeId },
}

/// Ordered path through the route network
///
/// A walk never visits the same route node twice. Deserialization goes
/// through [`WalkOfInterest::new`], so a stored walk is checked like a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<RouteElementId>", into = "Vec<RouteElementId>")]
pub struct WalkOfInterest(Vec<RouteElementId>);

impl TryFrom<Vec<RouteElementId>> for WalkOfInterest {
    type Error = WalkError;

    fn try_from(elements: Vec<RouteElementId>) -> Result<Self, Self::Error> {
        Self::new(elements)
    }
}

impl From<WalkOfInterest> for Vec<RouteElementId> {
    fn from(walk: WalkOfInterest) -> Self {
        walk.0
    }
}

impl WalkOfInterest {
    /// Create a walk from alternating node/segment ids
    ///
    /// # Errors
    /// Returns error if the sequence is too short, does not end on a node or
    /// passes a node twice
    pub fn new(elements: Vec<RouteElementId>) -> Result<Self, WalkError> {
        if elements.len() < 3 {
            return Err(WalkError::TooShort { len: elements.len() });
        }
        if elements.len() % 2 == 0 {
            return Err(WalkError::EvenLength { len: elements.len() });
        }
        let walk = Self(elements);
        if let Some(node) = walk.repeated_node() {
            return Err(WalkError::RepeatedNode { node });
        }
        Ok(walk)
    }

    /// First node the walk reaches a second time
    #[must_use]
    pub fn repeated_node(&self) -> Option<RouteNodeId> {
        let mut seen = HashSet::new();
        self.node_ids().find(|node| !seen.insert(*node))
    }

    /// All elements in walk order
    #[inline]
    #[must_use]
    pub fn elements(&self) -> &[RouteElementId] {
        &self.0
    }

    /// Number of elements (nodes + segments)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Walks are never empty; provided for clippy symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First node
    #[inline]
    #[must_use]
    pub fn from_node_id(&self) -> RouteNodeId {
        self.0[0]
    }

    /// Last node
    #[inline]
    #[must_use]
    pub fn to_node_id(&self) -> RouteNodeId {
        self.0[self.0.len() - 1]
    }

    /// Node ids in walk order
    pub fn node_ids(&self) -> impl Iterator<Item = RouteNodeId> + '_ {
        self.0.iter().step_by(2).copied()
    }

    /// Segment ids in walk order
    pub fn segment_ids(&self) -> impl Iterator<Item = RouteElementId> + '_ {
        self.0.iter().skip(1).step_by(2).copied()
    }

    /// Whether the element appears anywhere in the walk
    #[inline]
    #[must_use]
    pub fn contains(&self, id: RouteElementId) -> bool {
        self.0.contains(&id)
    }

    /// Element index of `node` at a node position
    #[must_use]
    pub fn node_position(&self, node: RouteNodeId) -> Option<usize> {
        self.0.iter().step_by(2).position(|n| *n == node).map(|i| i * 2)
    }

    /// Part of the walk between two nodes, oriented from `from` to `to`
    ///
    /// Returns `None` if either node is missing or both are the same.
    #[must_use]
    pub fn sub_walk(&self, from: RouteNodeId, to: RouteNodeId) -> Option<WalkOfInterest> {
        let a = self.node_position(from)?;
        let b = self.node_position(to)?;
        if a == b {
            return None;
        }
        let mut part = self.0[a.min(b)..=a.max(b)].to_vec();
        if a > b {
            part.reverse();
        }
        Some(Self(part))
    }

    /// Start index of the first forward occurrence of `part` as a contiguous run
    #[must_use]
    pub fn find_contiguous(&self, part: &[RouteElementId]) -> Option<usize> {
        if part.is_empty() || part.len() > self.0.len() {
            return None;
        }
        self.0.windows(part.len()).position(|w| w == part)
    }

    /// Replace elements `start..=end` with `replacement`
    ///
    /// The replacement must begin and end with the nodes it replaces so the
    /// node/segment alternation is preserved.
    #[must_use]
    pub fn splice(&self, start: usize, end: usize, replacement: &[RouteElementId]) -> WalkOfInterest {
        debug_assert!(start < end && end < self.0.len());
        debug_assert_eq!(replacement.first(), Some(&self.0[start]));
        debug_assert_eq!(replacement.last(), Some(&self.0[end]));

        let mut elements = Vec::with_capacity(self.0.len() - (end - start + 1) + replacement.len());
        elements.extend_from_slice(&self.0[..start]);
        elements.extend_from_slice(replacement);
        elements.extend_from_slice(&self.0[end + 1..]);
        Self(elements)
    }

    /// Same walk traversed in the opposite direction
    #[must_use]
    pub fn reversed(&self) -> WalkOfInterest {
        let mut elements = self.0.clone();
        elements.reverse();
        Self(elements)
    }
}

/// Interest kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterestKind {
    /// Ordered walk through nodes and segments
    WalkOfInterest,
    /// A single route node
    NodeOfInterest,
}

/// Interest registered by a piece of equipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNetworkInterest {
    pub id: InterestId,
    pub kind: InterestKind,
    pub route_network_elements: Vec<RouteElementId>,
}

impl RouteNetworkInterest {
    /// Interest following a walk
    #[must_use]
    pub fn walk(id: InterestId, walk: &WalkOfInterest) -> Self {
        Self {
            id,
            kind: InterestKind::WalkOfInterest,
            route_network_elements: walk.elements().to_vec(),
        }
    }

    /// Interest on one route node
    #[must_use]
    pub fn node(id: InterestId, node: RouteNodeId) -> Self {
        Self {
            id,
            kind: InterestKind::NodeOfInterest,
            route_network_elements: vec![node],
        }
    }

    /// The node of a node-of-interest
    #[must_use]
    pub fn route_node_id(&self) -> Option<RouteNodeId> {
        match (self.kind, self.route_network_elements.as_slice()) {
            (InterestKind::NodeOfInterest, [node]) => Some(*node),
            _ => None,
        }
    }

    /// The walk of a walk-of-interest
    #[must_use]
    pub fn as_walk(&self) -> Option<WalkOfInterest> {
        match self.kind {
            InterestKind::WalkOfInterest => WalkOfInterest::new(self.route_network_elements.clone()).ok(),
            InterestKind::NodeOfInterest => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<RouteElementId> {
        (0..n).map(|_| RouteElementId::new()).collect()
    }

    #[test]
    fn walk_rejects_short_and_even() {
        assert!(matches!(WalkOfInterest::new(ids(1)), Err(WalkError::TooShort { len: 1 })));
        assert!(matches!(WalkOfInterest::new(ids(4)), Err(WalkError::EvenLength { len: 4 })));
        assert!(WalkOfInterest::new(ids(5)).is_ok());
    }

    #[test]
    fn walk_rejects_repeated_node() {
        let e = ids(5);
        let looped = vec![e[0], e[1], e[2], e[3], e[0]];
        assert_eq!(
            WalkOfInterest::new(looped),
            Err(WalkError::RepeatedNode { node: e[0] })
        );
    }

    #[test]
    fn stored_walk_is_validated() {
        assert!(serde_json::from_str::<WalkOfInterest>("[]").is_err());

        let e = ids(4);
        let even = serde_json::to_string(&e).unwrap();
        assert!(serde_json::from_str::<WalkOfInterest>(&even).is_err());

        let walk = WalkOfInterest::new(ids(3)).unwrap();
        let json = serde_json::to_string(&walk).unwrap();
        assert_eq!(json, serde_json::to_string(walk.elements()).unwrap());
        assert_eq!(serde_json::from_str::<WalkOfInterest>(&json).unwrap(), walk);
    }

    #[test]
    fn walk_nodes_and_segments() {
        let e = ids(5);
        let walk = WalkOfInterest::new(e.clone()).unwrap();
        assert_eq!(walk.node_ids().collect::<Vec<_>>(), vec![e[0], e[2], e[4]]);
        assert_eq!(walk.segment_ids().collect::<Vec<_>>(), vec![e[1], e[3]]);
        assert_eq!(walk.from_node_id(), e[0]);
        assert_eq!(walk.to_node_id(), e[4]);
    }

    #[test]
    fn sub_walk_is_oriented() {
        let e = ids(7);
        let walk = WalkOfInterest::new(e.clone()).unwrap();

        let forward = walk.sub_walk(e[2], e[6]).unwrap();
        assert_eq!(forward.elements(), &e[2..=6]);

        let backward = walk.sub_walk(e[6], e[2]).unwrap();
        assert_eq!(backward.from_node_id(), e[6]);
        assert_eq!(backward.to_node_id(), e[2]);

        // segment ids are not nodes
        assert!(walk.sub_walk(e[1], e[4]).is_none());
        assert!(walk.sub_walk(e[2], e[2]).is_none());
    }

    #[test]
    fn splice_replaces_inner_part() {
        let e = ids(5);
        let walk = WalkOfInterest::new(e.clone()).unwrap();
        let detour = vec![e[0], RouteElementId::new(), RouteElementId::new(), RouteElementId::new(), e[2]];

        let spliced = walk.splice(0, 2, &detour);
        assert_eq!(spliced.len(), 7);
        assert_eq!(spliced.find_contiguous(&detour), Some(0));
        assert_eq!(spliced.to_node_id(), e[4]);
    }

    #[test]
    fn node_of_interest_accessors() {
        let node = RouteElementId::new();
        let interest = RouteNetworkInterest::node(InterestId::new(), node);
        assert_eq!(interest.route_node_id(), Some(node));
        assert!(interest.as_walk().is_none());
    }

    proptest! {
        #[test]
        fn prop_sub_walk_round_trips_through_splice(len in 1usize..8, a in 0usize..8, b in 0usize..8) {
            let e = ids(len * 2 + 1);
            let walk = WalkOfInterest::new(e.clone()).unwrap();
            let (a, b) = (a % (len + 1), b % (len + 1));
            prop_assume!(a != b);

            let (from, to) = (e[a * 2], e[b * 2]);
            let part = walk.sub_walk(from, to).unwrap();
            prop_assert_eq!(part.from_node_id(), from);
            prop_assert_eq!(part.to_node_id(), to);

            // splicing a sub walk back into itself is the identity
            let (lo, hi) = (a.min(b) * 2, a.max(b) * 2);
            let forward = walk.sub_walk(e[lo], e[hi]).unwrap();
            prop_assert_eq!(walk.splice(lo, hi, forward.elements()), walk);
        }
    }
}
