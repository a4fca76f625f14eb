//! Route network collaborator
//!
//! The route network owns node and segment identity, geometry and interest
//! registration. Commands call it before taking the writer gate; nothing in
//! here touches the projection.

use async_trait::async_trait;
use fibernet_graph::{RouteGeometry, SegmentGeometry};
use fibernet_model::{
    ErrorCode, InterestId, InterestKind, RouteElementId, RouteNetworkInterest, RouteNodeId, RouteSegmentId,
    WalkOfInterest,
};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteNetworkError {
    #[error("invalid walk: {0}")]
    InvalidWalk(String),

    #[error("route network element {0} is unknown")]
    UnknownElement(RouteElementId),

    #[error("route segment {segment} does not join the nodes around it in the walk")]
    NotConnected { segment: RouteSegmentId },

    #[error("interest {0} is not registered")]
    UnknownInterest(InterestId),

    #[error("interest {0} is not a node of interest")]
    NotANodeInterest(InterestId),

    #[error("route network service unavailable: {0}")]
    Unavailable(String),
}

impl RouteNetworkError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidWalk(_) => ErrorCode::InvalidWalk,
            Self::UnknownInterest(_) | Self::NotANodeInterest(_) => ErrorCode::InvalidInterest,
            Self::UnknownElement(_) | Self::NotConnected { .. } | Self::Unavailable(_) => {
                ErrorCode::RouteNetworkRejected
            }
        }
    }
}

/// Walk validation and interest registration
#[async_trait]
pub trait RouteNetworkService: Send + Sync {
    /// Check that `elements` is a connected node/segment path
    async fn validate_walk(&self, elements: Vec<RouteElementId>) -> Result<WalkOfInterest, RouteNetworkError>;

    /// Register an interest, replacing any earlier one with the same id
    async fn register_interest(&self, interest: RouteNetworkInterest) -> Result<(), RouteNetworkError>;

    /// Drop an interest no equipment refers to any more
    async fn unregister_interest(&self, id: InterestId) -> Result<(), RouteNetworkError>;

    async fn interest(&self, id: InterestId) -> Result<RouteNetworkInterest, RouteNetworkError>;
}

#[derive(Debug, Clone)]
struct RouteSegment {
    from_node_id: RouteNodeId,
    to_node_id: RouteNodeId,
    geometry: SegmentGeometry,
}

#[derive(Debug, Default)]
struct RouteNetworkState {
    nodes: BTreeSet<RouteNodeId>,
    segments: HashMap<RouteSegmentId, RouteSegment>,
    interests: HashMap<InterestId, RouteNetworkInterest>,
}

impl RouteNetworkState {
    fn check_walk(&self, walk: &WalkOfInterest) -> Result<(), RouteNetworkError> {
        let elements = walk.elements();
        for node in walk.node_ids() {
            if !self.nodes.contains(&node) {
                return Err(RouteNetworkError::UnknownElement(node));
            }
        }
        for i in (1..elements.len()).step_by(2) {
            let segment_id = elements[i];
            let segment = self
                .segments
                .get(&segment_id)
                .ok_or(RouteNetworkError::UnknownElement(segment_id))?;
            let ends = (elements[i - 1], elements[i + 1]);
            let joins = ends == (segment.from_node_id, segment.to_node_id)
                || ends == (segment.to_node_id, segment.from_node_id);
            if !joins {
                return Err(RouteNetworkError::NotConnected { segment: segment_id });
            }
        }
        Ok(())
    }
}

/// Route network held in memory, used by the CLI and tests
#[derive(Debug, Default)]
pub struct InMemoryRouteNetwork {
    state: RwLock<RouteNetworkState>,
}

impl InMemoryRouteNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self) -> RouteNodeId {
        let id = RouteNodeId::new();
        self.state.write().nodes.insert(id);
        id
    }

    /// Straight segment between two known nodes
    ///
    /// # Errors
    /// `UnknownElement` if either node is missing
    pub fn add_segment(
        &self,
        from_node_id: RouteNodeId,
        to_node_id: RouteNodeId,
        length_m: f64,
    ) -> Result<RouteSegmentId, RouteNetworkError> {
        self.add_segment_with_geometry(from_node_id, to_node_id, Vec::new(), length_m)
    }

    /// # Errors
    /// `UnknownElement` if either node is missing
    pub fn add_segment_with_geometry(
        &self,
        from_node_id: RouteNodeId,
        to_node_id: RouteNodeId,
        coordinates: Vec<[f64; 2]>,
        length_m: f64,
    ) -> Result<RouteSegmentId, RouteNetworkError> {
        let mut state = self.state.write();
        for node in [from_node_id, to_node_id] {
            if !state.nodes.contains(&node) {
                return Err(RouteNetworkError::UnknownElement(node));
            }
        }
        let id = RouteSegmentId::new();
        state.segments.insert(
            id,
            RouteSegment {
                from_node_id,
                to_node_id,
                geometry: SegmentGeometry {
                    route_segment_id: id,
                    coordinates,
                    length_m,
                },
            },
        );
        Ok(id)
    }

    /// Register a node of interest without going through the async trait
    ///
    /// # Errors
    /// `UnknownElement` if the node is missing
    pub fn register_node_interest(&self, route_node_id: RouteNodeId) -> Result<InterestId, RouteNetworkError> {
        let mut state = self.state.write();
        if !state.nodes.contains(&route_node_id) {
            return Err(RouteNetworkError::UnknownElement(route_node_id));
        }
        let id = InterestId::new();
        state.interests.insert(id, RouteNetworkInterest::node(id, route_node_id));
        Ok(id)
    }

    #[must_use]
    pub fn interest_count(&self) -> usize {
        self.state.read().interests.len()
    }
}

#[async_trait]
impl RouteNetworkService for InMemoryRouteNetwork {
    async fn validate_walk(&self, elements: Vec<RouteElementId>) -> Result<WalkOfInterest, RouteNetworkError> {
        let walk = WalkOfInterest::new(elements).map_err(|e| RouteNetworkError::InvalidWalk(e.to_string()))?;
        self.state.read().check_walk(&walk)?;
        Ok(walk)
    }

    async fn register_interest(&self, interest: RouteNetworkInterest) -> Result<(), RouteNetworkError> {
        let mut state = self.state.write();
        match interest.kind {
            InterestKind::WalkOfInterest => {
                let walk = WalkOfInterest::new(interest.route_network_elements.clone())
                    .map_err(|e| RouteNetworkError::InvalidWalk(e.to_string()))?;
                state.check_walk(&walk)?;
            }
            InterestKind::NodeOfInterest => {
                let node = interest
                    .route_node_id()
                    .ok_or(RouteNetworkError::NotANodeInterest(interest.id))?;
                if !state.nodes.contains(&node) {
                    return Err(RouteNetworkError::UnknownElement(node));
                }
            }
        }
        state.interests.insert(interest.id, interest);
        Ok(())
    }

    async fn unregister_interest(&self, id: InterestId) -> Result<(), RouteNetworkError> {
        self.state
            .write()
            .interests
            .remove(&id)
            .map(|_| ())
            .ok_or(RouteNetworkError::UnknownInterest(id))
    }

    async fn interest(&self, id: InterestId) -> Result<RouteNetworkInterest, RouteNetworkError> {
        self.state
            .read()
            .interests
            .get(&id)
            .cloned()
            .ok_or(RouteNetworkError::UnknownInterest(id))
    }
}

impl RouteGeometry for InMemoryRouteNetwork {
    fn segment_geometry(&self, id: RouteSegmentId) -> Option<SegmentGeometry> {
        self.state.read().segments.get(&id).map(|s| s.geometry.clone())
    }
}
