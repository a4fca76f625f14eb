//! Projection and trace errors

use fibernet_model::{ErrorCode, InterestId, RouteNodeId};
use uuid::Uuid;

/// Invariant breach while folding an event
///
/// Never a user error: the event stream and the projection disagree. The
/// owner must stop applying events and rebuild from the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("event references unknown element {0}")]
    UnknownElement(Uuid),

    #[error("element {0} is already registered")]
    DuplicateElement(Uuid),

    #[error("interest {0} is not registered")]
    UnknownInterest(InterestId),

    #[error("route node {route_node_id} already holds a node container")]
    RouteNodeOccupied { route_node_id: RouteNodeId },

    #[error("index out of sync: {0}")]
    IndexInconsistent(String),

    #[error("connectivity graph conflict: {0}")]
    GraphConflict(String),
}

impl ProjectionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::ProjectionFailure
    }

    /// Projection errors always abort event processing
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        true
    }
}

/// Failed trace or outage query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("element {0} visited twice while tracing")]
    CycleDetected(Uuid),

    #[error("connectivity graph references unknown element {0}")]
    DanglingReference(Uuid),

    #[error("element {0} not found")]
    ElementNotFound(Uuid),

    #[error("no node container in route node {0}")]
    NoContainerAtRouteNode(RouteNodeId),

    #[error("equipment {equipment_id} is not present in route node {route_node_id}")]
    NotAtRouteNode {
        equipment_id: Uuid,
        route_node_id: RouteNodeId,
    },
}

impl TraceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::CycleDetected(_) => ErrorCode::TraceCycleDetected,
            Self::DanglingReference(_) => ErrorCode::TraceDanglingReference,
            Self::ElementNotFound(_) => ErrorCode::ElementNotFound,
            Self::NoContainerAtRouteNode(_) => ErrorCode::EquipmentNotFound,
            Self::NotAtRouteNode { .. } => ErrorCode::NotAtRouteNode,
        }
    }
}
