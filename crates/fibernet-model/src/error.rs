//! Error codes and aggregate errors
//!
//! Commands fail with a stable [`ErrorCode`] that crosses the command surface
//! unchanged; the rich error enums below carry the details.

use crate::ids::{
    ManufacturerId, NodeContainerId, RackId, RouteElementId, SpanEquipmentId, SpanSegmentId,
    SpecificationId, TerminalEquipmentId, TerminalId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input rejected before any event
    Validation,
    /// Request conflicts with current network structure
    Structural,
    /// Referenced entity is unknown
    NotFound,
    /// Trace or outage query could not complete
    Trace,
    /// Invariant breach inside the projection
    Fatal,
}

/// Stable error codes returned by command and query handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyName,
    DuplicateName,
    DuplicateId,
    InvalidWalk,
    InvalidInterest,
    InvalidSpecification,
    NoChange,
    InvalidRackPlacement,
    InvalidRackHeight,
    RouteNetworkRejected,
    InvalidRequest,
    NodeContainerAlreadyExistsInRouteNode,
    FixedSpecNotMutable,
    IncompatibleWithExistingAffixes,
    SpanSegmentTerminatedAtMovedEnd,
    AlreadyAffixed,
    AffixWalkMismatch,
    NotAffixedAtRouteNode,
    NotAtRouteNode,
    RackSpaceOccupied,
    TerminalAlreadyConnected,
    SpanSegmentEndAlreadyConnected,
    NotConnected,
    EquipmentNotFound,
    ElementNotFound,
    SpecificationNotFound,
    ManufacturerNotFound,
    RackNotFound,
    TraceCycleDetected,
    TraceDanglingReference,
    ProjectionFailure,
}

impl ErrorCode {
    /// Taxonomy bucket for this code
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::EmptyName
            | Self::DuplicateName
            | Self::DuplicateId
            | Self::InvalidWalk
            | Self::InvalidInterest
            | Self::InvalidSpecification
            | Self::NoChange
            | Self::InvalidRackPlacement
            | Self::InvalidRackHeight
            | Self::RouteNetworkRejected
            | Self::InvalidRequest => ErrorKind::Validation,
            Self::NodeContainerAlreadyExistsInRouteNode
            | Self::FixedSpecNotMutable
            | Self::IncompatibleWithExistingAffixes
            | Self::SpanSegmentTerminatedAtMovedEnd
            | Self::AlreadyAffixed
            | Self::AffixWalkMismatch
            | Self::NotAffixedAtRouteNode
            | Self::NotAtRouteNode
            | Self::RackSpaceOccupied
            | Self::TerminalAlreadyConnected
            | Self::SpanSegmentEndAlreadyConnected
            | Self::NotConnected => ErrorKind::Structural,
            Self::EquipmentNotFound
            | Self::ElementNotFound
            | Self::SpecificationNotFound
            | Self::ManufacturerNotFound
            | Self::RackNotFound => ErrorKind::NotFound,
            Self::TraceCycleDetected | Self::TraceDanglingReference => ErrorKind::Trace,
            Self::ProjectionFailure => ErrorKind::Fatal,
        }
    }

    /// Wire representation, e.g. `NODE_CONTAINER_ALREADY_EXISTS_IN_ROUTE_NODE`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyName => "EMPTY_NAME",
            Self::DuplicateName => "DUPLICATE_NAME",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::InvalidWalk => "INVALID_WALK",
            Self::InvalidInterest => "INVALID_INTEREST",
            Self::InvalidSpecification => "INVALID_SPECIFICATION",
            Self::NoChange => "NO_CHANGE",
            Self::InvalidRackPlacement => "INVALID_RACK_PLACEMENT",
            Self::InvalidRackHeight => "INVALID_RACK_HEIGHT",
            Self::RouteNetworkRejected => "ROUTE_NETWORK_REJECTED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NodeContainerAlreadyExistsInRouteNode => "NODE_CONTAINER_ALREADY_EXISTS_IN_ROUTE_NODE",
            Self::FixedSpecNotMutable => "FIXED_SPEC_NOT_MUTABLE",
            Self::IncompatibleWithExistingAffixes => "INCOMPATIBLE_WITH_EXISTING_AFFIXES",
            Self::SpanSegmentTerminatedAtMovedEnd => "SPAN_SEGMENT_TERMINATED_AT_MOVED_END",
            Self::AlreadyAffixed => "ALREADY_AFFIXED",
            Self::AffixWalkMismatch => "AFFIX_WALK_MISMATCH",
            Self::NotAffixedAtRouteNode => "NOT_AFFIXED_AT_ROUTE_NODE",
            Self::NotAtRouteNode => "NOT_AT_ROUTE_NODE",
            Self::RackSpaceOccupied => "RACK_SPACE_OCCUPIED",
            Self::TerminalAlreadyConnected => "TERMINAL_ALREADY_CONNECTED",
            Self::SpanSegmentEndAlreadyConnected => "SPAN_SEGMENT_END_ALREADY_CONNECTED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::EquipmentNotFound => "EQUIPMENT_NOT_FOUND",
            Self::ElementNotFound => "ELEMENT_NOT_FOUND",
            Self::SpecificationNotFound => "SPECIFICATION_NOT_FOUND",
            Self::ManufacturerNotFound => "MANUFACTURER_NOT_FOUND",
            Self::RackNotFound => "RACK_NOT_FOUND",
            Self::TraceCycleDetected => "TRACE_CYCLE_DETECTED",
            Self::TraceDanglingReference => "TRACE_DANGLING_REFERENCE",
            Self::ProjectionFailure => "PROJECTION_FAILURE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating a command against aggregate state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EquipmentError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name '{0}' is already in use")]
    DuplicateName(String),

    #[error("id {0} is already in use")]
    DuplicateId(Uuid),

    #[error("invalid walk of interest: {0}")]
    InvalidWalk(String),

    #[error("invalid route network interest: {0}")]
    InvalidInterest(String),

    #[error("nothing to change on {0}")]
    NoChange(Uuid),

    #[error("a node container already exists in route node {0}")]
    NodeContainerAlreadyExistsInRouteNode(RouteElementId),

    #[error("span equipment {0} has a fixed specification and cannot receive additional structures")]
    FixedSpecNotMutable(SpanEquipmentId),

    #[error("new walk for span equipment {span_equipment_id} is incompatible with existing affixes: {reason}")]
    IncompatibleWithExistingAffixes {
        span_equipment_id: SpanEquipmentId,
        reason: String,
    },

    #[error("span segment {0} is terminated at an end the move relocates")]
    SpanSegmentTerminatedAtMovedEnd(SpanSegmentId),

    #[error("span equipment {span_equipment_id} is already affixed to conduit segment {segment_id}")]
    AlreadyAffixed {
        span_equipment_id: SpanEquipmentId,
        segment_id: SpanSegmentId,
    },

    #[error("walk of span equipment {0} does not run between the conduit end nodes")]
    AffixWalkMismatch(SpanEquipmentId),

    #[error("span equipment {span_equipment_id} is not affixed to any conduit in route node {route_node_id}")]
    NotAffixedAtRouteNode {
        span_equipment_id: SpanEquipmentId,
        route_node_id: RouteElementId,
    },

    #[error("equipment {equipment_id} is not present in route node {route_node_id}")]
    NotAtRouteNode {
        equipment_id: Uuid,
        route_node_id: RouteElementId,
    },

    #[error("rack placement is invalid: {0}")]
    InvalidRackPlacement(String),

    #[error("rack {rack_id} cannot be {requested} units high, content reaches unit {occupied}")]
    InvalidRackHeight {
        rack_id: RackId,
        requested: u16,
        occupied: u16,
    },

    #[error("rack {rack_id} units {from}..{to} are already occupied")]
    RackSpaceOccupied { rack_id: RackId, from: u16, to: u16 },

    #[error("terminal {0} is already connected on that side")]
    TerminalAlreadyConnected(TerminalId),

    #[error("span segment {0} end is already connected")]
    SpanSegmentEndAlreadyConnected(SpanSegmentId),

    #[error("element {0} is not connected")]
    NotConnected(Uuid),

    #[error("span equipment {0} not found")]
    SpanEquipmentNotFound(SpanEquipmentId),

    #[error("node container {0} not found")]
    NodeContainerNotFound(NodeContainerId),

    #[error("terminal equipment {0} not found")]
    TerminalEquipmentNotFound(TerminalEquipmentId),

    #[error("element {0} not found")]
    ElementNotFound(Uuid),

    #[error("specification {0} not found")]
    SpecificationNotFound(SpecificationId),

    #[error("manufacturer {0} not found")]
    ManufacturerNotFound(ManufacturerId),

    #[error("rack {0} not found")]
    RackNotFound(RackId),
}

impl EquipmentError {
    /// Stable code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyName => ErrorCode::EmptyName,
            Self::DuplicateName(_) => ErrorCode::DuplicateName,
            Self::DuplicateId(_) => ErrorCode::DuplicateId,
            Self::InvalidWalk(_) => ErrorCode::InvalidWalk,
            Self::InvalidInterest(_) => ErrorCode::InvalidInterest,
            Self::NoChange(_) => ErrorCode::NoChange,
            Self::NodeContainerAlreadyExistsInRouteNode(_) => ErrorCode::NodeContainerAlreadyExistsInRouteNode,
            Self::FixedSpecNotMutable(_) => ErrorCode::FixedSpecNotMutable,
            Self::IncompatibleWithExistingAffixes { .. } => ErrorCode::IncompatibleWithExistingAffixes,
            Self::SpanSegmentTerminatedAtMovedEnd(_) => ErrorCode::SpanSegmentTerminatedAtMovedEnd,
            Self::AlreadyAffixed { .. } => ErrorCode::AlreadyAffixed,
            Self::AffixWalkMismatch(_) => ErrorCode::AffixWalkMismatch,
            Self::NotAffixedAtRouteNode { .. } => ErrorCode::NotAffixedAtRouteNode,
            Self::NotAtRouteNode { .. } => ErrorCode::NotAtRouteNode,
            Self::InvalidRackPlacement(_) => ErrorCode::InvalidRackPlacement,
            Self::InvalidRackHeight { .. } => ErrorCode::InvalidRackHeight,
            Self::RackSpaceOccupied { .. } => ErrorCode::RackSpaceOccupied,
            Self::TerminalAlreadyConnected(_) => ErrorCode::TerminalAlreadyConnected,
            Self::SpanSegmentEndAlreadyConnected(_) => ErrorCode::SpanSegmentEndAlreadyConnected,
            Self::NotConnected(_) => ErrorCode::NotConnected,
            Self::SpanEquipmentNotFound(_)
            | Self::NodeContainerNotFound(_)
            | Self::TerminalEquipmentNotFound(_) => ErrorCode::EquipmentNotFound,
            Self::ElementNotFound(_) => ErrorCode::ElementNotFound,
            Self::SpecificationNotFound(_) => ErrorCode::SpecificationNotFound,
            Self::ManufacturerNotFound(_) => ErrorCode::ManufacturerNotFound,
            Self::RackNotFound(_) => ErrorCode::RackNotFound,
        }
    }
}
