//! Fibernet Model - fiber network inventory domain
//!
//! Typed ids, route network interests, the specification catalog, the three
//! equipment aggregates and the domain events they emit.
//!
//! # Example
//!
//! ```rust,ignore
//! use fibernet_model::prelude::*;
//!
//! let container = NodeContainer::place(
//!     NodeContainerId::new(),
//!     spec_id,
//!     None,
//!     route_node_id,
//!     InterestId::new(),
//! );
//! let event = container.reverse_vertical_alignment();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod equipment;
pub mod error;
pub mod events;
pub mod ids;
pub mod interest;

pub use catalog::{
    CatalogError, CatalogEvent, CatalogKind, Manufacturer, NodeContainerSpecification,
    RackSpecification, SpanEquipmentSpecification, SpanStructureSpecification,
    SpanStructureTemplate, SpecificationCatalog, TerminalDirection, TerminalEquipmentSpecification,
    TerminalStructureSpecification, TerminalStructureTemplate, TerminalTemplate,
};
pub use equipment::{
    ConnectivityEvent, Equipment, EquipmentKind, NamingInfo, NodeContainer, NodeContainerAffix,
    NodeContainerEvent, NodeContainerSide, PlacedEquipment, Rack, RackPlacementMethod,
    SegmentTerminalConnect, SpanEquipment, SpanEquipmentEvent, SpanSegment, SpanSegmentEnd,
    SpanStructure, SubrackMount, Terminal, TerminalConnection, TerminalEquipment,
    TerminalEquipmentEvent, TerminalStructure, UtilityNetworkHop, VerticalContentAlignment,
};
pub use error::{EquipmentError, ErrorCode, ErrorKind};
pub use events::DomainEvent;
pub use ids::{
    EventId, InterestId, ManufacturerId, NodeContainerId, RackId, RouteElementId, RouteNodeId,
    RouteSegmentId, SpanEquipmentId, SpanSegmentId, SpanStructureId, SpecificationId,
    TerminalConnectionId, TerminalEquipmentId, TerminalId, TerminalStructureId,
};
pub use interest::{InterestKind, RouteNetworkInterest, WalkError, WalkOfInterest};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the model
    pub use crate::{
        DomainEvent, Equipment, EquipmentError, ErrorCode, InterestId, NamingInfo, NodeContainer,
        NodeContainerId, PlacedEquipment, RouteElementId, SpanEquipment, SpanEquipmentId,
        SpecificationCatalog, SpecificationId, TerminalEquipment, TerminalEquipmentId, TerminalId,
        WalkOfInterest,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
