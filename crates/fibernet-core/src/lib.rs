//! Fibernet Core - command and query surface of the utility network
//!
//! [`UtilityNetworkService`] owns the projection and the hash-chained event
//! log. Commands validate against the projection, fold their events into it,
//! seal them into the log and hand one notification per event to the
//! [`ChangeNotifier`]. Queries read the latest applied state.
//!
//! # Example
//!
//! ```rust,ignore
//! use fibernet_core::prelude::*;
//! use std::sync::Arc;
//!
//! let service = UtilityNetworkService::new(
//!     ServiceConfig::default(),
//!     Arc::new(InMemoryRouteNetwork::new()),
//!     Arc::new(InMemoryNotifier::new()),
//! );
//! service.place_node_container(command).await?;
//! let faces = service.get_connectivity_faces(route_node_id);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod config;
pub mod error;
pub mod event_log;
pub mod notification;
pub mod queries;
pub mod route_network;
pub mod service;
pub mod telemetry;

pub use commands::{
    AffixSpanEquipmentToNodeContainer, AffixSpanEquipmentToParent, ConnectSpanSegmentsWithTerminals,
    ConnectTerminals, DetachSpanEquipmentFromNodeContainer, DetachSpanEquipmentFromParent,
    DisconnectSpanSegmentFromTerminal, DisconnectTerminals, MoveSpanEquipment, PlaceAdditionalStructuresInSpanEquipment,
    PlaceNodeContainer, PlaceRackInNodeContainer, PlaceSpanEquipmentInRouteNetwork,
    PlaceTerminalEquipmentInNodeContainer, RackPlacement, UpdateNodeContainerProperties, UpdateRackProperties,
    UpdateSpanEquipmentProperties, UpdateTerminalEquipmentProperties,
};
pub use config::{ConfigError, ServiceConfig};
pub use error::{CommandError, QueryError};
pub use event_log::{EventEnvelope, EventLog, IntegrityReport, LogError, GENESIS_HASH};
pub use notification::{ChangeNotification, ChangeNotifier, InMemoryNotifier, NotifyError};
pub use queries::{
    ConnectivityFace, EquipmentDetails, EquipmentDetailsRequest, FaceConnection, FaceKind, LineEnd, SegmentTrace,
    SpanEquipmentDetails, TerminalEquipmentConnectivityView, TerminalLine, TerminalStructureLines,
};
pub use route_network::{InMemoryRouteNetwork, RouteNetworkError, RouteNetworkService};
pub use service::UtilityNetworkService;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the service
    pub use crate::{
        ChangeNotifier, CommandError, EquipmentDetailsRequest, EventLog, FaceKind, InMemoryNotifier,
        InMemoryRouteNetwork, QueryError, RouteNetworkService, ServiceConfig, UtilityNetworkService,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
