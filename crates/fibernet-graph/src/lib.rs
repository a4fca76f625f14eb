//! Fibernet Graph - utility graph projection and its derived algorithms
//!
//! The projection folds domain events into equipment state, secondary
//! indices and a directed connectivity graph. Walk planning, tracing and
//! outage views are read-only passes over a projection snapshot.
//!
//! # Example
//!
//! ```rust,ignore
//! use fibernet_graph::prelude::*;
//!
//! let projection = UtilityGraphProjection::rebuild(&events)?;
//! let trace = ConnectivityTracer::new(&projection, &NoGeometry, TraceOptions::default())
//!     .trace(route_node_id, terminal_id.uuid())?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod element;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod index;
pub mod outage;
pub mod projection;
pub mod trace;
pub mod walk;

#[cfg(test)]
mod fixture;

pub use element::{ElementRef, SpanSegmentRef};
pub use error::{ProjectionError, TraceError};
pub use geometry::{NoGeometry, RouteGeometry, SegmentGeometry};
pub use graph::{ConnectivityGraph, GraphEdge};
pub use index::{NameIndex, RelatedCablesIndex};
pub use outage::{OutageViewBuilder, OutageViewNode, DEFAULT_INSTALLATIONS_FOUND};
pub use projection::{ProjectionStats, UtilityGraphProjection};
pub use trace::{
    ConnectivityTracer, HopTarget, TraceDirection, TraceHop, TraceOptions, TracePath, TraceResult,
    DEFAULT_MAX_HOPS,
};
pub use walk::WalkSynchronizer;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for querying the projection
    pub use crate::{
        ConnectivityTracer, NoGeometry, OutageViewBuilder, OutageViewNode, ProjectionError,
        RouteGeometry, TraceDirection, TraceError, TraceOptions, TraceResult,
        UtilityGraphProjection, WalkSynchronizer,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
