//! Route segment geometry lookup used by the tracer

use fibernet_model::RouteSegmentId;
use serde::{Deserialize, Serialize};

/// Line geometry and length of one route segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentGeometry {
    pub route_segment_id: RouteSegmentId,
    /// `[x, y]` pairs along the segment
    pub coordinates: Vec<[f64; 2]>,
    pub length_m: f64,
}

/// Read access to route network geometry
pub trait RouteGeometry {
    fn segment_geometry(&self, id: RouteSegmentId) -> Option<SegmentGeometry>;
}

/// Geometry source that knows nothing; traces then carry ids only
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeometry;

impl RouteGeometry for NoGeometry {
    fn segment_geometry(&self, _id: RouteSegmentId) -> Option<SegmentGeometry> {
        None
    }
}
