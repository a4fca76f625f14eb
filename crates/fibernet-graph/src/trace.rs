//! Connectivity tracer
//!
//! Follows the signal from a terminal or span segment through the
//! connectivity graph in both directions. Each visited terminal and span
//! segment becomes a hop; hops are numbered from 1 moving away from the
//! start, which itself is reported as hop 0.
//!
//! At a splitter input the default trace continues on one output; with
//! `fan_out` every output becomes a branch whose numbering continues from
//! the split.

use crate::element::ElementRef;
use crate::error::TraceError;
use crate::geometry::{RouteGeometry, SegmentGeometry};
use crate::graph::GraphEdge;
use crate::projection::UtilityGraphProjection;
use fibernet_model::{
    RouteNodeId, RouteSegmentId, SpanEquipment, SpanEquipmentId, SpanSegmentId, SpanStructureId,
    TerminalEquipment, TerminalEquipmentId, TerminalId, TerminalStructureId,
};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Default hop bound
pub const DEFAULT_MAX_HOPS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceDirection {
    /// Along the signal, `from -> to`
    Downstream,
    /// Against the signal
    Upstream,
}

impl TraceDirection {
    #[inline]
    #[must_use]
    pub const fn graph_direction(self) -> Direction {
        match self {
            Self::Downstream => Direction::Outgoing,
            Self::Upstream => Direction::Incoming,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceOptions {
    /// Return every splitter output as a branch instead of one path
    pub fan_out: bool,
    /// Stop and mark the path truncated after this many hops
    pub max_hops: usize,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            fan_out: false,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

/// What a hop arrives at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HopTarget {
    SpanSegment {
        span_equipment_id: SpanEquipmentId,
        span_structure_id: SpanStructureId,
        span_segment_id: SpanSegmentId,
        structure_position: u16,
        route_segment_ids: Vec<RouteSegmentId>,
        geometries: Vec<SegmentGeometry>,
    },
    Terminal {
        terminal_equipment_id: TerminalEquipmentId,
        terminal_structure_id: TerminalStructureId,
        terminal_id: TerminalId,
        structure_position: u16,
        terminal_name: String,
        route_node_id: Option<RouteNodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHop {
    pub hop_seq_no: usize,
    pub element_id: Uuid,
    pub equipment_name: Option<String>,
    pub target: HopTarget,
    /// Segment length, or patch cord length for a terminal reached by a patch
    pub length_m: f64,
    pub total_length_m: f64,
}

impl TraceHop {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.target, HopTarget::Terminal { .. })
    }
}

/// One direction of a trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracePath {
    pub hops: Vec<TraceHop>,
    /// Splitter outputs when fanning out; empty otherwise
    pub branches: Vec<TracePath>,
    pub truncated: bool,
}

impl TracePath {
    /// Hops on this path and all branches
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.hops.len() + self.branches.iter().map(TracePath::hop_count).sum::<usize>()
    }

    /// Last hop of the path, ignoring branches
    #[must_use]
    pub fn last(&self) -> Option<&TraceHop> {
        self.hops.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub route_node_id: RouteNodeId,
    pub origin: TraceHop,
    pub downstream: TracePath,
    pub upstream: TracePath,
}

pub struct ConnectivityTracer<'a, G: RouteGeometry + ?Sized> {
    projection: &'a UtilityGraphProjection,
    geometry: &'a G,
    options: TraceOptions,
}

impl<'a, G: RouteGeometry + ?Sized> ConnectivityTracer<'a, G> {
    #[must_use]
    pub fn new(projection: &'a UtilityGraphProjection, geometry: &'a G, options: TraceOptions) -> Self {
        Self {
            projection,
            geometry,
            options,
        }
    }

    /// Trace both directions from a terminal or span segment at a route node
    ///
    /// Structure and span equipment ids resolve to their first segment.
    ///
    /// # Errors
    /// Unknown start, start not present at the route node, a revisited
    /// element or a graph edge to an unregistered element
    pub fn trace(&self, route_node_id: RouteNodeId, start: Uuid) -> Result<TraceResult, TraceError> {
        let start = self.resolve_start(route_node_id, start)?;
        let origin = self.hop(start, 0, 0.0, 0.0)?;

        let downstream = self.walk(start, TraceDirection::Downstream, 0, origin.total_length_m, &mut HashSet::from([start]))?;
        let upstream = self.walk(start, TraceDirection::Upstream, 0, origin.total_length_m, &mut HashSet::from([start]))?;

        debug!(
            start = %start,
            downstream = downstream.hop_count(),
            upstream = upstream.hop_count(),
            "trace complete"
        );
        Ok(TraceResult {
            route_node_id,
            origin,
            downstream,
            upstream,
        })
    }

    /// Trace one direction, without the origin hop
    ///
    /// # Errors
    /// As [`Self::trace`], without the route node check
    pub fn trace_direction(&self, start: Uuid, direction: TraceDirection) -> Result<TracePath, TraceError> {
        if !self.projection.graph().contains_node(start) {
            return Err(TraceError::ElementNotFound(start));
        }
        let origin = self.hop(start, 0, 0.0, 0.0)?;
        self.walk(start, direction, 0, origin.total_length_m, &mut HashSet::from([start]))
    }

    fn resolve_start(&self, route_node_id: RouteNodeId, id: Uuid) -> Result<Uuid, TraceError> {
        match self.projection.element(id) {
            Some(ElementRef::Terminal {
                terminal_equipment_id,
                terminal_id,
                ..
            }) => {
                let at_node = self
                    .projection
                    .try_get_equipment::<TerminalEquipment>(terminal_equipment_id)
                    .and_then(|e| self.projection.route_node_of(e))
                    == Some(route_node_id);
                if !at_node {
                    return Err(TraceError::NotAtRouteNode {
                        equipment_id: terminal_equipment_id.uuid(),
                        route_node_id,
                    });
                }
                Ok(terminal_id.uuid())
            }
            Some(ElementRef::SpanEquipment(_) | ElementRef::SpanStructure { .. } | ElementRef::SpanSegment { .. }) => {
                let segment = self
                    .projection
                    .try_get_graph_segment_ref(id)
                    .ok_or(TraceError::ElementNotFound(id))?;
                let at_node = self
                    .projection
                    .span_walk(segment.span_equipment_id)
                    .is_some_and(|w| w.node_position(route_node_id).is_some());
                if !at_node {
                    return Err(TraceError::NotAtRouteNode {
                        equipment_id: segment.span_equipment_id.uuid(),
                        route_node_id,
                    });
                }
                Ok(segment.span_segment_id.uuid())
            }
            _ => Err(TraceError::ElementNotFound(id)),
        }
    }

    fn walk(
        &self,
        mut current: Uuid,
        direction: TraceDirection,
        mut seq: usize,
        mut total: f64,
        visited: &mut HashSet<Uuid>,
    ) -> Result<TracePath, TraceError> {
        let mut path = TracePath::default();
        loop {
            let next = ordered_neighbors(self.projection, current, direction.graph_direction())?;
            if next.is_empty() {
                return Ok(path);
            }
            if seq >= self.options.max_hops {
                path.truncated = true;
                return Ok(path);
            }

            if next.len() > 1 && self.options.fan_out {
                for (id, edge) in next {
                    let mut branch_visited = visited.clone();
                    path.branches
                        .push(self.branch(id, edge, direction, seq, total, &mut branch_visited)?);
                }
                return Ok(path);
            }
            let (id, edge) = self.default_branch(&next, direction);

            let hop = self.visit(id, edge, seq + 1, total, visited)?;
            total = hop.total_length_m;
            path.hops.push(hop);
            seq += 1;
            current = id;
        }
    }

    fn branch(
        &self,
        id: Uuid,
        edge: GraphEdge,
        direction: TraceDirection,
        seq: usize,
        total: f64,
        visited: &mut HashSet<Uuid>,
    ) -> Result<TracePath, TraceError> {
        let hop = self.visit(id, edge, seq + 1, total, visited)?;
        let total = hop.total_length_m;
        let mut rest = self.walk(id, direction, seq + 1, total, visited)?;
        rest.hops.insert(0, hop);
        Ok(rest)
    }

    /// First candidate with onward connectivity, else the first candidate
    fn default_branch(&self, candidates: &[(Uuid, GraphEdge)], direction: TraceDirection) -> (Uuid, GraphEdge) {
        let graph = self.projection.graph();
        let onward = candidates
            .iter()
            .find(|(id, _)| graph.has_external(*id, direction.graph_direction()));
        *onward.unwrap_or(&candidates[0])
    }

    fn visit(
        &self,
        id: Uuid,
        edge: GraphEdge,
        seq: usize,
        total: f64,
        visited: &mut HashSet<Uuid>,
    ) -> Result<TraceHop, TraceError> {
        if !visited.insert(id) {
            return Err(TraceError::CycleDetected(id));
        }
        let patch = match edge {
            GraphEdge::Patch { fiber_length_m } => fiber_length_m,
            GraphEdge::SegmentEnd | GraphEdge::Internal => 0.0,
        };
        self.hop(id, seq, patch, total)
    }

    fn hop(&self, id: Uuid, seq: usize, patch_length: f64, total: f64) -> Result<TraceHop, TraceError> {
        match self.projection.element(id) {
            Some(ElementRef::SpanSegment {
                span_equipment_id,
                span_structure_id,
                span_segment_id,
            }) => {
                let span = self
                    .projection
                    .try_get_equipment::<SpanEquipment>(span_equipment_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                let structure = span
                    .structure(span_structure_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                let route_segment_ids: Vec<RouteSegmentId> = self
                    .projection
                    .walk_of(span)
                    .map(|w| w.segment_ids().collect())
                    .unwrap_or_default();
                let geometries: Vec<SegmentGeometry> = route_segment_ids
                    .iter()
                    .filter_map(|s| self.geometry.segment_geometry(*s))
                    .collect();
                let length_m: f64 = geometries.iter().map(|g| g.length_m).sum();

                Ok(TraceHop {
                    hop_seq_no: seq,
                    element_id: id,
                    equipment_name: span.naming.as_ref().and_then(|n| n.name.clone()),
                    target: HopTarget::SpanSegment {
                        span_equipment_id,
                        span_structure_id,
                        span_segment_id,
                        structure_position: structure.position,
                        route_segment_ids,
                        geometries,
                    },
                    length_m,
                    total_length_m: total + length_m,
                })
            }
            Some(ElementRef::Terminal { terminal_id, .. }) => {
                let (equipment, structure, terminal) = self
                    .projection
                    .terminal(terminal_id)
                    .ok_or(TraceError::DanglingReference(id))?;
                Ok(TraceHop {
                    hop_seq_no: seq,
                    element_id: id,
                    equipment_name: equipment.naming.as_ref().and_then(|n| n.name.clone()),
                    target: HopTarget::Terminal {
                        terminal_equipment_id: equipment.id,
                        terminal_structure_id: structure.id,
                        terminal_id,
                        structure_position: structure.position,
                        terminal_name: terminal.name.clone(),
                        route_node_id: self.projection.route_node_of(equipment),
                    },
                    length_m: patch_length,
                    total_length_m: total + patch_length,
                })
            }
            _ => Err(TraceError::DanglingReference(id)),
        }
    }
}

/// Neighbours in a stable order
///
/// An external link wins over internal wiring; internal neighbours come in
/// structure position then terminal order.
pub(crate) fn ordered_neighbors(
    projection: &UtilityGraphProjection,
    id: Uuid,
    direction: Direction,
) -> Result<Vec<(Uuid, GraphEdge)>, TraceError> {
    let neighbors = projection.graph().neighbors(id, direction);
    if let Some(external) = neighbors.iter().find(|(_, e)| e.is_external()) {
        return Ok(vec![*external]);
    }

    let mut keyed = Vec::with_capacity(neighbors.len());
    for (neighbor, edge) in neighbors {
        let key = match projection.element(neighbor) {
            Some(ElementRef::Terminal { terminal_id, .. }) => {
                let (_, structure, _) = projection
                    .terminal(terminal_id)
                    .ok_or(TraceError::DanglingReference(neighbor))?;
                let index = structure
                    .terminals
                    .iter()
                    .position(|t| t.id == terminal_id)
                    .unwrap_or(usize::MAX);
                (structure.position, index)
            }
            Some(_) => (u16::MAX, usize::MAX),
            None => return Err(TraceError::DanglingReference(neighbor)),
        };
        keyed.push((key, neighbor, edge));
    }
    keyed.sort_by_key(|(key, neighbor, _)| (*key, *neighbor));
    Ok(keyed.into_iter().map(|(_, n, e)| (n, e)).collect())
}
