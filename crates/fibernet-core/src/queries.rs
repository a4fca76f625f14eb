//! Read-only queries over the current projection
//!
//! Queries never take the writer gate; they run against whatever batch was
//! last fully applied.

use crate::error::QueryError;
use crate::service::UtilityNetworkService;
use fibernet_graph::{
    ConnectivityTracer, ElementRef, GraphEdge, OutageViewBuilder, OutageViewNode, TraceDirection, TraceError,
    TracePath, TraceResult, UtilityGraphProjection,
};
use fibernet_model::{
    Equipment, EquipmentKind, NamingInfo, NodeContainer, RouteNodeId, SpanEquipment, SpanSegmentEnd,
    SpanSegmentId, SpecificationId, TerminalEquipment, TerminalEquipmentId, TerminalId, WalkOfInterest,
};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentDetailsRequest {
    /// Equipment ids, or ids of anything inside an equipment
    #[serde(default)]
    pub ids: Vec<Uuid>,
    /// Case-insensitive name prefix
    #[serde(default)]
    pub name_search: Option<String>,
    #[serde(default)]
    pub include_trace: bool,
}

impl EquipmentDetailsRequest {
    #[must_use]
    pub fn by_ids(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_name(prefix: impl Into<String>) -> Self {
        Self {
            name_search: Some(prefix.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_trace(mut self) -> Self {
        self.include_trace = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTrace {
    pub span_segment_id: SpanSegmentId,
    pub downstream: TracePath,
    pub upstream: TracePath,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentDetails {
    pub equipment: SpanEquipment,
    pub walk: Option<WalkOfInterest>,
    /// One entry per segment when traces were requested
    pub traces: Vec<SegmentTrace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentDetails {
    pub span_equipment: Vec<SpanEquipmentDetails>,
    pub node_containers: Vec<NodeContainer>,
    pub terminal_equipment: Vec<TerminalEquipment>,
}

impl EquipmentDetails {
    #[must_use]
    pub fn len(&self) -> usize {
        self.span_equipment.len() + self.node_containers.len() + self.terminal_equipment.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceKind {
    /// Connector terminals of terminal equipment
    PatchSide,
    /// Splice terminals of terminal equipment
    SpliceSide,
    /// Fibers or ducts of span equipment ending in the node
    SpanSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityFace {
    pub equipment_id: Uuid,
    pub equipment_kind: EquipmentKind,
    pub kind: FaceKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceConnection {
    /// Terminal or span segment id
    pub id: Uuid,
    pub name: String,
    pub is_connected: bool,
    pub connected_to: Option<String>,
}

/// Far side of one terminal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEnd {
    pub element_id: Uuid,
    pub description: String,
    /// Patch cord length when the link is a patch
    pub fiber_length_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub terminal_id: TerminalId,
    pub name: String,
    /// Where the signal comes from
    pub a: Option<LineEnd>,
    /// Where the signal goes to
    pub z: Option<LineEnd>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalStructureLines {
    pub position: u16,
    pub name: String,
    pub lines: Vec<TerminalLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEquipmentConnectivityView {
    pub terminal_equipment_id: TerminalEquipmentId,
    pub name: String,
    pub structures: Vec<TerminalStructureLines>,
}

fn name_or(naming: Option<&NamingInfo>, fallback: impl FnOnce() -> String) -> String {
    naming.and_then(|n| n.name.clone()).unwrap_or_else(fallback)
}

fn terminal_equipment_name(p: &UtilityGraphProjection, equipment: &TerminalEquipment) -> String {
    name_or(equipment.naming.as_ref(), || {
        p.catalog()
            .terminal_equipment_specification(equipment.specification_id)
            .map_or_else(|| equipment.id.to_string(), |s| s.short_name.clone())
    })
}

fn span_equipment_name(p: &UtilityGraphProjection, span: &SpanEquipment) -> String {
    name_or(span.naming.as_ref(), || {
        p.catalog()
            .span_equipment_specification(span.specification_id)
            .map_or_else(|| span.id.to_string(), |s| s.name.clone())
    })
}

fn structure_name(p: &UtilityGraphProjection, specification_id: SpecificationId, position: u16) -> String {
    p.catalog()
        .terminal_structure_specification(specification_id)
        .map_or_else(|| position.to_string(), |s| format!("{position} {}", s.short_name))
}

/// Human-readable label for a terminal or span segment
fn describe(p: &UtilityGraphProjection, id: Uuid) -> String {
    match p.element(id) {
        Some(ElementRef::Terminal { terminal_id, .. }) => match p.terminal(terminal_id) {
            Some((equipment, structure, terminal)) => format!(
                "{} {}-{}",
                terminal_equipment_name(p, equipment),
                structure.position,
                terminal.name
            ),
            None => id.to_string(),
        },
        Some(ElementRef::SpanSegment { .. }) => match p.try_get_graph_segment_ref(id) {
            Some(segment) => match p.try_get_equipment::<SpanEquipment>(segment.span_equipment_id) {
                Some(span) => format!("{} ({})", span_equipment_name(p, span), segment.structure_position),
                None => id.to_string(),
            },
            None => id.to_string(),
        },
        _ => id.to_string(),
    }
}

fn line_end(p: &UtilityGraphProjection, terminal_id: TerminalId, direction: Direction) -> Option<LineEnd> {
    let (neighbor, edge) = p.graph().external_neighbor(terminal_id.uuid(), direction)?;
    Some(LineEnd {
        element_id: neighbor,
        description: describe(p, neighbor),
        fiber_length_m: match edge {
            GraphEdge::Patch { fiber_length_m } => Some(fiber_length_m),
            GraphEdge::SegmentEnd | GraphEdge::Internal => None,
        },
    })
}

/// Which end of the span equipment lies in the node, if any
fn end_at(walk: &WalkOfInterest, route_node_id: RouteNodeId) -> Option<SpanSegmentEnd> {
    if walk.from_node_id() == route_node_id {
        Some(SpanSegmentEnd::From)
    } else if walk.to_node_id() == route_node_id {
        Some(SpanSegmentEnd::To)
    } else {
        None
    }
}

fn terminal_equipment_at<'a>(
    p: &'a UtilityGraphProjection,
    route_node_id: RouteNodeId,
) -> Vec<&'a TerminalEquipment> {
    p.node_container_at(route_node_id)
        .map(|c| {
            c.all_terminal_equipment()
                .into_iter()
                .filter_map(|id| p.try_get_equipment::<TerminalEquipment>(id))
                .collect()
        })
        .unwrap_or_default()
}

impl UtilityNetworkService {
    /// Equipment by id or name prefix, optionally with per-segment traces
    ///
    /// # Errors
    /// `NotFound` for an id that resolves to nothing, or a trace error
    pub fn get_equipment_details(&self, request: &EquipmentDetailsRequest) -> Result<EquipmentDetails, QueryError> {
        self.read(|p| {
            let mut wanted = Vec::new();
            for id in &request.ids {
                let element = p.element(*id).ok_or(QueryError::NotFound(*id))?;
                wanted.push(element.equipment_id());
            }
            if let Some(prefix) = &request.name_search {
                wanted.extend(p.search_by_name_prefix(prefix));
            }

            let mut seen = HashSet::new();
            let mut details = EquipmentDetails::default();
            for id in wanted.into_iter().filter(|id| seen.insert(*id)) {
                match p.equipment(id).ok_or(QueryError::NotFound(id))? {
                    Equipment::Span(span) => {
                        let traces = if request.include_trace {
                            self.segment_traces(p, span)?
                        } else {
                            Vec::new()
                        };
                        details.span_equipment.push(SpanEquipmentDetails {
                            equipment: span.clone(),
                            walk: p.walk_of(span),
                            traces,
                        });
                    }
                    Equipment::NodeContainer(container) => details.node_containers.push(container.clone()),
                    Equipment::Terminal(equipment) => details.terminal_equipment.push(equipment.clone()),
                }
            }
            debug!(found = details.len(), "equipment details resolved");
            Ok(details)
        })
    }

    fn segment_traces(&self, p: &UtilityGraphProjection, span: &SpanEquipment) -> Result<Vec<SegmentTrace>, QueryError> {
        let tracer = ConnectivityTracer::new(p, &*self.geometry, self.config().trace_options(None));
        span.segments()
            .map(|(_, segment)| {
                Ok(SegmentTrace {
                    span_segment_id: segment.id,
                    downstream: tracer.trace_direction(segment.id.uuid(), TraceDirection::Downstream)?,
                    upstream: tracer.trace_direction(segment.id.uuid(), TraceDirection::Upstream)?,
                })
            })
            .collect()
    }

    /// Connectable faces of the equipment in a route node
    ///
    /// Terminal equipment comes first in container display order, followed by
    /// cables ending in the node.
    #[must_use]
    pub fn get_connectivity_faces(&self, route_node_id: RouteNodeId) -> Vec<ConnectivityFace> {
        self.read(|p| {
            let mut faces = Vec::new();
            for equipment in terminal_equipment_at(p, route_node_id) {
                let name = terminal_equipment_name(p, equipment);
                let terminals: Vec<_> = equipment.terminals().map(|(_, t)| t).collect();
                for (kind, present) in [
                    (FaceKind::PatchSide, terminals.iter().any(|t| !t.is_splice)),
                    (FaceKind::SpliceSide, terminals.iter().any(|t| t.is_splice)),
                ] {
                    if present {
                        faces.push(ConnectivityFace {
                            equipment_id: equipment.id.uuid(),
                            equipment_kind: EquipmentKind::TerminalEquipment,
                            kind,
                            name: name.clone(),
                        });
                    }
                }
            }

            for span in p.span_equipment_at(route_node_id) {
                let ends_here = p.walk_of(span).and_then(|w| end_at(&w, route_node_id)).is_some();
                if span.is_cable && ends_here {
                    faces.push(ConnectivityFace {
                        equipment_id: span.id.uuid(),
                        equipment_kind: EquipmentKind::SpanEquipment,
                        kind: FaceKind::SpanSide,
                        name: span_equipment_name(p, span),
                    });
                }
            }
            faces
        })
    }

    /// Connection points of one face, in structure and terminal order
    ///
    /// # Errors
    /// `NotFound` for unknown equipment, `InvalidRequest` when the face kind
    /// does not fit the equipment, `NotAtRouteNode` when it is elsewhere
    pub fn get_connectivity_face_connections(
        &self,
        route_node_id: RouteNodeId,
        equipment_id: Uuid,
        kind: FaceKind,
    ) -> Result<Vec<FaceConnection>, QueryError> {
        self.read(|p| match (p.equipment(equipment_id), kind) {
            (None, _) => Err(QueryError::NotFound(equipment_id)),
            (Some(Equipment::Terminal(equipment)), FaceKind::PatchSide | FaceKind::SpliceSide) => {
                if p.route_node_of(equipment) != Some(route_node_id) {
                    return Err(TraceError::NotAtRouteNode {
                        equipment_id,
                        route_node_id,
                    }
                    .into());
                }
                let splice = kind == FaceKind::SpliceSide;
                Ok(equipment
                    .terminals()
                    .filter(|(_, t)| t.is_splice == splice)
                    .map(|(structure, terminal)| {
                        let neighbor = p
                            .graph()
                            .external_neighbor(terminal.id.uuid(), Direction::Outgoing)
                            .or_else(|| p.graph().external_neighbor(terminal.id.uuid(), Direction::Incoming));
                        FaceConnection {
                            id: terminal.id.uuid(),
                            name: format!("{}-{}", structure.position, terminal.name),
                            is_connected: neighbor.is_some(),
                            connected_to: neighbor.map(|(id, _)| describe(p, id)),
                        }
                    })
                    .collect())
            }
            (Some(Equipment::Span(span)), FaceKind::SpanSide) => {
                let end = p
                    .walk_of(span)
                    .and_then(|w| end_at(&w, route_node_id))
                    .ok_or(TraceError::NotAtRouteNode {
                        equipment_id,
                        route_node_id,
                    })?;
                let has_inner = span.span_structures.iter().any(|s| s.level > 1);
                Ok(span
                    .segments()
                    .filter(|(structure, _)| !has_inner || structure.level > 1)
                    .map(|(structure, segment)| {
                        let terminal = segment.terminal_at(end);
                        FaceConnection {
                            id: segment.id.uuid(),
                            name: format!("{} ({})", span_equipment_name(p, span), structure.position),
                            is_connected: terminal.is_some(),
                            connected_to: terminal.map(|t| describe(p, t.uuid())),
                        }
                    })
                    .collect())
            }
            (Some(other), kind) => Err(QueryError::InvalidRequest(format!(
                "{:?} has no {kind:?} face",
                other.kind()
            ))),
        })
    }

    /// Trace a terminal or span segment in both directions
    ///
    /// # Errors
    /// Unknown start, start outside the node, cycle or dangling reference
    pub fn get_connectivity_trace_view(
        &self,
        route_node_id: RouteNodeId,
        terminal_or_segment_id: Uuid,
        fan_out: Option<bool>,
    ) -> Result<TraceResult, QueryError> {
        let options = self.config().trace_options(fan_out);
        self.read(|p| {
            ConnectivityTracer::new(p, &*self.geometry, options)
                .trace(route_node_id, terminal_or_segment_id)
                .map_err(QueryError::from)
        })
    }

    /// A/Z view of every terminal of one terminal equipment
    ///
    /// # Errors
    /// `NotFound` for unknown equipment, `NotAtRouteNode` when it is elsewhere
    pub fn get_terminal_equipment_connectivity_view(
        &self,
        route_node_id: RouteNodeId,
        terminal_equipment_id: TerminalEquipmentId,
    ) -> Result<TerminalEquipmentConnectivityView, QueryError> {
        self.read(|p| {
            let equipment = p
                .try_get_equipment::<TerminalEquipment>(terminal_equipment_id)
                .ok_or(QueryError::NotFound(terminal_equipment_id.uuid()))?;
            if p.route_node_of(equipment) != Some(route_node_id) {
                return Err(TraceError::NotAtRouteNode {
                    equipment_id: terminal_equipment_id.uuid(),
                    route_node_id,
                }
                .into());
            }

            let mut structures: Vec<_> = equipment.terminal_structures.iter().collect();
            structures.sort_by_key(|s| s.position);
            Ok(TerminalEquipmentConnectivityView {
                terminal_equipment_id,
                name: terminal_equipment_name(p, equipment),
                structures: structures
                    .into_iter()
                    .map(|structure| TerminalStructureLines {
                        position: structure.position,
                        name: structure_name(p, structure.specification_id, structure.position),
                        lines: structure
                            .terminals
                            .iter()
                            .map(|terminal| TerminalLine {
                                terminal_id: terminal.id,
                                name: terminal.name.clone(),
                                a: line_end(p, terminal.id, Direction::Incoming),
                                z: line_end(p, terminal.id, Direction::Outgoing),
                            })
                            .collect(),
                    })
                    .collect(),
            })
        })
    }

    /// Everything downstream of a node, or of one equipment in it
    ///
    /// # Errors
    /// No container at the node, or root equipment not in it
    pub fn get_outage_view(&self, route_node_id: RouteNodeId, root: Option<Uuid>) -> Result<OutageViewNode, QueryError> {
        self.read(|p| {
            OutageViewBuilder::new(p, &self.config().installations_found_label)
                .build(route_node_id, root)
                .map_err(QueryError::from)
        })
    }
}
