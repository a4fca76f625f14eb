//! Command payloads and handlers
//!
//! Every handler validates against the current projection and returns the
//! sealed envelopes of the events it produced. Walk validation happens before
//! [`UtilityNetworkService::execute`] takes the writer gate; walks rewritten
//! by affix, detach and move are registered under the gate, before commit.

use crate::error::CommandError;
use crate::event_log::EventEnvelope;
use crate::route_network::RouteNetworkError;
use crate::service::UtilityNetworkService;
use fibernet_graph::{ElementRef, UtilityGraphProjection, WalkSynchronizer};
use fibernet_model::{
    ConnectivityEvent, DomainEvent, EquipmentError, InterestId, Manufacturer,
    ManufacturerId, NamingInfo, NodeContainer, NodeContainerEvent, NodeContainerId,
    NodeContainerSide, NodeContainerSpecification, RackId, RackPlacementMethod, RackSpecification,
    RouteElementId, RouteNetworkInterest, RouteNodeId, SegmentTerminalConnect, SpanEquipment,
    SpanEquipmentEvent, SpanEquipmentId, SpanEquipmentSpecification, SpanSegmentEnd, SpanSegmentId,
    SpanStructureSpecification, SpecificationId, SubrackMount, TerminalConnection,
    TerminalConnectionId, TerminalEquipment, TerminalEquipmentEvent, TerminalEquipmentId,
    TerminalEquipmentSpecification, TerminalId, TerminalStructureSpecification,
};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

fn one() -> u16 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSpanEquipmentInRouteNetwork {
    pub span_equipment_id: SpanEquipmentId,
    pub specification_id: SpecificationId,
    pub walk: Vec<RouteElementId>,
    #[serde(default)]
    pub manufacturer_id: Option<ManufacturerId>,
    #[serde(default)]
    pub naming: Option<NamingInfo>,
}

/// `None` leaves a property alone, `Some(None)` clears it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpanEquipmentProperties {
    pub span_equipment_id: SpanEquipmentId,
    #[serde(default)]
    pub naming: Option<Option<NamingInfo>>,
    #[serde(default)]
    pub manufacturer_id: Option<Option<ManufacturerId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceAdditionalStructuresInSpanEquipment {
    /// Span equipment, or any of its structures or segments
    pub span_equipment_or_segment_id: Uuid,
    pub structure_specification_ids: Vec<SpecificationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSpanEquipment {
    pub span_equipment_id: SpanEquipmentId,
    pub walk: Vec<RouteElementId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffixSpanEquipmentToParent {
    pub span_equipment_id: SpanEquipmentId,
    pub route_node_id: RouteNodeId,
    pub parent_span_segment_id: SpanSegmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachSpanEquipmentFromParent {
    pub span_equipment_id: SpanEquipmentId,
    pub route_node_id: RouteNodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffixSpanEquipmentToNodeContainer {
    pub span_equipment_id: SpanEquipmentId,
    pub node_container_id: NodeContainerId,
    pub side: NodeContainerSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachSpanEquipmentFromNodeContainer {
    pub span_equipment_id: SpanEquipmentId,
    pub route_node_id: RouteNodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceNodeContainer {
    pub node_container_id: NodeContainerId,
    /// Node of interest registered with the route network
    pub interest_id: InterestId,
    pub specification_id: SpecificationId,
    #[serde(default)]
    pub manufacturer_id: Option<ManufacturerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNodeContainerProperties {
    pub node_container_id: NodeContainerId,
    #[serde(default)]
    pub manufacturer_id: Option<Option<ManufacturerId>>,
    #[serde(default)]
    pub specification_id: Option<SpecificationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRackInNodeContainer {
    pub node_container_id: NodeContainerId,
    pub rack_id: RackId,
    pub specification_id: SpecificationId,
    pub name: String,
    pub height_in_units: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRackProperties {
    pub rack_id: RackId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub specification_id: Option<SpecificationId>,
    #[serde(default)]
    pub height_in_units: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackPlacement {
    pub rack_id: RackId,
    pub start_unit: u16,
    pub method: RackPlacementMethod,
}

/// Place `count` copies; with a name and more than one copy, each name gets
/// a sequence number suffix starting at `start_sequence_number`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceTerminalEquipmentInNodeContainer {
    pub node_container_id: NodeContainerId,
    pub specification_id: SpecificationId,
    #[serde(default)]
    pub manufacturer_id: Option<ManufacturerId>,
    #[serde(default)]
    pub naming: Option<NamingInfo>,
    #[serde(default = "one")]
    pub count: u16,
    #[serde(default = "one")]
    pub start_sequence_number: u16,
    #[serde(default)]
    pub rack_placement: Option<RackPlacement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTerminalEquipmentProperties {
    pub terminal_equipment_id: TerminalEquipmentId,
    #[serde(default)]
    pub naming: Option<Option<NamingInfo>>,
    #[serde(default)]
    pub manufacturer_id: Option<Option<ManufacturerId>>,
    /// New lowest rack unit, for rack mounted equipment
    #[serde(default)]
    pub rack_position: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectSpanSegmentsWithTerminals {
    pub route_node_id: RouteNodeId,
    pub connects: Vec<SegmentTerminalConnect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectSpanSegmentFromTerminal {
    pub route_node_id: RouteNodeId,
    pub span_segment_id: SpanSegmentId,
    pub terminal_id: TerminalId,
}

/// Patch or splice between two terminals in the same route node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectTerminals {
    pub route_node_id: RouteNodeId,
    pub terminal_connection_id: TerminalConnectionId,
    pub from_terminal_id: TerminalId,
    pub to_terminal_id: TerminalId,
    #[serde(default)]
    pub fiber_length_m: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectTerminals {
    pub terminal_connection_id: TerminalConnectionId,
}

// ----------------------------------------------------------------------
// Lookups shared by the handlers
// ----------------------------------------------------------------------

fn span_equipment(p: &UtilityGraphProjection, id: SpanEquipmentId) -> Result<&SpanEquipment, EquipmentError> {
    p.try_get_equipment::<SpanEquipment>(id)
        .ok_or(EquipmentError::SpanEquipmentNotFound(id))
}

fn node_container(p: &UtilityGraphProjection, id: NodeContainerId) -> Result<&NodeContainer, EquipmentError> {
    p.try_get_equipment::<NodeContainer>(id)
        .ok_or(EquipmentError::NodeContainerNotFound(id))
}

fn terminal_equipment(
    p: &UtilityGraphProjection,
    id: TerminalEquipmentId,
) -> Result<&TerminalEquipment, EquipmentError> {
    p.try_get_equipment::<TerminalEquipment>(id)
        .ok_or(EquipmentError::TerminalEquipmentNotFound(id))
}

fn check_manufacturer(p: &UtilityGraphProjection, id: Option<ManufacturerId>) -> Result<(), EquipmentError> {
    match id {
        Some(id) if p.catalog().manufacturer(id).is_none() => Err(EquipmentError::ManufacturerNotFound(id)),
        _ => Ok(()),
    }
}

/// Walk interests of span equipment whose walk a batch rewrites
pub(crate) fn rewritten_walk_interests(p: &UtilityGraphProjection, events: &[DomainEvent]) -> Vec<RouteNetworkInterest> {
    events
        .iter()
        .filter_map(|event| match event {
            DomainEvent::SpanEquipment(
                SpanEquipmentEvent::Moved { id, walk, .. }
                | SpanEquipmentEvent::WalkRecomputed { id, walk, .. }
                | SpanEquipmentEvent::AffixedToParent { id, walk, .. }
                | SpanEquipmentEvent::DetachedFromParent { id, walk, .. },
            ) => p
                .try_get_equipment::<SpanEquipment>(*id)
                .map(|span| RouteNetworkInterest::walk(span.walk_of_interest_id, walk)),
            _ => None,
        })
        .collect()
}

fn check_fresh_id(p: &UtilityGraphProjection, id: Uuid) -> Result<(), EquipmentError> {
    if p.element(id).is_some() {
        return Err(EquipmentError::DuplicateId(id));
    }
    Ok(())
}

/// Terminal must sit in the container at `route_node_id`
fn check_terminal_at(
    p: &UtilityGraphProjection,
    terminal_id: TerminalId,
    route_node_id: RouteNodeId,
) -> Result<(), EquipmentError> {
    let (equipment, _, _) = p
        .terminal(terminal_id)
        .ok_or(EquipmentError::ElementNotFound(terminal_id.uuid()))?;
    if p.route_node_of(equipment) != Some(route_node_id) {
        return Err(EquipmentError::NotAtRouteNode {
            equipment_id: equipment.id.uuid(),
            route_node_id,
        });
    }
    Ok(())
}

fn events<E: Into<DomainEvent>>(events: impl IntoIterator<Item = E>) -> Vec<DomainEvent> {
    events.into_iter().map(Into::into).collect()
}

impl UtilityNetworkService {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// # Errors
    /// Empty name, duplicate id or duplicate name
    pub async fn add_manufacturer(&self, manufacturer: Manufacturer) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddManufacturer", move |p| {
            Ok(vec![p.catalog().add_manufacturer(manufacturer)?.into()])
        })
        .await
    }

    /// # Errors
    /// Empty name, duplicate id or duplicate name
    pub async fn add_span_structure_specification(
        &self,
        spec: SpanStructureSpecification,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddSpanStructureSpecification", move |p| {
            Ok(vec![p.catalog().add_span_structure_specification(spec)?.into()])
        })
        .await
    }

    /// # Errors
    /// Empty name, duplicates, or a template or manufacturer missing from
    /// the catalog
    pub async fn add_span_equipment_specification(
        &self,
        spec: SpanEquipmentSpecification,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddSpanEquipmentSpecification", move |p| {
            Ok(vec![p.catalog().add_span_equipment_specification(spec)?.into()])
        })
        .await
    }

    /// # Errors
    /// Empty name, duplicates, or an unknown manufacturer
    pub async fn add_node_container_specification(
        &self,
        spec: NodeContainerSpecification,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddNodeContainerSpecification", move |p| {
            Ok(vec![p.catalog().add_node_container_specification(spec)?.into()])
        })
        .await
    }

    /// # Errors
    /// Empty name or duplicates
    pub async fn add_rack_specification(&self, spec: RackSpecification) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddRackSpecification", move |p| {
            Ok(vec![p.catalog().add_rack_specification(spec)?.into()])
        })
        .await
    }

    /// # Errors
    /// Empty name or duplicates
    pub async fn add_terminal_structure_specification(
        &self,
        spec: TerminalStructureSpecification,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddTerminalStructureSpecification", move |p| {
            Ok(vec![p.catalog().add_terminal_structure_specification(spec)?.into()])
        })
        .await
    }

    /// # Errors
    /// Empty name, duplicates, or structures missing from the catalog
    pub async fn add_terminal_equipment_specification(
        &self,
        spec: TerminalEquipmentSpecification,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AddTerminalEquipmentSpecification", move |p| {
            Ok(vec![p.catalog().add_terminal_equipment_specification(spec)?.into()])
        })
        .await
    }

    // ------------------------------------------------------------------
    // Span equipment
    // ------------------------------------------------------------------

    /// Validate the walk, register it as an interest and place the equipment
    ///
    /// # Errors
    /// Unknown specification or manufacturer, duplicate id, blank name, or
    /// a walk the route network rejects
    pub async fn place_span_equipment(
        &self,
        cmd: PlaceSpanEquipmentInRouteNetwork,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        let interest_id = InterestId::new();
        let equipment = self.read(|p| {
            check_fresh_id(p, cmd.span_equipment_id.uuid())?;
            let spec = p
                .catalog()
                .span_equipment_specification(cmd.specification_id)
                .ok_or(EquipmentError::SpecificationNotFound(cmd.specification_id))?;
            check_manufacturer(p, cmd.manufacturer_id)?;
            SpanEquipment::place(
                cmd.span_equipment_id,
                spec,
                interest_id,
                cmd.manufacturer_id,
                cmd.naming.clone(),
            )
        })?;

        let walk = self.route_network.validate_walk(cmd.walk).await?;
        self.route_network
            .register_interest(RouteNetworkInterest::walk(interest_id, &walk))
            .await?;

        let placed = self
            .execute("PlaceSpanEquipmentInRouteNetwork", move |p| {
                check_fresh_id(p, equipment.id.uuid())?;
                Ok(vec![SpanEquipmentEvent::PlacedInRouteNetwork { equipment, walk }.into()])
            })
            .await;
        if placed.is_err() {
            if let Err(err) = self.route_network.unregister_interest(interest_id).await {
                warn!(interest = %interest_id, error = %err, "could not drop interest of rejected placement");
            }
        }
        placed
    }

    /// # Errors
    /// Unknown equipment or manufacturer, blank name, `NoChange`
    pub async fn update_span_equipment_properties(
        &self,
        cmd: UpdateSpanEquipmentProperties,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("UpdateSpanEquipmentProperties", move |p| {
            let span = span_equipment(p, cmd.span_equipment_id)?;
            check_manufacturer(p, cmd.manufacturer_id.flatten())?;
            Ok(events(span.update_properties(cmd.naming, cmd.manufacturer_id)?))
        })
        .await
    }

    /// # Errors
    /// Unknown element or specification, `FixedSpecNotMutable`
    pub async fn place_additional_structures(
        &self,
        cmd: PlaceAdditionalStructuresInSpanEquipment,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("PlaceAdditionalStructuresInSpanEquipment", move |p| {
            let span_id = p
                .try_get_graph_segment_ref(cmd.span_equipment_or_segment_id)
                .map(|s| s.span_equipment_id)
                .ok_or(EquipmentError::ElementNotFound(cmd.span_equipment_or_segment_id))?;
            let span = span_equipment(p, span_id)?;
            let spec = p
                .catalog()
                .span_equipment_specification(span.specification_id)
                .ok_or(EquipmentError::SpecificationNotFound(span.specification_id))?;
            if let Some(missing) = cmd
                .structure_specification_ids
                .iter()
                .find(|id| p.catalog().span_structure_specification(**id).is_none())
            {
                return Err(EquipmentError::SpecificationNotFound(*missing).into());
            }
            Ok(vec![span
                .add_additional_structures(spec, &cmd.structure_specification_ids)?
                .into()])
        })
        .await
    }

    /// Move to a new walk, recomputing every equipment threaded through it
    ///
    /// # Errors
    /// Unknown equipment, a walk the route network rejects, or a walk
    /// incompatible with existing affixes or terminations
    pub async fn move_span_equipment(&self, cmd: MoveSpanEquipment) -> Result<Vec<EventEnvelope>, CommandError> {
        self.read(|p| span_equipment(p, cmd.span_equipment_id).map(|_| ()))?;
        let walk = self.route_network.validate_walk(cmd.walk).await?;

        self.execute_rewriting_walks("MoveSpanEquipment", move |p| {
            Ok(events(WalkSynchronizer::new(p).plan_move(cmd.span_equipment_id, walk)?))
        })
        .await
    }

    /// Pull a cable through a conduit segment at a route node
    ///
    /// # Errors
    /// See [`WalkSynchronizer::plan_affix`]
    pub async fn affix_span_equipment_to_parent(
        &self,
        cmd: AffixSpanEquipmentToParent,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute_rewriting_walks("AffixSpanEquipmentToParent", move |p| {
            let event = WalkSynchronizer::new(p).plan_affix(
                cmd.span_equipment_id,
                cmd.route_node_id,
                cmd.parent_span_segment_id,
            )?;
            Ok(vec![event.into()])
        })
        .await
    }

    /// # Errors
    /// Unknown cable, `NotAffixedAtRouteNode`
    pub async fn detach_span_equipment_from_parent(
        &self,
        cmd: DetachSpanEquipmentFromParent,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute_rewriting_walks("DetachSpanEquipmentFromParent", move |p| {
            let event = WalkSynchronizer::new(p).plan_detach(cmd.span_equipment_id, cmd.route_node_id)?;
            Ok(vec![event.into()])
        })
        .await
    }

    /// # Errors
    /// Unknown equipment, walk not passing the container, already affixed
    pub async fn affix_span_equipment_to_node_container(
        &self,
        cmd: AffixSpanEquipmentToNodeContainer,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("AffixSpanEquipmentToNodeContainer", move |p| {
            let container = node_container(p, cmd.node_container_id)?;
            let span = span_equipment(p, cmd.span_equipment_id)?;
            let walk = p
                .walk_of(span)
                .ok_or_else(|| EquipmentError::InvalidInterest(format!("no walk registered for {}", span.id)))?;
            let event = span.affix_to_node_container(&walk, container.id, container.route_node_id, cmd.side)?;
            Ok(vec![event.into()])
        })
        .await
    }

    /// # Errors
    /// Unknown equipment, `NotAffixedAtRouteNode`
    pub async fn detach_span_equipment_from_node_container(
        &self,
        cmd: DetachSpanEquipmentFromNodeContainer,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("DetachSpanEquipmentFromNodeContainer", move |p| {
            let span = span_equipment(p, cmd.span_equipment_id)?;
            Ok(vec![span.detach_from_node_container(cmd.route_node_id)?.into()])
        })
        .await
    }

    // ------------------------------------------------------------------
    // Node containers and racks
    // ------------------------------------------------------------------

    /// Place a container at the node of a registered node interest
    ///
    /// # Errors
    /// Interest unknown or not a node, unknown specification or
    /// manufacturer, `NodeContainerAlreadyExistsInRouteNode`, duplicate id
    pub async fn place_node_container(&self, cmd: PlaceNodeContainer) -> Result<Vec<EventEnvelope>, CommandError> {
        let interest = self.route_network.interest(cmd.interest_id).await?;
        let route_node_id = interest
            .route_node_id()
            .ok_or(RouteNetworkError::NotANodeInterest(cmd.interest_id))?;

        self.execute("PlaceNodeContainer", move |p| {
            if p.catalog().node_container_specification(cmd.specification_id).is_none() {
                return Err(EquipmentError::SpecificationNotFound(cmd.specification_id).into());
            }
            check_manufacturer(p, cmd.manufacturer_id)?;
            if p.node_container_at(route_node_id).is_some() {
                return Err(EquipmentError::NodeContainerAlreadyExistsInRouteNode(route_node_id).into());
            }
            check_fresh_id(p, cmd.node_container_id.uuid())?;
            if p.interest(cmd.interest_id).is_some() {
                return Err(EquipmentError::DuplicateId(cmd.interest_id.uuid()).into());
            }

            let container = NodeContainer::place(
                cmd.node_container_id,
                cmd.specification_id,
                cmd.manufacturer_id,
                route_node_id,
                cmd.interest_id,
            );
            Ok(vec![NodeContainerEvent::PlacedInRouteNetwork { container }.into()])
        })
        .await
    }

    /// # Errors
    /// Unknown container, specification or manufacturer, `NoChange`
    pub async fn update_node_container_properties(
        &self,
        cmd: UpdateNodeContainerProperties,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("UpdateNodeContainerProperties", move |p| {
            let container = node_container(p, cmd.node_container_id)?;
            check_manufacturer(p, cmd.manufacturer_id.flatten())?;
            if let Some(spec) = cmd.specification_id {
                if p.catalog().node_container_specification(spec).is_none() {
                    return Err(EquipmentError::SpecificationNotFound(spec).into());
                }
            }
            Ok(events(container.update_properties(cmd.manufacturer_id, cmd.specification_id)?))
        })
        .await
    }

    /// # Errors
    /// Unknown container
    pub async fn reverse_node_container_vertical_content_alignment(
        &self,
        node_container_id: NodeContainerId,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("ReverseNodeContainerVerticalContentAlignment", move |p| {
            Ok(vec![node_container(p, node_container_id)?.reverse_vertical_alignment().into()])
        })
        .await
    }

    /// # Errors
    /// Unknown container or rack specification, blank or duplicate name,
    /// duplicate id, zero height
    pub async fn place_rack(&self, cmd: PlaceRackInNodeContainer) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("PlaceRackInNodeContainer", move |p| {
            let container = node_container(p, cmd.node_container_id)?;
            if p.catalog().rack_specification(cmd.specification_id).is_none() {
                return Err(EquipmentError::SpecificationNotFound(cmd.specification_id).into());
            }
            check_fresh_id(p, cmd.rack_id.uuid())?;
            let event = container.add_rack(cmd.rack_id, cmd.specification_id, &cmd.name, cmd.height_in_units)?;
            Ok(vec![event.into()])
        })
        .await
    }

    /// # Errors
    /// Unknown rack or specification, blank or duplicate name, height below
    /// mounted content, `NoChange`
    pub async fn update_rack_properties(&self, cmd: UpdateRackProperties) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("UpdateRackProperties", move |p| {
            let Some(ElementRef::Rack { node_container_id, .. }) = p.element(cmd.rack_id.uuid()) else {
                return Err(EquipmentError::RackNotFound(cmd.rack_id).into());
            };
            if let Some(spec) = cmd.specification_id {
                if p.catalog().rack_specification(spec).is_none() {
                    return Err(EquipmentError::SpecificationNotFound(spec).into());
                }
            }
            let event = node_container(p, node_container_id)?.update_rack(
                cmd.rack_id,
                cmd.name.as_deref(),
                cmd.specification_id,
                cmd.height_in_units,
            )?;
            Ok(vec![event.into()])
        })
        .await
    }

    // ------------------------------------------------------------------
    // Terminal equipment
    // ------------------------------------------------------------------

    /// # Errors
    /// Unknown container, specification or manufacturer, zero count, rack
    /// placement of non-rack equipment, rack overflow or overlap
    pub async fn place_terminal_equipment(
        &self,
        cmd: PlaceTerminalEquipmentInNodeContainer,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("PlaceTerminalEquipmentInNodeContainer", move |p| {
            if cmd.count == 0 {
                return Err(CommandError::InvalidRequest("count must be at least 1".to_string()));
            }
            let container = node_container(p, cmd.node_container_id)?;
            let spec = p
                .catalog()
                .terminal_equipment_specification(cmd.specification_id)
                .ok_or(EquipmentError::SpecificationNotFound(cmd.specification_id))?;
            check_manufacturer(p, cmd.manufacturer_id)?;

            let mounts: Vec<Option<(RackId, u16)>> = match cmd.rack_placement {
                Some(placement) => {
                    if !spec.is_rack_equipment {
                        return Err(EquipmentError::InvalidRackPlacement(format!(
                            "'{}' is not rack equipment",
                            spec.name
                        ))
                        .into());
                    }
                    let positions = container.plan_rack_mounts(
                        placement.rack_id,
                        placement.start_unit,
                        placement.method,
                        spec.height_in_rack_units,
                        cmd.count,
                    )?;
                    positions.into_iter().map(|position| Some((placement.rack_id, position))).collect()
                }
                None => vec![None; usize::from(cmd.count)],
            };

            let mut planned: Vec<DomainEvent> = Vec::with_capacity(usize::from(cmd.count) * 2);
            for (i, mount) in (0..cmd.count).zip(mounts) {
                let naming = match &cmd.naming {
                    Some(naming) if cmd.count > 1 => Some(NamingInfo {
                        name: naming
                            .name
                            .as_ref()
                            .map(|n| format!("{n} {}", cmd.start_sequence_number.saturating_add(i))),
                        description: naming.description.clone(),
                    }),
                    other => other.clone(),
                };
                let equipment = TerminalEquipment::place(
                    TerminalEquipmentId::new(),
                    spec,
                    p.catalog(),
                    container.id,
                    cmd.manufacturer_id,
                    naming,
                )?;
                let terminal_equipment_id = equipment.id;
                planned.push(
                    TerminalEquipmentEvent::Placed {
                        equipment,
                        route_node_id: container.route_node_id,
                    }
                    .into(),
                );

                let added = match mount {
                    Some((rack_id, position)) => NodeContainerEvent::TerminalEquipmentAddedToRack {
                        id: container.id,
                        rack_id,
                        mount: SubrackMount {
                            terminal_equipment_id,
                            position,
                            height_in_units: spec.height_in_rack_units,
                        },
                    },
                    None => NodeContainerEvent::TerminalEquipmentAdded {
                        id: container.id,
                        terminal_equipment_id,
                    },
                };
                planned.push(added.into());
            }
            debug!(container = %container.id, count = cmd.count, "terminal equipment planned");
            Ok(planned)
        })
        .await
    }

    /// # Errors
    /// Unknown equipment or manufacturer, blank name, rack position for
    /// equipment outside a rack, overlap, `NoChange`
    pub async fn update_terminal_equipment_properties(
        &self,
        cmd: UpdateTerminalEquipmentProperties,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("UpdateTerminalEquipmentProperties", move |p| {
            let equipment = terminal_equipment(p, cmd.terminal_equipment_id)?;
            check_manufacturer(p, cmd.manufacturer_id.flatten())?;

            let mut planned: Vec<DomainEvent> = match equipment.update_properties(cmd.naming, cmd.manufacturer_id) {
                Ok(changes) => events(changes),
                Err(EquipmentError::NoChange(_)) => Vec::new(),
                Err(err) => return Err(err.into()),
            };

            if let Some(position) = cmd.rack_position {
                let container = node_container(p, equipment.node_container_id)?;
                let rack = container.rack_of(equipment.id).ok_or_else(|| {
                    EquipmentError::InvalidRackPlacement(format!("{} is not mounted in a rack", equipment.id))
                })?;
                match container.move_in_rack(rack.id, equipment.id, position) {
                    Ok(event) => planned.push(event.into()),
                    Err(EquipmentError::NoChange(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }

            if planned.is_empty() {
                return Err(EquipmentError::NoChange(equipment.id.uuid()).into());
            }
            Ok(planned)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Connectivity
    // ------------------------------------------------------------------

    /// Link span segment ends to terminals in a route node
    ///
    /// Connects are grouped per span equipment, one event each, in first
    /// appearance order.
    ///
    /// # Errors
    /// Unknown segment or terminal, either side not at the route node, a
    /// segment end already terminated, a terminal already linked on that side
    pub async fn connect_span_segments_with_terminals(
        &self,
        cmd: ConnectSpanSegmentsWithTerminals,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("ConnectSpanSegmentsWithTerminals", move |p| {
            if cmd.connects.is_empty() {
                return Err(CommandError::InvalidRequest("nothing to connect".to_string()));
            }
            let route_node_id = cmd.route_node_id;
            let mut groups: Vec<(SpanEquipmentId, Vec<SegmentTerminalConnect>)> = Vec::new();
            let mut claimed: HashSet<(TerminalId, Direction)> = HashSet::new();

            for connect in cmd.connects {
                let segment = p
                    .try_get_graph_segment_ref(connect.span_segment_id.uuid())
                    .filter(|s| s.span_segment_id == connect.span_segment_id)
                    .ok_or(EquipmentError::ElementNotFound(connect.span_segment_id.uuid()))?;
                let walk = p
                    .span_walk(segment.span_equipment_id)
                    .ok_or(EquipmentError::SpanEquipmentNotFound(segment.span_equipment_id))?;
                let end_node = match connect.end {
                    SpanSegmentEnd::From => walk.from_node_id(),
                    SpanSegmentEnd::To => walk.to_node_id(),
                };
                if end_node != route_node_id {
                    return Err(EquipmentError::NotAtRouteNode {
                        equipment_id: segment.span_equipment_id.uuid(),
                        route_node_id,
                    }
                    .into());
                }

                check_terminal_at(p, connect.terminal_id, route_node_id)?;
                // signal enters the segment at its From end and leaves at its To end
                let side = match connect.end {
                    SpanSegmentEnd::From => Direction::Outgoing,
                    SpanSegmentEnd::To => Direction::Incoming,
                };
                if p.graph().has_external(connect.terminal_id.uuid(), side)
                    || !claimed.insert((connect.terminal_id, side))
                {
                    return Err(EquipmentError::TerminalAlreadyConnected(connect.terminal_id).into());
                }

                match groups.iter_mut().find(|(id, _)| *id == segment.span_equipment_id) {
                    Some((_, connects)) => connects.push(connect),
                    None => groups.push((segment.span_equipment_id, vec![connect])),
                }
            }

            groups
                .into_iter()
                .map(|(id, connects)| -> Result<DomainEvent, CommandError> {
                    let event = span_equipment(p, id)?.connect_segments(route_node_id, connects)?;
                    Ok(event.into())
                })
                .collect()
        })
        .await
    }

    /// # Errors
    /// Unknown segment, or segment not linked to the terminal
    pub async fn disconnect_span_segment_from_terminal(
        &self,
        cmd: DisconnectSpanSegmentFromTerminal,
    ) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("DisconnectSpanSegmentFromTerminal", move |p| {
            let segment = p
                .try_get_graph_segment_ref(cmd.span_segment_id.uuid())
                .filter(|s| s.span_segment_id == cmd.span_segment_id)
                .ok_or(EquipmentError::ElementNotFound(cmd.span_segment_id.uuid()))?;
            let event = span_equipment(p, segment.span_equipment_id)?.disconnect_segment(
                cmd.route_node_id,
                cmd.span_segment_id,
                cmd.terminal_id,
            )?;
            Ok(vec![event.into()])
        })
        .await
    }

    /// # Errors
    /// Unknown terminal, terminal outside the route node, a terminal already
    /// patched on that side, duplicate id, negative length
    pub async fn connect_terminals(&self, cmd: ConnectTerminals) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("ConnectTerminals", move |p| {
            if !cmd.fiber_length_m.is_finite() || cmd.fiber_length_m < 0.0 {
                return Err(CommandError::InvalidRequest(format!(
                    "fiber length {} is not a non-negative number",
                    cmd.fiber_length_m
                )));
            }
            if cmd.from_terminal_id == cmd.to_terminal_id {
                return Err(CommandError::InvalidRequest("cannot connect a terminal to itself".to_string()));
            }
            if p.connection(cmd.terminal_connection_id).is_some() {
                return Err(EquipmentError::DuplicateId(cmd.terminal_connection_id.uuid()).into());
            }
            check_terminal_at(p, cmd.from_terminal_id, cmd.route_node_id)?;
            check_terminal_at(p, cmd.to_terminal_id, cmd.route_node_id)?;
            if p.graph().has_external(cmd.from_terminal_id.uuid(), Direction::Outgoing) {
                return Err(EquipmentError::TerminalAlreadyConnected(cmd.from_terminal_id).into());
            }
            if p.graph().has_external(cmd.to_terminal_id.uuid(), Direction::Incoming) {
                return Err(EquipmentError::TerminalAlreadyConnected(cmd.to_terminal_id).into());
            }

            Ok(vec![ConnectivityEvent::TerminalsConnected {
                connection: TerminalConnection {
                    id: cmd.terminal_connection_id,
                    route_node_id: cmd.route_node_id,
                    from_terminal_id: cmd.from_terminal_id,
                    to_terminal_id: cmd.to_terminal_id,
                    fiber_length_m: cmd.fiber_length_m,
                },
            }
            .into()])
        })
        .await
    }

    /// # Errors
    /// `NotConnected` if no such connection exists
    pub async fn disconnect_terminals(&self, cmd: DisconnectTerminals) -> Result<Vec<EventEnvelope>, CommandError> {
        self.execute("DisconnectTerminals", move |p| {
            let connection = p
                .connection(cmd.terminal_connection_id)
                .ok_or(EquipmentError::NotConnected(cmd.terminal_connection_id.uuid()))?;
            Ok(vec![ConnectivityEvent::TerminalsDisconnected {
                connection: connection.clone(),
            }
            .into()])
        })
        .await
    }
}
