//! Span equipment aggregate (cables and conduits)

use super::{check_naming, NamingInfo};
use crate::catalog::{SpanEquipmentSpecification, SpanStructureTemplate};
use crate::error::EquipmentError;
use crate::ids::{
    InterestId, ManufacturerId, NodeContainerId, RouteElementId, RouteNodeId, SpanEquipmentId,
    SpanSegmentId, SpanStructureId, SpecificationId, TerminalId,
};
use crate::interest::WalkOfInterest;
use serde::{Deserialize, Serialize};

/// Physical conductor running end-to-end through a structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSegment {
    pub id: SpanSegmentId,
    pub from_terminal_id: Option<TerminalId>,
    pub to_terminal_id: Option<TerminalId>,
}

impl SpanSegment {
    /// Fresh segment with both ends unterminated
    #[must_use]
    pub fn unterminated() -> Self {
        Self {
            id: SpanSegmentId::new(),
            from_terminal_id: None,
            to_terminal_id: None,
        }
    }

    #[must_use]
    pub fn terminal_at(&self, end: SpanSegmentEnd) -> Option<TerminalId> {
        match end {
            SpanSegmentEnd::From => self.from_terminal_id,
            SpanSegmentEnd::To => self.to_terminal_id,
        }
    }

    fn terminal_at_mut(&mut self, end: SpanSegmentEnd) -> &mut Option<TerminalId> {
        match end {
            SpanSegmentEnd::From => &mut self.from_terminal_id,
            SpanSegmentEnd::To => &mut self.to_terminal_id,
        }
    }
}

/// Outer jacket, inner duct or fiber tube
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStructure {
    pub id: SpanStructureId,
    pub specification_id: SpecificationId,
    pub level: u8,
    pub position: u16,
    pub span_segments: Vec<SpanSegment>,
}

impl SpanStructure {
    fn from_template(template: &SpanStructureTemplate) -> Self {
        Self::new(template.span_structure_specification_id, template.level, template.position)
    }

    fn new(specification_id: SpecificationId, level: u8, position: u16) -> Self {
        Self {
            id: SpanStructureId::new(),
            specification_id,
            level,
            position,
            span_segments: vec![SpanSegment::unterminated()],
        }
    }
}

/// End of a span segment, in walk direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanSegmentEnd {
    From,
    To,
}

/// Part of a cable's walk that runs through a conduit segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityNetworkHop {
    /// Hop boundaries, in the cable's walk direction
    pub from_node_id: RouteNodeId,
    pub to_node_id: RouteNodeId,
    pub parent_span_equipment_id: SpanEquipmentId,
    pub parent_span_segment_id: SpanSegmentId,
    /// Cable sub-walk the conduit walk replaced; restored on detach
    pub direct_walk: Vec<RouteElementId>,
}

/// Side of a node container a span equipment enters through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeContainerSide {
    North,
    East,
    South,
    West,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContainerAffix {
    pub node_container_id: NodeContainerId,
    pub route_node_id: RouteNodeId,
    pub side: NodeContainerSide,
}

/// One segment end to terminal link requested by a connect command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTerminalConnect {
    pub span_segment_id: SpanSegmentId,
    pub terminal_id: TerminalId,
    pub end: SpanSegmentEnd,
}

/// Cable or conduit placed along a walk of interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEquipment {
    pub id: SpanEquipmentId,
    pub specification_id: SpecificationId,
    pub manufacturer_id: Option<ManufacturerId>,
    pub naming: Option<NamingInfo>,
    pub walk_of_interest_id: InterestId,
    pub is_cable: bool,
    /// Ordered by level, then position
    pub span_structures: Vec<SpanStructure>,
    /// Conduit segments this equipment runs through, in walk order
    #[serde(default)]
    pub utility_network_hops: Vec<UtilityNetworkHop>,
    #[serde(default)]
    pub node_container_affixes: Vec<NodeContainerAffix>,
}

/// Span equipment events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpanEquipmentEvent {
    PlacedInRouteNetwork {
        equipment: SpanEquipment,
        walk: WalkOfInterest,
    },
    NamingInfoChanged {
        id: SpanEquipmentId,
        naming: Option<NamingInfo>,
    },
    ManufacturerChanged {
        id: SpanEquipmentId,
        manufacturer_id: Option<ManufacturerId>,
    },
    AdditionalStructuresAdded {
        id: SpanEquipmentId,
        structures: Vec<SpanStructure>,
    },
    Moved {
        id: SpanEquipmentId,
        old_walk: WalkOfInterest,
        walk: WalkOfInterest,
    },
    /// Walk rewritten because an equipment it runs through moved
    WalkRecomputed {
        id: SpanEquipmentId,
        old_walk: WalkOfInterest,
        walk: WalkOfInterest,
        hops: Vec<UtilityNetworkHop>,
    },
    AffixedToParent {
        id: SpanEquipmentId,
        hop: UtilityNetworkHop,
        walk: WalkOfInterest,
    },
    DetachedFromParent {
        id: SpanEquipmentId,
        hop: UtilityNetworkHop,
        walk: WalkOfInterest,
    },
    AffixedToNodeContainer {
        id: SpanEquipmentId,
        affix: NodeContainerAffix,
    },
    DetachedFromNodeContainer {
        id: SpanEquipmentId,
        node_container_id: NodeContainerId,
        route_node_id: RouteNodeId,
    },
    SegmentsConnectedToTerminals {
        id: SpanEquipmentId,
        route_node_id: RouteNodeId,
        connects: Vec<SegmentTerminalConnect>,
    },
    SegmentDisconnectedFromTerminal {
        id: SpanEquipmentId,
        route_node_id: RouteNodeId,
        span_segment_id: SpanSegmentId,
        terminal_id: TerminalId,
    },
}

impl SpanEquipmentEvent {
    #[must_use]
    pub fn span_equipment_id(&self) -> SpanEquipmentId {
        match self {
            Self::PlacedInRouteNetwork { equipment, .. } => equipment.id,
            Self::NamingInfoChanged { id, .. }
            | Self::ManufacturerChanged { id, .. }
            | Self::AdditionalStructuresAdded { id, .. }
            | Self::Moved { id, .. }
            | Self::WalkRecomputed { id, .. }
            | Self::AffixedToParent { id, .. }
            | Self::DetachedFromParent { id, .. }
            | Self::AffixedToNodeContainer { id, .. }
            | Self::DetachedFromNodeContainer { id, .. }
            | Self::SegmentsConnectedToTerminals { id, .. }
            | Self::SegmentDisconnectedFromTerminal { id, .. } => *id,
        }
    }
}

impl SpanEquipment {
    /// Build a new span equipment from its specification
    ///
    /// Every structure in the specification's template tree gets one
    /// unterminated segment.
    ///
    /// # Errors
    /// Blank name
    pub fn place(
        id: SpanEquipmentId,
        specification: &SpanEquipmentSpecification,
        walk_of_interest_id: InterestId,
        manufacturer_id: Option<ManufacturerId>,
        naming: Option<NamingInfo>,
    ) -> Result<Self, EquipmentError> {
        check_naming(naming.as_ref())?;

        let span_structures = specification
            .root_template
            .flatten()
            .into_iter()
            .map(SpanStructure::from_template)
            .collect();

        Ok(Self {
            id,
            specification_id: specification.id,
            manufacturer_id,
            naming,
            walk_of_interest_id,
            is_cable: specification.is_cable,
            span_structures,
            utility_network_hops: Vec::new(),
            node_container_affixes: Vec::new(),
        })
    }

    /// Outer structure (level 1)
    #[must_use]
    pub fn root_structure(&self) -> Option<&SpanStructure> {
        self.span_structures.iter().find(|s| s.level == 1)
    }

    #[must_use]
    pub fn structure(&self, id: SpanStructureId) -> Option<&SpanStructure> {
        self.span_structures.iter().find(|s| s.id == id)
    }

    /// Segment together with the structure holding it
    #[must_use]
    pub fn segment(&self, id: SpanSegmentId) -> Option<(&SpanStructure, &SpanSegment)> {
        self.span_structures
            .iter()
            .find_map(|s| s.span_segments.iter().find(|seg| seg.id == id).map(|seg| (s, seg)))
    }

    /// All segments in structure order
    pub fn segments(&self) -> impl Iterator<Item = (&SpanStructure, &SpanSegment)> {
        self.span_structures
            .iter()
            .flat_map(|s| s.span_segments.iter().map(move |seg| (s, seg)))
    }

    /// Hop running through the given conduit segment
    #[must_use]
    pub fn hop_through(&self, parent_segment_id: SpanSegmentId) -> Option<&UtilityNetworkHop> {
        self.utility_network_hops
            .iter()
            .find(|h| h.parent_span_segment_id == parent_segment_id)
    }

    /// Validate a property update
    ///
    /// # Errors
    /// Blank name, or `NoChange` if nothing differs
    pub fn update_properties(
        &self,
        naming: Option<Option<NamingInfo>>,
        manufacturer_id: Option<Option<ManufacturerId>>,
    ) -> Result<Vec<SpanEquipmentEvent>, EquipmentError> {
        let mut events = Vec::new();

        if let Some(naming) = naming.filter(|n| *n != self.naming) {
            check_naming(naming.as_ref())?;
            events.push(SpanEquipmentEvent::NamingInfoChanged { id: self.id, naming });
        }
        if let Some(manufacturer_id) = manufacturer_id.filter(|m| *m != self.manufacturer_id) {
            events.push(SpanEquipmentEvent::ManufacturerChanged {
                id: self.id,
                manufacturer_id,
            });
        }

        if events.is_empty() {
            return Err(EquipmentError::NoChange(self.id.uuid()));
        }
        Ok(events)
    }

    /// Validate adding inner structures
    ///
    /// New structures are level 2, positioned after the existing ones, each
    /// with a fresh unterminated segment.
    ///
    /// # Errors
    /// `FixedSpecNotMutable` if the specification is fixed
    pub fn add_additional_structures(
        &self,
        specification: &SpanEquipmentSpecification,
        structure_specification_ids: &[SpecificationId],
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        if specification.is_fixed {
            return Err(EquipmentError::FixedSpecNotMutable(self.id));
        }
        if structure_specification_ids.is_empty() {
            return Err(EquipmentError::NoChange(self.id.uuid()));
        }

        let last_position = self
            .span_structures
            .iter()
            .filter(|s| s.level == 2)
            .map(|s| s.position)
            .max()
            .unwrap_or(0);

        let structures = structure_specification_ids
            .iter()
            .zip(1u16..)
            .map(|(spec_id, offset)| SpanStructure::new(*spec_id, 2, last_position + offset))
            .collect();

        Ok(SpanEquipmentEvent::AdditionalStructuresAdded {
            id: self.id,
            structures,
        })
    }

    /// Validate an affix to a node container
    ///
    /// # Errors
    /// `NotAtRouteNode` if the walk does not pass the container's node,
    /// `DuplicateId` if already affixed to that container
    pub fn affix_to_node_container(
        &self,
        walk: &WalkOfInterest,
        node_container_id: NodeContainerId,
        route_node_id: RouteNodeId,
        side: NodeContainerSide,
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        if walk.node_position(route_node_id).is_none() {
            return Err(EquipmentError::NotAtRouteNode {
                equipment_id: self.id.uuid(),
                route_node_id,
            });
        }
        if self
            .node_container_affixes
            .iter()
            .any(|a| a.node_container_id == node_container_id)
        {
            return Err(EquipmentError::DuplicateId(node_container_id.uuid()));
        }
        Ok(SpanEquipmentEvent::AffixedToNodeContainer {
            id: self.id,
            affix: NodeContainerAffix {
                node_container_id,
                route_node_id,
                side,
            },
        })
    }

    /// Validate removing the node container affix at a route node
    ///
    /// # Errors
    /// `NotAffixedAtRouteNode` if no container affix exists there
    pub fn detach_from_node_container(
        &self,
        route_node_id: RouteNodeId,
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        let affix = self
            .node_container_affixes
            .iter()
            .find(|a| a.route_node_id == route_node_id)
            .ok_or(EquipmentError::NotAffixedAtRouteNode {
                span_equipment_id: self.id,
                route_node_id,
            })?;

        Ok(SpanEquipmentEvent::DetachedFromNodeContainer {
            id: self.id,
            node_container_id: affix.node_container_id,
            route_node_id,
        })
    }

    /// Validate connecting segment ends to terminals
    ///
    /// # Errors
    /// Unknown segment, an end already holding a terminal, or the same end
    /// requested twice
    pub fn connect_segments(
        &self,
        route_node_id: RouteNodeId,
        connects: Vec<SegmentTerminalConnect>,
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        let mut seen = Vec::with_capacity(connects.len());
        for connect in &connects {
            let (_, segment) = self
                .segment(connect.span_segment_id)
                .ok_or(EquipmentError::ElementNotFound(connect.span_segment_id.uuid()))?;
            let key = (connect.span_segment_id, connect.end);
            if segment.terminal_at(connect.end).is_some() || seen.contains(&key) {
                return Err(EquipmentError::SpanSegmentEndAlreadyConnected(
                    connect.span_segment_id,
                ));
            }
            seen.push(key);
        }
        Ok(SpanEquipmentEvent::SegmentsConnectedToTerminals {
            id: self.id,
            route_node_id,
            connects,
        })
    }

    /// Validate removing a segment to terminal link
    ///
    /// # Errors
    /// Unknown segment, or `NotConnected` if the segment is not linked to
    /// that terminal
    pub fn disconnect_segment(
        &self,
        route_node_id: RouteNodeId,
        span_segment_id: SpanSegmentId,
        terminal_id: TerminalId,
    ) -> Result<SpanEquipmentEvent, EquipmentError> {
        let (_, segment) = self
            .segment(span_segment_id)
            .ok_or(EquipmentError::ElementNotFound(span_segment_id.uuid()))?;
        if segment.from_terminal_id != Some(terminal_id) && segment.to_terminal_id != Some(terminal_id) {
            return Err(EquipmentError::NotConnected(span_segment_id.uuid()));
        }
        Ok(SpanEquipmentEvent::SegmentDisconnectedFromTerminal {
            id: self.id,
            route_node_id,
            span_segment_id,
            terminal_id,
        })
    }

    /// Fold an event into this aggregate
    ///
    /// Walk changes live in the projection's interest table; only the hop
    /// list is tracked here.
    pub fn apply(&mut self, event: &SpanEquipmentEvent) {
        match event {
            SpanEquipmentEvent::PlacedInRouteNetwork { equipment, .. } => *self = equipment.clone(),
            SpanEquipmentEvent::NamingInfoChanged { naming, .. } => self.naming.clone_from(naming),
            SpanEquipmentEvent::ManufacturerChanged { manufacturer_id, .. } => {
                self.manufacturer_id = *manufacturer_id;
            }
            SpanEquipmentEvent::AdditionalStructuresAdded { structures, .. } => {
                self.span_structures.extend(structures.iter().cloned());
                self.span_structures.sort_by_key(|s| (s.level, s.position));
            }
            SpanEquipmentEvent::Moved { .. } => {}
            SpanEquipmentEvent::WalkRecomputed { hops, .. } => self.utility_network_hops.clone_from(hops),
            SpanEquipmentEvent::AffixedToParent { hop, walk, .. } => {
                self.utility_network_hops.push(hop.clone());
                sort_hops(&mut self.utility_network_hops, walk);
            }
            SpanEquipmentEvent::DetachedFromParent { hop, .. } => {
                self.utility_network_hops
                    .retain(|h| h.parent_span_segment_id != hop.parent_span_segment_id);
            }
            SpanEquipmentEvent::AffixedToNodeContainer { affix, .. } => {
                self.node_container_affixes.push(affix.clone());
            }
            SpanEquipmentEvent::DetachedFromNodeContainer { node_container_id, .. } => {
                self.node_container_affixes
                    .retain(|a| a.node_container_id != *node_container_id);
            }
            SpanEquipmentEvent::SegmentsConnectedToTerminals { connects, .. } => {
                for connect in connects {
                    if let Some(segment) = self.segment_mut(connect.span_segment_id) {
                        *segment.terminal_at_mut(connect.end) = Some(connect.terminal_id);
                    }
                }
            }
            SpanEquipmentEvent::SegmentDisconnectedFromTerminal {
                span_segment_id,
                terminal_id,
                ..
            } => {
                if let Some(segment) = self.segment_mut(*span_segment_id) {
                    for end in [SpanSegmentEnd::From, SpanSegmentEnd::To] {
                        let slot = segment.terminal_at_mut(end);
                        if *slot == Some(*terminal_id) {
                            *slot = None;
                        }
                    }
                }
            }
        }
    }

    fn segment_mut(&mut self, id: SpanSegmentId) -> Option<&mut SpanSegment> {
        self.span_structures
            .iter_mut()
            .flat_map(|s| s.span_segments.iter_mut())
            .find(|seg| seg.id == id)
    }
}

/// Order hops by where their start node sits in the walk
pub(crate) fn sort_hops(hops: &mut [UtilityNetworkHop], walk: &WalkOfInterest) {
    hops.sort_by_key(|h| walk.node_position(h.from_node_id).unwrap_or(usize::MAX));
}
