//! Node container aggregate with racks and subrack mounts

use crate::error::EquipmentError;
use crate::ids::{
    InterestId, ManufacturerId, NodeContainerId, RackId, RouteNodeId, SpecificationId,
    TerminalEquipmentId,
};
use serde::{Deserialize, Serialize};

/// Order in which rack content is presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerticalContentAlignment {
    Top,
    #[default]
    Bottom,
}

impl VerticalContentAlignment {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

/// Direction in which numbered copies are stacked in a rack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RackPlacementMethod {
    /// First copy's top unit at the start unit, further copies below
    TopDown,
    /// First copy's bottom unit at the start unit, further copies above
    BottomUp,
}

/// Terminal equipment mounted in a rack; `position` is the lowest unit used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubrackMount {
    pub terminal_equipment_id: TerminalEquipmentId,
    pub position: u16,
    pub height_in_units: u16,
}

impl SubrackMount {
    /// Highest unit used
    #[must_use]
    pub fn top(&self) -> u16 {
        self.position.saturating_add(self.height_in_units.saturating_sub(1))
    }

    fn overlaps(&self, position: u16, height: u16) -> bool {
        let top = position.saturating_add(height.saturating_sub(1));
        position <= self.top() && self.position <= top
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    pub name: String,
    pub position: u16,
    pub specification_id: SpecificationId,
    pub height_in_units: u16,
    pub subrack_mounts: Vec<SubrackMount>,
}

impl Rack {
    /// Highest unit in use, 0 when empty
    #[must_use]
    pub fn occupied_height(&self) -> u16 {
        self.subrack_mounts.iter().map(SubrackMount::top).max().unwrap_or(0)
    }

    /// Mounts ordered for display under the given alignment
    #[must_use]
    pub fn ordered_mounts(&self, alignment: VerticalContentAlignment) -> Vec<&SubrackMount> {
        let mut mounts: Vec<_> = self.subrack_mounts.iter().collect();
        mounts.sort_by_key(|m| m.position);
        if alignment == VerticalContentAlignment::Top {
            mounts.reverse();
        }
        mounts
    }

    fn check_space(
        &self,
        position: u16,
        height: u16,
        ignore: Option<TerminalEquipmentId>,
    ) -> Result<(), EquipmentError> {
        let top = position.saturating_add(height.saturating_sub(1));
        if position == 0 || top > self.height_in_units {
            return Err(EquipmentError::InvalidRackPlacement(format!(
                "units {position}..{top} outside rack '{}' of height {}",
                self.name,
                self.height_in_units
            )));
        }
        let clash = self
            .subrack_mounts
            .iter()
            .filter(|m| Some(m.terminal_equipment_id) != ignore)
            .any(|m| m.overlaps(position, height));
        if clash {
            return Err(EquipmentError::RackSpaceOccupied {
                rack_id: self.id,
                from: position,
                to: top,
            });
        }
        Ok(())
    }
}

/// Well, cabinet or building at one route node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContainer {
    pub id: NodeContainerId,
    pub specification_id: SpecificationId,
    pub manufacturer_id: Option<ManufacturerId>,
    pub route_node_id: RouteNodeId,
    pub interest_id: InterestId,
    #[serde(default)]
    pub vertical_content_alignment: VerticalContentAlignment,
    #[serde(default)]
    pub racks: Vec<Rack>,
    /// Terminal equipment placed directly in the container
    #[serde(default)]
    pub terminal_equipment_references: Vec<TerminalEquipmentId>,
}

/// Node container events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeContainerEvent {
    PlacedInRouteNetwork {
        container: NodeContainer,
    },
    ManufacturerChanged {
        id: NodeContainerId,
        manufacturer_id: Option<ManufacturerId>,
    },
    SpecificationChanged {
        id: NodeContainerId,
        specification_id: SpecificationId,
    },
    VerticalContentAlignmentReversed {
        id: NodeContainerId,
        alignment: VerticalContentAlignment,
    },
    RackAdded {
        id: NodeContainerId,
        rack: Rack,
    },
    RackPropertiesUpdated {
        id: NodeContainerId,
        rack_id: RackId,
        name: String,
        specification_id: SpecificationId,
        height_in_units: u16,
    },
    TerminalEquipmentAdded {
        id: NodeContainerId,
        terminal_equipment_id: TerminalEquipmentId,
    },
    TerminalEquipmentAddedToRack {
        id: NodeContainerId,
        rack_id: RackId,
        mount: SubrackMount,
    },
    TerminalEquipmentMovedInRack {
        id: NodeContainerId,
        rack_id: RackId,
        terminal_equipment_id: TerminalEquipmentId,
        position: u16,
    },
}

impl NodeContainerEvent {
    #[must_use]
    pub fn node_container_id(&self) -> NodeContainerId {
        match self {
            Self::PlacedInRouteNetwork { container } => container.id,
            Self::ManufacturerChanged { id, .. }
            | Self::SpecificationChanged { id, .. }
            | Self::VerticalContentAlignmentReversed { id, .. }
            | Self::RackAdded { id, .. }
            | Self::RackPropertiesUpdated { id, .. }
            | Self::TerminalEquipmentAdded { id, .. }
            | Self::TerminalEquipmentAddedToRack { id, .. }
            | Self::TerminalEquipmentMovedInRack { id, .. } => *id,
        }
    }
}

impl NodeContainer {
    /// New container at a route node, aligned to the bottom
    #[must_use]
    pub fn place(
        id: NodeContainerId,
        specification_id: SpecificationId,
        manufacturer_id: Option<ManufacturerId>,
        route_node_id: RouteNodeId,
        interest_id: InterestId,
    ) -> Self {
        Self {
            id,
            specification_id,
            manufacturer_id,
            route_node_id,
            interest_id,
            vertical_content_alignment: VerticalContentAlignment::default(),
            racks: Vec::new(),
            terminal_equipment_references: Vec::new(),
        }
    }

    #[must_use]
    pub fn rack(&self, id: RackId) -> Option<&Rack> {
        self.racks.iter().find(|r| r.id == id)
    }

    /// Rack holding the given terminal equipment
    #[must_use]
    pub fn rack_of(&self, terminal_equipment_id: TerminalEquipmentId) -> Option<&Rack> {
        self.racks.iter().find(|r| {
            r.subrack_mounts
                .iter()
                .any(|m| m.terminal_equipment_id == terminal_equipment_id)
        })
    }

    /// Whether the terminal equipment sits in this container (directly or in a rack)
    #[must_use]
    pub fn holds(&self, terminal_equipment_id: TerminalEquipmentId) -> bool {
        self.terminal_equipment_references.contains(&terminal_equipment_id)
            || self.rack_of(terminal_equipment_id).is_some()
    }

    /// All terminal equipment ids, rack content first in display order
    #[must_use]
    pub fn all_terminal_equipment(&self) -> Vec<TerminalEquipmentId> {
        let mut racks: Vec<_> = self.racks.iter().collect();
        racks.sort_by_key(|r| r.position);
        racks
            .into_iter()
            .flat_map(|r| r.ordered_mounts(self.vertical_content_alignment))
            .map(|m| m.terminal_equipment_id)
            .chain(self.terminal_equipment_references.iter().copied())
            .collect()
    }

    /// Validate a property update
    ///
    /// # Errors
    /// `NoChange` if neither value differs
    pub fn update_properties(
        &self,
        manufacturer_id: Option<Option<ManufacturerId>>,
        specification_id: Option<SpecificationId>,
    ) -> Result<Vec<NodeContainerEvent>, EquipmentError> {
        let mut events = Vec::new();
        if let Some(manufacturer_id) = manufacturer_id.filter(|m| *m != self.manufacturer_id) {
            events.push(NodeContainerEvent::ManufacturerChanged {
                id: self.id,
                manufacturer_id,
            });
        }
        if let Some(specification_id) = specification_id.filter(|s| *s != self.specification_id) {
            events.push(NodeContainerEvent::SpecificationChanged {
                id: self.id,
                specification_id,
            });
        }
        if events.is_empty() {
            return Err(EquipmentError::NoChange(self.id.uuid()));
        }
        Ok(events)
    }

    #[must_use]
    pub fn reverse_vertical_alignment(&self) -> NodeContainerEvent {
        NodeContainerEvent::VerticalContentAlignmentReversed {
            id: self.id,
            alignment: self.vertical_content_alignment.reversed(),
        }
    }

    /// Validate a new rack; racks are positioned after existing ones
    ///
    /// # Errors
    /// Blank or duplicate name, duplicate id, zero height
    pub fn add_rack(
        &self,
        rack_id: RackId,
        specification_id: SpecificationId,
        name: &str,
        height_in_units: u16,
    ) -> Result<NodeContainerEvent, EquipmentError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EquipmentError::EmptyName);
        }
        if self.rack(rack_id).is_some() {
            return Err(EquipmentError::DuplicateId(rack_id.uuid()));
        }
        if self.racks.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
            return Err(EquipmentError::DuplicateName(name.to_string()));
        }
        if height_in_units == 0 {
            return Err(EquipmentError::InvalidRackHeight {
                rack_id,
                requested: 0,
                occupied: 0,
            });
        }

        let position = self.racks.iter().map(|r| r.position).max().unwrap_or(0) + 1;
        Ok(NodeContainerEvent::RackAdded {
            id: self.id,
            rack: Rack {
                id: rack_id,
                name: name.to_string(),
                position,
                specification_id,
                height_in_units,
                subrack_mounts: Vec::new(),
            },
        })
    }

    /// Validate a rack property update
    ///
    /// # Errors
    /// Unknown rack, blank or duplicate name, height below current content,
    /// `NoChange`
    pub fn update_rack(
        &self,
        rack_id: RackId,
        name: Option<&str>,
        specification_id: Option<SpecificationId>,
        height_in_units: Option<u16>,
    ) -> Result<NodeContainerEvent, EquipmentError> {
        let rack = self.rack(rack_id).ok_or(EquipmentError::RackNotFound(rack_id))?;

        let new_name = name.map_or(rack.name.as_str(), str::trim);
        if new_name.is_empty() {
            return Err(EquipmentError::EmptyName);
        }
        if new_name != rack.name
            && self
                .racks
                .iter()
                .any(|r| r.id != rack_id && r.name.eq_ignore_ascii_case(new_name))
        {
            return Err(EquipmentError::DuplicateName(new_name.to_string()));
        }

        let new_height = height_in_units.unwrap_or(rack.height_in_units);
        let occupied = rack.occupied_height();
        if new_height == 0 || new_height < occupied {
            return Err(EquipmentError::InvalidRackHeight {
                rack_id,
                requested: new_height,
                occupied,
            });
        }

        let new_spec = specification_id.unwrap_or(rack.specification_id);
        if new_name == rack.name && new_spec == rack.specification_id && new_height == rack.height_in_units {
            return Err(EquipmentError::NoChange(rack_id.uuid()));
        }

        Ok(NodeContainerEvent::RackPropertiesUpdated {
            id: self.id,
            rack_id,
            name: new_name.to_string(),
            specification_id: new_spec,
            height_in_units: new_height,
        })
    }

    /// Rack positions for `count` copies of `height` units starting at `start_unit`
    ///
    /// # Errors
    /// Unknown rack, zero height, placement outside the rack or overlapping
    /// existing mounts
    pub fn plan_rack_mounts(
        &self,
        rack_id: RackId,
        start_unit: u16,
        method: RackPlacementMethod,
        height: u16,
        count: u16,
    ) -> Result<Vec<u16>, EquipmentError> {
        let rack = self.rack(rack_id).ok_or(EquipmentError::RackNotFound(rack_id))?;
        if height == 0 {
            return Err(EquipmentError::InvalidRackPlacement(
                "equipment without rack height cannot be mounted".to_string(),
            ));
        }

        let mut positions = Vec::with_capacity(usize::from(count));
        for i in 0..count {
            let offset = u32::from(i) * u32::from(height);
            let position = match method {
                RackPlacementMethod::BottomUp => u32::from(start_unit) + offset,
                RackPlacementMethod::TopDown => {
                    let top = u32::from(start_unit).checked_sub(offset);
                    top.and_then(|t| (t + 1).checked_sub(u32::from(height))).unwrap_or(0)
                }
            };
            let position = u16::try_from(position).map_err(|_| {
                EquipmentError::InvalidRackPlacement(format!("unit {position} out of range"))
            })?;
            rack.check_space(position, height, None)?;
            positions.push(position);
        }
        Ok(positions)
    }

    /// Validate moving mounted equipment to a new lowest unit
    ///
    /// # Errors
    /// Unknown rack or equipment, placement outside the rack, overlap
    pub fn move_in_rack(
        &self,
        rack_id: RackId,
        terminal_equipment_id: TerminalEquipmentId,
        position: u16,
    ) -> Result<NodeContainerEvent, EquipmentError> {
        let rack = self.rack(rack_id).ok_or(EquipmentError::RackNotFound(rack_id))?;
        let mount = rack
            .subrack_mounts
            .iter()
            .find(|m| m.terminal_equipment_id == terminal_equipment_id)
            .ok_or(EquipmentError::TerminalEquipmentNotFound(terminal_equipment_id))?;
        if mount.position == position {
            return Err(EquipmentError::NoChange(terminal_equipment_id.uuid()));
        }
        rack.check_space(position, mount.height_in_units, Some(terminal_equipment_id))?;
        Ok(NodeContainerEvent::TerminalEquipmentMovedInRack {
            id: self.id,
            rack_id,
            terminal_equipment_id,
            position,
        })
    }

    pub fn apply(&mut self, event: &NodeContainerEvent) {
        match event {
            NodeContainerEvent::PlacedInRouteNetwork { container } => *self = container.clone(),
            NodeContainerEvent::ManufacturerChanged { manufacturer_id, .. } => {
                self.manufacturer_id = *manufacturer_id;
            }
            NodeContainerEvent::SpecificationChanged { specification_id, .. } => {
                self.specification_id = *specification_id;
            }
            NodeContainerEvent::VerticalContentAlignmentReversed { alignment, .. } => {
                self.vertical_content_alignment = *alignment;
            }
            NodeContainerEvent::RackAdded { rack, .. } => self.racks.push(rack.clone()),
            NodeContainerEvent::RackPropertiesUpdated {
                rack_id,
                name,
                specification_id,
                height_in_units,
                ..
            } => {
                if let Some(rack) = self.racks.iter_mut().find(|r| r.id == *rack_id) {
                    rack.name.clone_from(name);
                    rack.specification_id = *specification_id;
                    rack.height_in_units = *height_in_units;
                }
            }
            NodeContainerEvent::TerminalEquipmentAdded {
                terminal_equipment_id, ..
            } => self.terminal_equipment_references.push(*terminal_equipment_id),
            NodeContainerEvent::TerminalEquipmentAddedToRack { rack_id, mount, .. } => {
                if let Some(rack) = self.racks.iter_mut().find(|r| r.id == *rack_id) {
                    rack.subrack_mounts.push(mount.clone());
                }
            }
            NodeContainerEvent::TerminalEquipmentMovedInRack {
                rack_id,
                terminal_equipment_id,
                position,
                ..
            } => {
                let mount = self
                    .racks
                    .iter_mut()
                    .filter(|r| r.id == *rack_id)
                    .flat_map(|r| r.subrack_mounts.iter_mut())
                    .find(|m| m.terminal_equipment_id == *terminal_equipment_id);
                if let Some(mount) = mount {
                    mount.position = *position;
                }
            }
        }
    }
}
