//! Terminal equipment aggregate and terminal-to-terminal connections

use super::{check_naming, NamingInfo};
use crate::catalog::{SpecificationCatalog, TerminalDirection, TerminalEquipmentSpecification};
use crate::error::EquipmentError;
use crate::ids::{
    ManufacturerId, NodeContainerId, RouteNodeId, SpecificationId, TerminalConnectionId,
    TerminalEquipmentId, TerminalId, TerminalStructureId,
};
use serde::{Deserialize, Serialize};

/// Atomic connection point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: TerminalId,
    pub name: String,
    pub direction: TerminalDirection,
    pub is_pass_through: bool,
    pub is_splice: bool,
    pub connector_type: Option<String>,
    pub internal_connectivity_node: Option<String>,
}

/// Tray, card or splitter module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStructure {
    pub id: TerminalStructureId,
    pub specification_id: SpecificationId,
    pub position: u16,
    pub terminals: Vec<Terminal>,
}

impl TerminalStructure {
    /// A structure with internally wired In/Out terminals fans signal out
    #[must_use]
    pub fn is_splitter(&self) -> bool {
        self.terminals.iter().any(|t| {
            t.direction == TerminalDirection::In && t.internal_connectivity_node.is_some()
        }) && self.terminals.iter().any(|t| {
            t.direction == TerminalDirection::Out && t.internal_connectivity_node.is_some()
        })
    }

    /// Terminals wired to `terminal` inside this structure with the opposite direction
    pub fn internal_counterparts<'a>(&'a self, terminal: &'a Terminal) -> impl Iterator<Item = &'a Terminal> + 'a {
        let wanted = match terminal.direction {
            TerminalDirection::In => Some(TerminalDirection::Out),
            TerminalDirection::Out => Some(TerminalDirection::In),
            TerminalDirection::Bi => None,
        };
        self.terminals.iter().filter(move |t| {
            t.id != terminal.id
                && terminal.internal_connectivity_node.is_some()
                && t.internal_connectivity_node == terminal.internal_connectivity_node
                && Some(t.direction) == wanted
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalEquipment {
    pub id: TerminalEquipmentId,
    pub specification_id: SpecificationId,
    pub manufacturer_id: Option<ManufacturerId>,
    pub naming: Option<NamingInfo>,
    pub node_container_id: NodeContainerId,
    pub terminal_structures: Vec<TerminalStructure>,
}

/// Terminal equipment events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TerminalEquipmentEvent {
    Placed {
        equipment: TerminalEquipment,
        route_node_id: RouteNodeId,
    },
    NamingInfoChanged {
        id: TerminalEquipmentId,
        naming: Option<NamingInfo>,
    },
    ManufacturerChanged {
        id: TerminalEquipmentId,
        manufacturer_id: Option<ManufacturerId>,
    },
}

impl TerminalEquipmentEvent {
    #[must_use]
    pub fn terminal_equipment_id(&self) -> TerminalEquipmentId {
        match self {
            Self::Placed { equipment, .. } => equipment.id,
            Self::NamingInfoChanged { id, .. } | Self::ManufacturerChanged { id, .. } => *id,
        }
    }
}

impl TerminalEquipment {
    /// Build terminal equipment from its specification
    ///
    /// # Errors
    /// Blank name, or a structure specification missing from the catalog
    pub fn place(
        id: TerminalEquipmentId,
        specification: &TerminalEquipmentSpecification,
        catalog: &SpecificationCatalog,
        node_container_id: NodeContainerId,
        manufacturer_id: Option<ManufacturerId>,
        naming: Option<NamingInfo>,
    ) -> Result<Self, EquipmentError> {
        check_naming(naming.as_ref())?;

        let mut templates: Vec<_> = specification.structure_templates.iter().collect();
        templates.sort_by_key(|t| t.position);

        let terminal_structures = templates
            .into_iter()
            .map(|template| {
                let structure_spec = catalog
                    .terminal_structure_specification(template.terminal_structure_specification_id)
                    .ok_or(EquipmentError::SpecificationNotFound(
                        template.terminal_structure_specification_id,
                    ))?;
                Ok(TerminalStructure {
                    id: TerminalStructureId::new(),
                    specification_id: structure_spec.id,
                    position: template.position,
                    terminals: structure_spec
                        .terminal_templates
                        .iter()
                        .map(|t| Terminal {
                            id: TerminalId::new(),
                            name: t.name.clone(),
                            direction: t.direction,
                            is_pass_through: t.is_pass_through,
                            is_splice: t.is_splice,
                            connector_type: t.connector_type.clone(),
                            internal_connectivity_node: t.internal_connectivity_node.clone(),
                        })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, EquipmentError>>()?;

        Ok(Self {
            id,
            specification_id: specification.id,
            manufacturer_id,
            naming,
            node_container_id,
            terminal_structures,
        })
    }

    /// Terminal together with the structure holding it
    #[must_use]
    pub fn terminal(&self, id: TerminalId) -> Option<(&TerminalStructure, &Terminal)> {
        self.terminal_structures
            .iter()
            .find_map(|s| s.terminals.iter().find(|t| t.id == id).map(|t| (s, t)))
    }

    #[must_use]
    pub fn structure(&self, id: TerminalStructureId) -> Option<&TerminalStructure> {
        self.terminal_structures.iter().find(|s| s.id == id)
    }

    pub fn terminals(&self) -> impl Iterator<Item = (&TerminalStructure, &Terminal)> {
        self.terminal_structures
            .iter()
            .flat_map(|s| s.terminals.iter().map(move |t| (s, t)))
    }

    /// Validate a property update
    ///
    /// # Errors
    /// Blank name, or `NoChange` if nothing differs
    pub fn update_properties(
        &self,
        naming: Option<Option<NamingInfo>>,
        manufacturer_id: Option<Option<ManufacturerId>>,
    ) -> Result<Vec<TerminalEquipmentEvent>, EquipmentError> {
        let mut events = Vec::new();
        if let Some(naming) = naming.filter(|n| *n != self.naming) {
            check_naming(naming.as_ref())?;
            events.push(TerminalEquipmentEvent::NamingInfoChanged { id: self.id, naming });
        }
        if let Some(manufacturer_id) = manufacturer_id.filter(|m| *m != self.manufacturer_id) {
            events.push(TerminalEquipmentEvent::ManufacturerChanged {
                id: self.id,
                manufacturer_id,
            });
        }
        if events.is_empty() {
            return Err(EquipmentError::NoChange(self.id.uuid()));
        }
        Ok(events)
    }

    pub fn apply(&mut self, event: &TerminalEquipmentEvent) {
        match event {
            TerminalEquipmentEvent::Placed { equipment, .. } => *self = equipment.clone(),
            TerminalEquipmentEvent::NamingInfoChanged { naming, .. } => self.naming.clone_from(naming),
            TerminalEquipmentEvent::ManufacturerChanged { manufacturer_id, .. } => {
                self.manufacturer_id = *manufacturer_id;
            }
        }
    }
}

/// Patch or splice between two terminals, directed `from -> to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalConnection {
    pub id: TerminalConnectionId,
    pub route_node_id: RouteNodeId,
    pub from_terminal_id: TerminalId,
    pub to_terminal_id: TerminalId,
    pub fiber_length_m: f64,
}

/// Terminal connection events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectivityEvent {
    TerminalsConnected { connection: TerminalConnection },
    TerminalsDisconnected { connection: TerminalConnection },
}
