//! Specification catalog
//!
//! Immutable lookup of manufacturers and equipment specifications. Entries are
//! added through validated catalog events and never change afterwards; the
//! projection folds those events like any other.

use crate::error::ErrorCode;
use crate::ids::{ManufacturerId, SpecificationId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Catalog validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} name must not be empty")]
    EmptyName(CatalogKind),

    #[error("id {0} is already used in the catalog")]
    DuplicateId(Uuid),

    #[error("{kind} named '{name}' already exists")]
    DuplicateName { kind: CatalogKind, name: String },

    #[error("specification {0} not found")]
    SpecificationNotFound(SpecificationId),

    #[error("manufacturer {0} not found")]
    ManufacturerNotFound(ManufacturerId),

    #[error("invalid {kind}: {reason}")]
    Invalid { kind: CatalogKind, reason: String },
}

impl CatalogError {
    /// Stable code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyName(_) => ErrorCode::EmptyName,
            Self::DuplicateId(_) => ErrorCode::DuplicateId,
            Self::DuplicateName { .. } => ErrorCode::DuplicateName,
            Self::SpecificationNotFound(_) => ErrorCode::SpecificationNotFound,
            Self::ManufacturerNotFound(_) => ErrorCode::ManufacturerNotFound,
            Self::Invalid { .. } => ErrorCode::InvalidSpecification,
        }
    }
}

/// Kind of catalog entry; names are unique per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogKind {
    Manufacturer,
    SpanStructure,
    SpanEquipment,
    NodeContainer,
    Rack,
    TerminalStructure,
    TerminalEquipment,
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Manufacturer => "manufacturer",
            Self::SpanStructure => "span structure specification",
            Self::SpanEquipment => "span equipment specification",
            Self::NodeContainer => "node container specification",
            Self::Rack => "rack specification",
            Self::TerminalStructure => "terminal structure specification",
            Self::TerminalEquipment => "terminal equipment specification",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: ManufacturerId,
    pub name: String,
    #[serde(default)]
    pub deprecated: bool,
}

impl Manufacturer {
    pub fn new(id: ManufacturerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            deprecated: false,
        }
    }
}

/// Duct, tube or jacket specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStructureSpecification {
    pub id: SpecificationId,
    pub category: String,
    pub name: String,
    pub color: String,
    pub inner_diameter_mm: Option<u16>,
    pub outer_diameter_mm: Option<u16>,
    #[serde(default)]
    pub deprecated: bool,
}

/// Structure layout of a span equipment specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStructureTemplate {
    pub span_structure_specification_id: SpecificationId,
    pub level: u8,
    pub position: u16,
    #[serde(default)]
    pub child_templates: Vec<SpanStructureTemplate>,
}

impl SpanStructureTemplate {
    /// Template and all descendants, ordered by level then position
    #[must_use]
    pub fn flatten(&self) -> Vec<&SpanStructureTemplate> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            out.push(t);
            stack.extend(t.child_templates.iter());
        }
        out.sort_by_key(|t| (t.level, t.position));
        out
    }
}

/// Cable or conduit specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEquipmentSpecification {
    pub id: SpecificationId,
    pub category: String,
    pub name: String,
    pub root_template: SpanStructureTemplate,
    #[serde(default)]
    pub manufacturer_refs: Vec<ManufacturerId>,
    /// Fixed specifications never receive additional structures
    pub is_fixed: bool,
    pub is_cable: bool,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContainerSpecification {
    pub id: SpecificationId,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub manufacturer_refs: Vec<ManufacturerId>,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackSpecification {
    pub id: SpecificationId,
    pub name: String,
    pub short_name: String,
    #[serde(default)]
    pub deprecated: bool,
}

/// Signal direction of a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalDirection {
    In,
    Out,
    Bi,
}

/// One terminal in a terminal structure specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalTemplate {
    pub name: String,
    pub direction: TerminalDirection,
    #[serde(default)]
    pub is_pass_through: bool,
    #[serde(default)]
    pub is_splice: bool,
    #[serde(default)]
    pub connector_type: Option<String>,
    /// Terminals sharing a node name are wired together inside the structure
    /// (splitters: inputs fan out to every output of the same node).
    #[serde(default)]
    pub internal_connectivity_node: Option<String>,
}

impl TerminalTemplate {
    pub fn new(name: impl Into<String>, direction: TerminalDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            is_pass_through: false,
            is_splice: false,
            connector_type: None,
            internal_connectivity_node: None,
        }
    }

    #[must_use]
    pub fn splice(mut self) -> Self {
        self.is_splice = true;
        self.is_pass_through = true;
        self
    }

    #[must_use]
    pub fn with_connector(mut self, connector: impl Into<String>) -> Self {
        self.connector_type = Some(connector.into());
        self
    }

    #[must_use]
    pub fn internally_connected(mut self, node: impl Into<String>) -> Self {
        self.internal_connectivity_node = Some(node.into());
        self
    }
}

/// Tray, card or splitter module specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStructureSpecification {
    pub id: SpecificationId,
    pub category: String,
    pub name: String,
    pub short_name: String,
    pub terminal_templates: Vec<TerminalTemplate>,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStructureTemplate {
    pub terminal_structure_specification_id: SpecificationId,
    pub position: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalEquipmentSpecification {
    pub id: SpecificationId,
    pub category: String,
    pub name: String,
    pub short_name: String,
    pub is_rack_equipment: bool,
    pub height_in_rack_units: u16,
    /// Leaf installation at an end customer
    #[serde(default)]
    pub is_customer_termination: bool,
    #[serde(default)]
    pub manufacturer_refs: Vec<ManufacturerId>,
    pub structure_templates: Vec<TerminalStructureTemplate>,
    #[serde(default)]
    pub deprecated: bool,
}

/// Catalog events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    ManufacturerAdded(Manufacturer),
    SpanStructureSpecificationAdded(SpanStructureSpecification),
    SpanEquipmentSpecificationAdded(SpanEquipmentSpecification),
    NodeContainerSpecificationAdded(NodeContainerSpecification),
    RackSpecificationAdded(RackSpecification),
    TerminalStructureSpecificationAdded(TerminalStructureSpecification),
    TerminalEquipmentSpecificationAdded(TerminalEquipmentSpecification),
}

/// Read-only catalog of manufacturers and specifications
#[derive(Debug, Clone, Default)]
pub struct SpecificationCatalog {
    manufacturers: BTreeMap<ManufacturerId, Manufacturer>,
    span_structures: BTreeMap<SpecificationId, SpanStructureSpecification>,
    span_equipment: BTreeMap<SpecificationId, SpanEquipmentSpecification>,
    node_containers: BTreeMap<SpecificationId, NodeContainerSpecification>,
    racks: BTreeMap<SpecificationId, RackSpecification>,
    terminal_structures: BTreeMap<SpecificationId, TerminalStructureSpecification>,
    terminal_equipment: BTreeMap<SpecificationId, TerminalEquipmentSpecification>,
    names: HashSet<(CatalogKind, String)>,
}

impl SpecificationCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a new manufacturer
    ///
    /// # Errors
    /// Empty name, duplicate id or duplicate name
    pub fn add_manufacturer(&self, manufacturer: Manufacturer) -> Result<CatalogEvent, CatalogError> {
        if self.manufacturers.contains_key(&manufacturer.id) {
            return Err(CatalogError::DuplicateId(manufacturer.id.uuid()));
        }
        self.check_name(CatalogKind::Manufacturer, &manufacturer.name)?;
        Ok(CatalogEvent::ManufacturerAdded(manufacturer))
    }

    /// Validate a new span structure specification
    ///
    /// # Errors
    /// Empty name, duplicate id or duplicate name
    pub fn add_span_structure_specification(
        &self,
        spec: SpanStructureSpecification,
    ) -> Result<CatalogEvent, CatalogError> {
        self.check_specification_id(spec.id)?;
        self.check_name(CatalogKind::SpanStructure, &spec.name)?;
        Ok(CatalogEvent::SpanStructureSpecificationAdded(spec))
    }

    /// Validate a new span equipment specification
    ///
    /// # Errors
    /// Empty/duplicate name or id, unknown structure specification or manufacturer
    pub fn add_span_equipment_specification(
        &self,
        spec: SpanEquipmentSpecification,
    ) -> Result<CatalogEvent, CatalogError> {
        self.check_specification_id(spec.id)?;
        self.check_name(CatalogKind::SpanEquipment, &spec.name)?;
        for template in spec.root_template.flatten() {
            if !self.span_structures.contains_key(&template.span_structure_specification_id) {
                return Err(CatalogError::SpecificationNotFound(
                    template.span_structure_specification_id,
                ));
            }
        }
        self.check_manufacturers(&spec.manufacturer_refs)?;
        Ok(CatalogEvent::SpanEquipmentSpecificationAdded(spec))
    }

    /// Validate a new node container specification
    ///
    /// # Errors
    /// Empty/duplicate name or id, unknown manufacturer
    pub fn add_node_container_specification(
        &self,
        spec: NodeContainerSpecification,
    ) -> Result<CatalogEvent, CatalogError> {
        self.check_specification_id(spec.id)?;
        self.check_name(CatalogKind::NodeContainer, &spec.name)?;
        self.check_manufacturers(&spec.manufacturer_refs)?;
        Ok(CatalogEvent::NodeContainerSpecificationAdded(spec))
    }

    /// Validate a new rack specification
    ///
    /// # Errors
    /// Empty/duplicate name or id
    pub fn add_rack_specification(&self, spec: RackSpecification) -> Result<CatalogEvent, CatalogError> {
        self.check_specification_id(spec.id)?;
        self.check_name(CatalogKind::Rack, &spec.name)?;
        Ok(CatalogEvent::RackSpecificationAdded(spec))
    }

    /// Validate a new terminal structure specification
    ///
    /// # Errors
    /// Empty/duplicate name or id, or a structure without terminals
    pub fn add_terminal_structure_specification(
        &self,
        spec: TerminalStructureSpecification,
    ) -> Result<CatalogEvent, CatalogError> {
        self.check_specification_id(spec.id)?;
        self.check_name(CatalogKind::TerminalStructure, &spec.name)?;
        if spec.terminal_templates.is_empty() {
            return Err(CatalogError::Invalid {
                kind: CatalogKind::TerminalStructure,
                reason: "at least one terminal template is required".to_string(),
            });
        }
        Ok(CatalogEvent::TerminalStructureSpecificationAdded(spec))
    }

    /// Validate a new terminal equipment specification
    ///
    /// # Errors
    /// Empty/duplicate name or id, unknown structure specification or manufacturer,
    /// rack equipment without height
    pub fn add_terminal_equipment_specification(
        &self,
        spec: TerminalEquipmentSpecification,
    ) -> Result<CatalogEvent, CatalogError> {
        self.check_specification_id(spec.id)?;
        self.check_name(CatalogKind::TerminalEquipment, &spec.name)?;
        if spec.is_rack_equipment && spec.height_in_rack_units == 0 {
            return Err(CatalogError::Invalid {
                kind: CatalogKind::TerminalEquipment,
                reason: "rack equipment must occupy at least one rack unit".to_string(),
            });
        }
        for template in &spec.structure_templates {
            if !self
                .terminal_structures
                .contains_key(&template.terminal_structure_specification_id)
            {
                return Err(CatalogError::SpecificationNotFound(
                    template.terminal_structure_specification_id,
                ));
            }
        }
        self.check_manufacturers(&spec.manufacturer_refs)?;
        Ok(CatalogEvent::TerminalEquipmentSpecificationAdded(spec))
    }

    /// Fold a catalog event
    pub fn apply(&mut self, event: &CatalogEvent) {
        match event {
            CatalogEvent::ManufacturerAdded(m) => {
                self.names.insert(name_key(CatalogKind::Manufacturer, &m.name));
                self.manufacturers.insert(m.id, m.clone());
            }
            CatalogEvent::SpanStructureSpecificationAdded(s) => {
                self.names.insert(name_key(CatalogKind::SpanStructure, &s.name));
                self.span_structures.insert(s.id, s.clone());
            }
            CatalogEvent::SpanEquipmentSpecificationAdded(s) => {
                self.names.insert(name_key(CatalogKind::SpanEquipment, &s.name));
                self.span_equipment.insert(s.id, s.clone());
            }
            CatalogEvent::NodeContainerSpecificationAdded(s) => {
                self.names.insert(name_key(CatalogKind::NodeContainer, &s.name));
                self.node_containers.insert(s.id, s.clone());
            }
            CatalogEvent::RackSpecificationAdded(s) => {
                self.names.insert(name_key(CatalogKind::Rack, &s.name));
                self.racks.insert(s.id, s.clone());
            }
            CatalogEvent::TerminalStructureSpecificationAdded(s) => {
                self.names.insert(name_key(CatalogKind::TerminalStructure, &s.name));
                self.terminal_structures.insert(s.id, s.clone());
            }
            CatalogEvent::TerminalEquipmentSpecificationAdded(s) => {
                self.names.insert(name_key(CatalogKind::TerminalEquipment, &s.name));
                self.terminal_equipment.insert(s.id, s.clone());
            }
        }
    }

    #[must_use]
    pub fn manufacturer(&self, id: ManufacturerId) -> Option<&Manufacturer> {
        self.manufacturers.get(&id)
    }

    #[must_use]
    pub fn span_structure_specification(&self, id: SpecificationId) -> Option<&SpanStructureSpecification> {
        self.span_structures.get(&id)
    }

    #[must_use]
    pub fn span_equipment_specification(&self, id: SpecificationId) -> Option<&SpanEquipmentSpecification> {
        self.span_equipment.get(&id)
    }

    #[must_use]
    pub fn node_container_specification(&self, id: SpecificationId) -> Option<&NodeContainerSpecification> {
        self.node_containers.get(&id)
    }

    #[must_use]
    pub fn rack_specification(&self, id: SpecificationId) -> Option<&RackSpecification> {
        self.racks.get(&id)
    }

    #[must_use]
    pub fn terminal_structure_specification(
        &self,
        id: SpecificationId,
    ) -> Option<&TerminalStructureSpecification> {
        self.terminal_structures.get(&id)
    }

    #[must_use]
    pub fn terminal_equipment_specification(
        &self,
        id: SpecificationId,
    ) -> Option<&TerminalEquipmentSpecification> {
        self.terminal_equipment.get(&id)
    }

    /// Iterate manufacturers in id order
    pub fn manufacturers(&self) -> impl Iterator<Item = &Manufacturer> {
        self.manufacturers.values()
    }

    fn check_name(&self, kind: CatalogKind, name: &str) -> Result<(), CatalogError> {
        if name.trim().is_empty() {
            return Err(CatalogError::EmptyName(kind));
        }
        if self.names.contains(&name_key(kind, name)) {
            return Err(CatalogError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_specification_id(&self, id: SpecificationId) -> Result<(), CatalogError> {
        let used = self.span_structures.contains_key(&id)
            || self.span_equipment.contains_key(&id)
            || self.node_containers.contains_key(&id)
            || self.racks.contains_key(&id)
            || self.terminal_structures.contains_key(&id)
            || self.terminal_equipment.contains_key(&id);
        if used {
            return Err(CatalogError::DuplicateId(id.uuid()));
        }
        Ok(())
    }

    fn check_manufacturers(&self, refs: &[ManufacturerId]) -> Result<(), CatalogError> {
        match refs.iter().find(|id| !self.manufacturers.contains_key(id)) {
            Some(missing) => Err(CatalogError::ManufacturerNotFound(*missing)),
            None => Ok(()),
        }
    }
}

fn name_key(kind: CatalogKind, name: &str) -> (CatalogKind, String) {
    (kind, name.trim().to_lowercase())
}
