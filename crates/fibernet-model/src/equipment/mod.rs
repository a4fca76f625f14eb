//! Equipment aggregates
//!
//! Three aggregates share the [`PlacedEquipment`] capability set and are
//! stored side by side as [`Equipment`] variants:
//!
//! - [`SpanEquipment`]: cable or conduit, structures and segments
//! - [`NodeContainer`]: housing at one route node, racks and equipment references
//! - [`TerminalEquipment`]: structures and terminals
//!
//! Each aggregate validates commands against its own state and returns
//! events; `apply` folds those events back. Cross-aggregate invariants are
//! checked by the projection and the walk synchronizer.

mod container;
mod span;
mod terminal;

pub use container::{
    NodeContainer, NodeContainerEvent, Rack, RackPlacementMethod, SubrackMount,
    VerticalContentAlignment,
};
pub use span::{
    NodeContainerAffix, NodeContainerSide, SegmentTerminalConnect, SpanEquipment,
    SpanEquipmentEvent, SpanSegment, SpanSegmentEnd, SpanStructure, UtilityNetworkHop,
};
pub use terminal::{
    ConnectivityEvent, Terminal, TerminalConnection, TerminalEquipment, TerminalEquipmentEvent,
    TerminalStructure,
};

use crate::ids::SpecificationId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name and description of a piece of equipment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl NamingInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Which aggregate an equipment id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentKind {
    SpanEquipment,
    NodeContainer,
    TerminalEquipment,
}

/// Capabilities shared by every placed aggregate
pub trait PlacedEquipment: Sized {
    const KIND: EquipmentKind;

    fn equipment_id(&self) -> Uuid;

    fn specification_id(&self) -> SpecificationId;

    fn naming(&self) -> Option<&NamingInfo> {
        None
    }

    /// Name used by the name index
    fn name(&self) -> Option<&str> {
        self.naming().and_then(|n| n.name.as_deref())
    }

    fn from_equipment(equipment: &Equipment) -> Option<&Self>;
}

/// Tagged union over the equipment aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Equipment {
    Span(SpanEquipment),
    NodeContainer(NodeContainer),
    Terminal(TerminalEquipment),
}

impl Equipment {
    #[must_use]
    pub fn kind(&self) -> EquipmentKind {
        match self {
            Self::Span(_) => EquipmentKind::SpanEquipment,
            Self::NodeContainer(_) => EquipmentKind::NodeContainer,
            Self::Terminal(_) => EquipmentKind::TerminalEquipment,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Span(e) => e.equipment_id(),
            Self::NodeContainer(e) => e.equipment_id(),
            Self::Terminal(e) => e.equipment_id(),
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Span(e) => e.name(),
            Self::NodeContainer(e) => e.name(),
            Self::Terminal(e) => e.name(),
        }
    }
}

impl PlacedEquipment for SpanEquipment {
    const KIND: EquipmentKind = EquipmentKind::SpanEquipment;

    fn equipment_id(&self) -> Uuid {
        self.id.uuid()
    }

    fn specification_id(&self) -> SpecificationId {
        self.specification_id
    }

    fn naming(&self) -> Option<&NamingInfo> {
        self.naming.as_ref()
    }

    fn from_equipment(equipment: &Equipment) -> Option<&Self> {
        match equipment {
            Equipment::Span(e) => Some(e),
            _ => None,
        }
    }
}

impl PlacedEquipment for NodeContainer {
    const KIND: EquipmentKind = EquipmentKind::NodeContainer;

    fn equipment_id(&self) -> Uuid {
        self.id.uuid()
    }

    fn specification_id(&self) -> SpecificationId {
        self.specification_id
    }

    fn from_equipment(equipment: &Equipment) -> Option<&Self> {
        match equipment {
            Equipment::NodeContainer(e) => Some(e),
            _ => None,
        }
    }
}

impl PlacedEquipment for TerminalEquipment {
    const KIND: EquipmentKind = EquipmentKind::TerminalEquipment;

    fn equipment_id(&self) -> Uuid {
        self.id.uuid()
    }

    fn specification_id(&self) -> SpecificationId {
        self.specification_id
    }

    fn naming(&self) -> Option<&NamingInfo> {
        self.naming.as_ref()
    }

    fn from_equipment(equipment: &Equipment) -> Option<&Self> {
        match equipment {
            Equipment::Terminal(e) => Some(e),
            _ => None,
        }
    }
}

/// Reject a name that is present but blank
pub(crate) fn check_naming(naming: Option<&NamingInfo>) -> Result<(), crate::error::EquipmentError> {
    match naming.and_then(|n| n.name.as_deref()) {
        Some(name) if name.trim().is_empty() => Err(crate::error::EquipmentError::EmptyName),
        _ => Ok(()),
    }
}
