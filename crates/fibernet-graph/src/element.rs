//! Id-to-kind index entries
//!
//! Every id placed by an event (equipment, structure, segment, rack,
//! terminal) is registered with its kind and ancestors, so any id can be
//! resolved without inspecting the equipment maps.

use fibernet_model::{
    NodeContainerId, RackId, SpanEquipmentId, SpanSegmentId, SpanStructureId, TerminalEquipmentId,
    TerminalId, TerminalStructureId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    SpanEquipment(SpanEquipmentId),
    SpanStructure {
        span_equipment_id: SpanEquipmentId,
        span_structure_id: SpanStructureId,
    },
    SpanSegment {
        span_equipment_id: SpanEquipmentId,
        span_structure_id: SpanStructureId,
        span_segment_id: SpanSegmentId,
    },
    NodeContainer(NodeContainerId),
    Rack {
        node_container_id: NodeContainerId,
        rack_id: RackId,
    },
    TerminalEquipment(TerminalEquipmentId),
    TerminalStructure {
        terminal_equipment_id: TerminalEquipmentId,
        terminal_structure_id: TerminalStructureId,
    },
    Terminal {
        terminal_equipment_id: TerminalEquipmentId,
        terminal_structure_id: TerminalStructureId,
        terminal_id: TerminalId,
    },
}

impl ElementRef {
    /// Id of the owning equipment aggregate
    #[must_use]
    pub fn equipment_id(&self) -> Uuid {
        match self {
            Self::SpanEquipment(id)
            | Self::SpanStructure { span_equipment_id: id, .. }
            | Self::SpanSegment { span_equipment_id: id, .. } => id.uuid(),
            Self::NodeContainer(id) | Self::Rack { node_container_id: id, .. } => id.uuid(),
            Self::TerminalEquipment(id)
            | Self::TerminalStructure { terminal_equipment_id: id, .. }
            | Self::Terminal { terminal_equipment_id: id, .. } => id.uuid(),
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }

    #[must_use]
    pub fn is_span_segment(&self) -> bool {
        matches!(self, Self::SpanSegment { .. })
    }
}

/// Navigable span segment reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSegmentRef {
    pub span_equipment_id: SpanEquipmentId,
    pub span_structure_id: SpanStructureId,
    pub span_segment_id: SpanSegmentId,
    pub structure_level: u8,
    pub structure_position: u16,
    pub from_terminal_id: Option<TerminalId>,
    pub to_terminal_id: Option<TerminalId>,
}
