//! Domain events
//!
//! Everything that changes projection state is one of these. Events are
//! appended to the event log, folded by the projection and published with
//! their [`DomainEvent::category`].

use crate::catalog::CatalogEvent;
use crate::equipment::{
    ConnectivityEvent, NodeContainerEvent, SpanEquipmentEvent, TerminalEquipmentEvent,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "event")]
pub enum DomainEvent {
    Catalog(CatalogEvent),
    SpanEquipment(SpanEquipmentEvent),
    NodeContainer(NodeContainerEvent),
    TerminalEquipment(TerminalEquipmentEvent),
    Connectivity(ConnectivityEvent),
}

impl DomainEvent {
    /// Notification category, e.g. `EquipmentModification.PropertiesUpdated`
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Catalog(CatalogEvent::ManufacturerAdded(_)) => "Catalog.ManufacturerAdded",
            Self::Catalog(_) => "Catalog.SpecificationAdded",
            Self::SpanEquipment(e) => match e {
                SpanEquipmentEvent::PlacedInRouteNetwork { .. } => "EquipmentPlacement.Placed",
                SpanEquipmentEvent::NamingInfoChanged { .. }
                | SpanEquipmentEvent::ManufacturerChanged { .. } => "EquipmentModification.PropertiesUpdated",
                SpanEquipmentEvent::AdditionalStructuresAdded { .. } => "EquipmentModification.StructuresAdded",
                SpanEquipmentEvent::Moved { .. } | SpanEquipmentEvent::WalkRecomputed { .. } => {
                    "EquipmentModification.Moved"
                }
                SpanEquipmentEvent::AffixedToParent { .. } => "EquipmentModification.AffixedToParent",
                SpanEquipmentEvent::DetachedFromParent { .. } => "EquipmentModification.DetachedFromParent",
                SpanEquipmentEvent::AffixedToNodeContainer { .. } => "EquipmentModification.AffixedToContainer",
                SpanEquipmentEvent::DetachedFromNodeContainer { .. } => {
                    "EquipmentModification.DetachedFromContainer"
                }
                SpanEquipmentEvent::SegmentsConnectedToTerminals { .. } => "EquipmentConnectivityModification.Connect",
                SpanEquipmentEvent::SegmentDisconnectedFromTerminal { .. } => {
                    "EquipmentConnectivityModification.Disconnect"
                }
            },
            Self::NodeContainer(e) => match e {
                NodeContainerEvent::PlacedInRouteNetwork { .. } => "EquipmentPlacement.Placed",
                NodeContainerEvent::ManufacturerChanged { .. }
                | NodeContainerEvent::SpecificationChanged { .. }
                | NodeContainerEvent::VerticalContentAlignmentReversed { .. }
                | NodeContainerEvent::RackPropertiesUpdated { .. } => "EquipmentModification.PropertiesUpdated",
                NodeContainerEvent::RackAdded { .. } => "EquipmentModification.RackAdded",
                NodeContainerEvent::TerminalEquipmentAdded { .. }
                | NodeContainerEvent::TerminalEquipmentAddedToRack { .. } => {
                    "EquipmentModification.TerminalEquipmentAdded"
                }
                NodeContainerEvent::TerminalEquipmentMovedInRack { .. } => {
                    "EquipmentModification.TerminalEquipmentMoved"
                }
            },
            Self::TerminalEquipment(e) => match e {
                TerminalEquipmentEvent::Placed { .. } => "EquipmentPlacement.Placed",
                TerminalEquipmentEvent::NamingInfoChanged { .. }
                | TerminalEquipmentEvent::ManufacturerChanged { .. } => "EquipmentModification.PropertiesUpdated",
            },
            Self::Connectivity(ConnectivityEvent::TerminalsConnected { .. }) => {
                "EquipmentConnectivityModification.Connect"
            }
            Self::Connectivity(ConnectivityEvent::TerminalsDisconnected { .. }) => {
                "EquipmentConnectivityModification.Disconnect"
            }
        }
    }

    /// Equipment the event is about, if any
    #[must_use]
    pub fn equipment_id(&self) -> Option<Uuid> {
        match self {
            Self::Catalog(_) | Self::Connectivity(_) => None,
            Self::SpanEquipment(e) => Some(e.span_equipment_id().uuid()),
            Self::NodeContainer(e) => Some(e.node_container_id().uuid()),
            Self::TerminalEquipment(e) => Some(e.terminal_equipment_id().uuid()),
        }
    }
}

impl From<CatalogEvent> for DomainEvent {
    fn from(value: CatalogEvent) -> Self {
        Self::Catalog(value)
    }
}

impl From<SpanEquipmentEvent> for DomainEvent {
    fn from(value: SpanEquipmentEvent) -> Self {
        Self::SpanEquipment(value)
    }
}

impl From<NodeContainerEvent> for DomainEvent {
    fn from(value: NodeContainerEvent) -> Self {
        Self::NodeContainer(value)
    }
}

impl From<TerminalEquipmentEvent> for DomainEvent {
    fn from(value: TerminalEquipmentEvent) -> Self {
        Self::TerminalEquipment(value)
    }
}

impl From<ConnectivityEvent> for DomainEvent {
    fn from(value: ConnectivityEvent) -> Self {
        Self::Connectivity(value)
    }
}
