//! Strongly-typed identifiers
//!
//! Every entity is keyed by a UUID. The newtypes keep span, terminal and
//! container ids from being mixed up at compile time while still sharing one
//! id-space at runtime (see [`Uuid`] conversions).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Underlying UUID
            #[inline]
            #[must_use]
            pub const fn uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id!(
    /// Route network node or segment, owned by the route network service
    RouteElementId
);
define_id!(
    /// Registered route network interest (walk or node of interest)
    InterestId
);
define_id!(
    /// Manufacturer catalog entry
    ManufacturerId
);
define_id!(
    /// Any catalog specification (span, terminal, container, rack)
    SpecificationId
);
define_id!(
    /// Cable or conduit
    SpanEquipmentId
);
define_id!(
    /// Structure inside a span equipment (outer jacket, inner duct, fiber tube)
    SpanStructureId
);
define_id!(
    /// Physical conductor inside a span structure
    SpanSegmentId
);
define_id!(
    /// Well, cabinet or building housing equipment at one route node
    NodeContainerId
);
define_id!(
    /// Rack inside a node container
    RackId
);
define_id!(
    /// Splice closure, patch panel, splitter or customer termination
    TerminalEquipmentId
);
define_id!(
    /// Tray, card or splitter module inside terminal equipment
    TerminalStructureId
);
define_id!(
    /// Atomic connection point
    TerminalId
);
define_id!(
    /// Patch connection between two terminals
    TerminalConnectionId
);
define_id!(
    /// Domain event
    EventId
);

/// Route network nodes and segments share one id type; the alias documents intent.
pub type RouteNodeId = RouteElementId;

/// See [`RouteNodeId`].
pub type RouteSegmentId = RouteElementId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_convert_to_uuid() {
        let a = SpanEquipmentId::new();
        let b = SpanEquipmentId::new();
        assert_ne!(a, b);

        let raw: Uuid = a.into();
        assert_eq!(SpanEquipmentId::from(raw), a);
        assert_eq!(a.to_string(), raw.to_string());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = TerminalId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.uuid()));
    }
}
