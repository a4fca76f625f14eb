//! Outbound change notifications
//!
//! One notification per appended event. Publishing happens after the batch
//! is in the log; a failed publish is logged and never undoes the command.

use crate::event_log::EventEnvelope;
use async_trait::async_trait;
use fibernet_model::{EventId, RouteElementId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub event_id: EventId,
    pub category: String,
    pub equipment_id: Option<Uuid>,
    pub affected_route_network_element_ids: Vec<RouteElementId>,
}

impl From<&EventEnvelope> for ChangeNotification {
    fn from(envelope: &EventEnvelope) -> Self {
        Self {
            event_id: envelope.event_id,
            category: envelope.category.clone(),
            equipment_id: envelope.event.equipment_id(),
            affected_route_network_element_ids: envelope.affected_route_network_element_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notification not delivered: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify(&self, notification: ChangeNotification) -> Result<(), NotifyError>;
}

/// Collects notifications in memory
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<ChangeNotification>>,
}

impl InMemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<ChangeNotification> {
        self.sent.lock().clone()
    }

    /// Drain everything received so far
    pub fn take(&self) -> Vec<ChangeNotification> {
        std::mem::take(&mut *self.sent.lock())
    }
}

#[async_trait]
impl ChangeNotifier for InMemoryNotifier {
    async fn notify(&self, notification: ChangeNotification) -> Result<(), NotifyError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}
