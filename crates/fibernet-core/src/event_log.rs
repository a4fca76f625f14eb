//! Append-only, hash-chained event log
//!
//! Each envelope carries the hash of its predecessor and a sha256 over its
//! own fields plus that predecessor hash, so any edit or reorder in a saved
//! log is detected on load. The log, not the projection, is the durability
//! boundary: the projection can always be rebuilt from it.

use chrono::{DateTime, Utc};
use fibernet_model::{DomainEvent, EventId, RouteElementId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hash of the (absent) predecessor of the first envelope
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("integrity violation at sequence {sequence}")]
    IntegrityViolation { sequence: u64 },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("i/o failed: {0}")]
    Io(String),
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// One persisted domain event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    /// Position in the log, starting at 0
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub affected_route_network_element_ids: Vec<RouteElementId>,
    pub event: DomainEvent,
    pub prev_hash: String,
    pub hash: String,
}

/// Fields covered by the hash
#[derive(Serialize)]
struct Hashed<'a> {
    event_id: EventId,
    sequence: u64,
    timestamp: &'a DateTime<Utc>,
    category: &'a str,
    affected_route_network_element_ids: &'a [RouteElementId],
    event: &'a DomainEvent,
}

impl EventEnvelope {
    fn seal(
        sequence: u64,
        event: DomainEvent,
        affected_route_network_element_ids: Vec<RouteElementId>,
        prev_hash: String,
    ) -> Result<Self, LogError> {
        let mut envelope = Self {
            event_id: EventId::new(),
            sequence,
            timestamp: Utc::now(),
            category: event.category().to_string(),
            affected_route_network_element_ids,
            event,
            prev_hash,
            hash: String::new(),
        };
        envelope.hash = envelope.compute_hash()?;
        Ok(envelope)
    }

    fn compute_hash(&self) -> Result<String, LogError> {
        let body = serde_json::to_vec(&Hashed {
            event_id: self.event_id,
            sequence: self.sequence,
            timestamp: &self.timestamp,
            category: &self.category,
            affected_route_network_element_ids: &self.affected_route_network_element_ids,
            event: &self.event,
        })?;
        let mut hasher = Sha256::new();
        hasher.update(self.prev_hash.as_bytes());
        hasher.update([0]);
        hasher.update(&body);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Outcome of [`EventLog::verify_integrity`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub events_checked: u64,
    /// Sequence of the first envelope that failed, if any
    pub first_invalid: Option<u64>,
}

#[derive(Debug, Default)]
pub struct EventLog {
    inner: Mutex<Vec<EventEnvelope>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt existing envelopes, checking the chain
    ///
    /// # Errors
    /// `IntegrityViolation` at the first broken link
    pub fn from_envelopes(envelopes: Vec<EventEnvelope>) -> Result<Self, LogError> {
        let log = Self {
            inner: Mutex::new(envelopes),
        };
        log.ensure_integrity()?;
        Ok(log)
    }

    /// Seal and append a batch of events with their affected element ids
    ///
    /// The batch is appended as a whole or not at all.
    ///
    /// # Errors
    /// `Serialization` if an event cannot be hashed
    pub fn append_batch(
        &self,
        entries: Vec<(DomainEvent, Vec<RouteElementId>)>,
    ) -> Result<Vec<EventEnvelope>, LogError> {
        let mut guard = self.inner.lock();
        let mut prev_hash = guard.last().map_or_else(|| GENESIS_HASH.to_string(), |e| e.hash.clone());
        let mut sequence = guard.len() as u64;

        let mut sealed = Vec::with_capacity(entries.len());
        for (event, affected) in entries {
            let envelope = EventEnvelope::seal(sequence, event, affected, prev_hash.clone())?;
            prev_hash.clone_from(&envelope.hash);
            sequence += 1;
            sealed.push(envelope);
        }
        guard.extend(sealed.iter().cloned());
        Ok(sealed)
    }

    #[must_use]
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.inner.lock().clone()
    }

    /// Domain events in append order, for projection rebuilds
    #[must_use]
    pub fn domain_events(&self) -> Vec<DomainEvent> {
        self.inner.lock().iter().map(|e| e.event.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    #[must_use]
    pub fn verify_integrity(&self) -> IntegrityReport {
        let guard = self.inner.lock();
        let mut prev: &str = GENESIS_HASH;
        let mut checked = 0u64;
        for (expected_sequence, envelope) in (0u64..).zip(guard.iter()) {
            let intact = envelope.sequence == expected_sequence
                && envelope.prev_hash == prev
                && envelope.compute_hash().is_ok_and(|h| h == envelope.hash);
            if !intact {
                return IntegrityReport {
                    valid: false,
                    events_checked: checked,
                    first_invalid: Some(expected_sequence),
                };
            }
            checked += 1;
            prev = envelope.hash.as_str();
        }
        IntegrityReport {
            valid: true,
            events_checked: checked,
            first_invalid: None,
        }
    }

    /// # Errors
    /// `IntegrityViolation` at the first broken link
    pub fn ensure_integrity(&self) -> Result<(), LogError> {
        match self.verify_integrity().first_invalid {
            Some(sequence) => Err(LogError::IntegrityViolation { sequence }),
            None => Ok(()),
        }
    }

    /// Write the log as a JSON array
    ///
    /// # Errors
    /// Serialization or file system failure
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        let bytes = serde_json::to_vec_pretty(&*self.inner.lock())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a log written by [`Self::save`] and verify its chain
    ///
    /// # Errors
    /// File system failure, malformed JSON, or a broken chain
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let bytes = std::fs::read(path)?;
        let envelopes: Vec<EventEnvelope> = serde_json::from_slice(&bytes)?;
        Self::from_envelopes(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibernet_model::{CatalogEvent, Manufacturer, ManufacturerId};
    use proptest::prelude::*;

    fn manufacturer_added(name: &str) -> DomainEvent {
        CatalogEvent::ManufacturerAdded(Manufacturer::new(ManufacturerId::new(), name)).into()
    }

    #[test]
    fn chain_links_batches() {
        let log = EventLog::new();
        let first = log.append_batch(vec![(manufacturer_added("Acme"), vec![])]).unwrap();
        let second = log
            .append_batch(vec![
                (manufacturer_added("Fibra"), vec![]),
                (manufacturer_added("Nordic"), vec![]),
            ])
            .unwrap();

        assert_eq!(first[0].prev_hash, GENESIS_HASH);
        assert_eq!(second[0].prev_hash, first[0].hash);
        assert_eq!(second[1].prev_hash, second[0].hash);
        assert_eq!(second[1].sequence, 2);
        assert_eq!(second[0].category, "Catalog.ManufacturerAdded");

        let report = log.verify_integrity();
        assert!(report.valid);
        assert_eq!(report.events_checked, 3);
    }

    #[test]
    fn tampering_is_detected() {
        let log = EventLog::new();
        log.append_batch(vec![
            (manufacturer_added("Acme"), vec![]),
            (manufacturer_added("Fibra"), vec![]),
        ])
        .unwrap();

        let mut envelopes = log.events();
        envelopes[1].category = "Catalog.SpecificationAdded".to_string();
        let err = EventLog::from_envelopes(envelopes).unwrap_err();
        assert_eq!(err, LogError::IntegrityViolation { sequence: 1 });
    }

    #[test]
    fn reordering_is_detected() {
        let log = EventLog::new();
        log.append_batch(vec![
            (manufacturer_added("Acme"), vec![]),
            (manufacturer_added("Fibra"), vec![]),
        ])
        .unwrap();

        let mut envelopes = log.events();
        envelopes.swap(0, 1);
        let tampered = EventLog {
            inner: Mutex::new(envelopes),
        };
        let report = tampered.verify_integrity();
        assert!(!report.valid);
        assert_eq!(report.first_invalid, Some(0));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");

        let log = EventLog::new();
        log.append_batch(vec![(manufacturer_added("Acme"), vec![RouteElementId::new()])])
            .unwrap();
        log.save(&path).unwrap();

        let loaded = EventLog::load(&path).unwrap();
        assert_eq!(loaded.events(), log.events());
        assert_eq!(loaded.domain_events(), log.domain_events());
    }

    proptest! {
        #[test]
        fn prop_any_edit_breaks_chain_at_its_sequence(batches in prop::collection::vec(1usize..4, 1..5), pick in 0usize..16) {
            let log = EventLog::new();
            for (b, size) in batches.iter().enumerate() {
                let entries = (0..*size).map(|i| (manufacturer_added(&format!("m{b}-{i}")), vec![])).collect();
                log.append_batch(entries).unwrap();
            }
            prop_assert!(log.verify_integrity().valid);

            let mut envelopes = log.events();
            let target = pick % envelopes.len();
            envelopes[target].affected_route_network_element_ids.push(RouteElementId::new());
            let err = EventLog::from_envelopes(envelopes).unwrap_err();
            prop_assert_eq!(err, LogError::IntegrityViolation { sequence: target as u64 });
        }
    }
}
