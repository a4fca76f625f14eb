//! Service handle owning the projection, the event log and collaborators
//!
//! Writers are serialised by an async gate. Each command plans its events
//! against a read snapshot, then the batch is folded into a staged copy of
//! the projection, sealed into the log and published, in that order. The
//! staged copy replaces the live projection only once the log accepted the
//! batch. A batch the projection refuses never reaches the log, so
//! [`UtilityNetworkService::rebuild`] recovers a poisoned service.

use crate::commands::rewritten_walk_interests;
use crate::config::ServiceConfig;
use crate::error::CommandError;
use crate::event_log::{EventEnvelope, EventLog};
use crate::notification::{ChangeNotification, ChangeNotifier};
use crate::route_network::RouteNetworkService;
use fibernet_graph::{NoGeometry, ProjectionStats, RouteGeometry, UtilityGraphProjection};
use fibernet_model::{DomainEvent, RouteNetworkInterest};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct UtilityNetworkService {
    config: ServiceConfig,
    projection: RwLock<UtilityGraphProjection>,
    event_log: EventLog,
    writer: tokio::sync::Mutex<()>,
    poisoned: AtomicBool,
    pub(crate) route_network: Arc<dyn RouteNetworkService>,
    pub(crate) geometry: Arc<dyn RouteGeometry + Send + Sync>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl UtilityNetworkService {
    /// Empty service with no route geometry
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        route_network: Arc<dyn RouteNetworkService>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            config,
            projection: RwLock::new(UtilityGraphProjection::new()),
            event_log: EventLog::new(),
            writer: tokio::sync::Mutex::new(()),
            poisoned: AtomicBool::new(false),
            route_network,
            geometry: Arc::new(NoGeometry),
            notifier,
        }
    }

    /// Service resuming from an existing log
    ///
    /// # Errors
    /// Broken hash chain, or an event the projection cannot fold
    pub fn from_event_log(
        config: ServiceConfig,
        event_log: EventLog,
        route_network: Arc<dyn RouteNetworkService>,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Result<Self, CommandError> {
        event_log.ensure_integrity()?;
        let projection = UtilityGraphProjection::rebuild(event_log.domain_events().iter())?;
        info!(events = event_log.len(), "projection rebuilt from event log");

        let mut service = Self::new(config, route_network, notifier);
        service.projection = RwLock::new(projection);
        service.event_log = event_log;
        Ok(service)
    }

    /// With segment geometry for traces
    #[must_use]
    pub fn with_geometry(mut self, geometry: Arc<dyn RouteGeometry + Send + Sync>) -> Self {
        self.geometry = geometry;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    #[inline]
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stats(&self) -> ProjectionStats {
        self.projection.read().stats()
    }

    /// Run a read against the latest fully applied state
    pub fn read<R>(&self, f: impl FnOnce(&UtilityGraphProjection) -> R) -> R {
        f(&self.projection.read())
    }

    /// Replace the projection with one folded from the log
    ///
    /// # Errors
    /// Broken hash chain, or an event the projection cannot fold; the
    /// service stays poisoned in that case
    pub async fn rebuild(&self) -> Result<(), CommandError> {
        let _gate = self.writer.lock().await;
        self.event_log.ensure_integrity()?;
        let rebuilt = UtilityGraphProjection::rebuild(self.event_log.domain_events().iter())?;
        *self.projection.write() = rebuilt;
        self.poisoned.store(false, Ordering::Release);
        info!(events = self.event_log.len(), "projection rebuilt");
        Ok(())
    }

    /// Plan under the gate, then fold, log and publish the batch
    pub(crate) async fn execute<F>(&self, command: &'static str, plan: F) -> Result<Vec<EventEnvelope>, CommandError>
    where
        F: FnOnce(&UtilityGraphProjection) -> Result<Vec<DomainEvent>, CommandError> + Send,
    {
        let _gate = self.writer.lock().await;
        let events = self.plan(command, plan)?;
        let envelopes = self.commit(command, events)?;
        info!(command, events = envelopes.len(), "command accepted");
        self.publish(&envelopes).await;
        Ok(envelopes)
    }

    /// Like [`Self::execute`] for batches that rewrite span equipment walks
    ///
    /// The rewritten walk interests are registered with the route network
    /// before the batch is committed. If the route network refuses one, or
    /// the commit fails, the interests registered so far are put back.
    pub(crate) async fn execute_rewriting_walks<F>(
        &self,
        command: &'static str,
        plan: F,
    ) -> Result<Vec<EventEnvelope>, CommandError>
    where
        F: FnOnce(&UtilityGraphProjection) -> Result<Vec<DomainEvent>, CommandError> + Send,
    {
        let _gate = self.writer.lock().await;
        let events = self.plan(command, plan)?;

        let rewritten = self.read(|p| rewritten_walk_interests(p, &events));
        let previous = self.swap_interests(command, rewritten).await?;

        let envelopes = match self.commit(command, events) {
            Ok(envelopes) => envelopes,
            Err(err) => {
                self.restore_interests(previous).await;
                return Err(err);
            }
        };
        info!(command, events = envelopes.len(), "command accepted");
        self.publish(&envelopes).await;
        Ok(envelopes)
    }

    fn plan<F>(&self, command: &'static str, plan: F) -> Result<Vec<DomainEvent>, CommandError>
    where
        F: FnOnce(&UtilityGraphProjection) -> Result<Vec<DomainEvent>, CommandError>,
    {
        if self.is_poisoned() {
            return Err(CommandError::Poisoned);
        }
        let planned = {
            let projection = self.projection.read();
            plan(&projection)
        };
        planned.map_err(|err| {
            warn!(command, code = %err.code(), error = %err, "command rejected");
            err
        })
    }

    /// Fold the batch into a staged copy of the projection, seal it into the
    /// log, then swap the copy in. Readers never see a partial batch.
    fn commit(&self, command: &'static str, events: Vec<DomainEvent>) -> Result<Vec<EventEnvelope>, CommandError> {
        let mut staged = self.projection.read().clone();
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            match staged.apply(&event) {
                Ok(affected) => entries.push((event, affected)),
                Err(err) => {
                    error!(command, category = event.category(), error = %err, "projection refused event");
                    self.poisoned.store(true, Ordering::Release);
                    return Err(err.into());
                }
            }
        }

        let envelopes = self.event_log.append_batch(entries).map_err(|err| {
            error!(command, error = %err, "event log append failed");
            self.poisoned.store(true, Ordering::Release);
            CommandError::from(err)
        })?;
        *self.projection.write() = staged;
        Ok(envelopes)
    }

    /// Register each interest, returning the ones they replaced
    async fn swap_interests(
        &self,
        command: &'static str,
        interests: Vec<RouteNetworkInterest>,
    ) -> Result<Vec<RouteNetworkInterest>, CommandError> {
        let mut previous = Vec::with_capacity(interests.len());
        for interest in interests {
            let id = interest.id;
            let swapped = match self.route_network.interest(id).await {
                Ok(old) => self.route_network.register_interest(interest).await.map(|()| old),
                Err(err) => Err(err),
            };
            match swapped {
                Ok(old) => previous.push(old),
                Err(err) => {
                    warn!(command, interest = %id, error = %err, "route network refused rewritten walk");
                    self.restore_interests(previous).await;
                    return Err(err.into());
                }
            }
        }
        Ok(previous)
    }

    async fn restore_interests(&self, previous: Vec<RouteNetworkInterest>) {
        for interest in previous.into_iter().rev() {
            let id = interest.id;
            if let Err(err) = self.route_network.register_interest(interest).await {
                error!(interest = %id, error = %err, "could not restore route network interest");
            }
        }
    }

    async fn publish(&self, envelopes: &[EventEnvelope]) {
        for envelope in envelopes {
            if let Err(err) = self.notifier.notify(ChangeNotification::from(envelope)).await {
                warn!(category = %envelope.category, sequence = envelope.sequence, error = %err, "notification failed");
            }
        }
    }
}

impl std::fmt::Debug for UtilityNetworkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtilityNetworkService")
            .field("config", &self.config)
            .field("events", &self.event_log.len())
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AffixSpanEquipmentToParent, MoveSpanEquipment, PlaceSpanEquipmentInRouteNetwork};
    use crate::notification::InMemoryNotifier;
    use crate::route_network::{InMemoryRouteNetwork, RouteNetworkError};
    use async_trait::async_trait;
    use fibernet_model::{
        InterestId, RouteElementId, SpanEquipment, SpanEquipmentId, SpanEquipmentSpecification,
        SpanStructureSpecification, SpanStructureTemplate, SpecificationId, WalkOfInterest,
    };
    use pretty_assertions::assert_eq;

    /// In-memory route network that refuses to register one chosen interest
    #[derive(Default)]
    struct Picky {
        inner: InMemoryRouteNetwork,
        refused: parking_lot::Mutex<Option<InterestId>>,
    }

    #[async_trait]
    impl RouteNetworkService for Picky {
        async fn validate_walk(&self, elements: Vec<RouteElementId>) -> Result<WalkOfInterest, RouteNetworkError> {
            self.inner.validate_walk(elements).await
        }

        async fn register_interest(&self, interest: RouteNetworkInterest) -> Result<(), RouteNetworkError> {
            if *self.refused.lock() == Some(interest.id) {
                return Err(RouteNetworkError::Unavailable("interest locked".to_string()));
            }
            self.inner.register_interest(interest).await
        }

        async fn unregister_interest(&self, id: InterestId) -> Result<(), RouteNetworkError> {
            self.inner.unregister_interest(id).await
        }

        async fn interest(&self, id: InterestId) -> Result<RouteNetworkInterest, RouteNetworkError> {
            self.inner.interest(id).await
        }
    }

    /// `A -s1- B -s2- C` with a bypass `B -s3- X -s4- C`
    struct Fixture {
        route_network: Arc<Picky>,
        service: UtilityNetworkService,
        cable_spec: SpecificationId,
        conduit_spec: SpecificationId,
        direct: Vec<RouteElementId>,
        duct: Vec<RouteElementId>,
        bypass: Vec<RouteElementId>,
    }

    fn structure(id: SpecificationId, name: &str) -> SpanStructureSpecification {
        SpanStructureSpecification {
            id,
            category: "Structure".to_string(),
            name: name.to_string(),
            color: "Black".to_string(),
            inner_diameter_mm: None,
            outer_diameter_mm: None,
            deprecated: false,
        }
    }

    fn equipment_spec(id: SpecificationId, name: &str, structure: SpecificationId, is_cable: bool) -> SpanEquipmentSpecification {
        SpanEquipmentSpecification {
            id,
            category: name.to_string(),
            name: name.to_string(),
            root_template: SpanStructureTemplate {
                span_structure_specification_id: structure,
                level: 1,
                position: 1,
                child_templates: vec![],
            },
            manufacturer_refs: vec![],
            is_fixed: true,
            is_cable,
            deprecated: false,
        }
    }

    async fn fixture() -> Fixture {
        let route_network = Arc::new(Picky::default());
        let net = &route_network.inner;
        let [a, b, c, x] = [(); 4].map(|()| net.add_node());
        let s1 = net.add_segment(a, b, 100.0).unwrap();
        let s2 = net.add_segment(b, c, 100.0).unwrap();
        let s3 = net.add_segment(b, x, 80.0).unwrap();
        let s4 = net.add_segment(x, c, 80.0).unwrap();

        let service = UtilityNetworkService::new(
            ServiceConfig::default(),
            route_network.clone(),
            Arc::new(InMemoryNotifier::new()),
        );
        let (jacket, duct) = (SpecificationId::new(), SpecificationId::new());
        service.add_span_structure_specification(structure(jacket, "Jacket")).await.unwrap();
        service.add_span_structure_specification(structure(duct, "Duct")).await.unwrap();
        let (cable_spec, conduit_spec) = (SpecificationId::new(), SpecificationId::new());
        service
            .add_span_equipment_specification(equipment_spec(cable_spec, "Cable", jacket, true))
            .await
            .unwrap();
        service
            .add_span_equipment_specification(equipment_spec(conduit_spec, "Conduit", duct, false))
            .await
            .unwrap();

        Fixture {
            route_network,
            service,
            cable_spec,
            conduit_spec,
            direct: vec![a, s1, b, s2, c],
            duct: vec![b, s2, c],
            bypass: vec![b, s3, x, s4, c],
        }
    }

    impl Fixture {
        async fn place(&self, spec: SpecificationId, walk: &[RouteElementId]) -> SpanEquipmentId {
            let id = SpanEquipmentId::new();
            self.service
                .place_span_equipment(PlaceSpanEquipmentInRouteNetwork {
                    span_equipment_id: id,
                    specification_id: spec,
                    walk: walk.to_vec(),
                    manufacturer_id: None,
                    naming: None,
                })
                .await
                .unwrap();
            id
        }

        fn span(&self, id: SpanEquipmentId) -> SpanEquipment {
            self.service
                .read(|p| p.try_get_equipment::<SpanEquipment>(id).cloned())
                .unwrap()
        }

        async fn registered(&self, id: SpanEquipmentId) -> Vec<RouteElementId> {
            let interest = self.span(id).walk_of_interest_id;
            self.route_network
                .interest(interest)
                .await
                .unwrap()
                .route_network_elements
        }
    }

    #[tokio::test]
    async fn poisoned_service_leaves_no_interest_behind() {
        let f = fixture().await;
        f.service.poisoned.store(true, Ordering::Release);

        let err = f
            .service
            .place_span_equipment(PlaceSpanEquipmentInRouteNetwork {
                span_equipment_id: SpanEquipmentId::new(),
                specification_id: f.cable_spec,
                walk: f.direct.clone(),
                manufacturer_id: None,
                naming: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Poisoned);
        assert_eq!(f.route_network.inner.interest_count(), 0);
        assert_eq!(f.service.stats().span_equipment, 0);
    }

    #[tokio::test]
    async fn refused_walk_rewrite_restores_earlier_interests() {
        let f = fixture().await;
        let cable = f.place(f.cable_spec, &f.direct).await;
        let conduit = f.place(f.conduit_spec, &f.duct).await;
        let segment = f.span(conduit).segments().map(|(_, s)| s.id).next().unwrap();
        f.service
            .affix_span_equipment_to_parent(AffixSpanEquipmentToParent {
                span_equipment_id: cable,
                route_node_id: f.duct[0],
                parent_span_segment_id: segment,
            })
            .await
            .unwrap();
        let logged = f.service.event_log().len();

        // the conduit's walk registers first, then the cable's is refused
        *f.route_network.refused.lock() = Some(f.span(cable).walk_of_interest_id);
        let err = f
            .service
            .move_span_equipment(MoveSpanEquipment {
                span_equipment_id: conduit,
                walk: f.bypass.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::RouteNetwork(RouteNetworkError::Unavailable(_))));
        assert!(!f.service.is_poisoned());

        assert_eq!(f.service.event_log().len(), logged);
        assert_eq!(f.registered(conduit).await, f.duct);
        assert_eq!(f.registered(cable).await, f.direct);
        let walk = f.service.read(|p| p.span_walk(conduit)).unwrap();
        assert_eq!(walk.elements(), f.duct.as_slice());

        *f.route_network.refused.lock() = None;
        f.service
            .move_span_equipment(MoveSpanEquipment {
                span_equipment_id: conduit,
                walk: f.bypass.clone(),
            })
            .await
            .unwrap();
        assert_eq!(f.registered(conduit).await, f.bypass);
        assert_eq!(f.registered(cable).await.len(), 7);
    }
}
