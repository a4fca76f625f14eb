use async_trait::async_trait;
use fibernet_core::{
    AffixSpanEquipmentToNodeContainer, AffixSpanEquipmentToParent, CommandError, DetachSpanEquipmentFromNodeContainer,
    DetachSpanEquipmentFromParent, InMemoryNotifier, MoveSpanEquipment, PlaceAdditionalStructuresInSpanEquipment,
    PlaceSpanEquipmentInRouteNetwork, RouteNetworkError, RouteNetworkService, ServiceConfig,
    UpdateSpanEquipmentProperties, UtilityNetworkService,
};
use fibernet_model::{
    DomainEvent, ErrorCode, InterestId, NamingInfo, NodeContainerSide, RouteElementId, RouteNetworkInterest,
    SpanEquipmentEvent, SpanEquipmentId, SpanEquipmentSpecification, SpecificationId, WalkOfInterest,
};
use fibernet_test_utils::{span_structure_spec, structure_template, TestNetwork};
use mockall::mock;
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Two routes between B and C:
///
/// ```text
///  A --s1-- B --s2-- C
///            \      /
///            s3    s4
///              \  /
///               X
/// ```
struct Detour {
    net: TestNetwork,
    a: RouteElementId,
    b: RouteElementId,
    c: RouteElementId,
    x: RouteElementId,
    s1: RouteElementId,
    s2: RouteElementId,
    s3: RouteElementId,
    s4: RouteElementId,
}

impl Detour {
    async fn new() -> Self {
        let net = TestNetwork::new().await;
        let [a, b, c, x] = [(); 4].map(|()| net.route_network.add_node());
        let s1 = net.segment(a, b, 100.0);
        let s2 = net.segment(b, c, 100.0);
        let s3 = net.segment(b, x, 80.0);
        let s4 = net.segment(x, c, 80.0);
        Self {
            net,
            a,
            b,
            c,
            x,
            s1,
            s2,
            s3,
            s4,
        }
    }

    fn direct(&self) -> Vec<RouteElementId> {
        vec![self.a, self.s1, self.b, self.s2, self.c]
    }

    fn via_x(&self) -> Vec<RouteElementId> {
        vec![self.a, self.s1, self.b, self.s3, self.x, self.s4, self.c]
    }

    fn walk_of(&self, id: SpanEquipmentId) -> Vec<RouteElementId> {
        self.net
            .service
            .read(|p| p.span_walk(id))
            .unwrap()
            .elements()
            .to_vec()
    }
}

#[tokio::test]
async fn test_place_registers_walk_interest() {
    let d = Detour::new().await;
    let cable = d.net.place_cable("Cable 1", &d.direct()).await;

    let span = d.net.span(cable);
    assert_eq!(span.span_structures.len(), 3);
    assert!(span.is_cable);

    let registered = d.net.route_network.interest(span.walk_of_interest_id).await.unwrap();
    assert_eq!(registered.route_network_elements, d.direct());
    assert_eq!(d.walk_of(cable), d.direct());

    let notes = d.net.notifier.take();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].category, "EquipmentPlacement.Placed");
    assert_eq!(notes[0].equipment_id, Some(cable.uuid()));
    assert_eq!(notes[0].affected_route_network_element_ids, d.direct());
}

#[tokio::test]
async fn test_disconnected_walk_is_rejected() {
    let d = Detour::new().await;
    let err = d
        .net
        .service
        .place_span_equipment(PlaceSpanEquipmentInRouteNetwork {
            span_equipment_id: SpanEquipmentId::new(),
            specification_id: d.net.catalog.cable_2f,
            walk: vec![d.a, d.s1, d.b, d.s4, d.c],
            manufacturer_id: None,
            naming: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RouteNetworkRejected);
    assert_eq!(d.net.service.stats().span_equipment, 0);
}

#[tokio::test]
async fn test_update_properties_and_no_change() {
    let d = Detour::new().await;
    let cable = d.net.place_cable("Cable 1", &d.direct()).await;

    let envelopes = d
        .net
        .service
        .update_span_equipment_properties(UpdateSpanEquipmentProperties {
            span_equipment_id: cable,
            naming: Some(Some(NamingInfo::named("Cable 2"))),
            manufacturer_id: Some(Some(d.net.catalog.manufacturer)),
        })
        .await
        .unwrap();
    assert_eq!(envelopes.len(), 2);
    assert!(envelopes
        .iter()
        .all(|e| e.category == "EquipmentModification.PropertiesUpdated"));

    let span = d.net.span(cable);
    assert_eq!(span.naming.and_then(|n| n.name).as_deref(), Some("Cable 2"));
    assert_eq!(span.manufacturer_id, Some(d.net.catalog.manufacturer));

    let err = d
        .net
        .service
        .update_span_equipment_properties(UpdateSpanEquipmentProperties {
            span_equipment_id: cable,
            naming: Some(Some(NamingInfo::named("Cable 2"))),
            manufacturer_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoChange);
}

#[tokio::test]
async fn test_additional_structures_respect_fixed_specs() {
    let d = Detour::new().await;
    let conduit = d.net.place_span(d.net.catalog.conduit, "Conduit", &d.direct()).await;
    let fixed = d.net.place_span(d.net.catalog.fixed_conduit, "Fixed", &d.direct()).await;

    // addressed through one of its segments
    let via_segment = d.net.segment_of(conduit, 1).uuid();
    d.net
        .service
        .place_additional_structures(PlaceAdditionalStructuresInSpanEquipment {
            span_equipment_or_segment_id: via_segment,
            structure_specification_ids: vec![d.net.catalog.duct],
        })
        .await
        .unwrap();
    let positions: Vec<_> = d
        .net
        .span(conduit)
        .span_structures
        .iter()
        .filter(|s| s.level == 2)
        .map(|s| s.position)
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let err = d
        .net
        .service
        .place_additional_structures(PlaceAdditionalStructuresInSpanEquipment {
            span_equipment_or_segment_id: fixed.uuid(),
            structure_specification_ids: vec![d.net.catalog.duct],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FixedSpecNotMutable);
}

#[tokio::test]
async fn test_affix_rewrites_walk_and_detach_restores_it() {
    let d = Detour::new().await;
    let cable = d.net.place_cable("Cable", &d.via_x()).await;
    let conduit = d
        .net
        .place_span(d.net.catalog.conduit, "Conduit", &[d.b, d.s2, d.c])
        .await;
    let duct = d.net.segment_of(conduit, 1);
    d.net.notifier.take();

    d.net
        .service
        .affix_span_equipment_to_parent(AffixSpanEquipmentToParent {
            span_equipment_id: cable,
            route_node_id: d.b,
            parent_span_segment_id: duct,
        })
        .await
        .unwrap();
    assert_eq!(d.walk_of(cable), d.direct());
    let related = d.net.service.read(|p| p.related_cables_by_conduit_segment_id(duct));
    assert!(related.contains(&cable));

    let interest = d.net.span(cable).walk_of_interest_id;
    let registered = d.net.route_network.interest(interest).await.unwrap();
    assert_eq!(registered.route_network_elements, d.direct());

    let err = d
        .net
        .service
        .affix_span_equipment_to_parent(AffixSpanEquipmentToParent {
            span_equipment_id: cable,
            route_node_id: d.b,
            parent_span_segment_id: duct,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyAffixed);

    d.net
        .service
        .detach_span_equipment_from_parent(DetachSpanEquipmentFromParent {
            span_equipment_id: cable,
            route_node_id: d.b,
        })
        .await
        .unwrap();
    assert_eq!(d.walk_of(cable), d.via_x());
    assert!(d.net.span(cable).utility_network_hops.is_empty());
    assert!(d
        .net
        .service
        .read(|p| p.related_cables_by_conduit_segment_id(duct))
        .is_empty());

    let categories: Vec<_> = d.net.notifier.take().into_iter().map(|n| n.category).collect();
    assert_eq!(
        categories,
        vec!["EquipmentModification.AffixedToParent", "EquipmentModification.DetachedFromParent"]
    );
}

#[tokio::test]
async fn test_affix_that_would_loop_the_cable_is_rejected() {
    let d = Detour::new().await;
    let cable = d.net.place_cable("Cable", &[d.b, d.s3, d.x, d.s4, d.c]).await;
    let conduit = d
        .net
        .place_span(d.net.catalog.conduit, "Conduit", &[d.b, d.s2, d.c, d.s4, d.x])
        .await;
    let before = d.net.service.event_log().len();

    let err = d
        .net
        .service
        .affix_span_equipment_to_parent(AffixSpanEquipmentToParent {
            span_equipment_id: cable,
            route_node_id: d.b,
            parent_span_segment_id: d.net.segment_of(conduit, 1),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AffixWalkMismatch);
    assert_eq!(d.walk_of(cable), vec![d.b, d.s3, d.x, d.s4, d.c]);
    assert_eq!(d.net.service.event_log().len(), before);
}

#[tokio::test]
async fn test_looping_walk_is_refused() {
    let d = Detour::new().await;
    let err = d
        .net
        .service
        .place_span_equipment(PlaceSpanEquipmentInRouteNetwork {
            span_equipment_id: SpanEquipmentId::new(),
            specification_id: d.net.catalog.cable_2f,
            walk: vec![d.b, d.s2, d.c, d.s4, d.x, d.s3, d.b],
            manufacturer_id: None,
            naming: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidWalk);
    assert_eq!(d.net.route_network.interest_count(), 0);
}

#[tokio::test]
async fn test_moving_conduit_recomputes_cable_walk() {
    let d = Detour::new().await;
    let cable = d.net.place_cable("Cable", &d.direct()).await;
    let conduit = d
        .net
        .place_span(d.net.catalog.conduit, "Conduit", &[d.b, d.s2, d.c])
        .await;
    d.net
        .service
        .affix_span_equipment_to_parent(AffixSpanEquipmentToParent {
            span_equipment_id: cable,
            route_node_id: d.c,
            parent_span_segment_id: d.net.segment_of(conduit, 2),
        })
        .await
        .unwrap();

    let envelopes = d
        .net
        .service
        .move_span_equipment(MoveSpanEquipment {
            span_equipment_id: conduit,
            walk: vec![d.b, d.s3, d.x, d.s4, d.c],
        })
        .await
        .unwrap();
    assert_eq!(envelopes.len(), 2);
    assert!(matches!(
        envelopes[0].event,
        DomainEvent::SpanEquipment(SpanEquipmentEvent::Moved { id, .. }) if id == conduit
    ));
    assert!(matches!(
        envelopes[1].event,
        DomainEvent::SpanEquipment(SpanEquipmentEvent::WalkRecomputed { id, .. }) if id == cable
    ));

    assert_eq!(d.walk_of(conduit), vec![d.b, d.s3, d.x, d.s4, d.c]);
    assert_eq!(d.walk_of(cable), d.via_x());
    let interest = d.net.span(cable).walk_of_interest_id;
    let registered = d.net.route_network.interest(interest).await.unwrap();
    assert_eq!(registered.route_network_elements, d.via_x());

    // the cable's notification covers both its old and new route
    let affected = &envelopes[1].affected_route_network_element_ids;
    for element in [d.s2, d.s3, d.x, d.s4] {
        assert!(affected.contains(&element));
    }
}

#[tokio::test]
async fn test_move_dropping_hop_nodes_is_rejected() {
    let d = Detour::new().await;
    let cable = d.net.place_cable("Cable", &d.direct()).await;
    let conduit = d
        .net
        .place_span(d.net.catalog.conduit, "Conduit", &[d.b, d.s2, d.c])
        .await;
    d.net
        .service
        .affix_span_equipment_to_parent(AffixSpanEquipmentToParent {
            span_equipment_id: cable,
            route_node_id: d.b,
            parent_span_segment_id: d.net.segment_of(conduit, 1),
        })
        .await
        .unwrap();
    let events_before = d.net.service.event_log().len();

    let err = d
        .net
        .service
        .move_span_equipment(MoveSpanEquipment {
            span_equipment_id: conduit,
            walk: vec![d.a, d.s1, d.b],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::IncompatibleWithExistingAffixes);
    assert_eq!(d.net.service.event_log().len(), events_before);
    assert_eq!(d.walk_of(conduit), vec![d.b, d.s2, d.c]);
    assert_eq!(d.walk_of(cable), d.direct());
    assert!(!d.net.service.is_poisoned());
}

#[tokio::test]
async fn test_node_container_affix_pins_the_walk() {
    let d = Detour::new().await;
    let container = d.net.place_container(d.b).await;
    let cable = d.net.place_cable("Cable", &d.direct()).await;

    d.net
        .service
        .affix_span_equipment_to_node_container(AffixSpanEquipmentToNodeContainer {
            span_equipment_id: cable,
            node_container_id: container,
            side: NodeContainerSide::West,
        })
        .await
        .unwrap();
    let affixes = d.net.span(cable).node_container_affixes;
    assert_eq!(affixes.len(), 1);
    assert_eq!(affixes[0].side, NodeContainerSide::West);

    // a walk that skips B would leave the container behind
    let x_only = d.net.route_network.add_node();
    let bypass = d.net.segment(d.a, x_only, 10.0);
    let back = d.net.segment(x_only, d.c, 10.0);
    let err = d
        .net
        .service
        .move_span_equipment(MoveSpanEquipment {
            span_equipment_id: cable,
            walk: vec![d.a, bypass, x_only, back, d.c],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::IncompatibleWithExistingAffixes);

    d.net
        .service
        .detach_span_equipment_from_node_container(DetachSpanEquipmentFromNodeContainer {
            span_equipment_id: cable,
            route_node_id: d.b,
        })
        .await
        .unwrap();
    assert!(d.net.span(cable).node_container_affixes.is_empty());

    let err = d
        .net
        .service
        .detach_span_equipment_from_node_container(DetachSpanEquipmentFromNodeContainer {
            span_equipment_id: cable,
            route_node_id: d.b,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotAffixedAtRouteNode);
}

mock! {
    RouteNet {}

    #[async_trait]
    impl RouteNetworkService for RouteNet {
        async fn validate_walk(&self, elements: Vec<RouteElementId>) -> Result<WalkOfInterest, RouteNetworkError>;
        async fn register_interest(&self, interest: RouteNetworkInterest) -> Result<(), RouteNetworkError>;
        async fn unregister_interest(&self, id: InterestId) -> Result<(), RouteNetworkError>;
        async fn interest(&self, id: InterestId) -> Result<RouteNetworkInterest, RouteNetworkError>;
    }
}

async fn service_with(route_network: MockRouteNet) -> (UtilityNetworkService, SpecificationId) {
    let service = UtilityNetworkService::new(
        ServiceConfig::default(),
        Arc::new(route_network),
        Arc::new(InMemoryNotifier::new()),
    );
    let structure = SpecificationId::new();
    service
        .add_span_structure_specification(span_structure_spec(structure, "Jacket", "Black"))
        .await
        .unwrap();
    let spec = SpecificationId::new();
    service
        .add_span_equipment_specification(SpanEquipmentSpecification {
            id: spec,
            category: "Cable".to_string(),
            name: "Drop".to_string(),
            root_template: structure_template(structure, 1, 1, vec![]),
            manufacturer_refs: vec![],
            is_fixed: true,
            is_cable: true,
            deprecated: false,
        })
        .await
        .unwrap();
    (service, spec)
}

fn place(spec: SpecificationId) -> PlaceSpanEquipmentInRouteNetwork {
    PlaceSpanEquipmentInRouteNetwork {
        span_equipment_id: SpanEquipmentId::new(),
        specification_id: spec,
        walk: vec![RouteElementId::new(), RouteElementId::new(), RouteElementId::new()],
        manufacturer_id: None,
        naming: None,
    }
}

#[tokio::test]
async fn test_route_network_outage_rejects_placement() {
    let mut route_network = MockRouteNet::new();
    route_network
        .expect_validate_walk()
        .times(1)
        .returning(|_| Err(RouteNetworkError::Unavailable("connection refused".to_string())));
    route_network.expect_register_interest().never();

    let (service, spec) = service_with(route_network).await;
    let err = service.place_span_equipment(place(spec)).await.unwrap_err();
    assert!(matches!(err, CommandError::RouteNetwork(RouteNetworkError::Unavailable(_))));
    assert_eq!(err.code(), ErrorCode::RouteNetworkRejected);
    assert_eq!(service.event_log().len(), 2);
    assert_eq!(service.stats().span_equipment, 0);
}

#[tokio::test]
async fn test_refused_interest_registration_logs_nothing() {
    let mut route_network = MockRouteNet::new();
    route_network
        .expect_validate_walk()
        .returning(|elements| WalkOfInterest::new(elements).map_err(|e| RouteNetworkError::InvalidWalk(e.to_string())));
    route_network
        .expect_register_interest()
        .times(1)
        .returning(|interest| Err(RouteNetworkError::UnknownInterest(interest.id)));

    let (service, spec) = service_with(route_network).await;
    let err = service.place_span_equipment(place(spec)).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInterest);
    assert_eq!(service.event_log().len(), 2);
    assert!(!service.is_poisoned());
}
