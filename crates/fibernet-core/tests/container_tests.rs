use fibernet_core::{
    PlaceNodeContainer, PlaceRackInNodeContainer, PlaceTerminalEquipmentInNodeContainer, RackPlacement, UpdateNodeContainerProperties,
    UpdateRackProperties, UpdateTerminalEquipmentProperties,
};
use fibernet_model::{
    DomainEvent, ErrorCode, NamingInfo, NodeContainer, NodeContainerEvent, NodeContainerId, RackId,
    RackPlacementMethod, SpanEquipment, SpecificationId, VerticalContentAlignment,
};
use fibernet_test_utils::{placed_terminal_equipment, TestNetwork};
use pretty_assertions::assert_eq;

fn container(net: &TestNetwork, id: NodeContainerId) -> NodeContainer {
    net.service
        .read(|p| p.try_get_equipment::<NodeContainer>(id).cloned())
        .unwrap()
}

fn rack_placement(rack_id: RackId, start_unit: u16) -> Option<RackPlacement> {
    Some(RackPlacement {
        rack_id,
        start_unit,
        method: RackPlacementMethod::BottomUp,
    })
}

fn splitters(container: NodeContainerId, spec: SpecificationId) -> PlaceTerminalEquipmentInNodeContainer {
    PlaceTerminalEquipmentInNodeContainer {
        node_container_id: container,
        specification_id: spec,
        manufacturer_id: None,
        naming: Some(NamingInfo::named("Splitter")),
        count: 2,
        start_sequence_number: 1,
        rack_placement: None,
    }
}

#[tokio::test]
async fn test_one_container_per_route_node() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let node = walk[0];
    let first = net.place_container(node).await;

    let interest_id = net.route_network.register_node_interest(node).unwrap();
    let err = net
        .service
        .place_node_container(PlaceNodeContainer {
            node_container_id: NodeContainerId::new(),
            interest_id,
            specification_id: net.catalog.well,
            manufacturer_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NodeContainerAlreadyExistsInRouteNode);

    let at_node = net.service.read(|p| p.node_container_at(node).map(|c| c.id));
    assert_eq!(at_node, Some(first));
}

#[tokio::test]
async fn test_container_needs_a_node_interest() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let cable = net.place_cable("Cable", &walk).await;
    let walk_interest = net.span(cable).walk_of_interest_id;

    let err = net
        .service
        .place_node_container(PlaceNodeContainer {
            node_container_id: NodeContainerId::new(),
            interest_id: walk_interest,
            specification_id: net.catalog.well,
            manufacturer_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInterest);
    assert_eq!(net.service.stats().node_containers, 0);
}

#[tokio::test]
async fn test_container_properties_and_alignment() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let id = net.place_container(walk[2]).await;

    let err = net
        .service
        .update_node_container_properties(UpdateNodeContainerProperties {
            node_container_id: id,
            manufacturer_id: None,
            specification_id: Some(net.catalog.well),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoChange);

    net.service
        .update_node_container_properties(UpdateNodeContainerProperties {
            node_container_id: id,
            manufacturer_id: Some(Some(net.catalog.manufacturer)),
            specification_id: None,
        })
        .await
        .unwrap();
    assert_eq!(container(&net, id).manufacturer_id, Some(net.catalog.manufacturer));

    assert_eq!(container(&net, id).vertical_content_alignment, VerticalContentAlignment::Bottom);
    net.service.reverse_node_container_vertical_content_alignment(id).await.unwrap();
    assert_eq!(container(&net, id).vertical_content_alignment, VerticalContentAlignment::Top);
    net.service.reverse_node_container_vertical_content_alignment(id).await.unwrap();
    assert_eq!(container(&net, id).vertical_content_alignment, VerticalContentAlignment::Bottom);
}

#[tokio::test]
async fn test_numbered_copies_stack_bottom_up() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let id = net.place_container(walk[0]).await;
    let rack = net.place_rack(id, "Rack 1", 10).await;

    let mut cmd = splitters(id, net.catalog.splitter);
    cmd.rack_placement = rack_placement(rack, 1);
    let envelopes = net.service.place_terminal_equipment(cmd).await.unwrap();
    assert_eq!(envelopes.len(), 4);

    let placed = placed_terminal_equipment(&envelopes);
    let names: Vec<_> = placed
        .iter()
        .map(|te| net.terminal_equipment(*te).naming.and_then(|n| n.name))
        .collect();
    assert_eq!(names, vec![Some("Splitter 1".to_string()), Some("Splitter 2".to_string())]);

    let positions: Vec<_> = container(&net, id)
        .rack(rack)
        .unwrap()
        .subrack_mounts
        .iter()
        .map(|m| (m.terminal_equipment_id, m.position))
        .collect();
    assert_eq!(positions, vec![(placed[0], 1), (placed[1], 2)]);

    // every placed equipment reports the container's route node
    for envelope in &envelopes {
        assert_eq!(envelope.affected_route_network_element_ids, vec![walk[0]]);
    }
}

#[tokio::test]
async fn test_rack_space_and_height_are_enforced() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let id = net.place_container(walk[0]).await;
    let rack = net.place_rack(id, "Rack 1", 10).await;
    let mut cmd = splitters(id, net.catalog.splitter);
    cmd.rack_placement = rack_placement(rack, 1);
    net.service.place_terminal_equipment(cmd).await.unwrap();

    let mut panel = splitters(id, net.catalog.patch_panel);
    panel.count = 1;
    panel.rack_placement = rack_placement(rack, 2);
    let err = net.service.place_terminal_equipment(panel.clone()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RackSpaceOccupied);

    panel.rack_placement = rack_placement(rack, 10);
    let err = net.service.place_terminal_equipment(panel).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRackPlacement);

    let err = net
        .service
        .update_rack_properties(UpdateRackProperties {
            rack_id: rack,
            name: None,
            specification_id: None,
            height_in_units: Some(1),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRackHeight);

    net.service
        .update_rack_properties(UpdateRackProperties {
            rack_id: rack,
            name: Some("Rack A".to_string()),
            specification_id: None,
            height_in_units: Some(2),
        })
        .await
        .unwrap();
    let updated = container(&net, id).rack(rack).cloned().unwrap();
    assert_eq!((updated.name.as_str(), updated.height_in_units), ("Rack A", 2));
}

#[tokio::test]
async fn test_placement_requests_are_validated() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let id = net.place_container(walk[0]).await;
    let rack = net.place_rack(id, "Rack 1", 10).await;

    let mut closure = splitters(id, net.catalog.splice_closure);
    closure.rack_placement = rack_placement(rack, 1);
    let err = net.service.place_terminal_equipment(closure).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRackPlacement);

    let mut none = splitters(id, net.catalog.splitter);
    none.count = 0;
    let err = net.service.place_terminal_equipment(none).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    let err = net
        .service
        .place_rack(PlaceRackInNodeContainer {
            node_container_id: id,
            rack_id: RackId::new(),
            specification_id: net.catalog.rack,
            name: "rack 1".to_string(),
            height_in_units: 42,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateName);
}

#[tokio::test]
async fn test_rack_position_update_moves_the_mount() {
    let net = TestNetwork::new().await;
    let walk = net.line(2);
    let id = net.place_container(walk[0]).await;
    let rack = net.place_rack(id, "Rack 1", 10).await;
    let te = net
        .place_terminal_equipment(id, net.catalog.splitter, "Splitter A", Some((rack, 1)))
        .await;

    let envelopes = net
        .service
        .update_terminal_equipment_properties(UpdateTerminalEquipmentProperties {
            terminal_equipment_id: te,
            naming: Some(Some(NamingInfo::named("Splitter Z"))),
            manufacturer_id: None,
            rack_position: Some(5),
        })
        .await
        .unwrap();
    assert_eq!(envelopes.len(), 2);
    assert!(matches!(
        envelopes[1].event,
        DomainEvent::NodeContainer(NodeContainerEvent::TerminalEquipmentMovedInRack { position: 5, .. })
    ));

    assert_eq!(container(&net, id).rack(rack).unwrap().subrack_mounts[0].position, 5);
    assert_eq!(
        net.terminal_equipment(te).naming.and_then(|n| n.name).as_deref(),
        Some("Splitter Z")
    );

    let err = net
        .service
        .update_terminal_equipment_properties(UpdateTerminalEquipmentProperties {
            terminal_equipment_id: te,
            naming: None,
            manufacturer_id: None,
            rack_position: Some(5),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoChange);
}

#[tokio::test]
async fn test_span_equipment_is_not_a_container() {
    let net = TestNetwork::new().await;
    let walk = net.line(3);
    let cable = net.place_cable("Cable", &walk).await;
    let is_container = net
        .service
        .read(|p| p.try_get_equipment::<NodeContainer>(cable.uuid()).is_some());
    assert!(!is_container);
    assert!(net
        .service
        .read(|p| p.try_get_equipment::<SpanEquipment>(cable).is_some()));
}
