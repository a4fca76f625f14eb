use fibernet_core::{
    ConnectSpanSegmentsWithTerminals, ConnectTerminals, DisconnectSpanSegmentFromTerminal, DisconnectTerminals,
    EquipmentDetailsRequest, FaceKind, QueryError,
};
use fibernet_graph::{HopTarget, TraceHop, TraceResult};
use fibernet_model::{
    EquipmentKind, ErrorCode, SegmentTerminalConnect, SpanSegmentEnd, TerminalConnectionId, TerminalEquipmentId,
};
use fibernet_test_utils::SplitterNetwork;
use pretty_assertions::assert_eq;

fn terminal_equipment_of(hop: &TraceHop) -> Option<TerminalEquipmentId> {
    match &hop.target {
        HopTarget::Terminal {
            terminal_equipment_id, ..
        } => Some(*terminal_equipment_id),
        HopTarget::SpanSegment { .. } => None,
    }
}

fn trace_feeder(s: &SplitterNetwork, fan_out: bool) -> TraceResult {
    let fiber = s.net.segment_of(s.feeder, 1);
    s.net
        .service
        .get_connectivity_trace_view(s.central, fiber.uuid(), Some(fan_out))
        .unwrap()
}

#[tokio::test]
async fn test_trace_follows_one_splitter_output() {
    let s = SplitterNetwork::new().await;
    let trace = trace_feeder(&s, false);

    assert_eq!(trace.origin.hop_seq_no, 0);
    assert_eq!(trace.origin.equipment_name.as_deref(), Some("Feeder"));
    assert_eq!(trace.origin.length_m, 100.0);
    assert!(trace.upstream.hops.is_empty());

    let downstream = &trace.downstream;
    assert!(downstream.branches.is_empty());
    let seq: Vec<_> = downstream.hops.iter().map(|h| h.hop_seq_no).collect();
    assert_eq!(seq, vec![1, 2, 3, 4]);

    let names: Vec<_> = downstream
        .hops
        .iter()
        .map(|h| h.equipment_name.clone().unwrap_or_default())
        .collect();
    assert_eq!(names, vec!["Splitter A", "Splitter A", "Drop 1", "Customer 1"]);

    let last = downstream.last().unwrap();
    assert_eq!(terminal_equipment_of(last), Some(s.customers[0]));
    assert_eq!(last.total_length_m, 150.0);
}

#[tokio::test]
async fn test_fan_out_branches_at_splitter() {
    let s = SplitterNetwork::new().await;
    let trace = trace_feeder(&s, true);

    let downstream = &trace.downstream;
    assert_eq!(downstream.hops.len(), 1);
    assert_eq!(downstream.branches.len(), 4);

    // branches continue numbering from the split
    assert!(downstream.branches.iter().all(|b| b.hops[0].hop_seq_no == 2));
    let reached: Vec<_> = downstream
        .branches
        .iter()
        .filter_map(|b| b.last().and_then(terminal_equipment_of))
        .filter(|te| s.customers.contains(te))
        .collect();
    assert_eq!(reached, vec![s.customers[0], s.customers[1]]);
}

#[tokio::test]
async fn test_upstream_trace_from_customer() {
    let s = SplitterNetwork::new().await;
    let ont = s.net.terminal_named(s.customers[2], "1");
    let trace = s
        .net
        .service
        .get_connectivity_trace_view(s.customer_nodes[2], ont.uuid(), None)
        .unwrap();

    assert!(trace.downstream.hops.is_empty());
    let upstream: Vec<_> = trace
        .upstream
        .hops
        .iter()
        .map(|h| h.equipment_name.clone().unwrap_or_default())
        .collect();
    assert_eq!(upstream, vec!["Drop 3", "Splitter B", "Splitter B"]);

    let err = s
        .net
        .service
        .get_connectivity_trace_view(s.central, ont.uuid(), None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotAtRouteNode);
}

#[tokio::test]
async fn test_faces_at_central_office() {
    let s = SplitterNetwork::new().await;
    let faces = s.net.service.get_connectivity_faces(s.central);
    assert_eq!(faces.len(), 6);

    let terminal_faces: Vec<_> = faces
        .iter()
        .filter(|f| f.equipment_kind == EquipmentKind::TerminalEquipment)
        .map(|f| (f.name.as_str(), f.kind))
        .collect();
    assert_eq!(
        terminal_faces,
        vec![("Splitter A", FaceKind::PatchSide), ("Splitter B", FaceKind::PatchSide)]
    );

    let mut cable_faces: Vec<_> = faces
        .iter()
        .filter(|f| f.kind == FaceKind::SpanSide)
        .map(|f| f.name.clone())
        .collect();
    cable_faces.sort();
    assert_eq!(cable_faces, vec!["Drop 1", "Drop 2", "Drop 3", "Feeder"]);
}

#[tokio::test]
async fn test_face_connections() {
    let s = SplitterNetwork::new().await;
    let service = &s.net.service;

    let fibers = service
        .get_connectivity_face_connections(s.central, s.feeder.uuid(), FaceKind::SpanSide)
        .unwrap();
    let summary: Vec<_> = fibers
        .iter()
        .map(|f| (f.name.as_str(), f.connected_to.as_deref()))
        .collect();
    assert_eq!(
        summary,
        vec![("Feeder (1)", Some("Splitter A 1-in")), ("Feeder (2)", None)]
    );

    let ports = service
        .get_connectivity_face_connections(s.central, s.splitter_a.uuid(), FaceKind::PatchSide)
        .unwrap();
    assert_eq!(ports.len(), 5);
    assert_eq!(ports[0].connected_to.as_deref(), Some("Feeder (1)"));
    assert_eq!(ports[1].connected_to.as_deref(), Some("Drop 1 (1)"));
    assert_eq!(ports[2].connected_to.as_deref(), Some("Drop 2 (1)"));
    assert!(!ports[3].is_connected);

    let splices = service
        .get_connectivity_face_connections(s.central, s.splitter_a.uuid(), FaceKind::SpliceSide)
        .unwrap();
    assert!(splices.is_empty());

    let err = service
        .get_connectivity_face_connections(s.central, s.feeder.uuid(), FaceKind::PatchSide)
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidRequest(_)));

    let err = service
        .get_connectivity_face_connections(s.central, s.customers[0].uuid(), FaceKind::PatchSide)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotAtRouteNode);
}

#[tokio::test]
async fn test_patch_between_terminals() {
    let s = SplitterNetwork::new().await;
    let panel = s
        .net
        .place_terminal_equipment(s.central_container, s.net.catalog.patch_panel, "ODF 1", Some((s.rack, 3)))
        .await;
    let from = s.net.terminal_named(s.splitter_b, "out2");
    let to = s.net.terminal_named(panel, "1");
    let connection = TerminalConnectionId::new();

    s.net
        .service
        .connect_terminals(ConnectTerminals {
            route_node_id: s.central,
            terminal_connection_id: connection,
            from_terminal_id: from,
            to_terminal_id: to,
            fiber_length_m: 2.5,
        })
        .await
        .unwrap();

    let view = s
        .net
        .service
        .get_terminal_equipment_connectivity_view(s.central, panel)
        .unwrap();
    assert_eq!(view.name, "ODF 1");
    assert_eq!(view.structures.len(), 1);
    let line = &view.structures[0].lines[0];
    let a = line.a.as_ref().unwrap();
    assert_eq!(a.description, "Splitter B 1-out2");
    assert_eq!(a.fiber_length_m, Some(2.5));
    assert!(line.z.is_none());

    let err = s
        .net
        .service
        .connect_terminals(ConnectTerminals {
            route_node_id: s.central,
            terminal_connection_id: TerminalConnectionId::new(),
            from_terminal_id: from,
            to_terminal_id: s.net.terminal_named(panel, "2"),
            fiber_length_m: 1.0,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TerminalAlreadyConnected);

    s.net
        .service
        .disconnect_terminals(DisconnectTerminals {
            terminal_connection_id: connection,
        })
        .await
        .unwrap();
    assert_eq!(s.net.service.stats().terminal_connections, 0);

    let err = s
        .net
        .service
        .disconnect_terminals(DisconnectTerminals {
            terminal_connection_id: connection,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotConnected);
}

#[tokio::test]
async fn test_splitter_lines_show_both_sides() {
    let s = SplitterNetwork::new().await;
    let view = s
        .net
        .service
        .get_terminal_equipment_connectivity_view(s.central, s.splitter_a)
        .unwrap();
    assert_eq!(view.structures[0].name, "1 PLC 1x4");

    let lines = &view.structures[0].lines;
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0].name, "in");
    assert_eq!(lines[0].a.as_ref().map(|e| e.description.as_str()), Some("Feeder (1)"));
    assert!(lines[0].z.is_none());
    assert!(lines[1].a.is_none());
    assert_eq!(lines[1].z.as_ref().map(|e| e.description.as_str()), Some("Drop 1 (1)"));
}

#[tokio::test]
async fn test_segment_connect_and_disconnect() {
    let s = SplitterNetwork::new().await;
    let drop_fiber = s.net.segment_of(s.drops[0], 1);

    let err = s
        .net
        .service
        .connect_span_segments_with_terminals(ConnectSpanSegmentsWithTerminals {
            route_node_id: s.central,
            connects: vec![SegmentTerminalConnect {
                span_segment_id: drop_fiber,
                terminal_id: s.net.terminal_named(s.splitter_a, "out3"),
                end: SpanSegmentEnd::From,
            }],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SpanSegmentEndAlreadyConnected);

    let err = s
        .net
        .service
        .connect_span_segments_with_terminals(ConnectSpanSegmentsWithTerminals {
            route_node_id: s.central,
            connects: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);

    // second fiber of drop 1 onto an output already feeding drop 1
    let err = s
        .net
        .service
        .connect_span_segments_with_terminals(ConnectSpanSegmentsWithTerminals {
            route_node_id: s.central,
            connects: vec![SegmentTerminalConnect {
                span_segment_id: s.net.segment_of(s.drops[0], 2),
                terminal_id: s.net.terminal_named(s.splitter_a, "out1"),
                end: SpanSegmentEnd::From,
            }],
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::TerminalAlreadyConnected);

    let third = s.net.segment_of(s.drops[2], 1);
    s.net
        .service
        .disconnect_span_segment_from_terminal(DisconnectSpanSegmentFromTerminal {
            route_node_id: s.central,
            span_segment_id: third,
            terminal_id: s.net.terminal_named(s.splitter_b, "out1"),
        })
        .await
        .unwrap();
    let outage = s.net.service.get_outage_view(s.central, None).unwrap();
    assert_eq!(outage.installation_count(), 2);
}

#[tokio::test]
async fn test_outage_view_counts_installations() {
    let s = SplitterNetwork::new().await;
    let service = &s.net.service;

    let view = service.get_outage_view(s.central, None).unwrap();
    assert_eq!(view.id, s.central_container.uuid());
    assert_eq!(view.installation_count(), 3);
    assert_eq!(view.description.as_deref(), Some("3 installations found"));
    assert!(view.find(s.splitter_b.uuid()).is_some());

    let view = service.get_outage_view(s.central, Some(s.splitter_a.uuid())).unwrap();
    assert_eq!(view.installation_count(), 2);
    assert_eq!(view.description.as_deref(), Some("2 installations found"));

    let err = service
        .get_outage_view(s.central, Some(s.customers[0].uuid()))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotAtRouteNode);

    let empty = s.net.route_network.add_node();
    let err = service.get_outage_view(empty, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::EquipmentNotFound);
}

#[tokio::test]
async fn test_equipment_details_lookup() {
    let s = SplitterNetwork::new().await;
    let service = &s.net.service;

    let details = service
        .get_equipment_details(&EquipmentDetailsRequest::by_name("drop"))
        .unwrap();
    assert_eq!(details.span_equipment.len(), 3);
    assert!(details.span_equipment.iter().all(|d| d.walk.is_some() && d.traces.is_empty()));

    let ont = s.net.terminal_named(s.customers[1], "1");
    let details = service
        .get_equipment_details(&EquipmentDetailsRequest::by_ids([ont.uuid(), s.drops[1].uuid()]).with_trace())
        .unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details.terminal_equipment[0].id, s.customers[1]);

    let traces = &details.span_equipment[0].traces;
    assert_eq!(traces.len(), 3);
    let fiber = s.net.segment_of(s.drops[1], 1);
    let fiber_trace = traces.iter().find(|t| t.span_segment_id == fiber).unwrap();
    assert_eq!(
        fiber_trace.downstream.last().and_then(terminal_equipment_of),
        Some(s.customers[1])
    );
    let upstream = &fiber_trace.upstream;
    assert!(upstream
        .hops
        .iter()
        .filter_map(terminal_equipment_of)
        .all(|te| te == s.splitter_a));
    assert_eq!(
        upstream.last().map(|h| h.element_id),
        Some(s.net.segment_of(s.feeder, 1).uuid())
    );

    let unknown = uuid::Uuid::new_v4();
    let err = service
        .get_equipment_details(&EquipmentDetailsRequest::by_ids([unknown]))
        .unwrap_err();
    assert_eq!(err, QueryError::NotFound(unknown));
}
