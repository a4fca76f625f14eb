use fibernet_core::{
    CommandError, EventLog, InMemoryNotifier, InMemoryRouteNetwork, LogError, ServiceConfig, UtilityNetworkService,
};
use fibernet_test_utils::{SplitterNetwork, TestNetwork};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

fn resume(log: EventLog) -> Result<UtilityNetworkService, CommandError> {
    UtilityNetworkService::from_event_log(
        ServiceConfig::default(),
        log,
        Arc::new(InMemoryRouteNetwork::new()),
        Arc::new(InMemoryNotifier::new()),
    )
}

#[tokio::test]
async fn test_saved_log_rebuilds_same_state() {
    let s = SplitterNetwork::new().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.json");
    s.net.service.event_log().save(&path).unwrap();

    let log = EventLog::load(&path).unwrap();
    assert_eq!(log.len(), s.net.service.event_log().len());
    assert_eq!(log.events(), s.net.service.event_log().events());

    let resumed = resume(log).unwrap();
    assert_eq!(resumed.stats(), s.net.service.stats());
    assert_eq!(
        resumed.get_connectivity_faces(s.central),
        s.net.service.get_connectivity_faces(s.central)
    );
    assert_eq!(
        resumed.get_outage_view(s.central, None).unwrap(),
        s.net.service.get_outage_view(s.central, None).unwrap()
    );
}

#[tokio::test]
async fn test_resumed_service_extends_the_chain() {
    let s = SplitterNetwork::new().await;
    let before = s.net.service.event_log().events();
    let last_hash = before.last().map(|e| e.hash.clone()).unwrap();

    let resumed = resume(EventLog::from_envelopes(before.clone()).unwrap()).unwrap();
    let envelopes = resumed
        .reverse_node_container_vertical_content_alignment(s.central_container)
        .await
        .unwrap();

    assert_eq!(envelopes[0].sequence, before.len() as u64);
    assert_eq!(envelopes[0].prev_hash, last_hash);
    let report = resumed.event_log().verify_integrity();
    assert!(report.valid);
    assert_eq!(report.events_checked, before.len() as u64 + 1);
}

#[tokio::test]
async fn test_tampered_log_is_rejected() {
    let net = TestNetwork::new().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.json");
    net.service.event_log().save(&path).unwrap();

    let mut envelopes: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    envelopes[3]["category"] = serde_json::Value::String("Catalog.Rewritten".to_string());
    std::fs::write(&path, serde_json::to_vec(&envelopes).unwrap()).unwrap();

    let err = EventLog::load(&path).unwrap_err();
    assert_eq!(err, LogError::IntegrityViolation { sequence: 3 });
}

fn clear_walks(value: &mut serde_json::Value) -> usize {
    match value {
        serde_json::Value::Object(map) => {
            let mut cleared = 0;
            for (key, inner) in map.iter_mut() {
                if key == "walk" && inner.is_array() {
                    *inner = serde_json::Value::Array(vec![]);
                    cleared += 1;
                } else {
                    cleared += clear_walks(inner);
                }
            }
            cleared
        }
        serde_json::Value::Array(items) => items.iter_mut().map(clear_walks).sum(),
        _ => 0,
    }
}

#[tokio::test]
async fn test_log_with_empty_walk_fails_to_load() {
    let s = SplitterNetwork::new().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.json");
    s.net.service.event_log().save(&path).unwrap();

    let mut envelopes: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(clear_walks(&mut envelopes) > 0);
    std::fs::write(&path, serde_json::to_vec(&envelopes).unwrap()).unwrap();

    assert!(EventLog::load(&path).is_err());
}

#[tokio::test]
async fn test_reordered_envelopes_break_the_chain() {
    let net = TestNetwork::new().await;
    let mut envelopes = net.service.event_log().events();
    envelopes.swap(1, 2);

    let err = EventLog::from_envelopes(envelopes).unwrap_err();
    assert_eq!(err, LogError::IntegrityViolation { sequence: 1 });
}

#[tokio::test]
async fn test_rebuild_keeps_state() {
    let s = SplitterNetwork::new().await;
    let stats = s.net.service.stats();

    s.net.service.rebuild().await.unwrap();
    assert_eq!(s.net.service.stats(), stats);
    assert!(!s.net.service.is_poisoned());
    assert_eq!(
        s.net
            .service
            .get_outage_view(s.central, None)
            .unwrap()
            .installation_count(),
        3
    );
}

#[tokio::test]
async fn test_config_file_sets_trace_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fibernet.toml");
    std::fs::write(
        &path,
        "trace_fan_out_by_default = true\ninstallations_found_label = \"customers affected\"\n",
    )
    .unwrap();
    let config = ServiceConfig::from_file(&path).unwrap();
    assert!(config.trace_fan_out_by_default);

    let s = SplitterNetwork::build(TestNetwork::with_config(config).await).await;
    let fiber = s.net.segment_of(s.feeder, 1);
    let trace = s
        .net
        .service
        .get_connectivity_trace_view(s.central, fiber.uuid(), None)
        .unwrap();
    assert_eq!(trace.downstream.branches.len(), 4);

    let single = s
        .net
        .service
        .get_connectivity_trace_view(s.central, fiber.uuid(), Some(false))
        .unwrap();
    assert!(single.downstream.branches.is_empty());

    let view = s.net.service.get_outage_view(s.central, None).unwrap();
    assert_eq!(view.description.as_deref(), Some("3 customers affected"));
}
