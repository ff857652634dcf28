//! Contract Test: Reconciliation Cycle
//!
//! Constraints verified:
//! - A changed address supersedes the stored row and reaches the provider
//! - An unchanged address produces no writes and no provider calls
//! - A family that failed to resolve leaves its records untouched
//! - Records shared by several zones are written once and sent to each zone

mod common;

use common::*;
use ddns_core::engine::{DdnsEngine, EngineEvent, ProviderAccount};
use ddns_core::model::{DomainRecord, RecordKey, RecordType};
use ddns_core::state::{MEMORY_LOCATION, MemoryRecordStore, SqliteRecordStore};
use ddns_core::traits::RecordStore;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

#[tokio::test]
async fn changed_address_supersedes_row_and_is_submitted() {
    let store = SqliteRecordStore::connect(MEMORY_LOCATION)
        .await
        .expect("in-memory store opens");
    store
        .init_records(&[DomainRecord::new("home.example.com", RecordType::A, "10.0.0.1")])
        .await
        .unwrap();

    let resolver = StaticResolver::v4([10, 0, 0, 2]);
    let updater = RecordingZoneUpdater::new();
    let account = ProviderAccount::new(
        "home",
        registry(vec![zone("Z1", &[("home.example.com", RecordType::A)])]),
        Box::new(updater.clone()),
    );

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(resolver),
        Arc::new(store.clone()),
        vec![account],
        fast_config(),
    )
    .expect("engine construction succeeds");

    let report = engine.run_cycle().await.expect("cycle succeeds");
    assert_eq!(report.persisted.len(), 1);
    assert_eq!(report.batches, 1);

    let active = store.get_active_records().await.unwrap();
    assert_eq!(
        active,
        vec![DomainRecord::new("home.example.com", RecordType::A, "10.0.0.2")]
    );

    let history = store
        .history(&RecordKey::new("home.example.com", RecordType::A))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].active);
    assert_eq!(history[0].value, "10.0.0.1");
    assert!(history[1].active);

    let batches = updater.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].zone_id, "Z1");
    assert_eq!(batches[0].comment, "changes for zone id Z1");
    assert_eq!(batches[0].changes.len(), 1);
    assert_eq!(batches[0].changes[0].value, "10.0.0.2");
    assert_eq!(batches[0].changes[0].ttl, 300);
}

#[tokio::test]
async fn unchanged_address_is_a_noop() {
    let store = MemoryRecordStore::new();
    let resolver = StaticResolver::v4([10, 0, 0, 2]);
    let updater = RecordingZoneUpdater::new();
    let account = ProviderAccount::new(
        "home",
        registry(vec![zone("Z1", &[("home.example.com", RecordType::A)])]),
        Box::new(updater.clone()),
    );

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(resolver),
        Arc::new(store.clone()),
        vec![account],
        fast_config(),
    )
    .unwrap();

    let first = engine.run_cycle().await.unwrap();
    assert_eq!(first.persisted.len(), 1);

    let second = engine.run_cycle().await.unwrap();
    assert!(second.is_noop(), "second cycle should change nothing: {:?}", second);
    assert_eq!(second.batches, 0);

    assert_eq!(store.len().await, 1, "no extra rows on an unchanged cycle");
    assert_eq!(updater.batches().len(), 1, "provider called only once");
}

#[tokio::test]
async fn failed_family_leaves_its_records_alone() {
    let store = MemoryRecordStore::new();
    store
        .init_records(&[DomainRecord::new("home.example.com", RecordType::A, "10.0.0.1")])
        .await
        .unwrap();

    // IPv4 lookup failed, IPv6 answered
    let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
    let resolver = StaticResolver::new(None, Some(v6));
    let updater = RecordingZoneUpdater::new();
    let account = ProviderAccount::new(
        "home",
        registry(vec![zone(
            "Z1",
            &[
                ("home.example.com", RecordType::A),
                ("home.example.com", RecordType::Aaaa),
            ],
        )]),
        Box::new(updater.clone()),
    );

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(resolver),
        Arc::new(store.clone()),
        vec![account],
        fast_config(),
    )
    .unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(
        report.persisted,
        vec![DomainRecord::new("home.example.com", RecordType::Aaaa, "2001:db8::1")]
    );

    let mut active = store.get_active_records().await.unwrap();
    active.sort_by_key(|r| r.record_type.as_str());
    assert_eq!(active[0].value, "10.0.0.1", "A record keeps its last value");
    assert_eq!(active[1].value, "2001:db8::1");

    let batches = updater.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].changes.len(), 1);
    assert_eq!(batches[0].changes[0].record_type, RecordType::Aaaa);
}

#[tokio::test]
async fn nothing_resolved_means_nothing_written() {
    let store = MemoryRecordStore::new();
    let updater = RecordingZoneUpdater::new();
    let account = ProviderAccount::new(
        "home",
        registry(vec![zone("Z1", &[("home.example.com", RecordType::A)])]),
        Box::new(updater.clone()),
    );

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(StaticResolver::new(None, None)),
        Arc::new(store.clone()),
        vec![account],
        fast_config(),
    )
    .unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert!(report.is_noop());
    assert!(store.is_empty().await);
    assert!(updater.batches().is_empty());
}

#[tokio::test]
async fn shared_record_is_persisted_once_and_sent_to_every_zone() {
    let store = MemoryRecordStore::new();
    let first = RecordingZoneUpdater::new();
    let second = RecordingZoneUpdater::new();

    let accounts = vec![
        ProviderAccount::new(
            "first",
            registry(vec![zone("Z1", &[("www.example.com", RecordType::A)])]),
            Box::new(first.clone()),
        ),
        ProviderAccount::new(
            "second",
            registry(vec![
                zone("Z2", &[("www.example.com", RecordType::A)]),
                zone("Z3", &[("mail.example.com", RecordType::A)]),
            ]),
            Box::new(second.clone()),
        ),
    ];

    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(StaticResolver::v4([192, 0, 2, 7])),
        Arc::new(store.clone()),
        accounts,
        fast_config(),
    )
    .unwrap();

    let report = engine.run_cycle().await.unwrap();

    assert_eq!(report.persisted.len(), 2);
    assert_eq!(store.len().await, 2);
    assert_eq!(report.batches, 3);
    assert_eq!(first.zone_ids(), vec!["Z1"]);
    assert_eq!(second.zone_ids(), vec!["Z2", "Z3"]);
}

#[tokio::test]
async fn cycle_emits_change_events() {
    let store = MemoryRecordStore::new();
    store
        .init_records(&[DomainRecord::new("home.example.com", RecordType::A, "10.0.0.1")])
        .await
        .unwrap();

    let account = ProviderAccount::new(
        "home",
        registry(vec![zone("Z1", &[("home.example.com", RecordType::A)])]),
        Box::new(RecordingZoneUpdater::new()),
    );

    let (engine, mut event_rx) = DdnsEngine::new(
        Box::new(StaticResolver::v4([10, 0, 0, 2])),
        Arc::new(store),
        vec![account],
        fast_config(),
    )
    .unwrap();

    engine.run_cycle().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events[0], EngineEvent::CycleStarted);
    assert_eq!(
        events[1],
        EngineEvent::AddressResolved {
            v4: Some(Ipv4Addr::new(10, 0, 0, 2)),
            v6: None,
        }
    );
    assert!(events.contains(&EngineEvent::RecordChanged {
        fqdn: "home.example.com".to_string(),
        record_type: RecordType::A,
        previous_value: Some("10.0.0.1".to_string()),
        new_value: "10.0.0.2".to_string(),
    }));
}

#[test]
fn engine_requires_an_account() {
    let result = DdnsEngine::new(
        Box::new(StaticResolver::default()),
        Arc::new(MemoryRecordStore::new()),
        Vec::new(),
        fast_config(),
    );

    assert!(matches!(result, Err(ddns_core::Error::Config(_))));
}
