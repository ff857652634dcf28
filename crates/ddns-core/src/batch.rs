//! Batch building and submission
//!
//! [`build_batches`] turns the records changed in a cycle into one
//! [`UpdateBatch`] per zone that manages at least one of them.
//! [`submit_batches`] hands every batch to the provider and collapses the
//! failures into a single error once all zones have been attempted.

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::model::{DomainRecord, RecordChange, UpdateBatch};
use crate::registry::ZoneRegistry;
use crate::traits::ZoneUpdater;

/// Outcome of a successful submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    /// Batches accepted by the provider
    pub batches: usize,
    /// Record changes across those batches
    pub changes: usize,
}

/// Build one batch per zone with at least one changed record
///
/// Zones and changes follow configuration order. Matching is exact on
/// `(fqdn, record_type)`. Zones without a matching change are omitted.
pub fn build_batches(changed: &[DomainRecord], registry: &ZoneRegistry) -> Vec<UpdateBatch> {
    registry
        .zones()
        .iter()
        .filter_map(|zone| {
            let mut batch = UpdateBatch::for_zone(&zone.zone_id);
            for key in &zone.records {
                batch.changes.extend(
                    changed
                        .iter()
                        .filter(|record| record.matches(key))
                        .map(RecordChange::upsert),
                );
            }
            (!batch.changes.is_empty()).then_some(batch)
        })
        .collect()
}

/// Submit every batch, attempting all zones regardless of earlier failures
///
/// Per-zone failures are logged with their zone ID before being folded
/// into [`Error::AggregateSubmission`].
pub async fn submit_batches(
    updater: &dyn ZoneUpdater,
    batches: &[UpdateBatch],
) -> Result<SubmitSummary> {
    let mut summary = SubmitSummary::default();
    let mut failed = 0;

    for batch in batches {
        debug!(
            "Submitting {} change(s) to zone {} via {}",
            batch.changes.len(),
            batch.zone_id,
            updater.provider_name()
        );

        match updater.apply_batch(batch).await {
            Ok(()) => {
                info!(
                    "Zone {} updated ({} change(s))",
                    batch.zone_id,
                    batch.changes.len()
                );
                summary.batches += 1;
                summary.changes += batch.changes.len();
            }
            Err(e) => {
                error!(
                    "Failed to update zone {} via {}: {}",
                    batch.zone_id,
                    updater.provider_name(),
                    e
                );
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(Error::AggregateSubmission {
            failed,
            attempted: batches.len(),
        });
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordKey, RecordType};
    use crate::registry::ZoneSubscription;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn registry() -> ZoneRegistry {
        ZoneRegistry::new(vec![
            ZoneSubscription::new(
                "zone-a",
                vec![
                    RecordKey::new("www.example.com", RecordType::A),
                    RecordKey::new("jenkins.example.com", RecordType::A),
                    RecordKey::new("www6.example.com", RecordType::Aaaa),
                ],
            ),
            ZoneSubscription::new(
                "zone-b",
                vec![RecordKey::new("vpn.example.org", RecordType::A)],
            ),
        ])
    }

    #[test]
    fn test_batches_follow_zone_record_order() {
        let changed = vec![
            DomainRecord::new("www6.example.com", RecordType::Aaaa, "2001:db8::1"),
            DomainRecord::new("jenkins.example.com", RecordType::A, "10.0.0.2"),
        ];

        let batches = build_batches(&changed, &registry());

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.zone_id, "zone-a");
        assert_eq!(batch.comment, "changes for zone id zone-a");
        let names: Vec<&str> = batch.changes.iter().map(|c| c.fqdn.as_str()).collect();
        assert_eq!(names, vec!["jenkins.example.com", "www6.example.com"]);
        assert_eq!(batch.changes[0].value, "10.0.0.2");
        assert_eq!(batch.changes[1].ttl, 300);
    }

    #[test]
    fn test_zone_without_matches_is_omitted() {
        let registry = ZoneRegistry::new(vec![ZoneSubscription::new(
            "zone-a",
            vec![
                RecordKey::new("a.example.com", RecordType::A),
                RecordKey::new("b.example.com", RecordType::Aaaa),
            ],
        )]);
        let changed = vec![DomainRecord::new("c.example.com", RecordType::A, "10.0.0.1")];

        assert!(build_batches(&changed, &registry).is_empty());
    }

    #[test]
    fn test_matching_requires_same_record_type() {
        let changed = vec![DomainRecord::new("www.example.com", RecordType::Aaaa, "::1")];
        assert!(build_batches(&changed, &registry()).is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let changed = vec![
            DomainRecord::new("www.example.com", RecordType::A, "10.0.0.2"),
            DomainRecord::new("vpn.example.org", RecordType::A, "10.0.0.2"),
        ];
        let registry = registry();

        let first = build_batches(&changed, &registry);
        let second = build_batches(&changed, &registry);

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].zone_id, "zone-b");
    }

    struct FailingZone {
        fail_zone: &'static str,
        attempted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ZoneUpdater for FailingZone {
        async fn apply_batch(&self, batch: &UpdateBatch) -> Result<()> {
            self.attempted.lock().unwrap().push(batch.zone_id.clone());
            if batch.zone_id == self.fail_zone {
                return Err(Error::provider("test", "zone rejected"));
            }
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_submit_attempts_every_zone() {
        let updater = FailingZone {
            fail_zone: "zone-a",
            attempted: Mutex::new(Vec::new()),
        };
        let changed = vec![
            DomainRecord::new("www.example.com", RecordType::A, "10.0.0.2"),
            DomainRecord::new("vpn.example.org", RecordType::A, "10.0.0.2"),
        ];
        let batches = build_batches(&changed, &registry());

        let err = submit_batches(&updater, &batches).await.unwrap_err();

        assert!(matches!(
            err,
            Error::AggregateSubmission {
                failed: 1,
                attempted: 2
            }
        ));
        assert_eq!(
            *updater.attempted.lock().unwrap(),
            vec!["zone-a".to_string(), "zone-b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_submit_nothing_is_success() {
        let updater = FailingZone {
            fail_zone: "zone-a",
            attempted: Mutex::new(Vec::new()),
        };
        let summary = submit_batches(&updater, &[]).await.unwrap();
        assert_eq!(summary, SubmitSummary::default());
        assert!(updater.attempted.lock().unwrap().is_empty());
    }
}
