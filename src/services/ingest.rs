//! Ingestion decision engine: per-event validation, payload fingerprinting,
//! and the deterministic conflict-resolution protocol against the shared
//! keyed store. Batches run strictly sequentially; the store is the only
//! synchronization point.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::IngestConfig;
use crate::error::StoreError;
use crate::models::{BatchSummary, EventRecord, RawEvent, RejectReason, Rejection};
use crate::store::EventStore;

/// Reduce the six logical payload fields to a fixed-width value for O(1)
/// content-equality checks. Collisions are an accepted, bounded risk: at
/// worst a genuinely different payload is treated as a duplicate. Not a
/// security primitive.
pub fn payload_fingerprint(
    machine_id: &str,
    line_id: &str,
    factory_id: &str,
    event_time: DateTime<Utc>,
    duration_ms: i64,
    defect_count: i32,
) -> i64 {
    let mut hasher = Sha256::new();
    // 0x1f separators keep ("ab","c") and ("a","bc") distinct
    hasher.update(machine_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(line_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(factory_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(event_time.timestamp_micros().to_be_bytes());
    hasher.update(duration_ms.to_be_bytes());
    hasher.update(defect_count.to_be_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}

/// How a single event resolved against the store.
enum Resolution {
    Accepted,
    Deduped,
    Updated,
    Rejected(RejectReason),
}

pub struct IngestService {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, config: IngestConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Process one batch, one event at a time. A failed event never aborts
    /// the batch; every input lands in exactly one counter.
    pub async fn process_batch(&self, events: Vec<RawEvent>) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for event in events {
            let event_time = match self.validate(&event) {
                Ok(t) => t,
                Err(reason) => {
                    tracing::warn!(event_id = %event.event_id, %reason, "event failed validation");
                    summary.rejected += 1;
                    summary.rejections.push(Rejection {
                        event_id: event.event_id.clone(),
                        reason,
                    });
                    continue;
                }
            };

            match self.resolve(&event, event_time).await {
                Resolution::Accepted => summary.accepted += 1,
                Resolution::Deduped => summary.deduped += 1,
                Resolution::Updated => summary.updated += 1,
                Resolution::Rejected(reason) => {
                    summary.rejected += 1;
                    summary.rejections.push(Rejection {
                        event_id: event.event_id.clone(),
                        reason,
                    });
                }
            }
        }

        summary
    }

    /// Checks run in order: duration range, timestamp parse, future skew.
    /// No store access; a failure short-circuits this event only.
    fn validate(&self, event: &RawEvent) -> Result<DateTime<Utc>, RejectReason> {
        if event.duration_ms < 0 || event.duration_ms > self.config.max_duration_ms {
            return Err(RejectReason::InvalidDuration);
        }

        let event_time = DateTime::parse_from_rfc3339(&event.event_time)
            .map_err(|_| RejectReason::InvalidDateFormat)?
            .with_timezone(&Utc);

        let max_allowed = self.clock.now() + Duration::minutes(self.config.max_future_skew_min);
        if event_time > max_allowed {
            return Err(RejectReason::FutureEventTime);
        }

        Ok(event_time)
    }

    async fn resolve(&self, event: &RawEvent, event_time: DateTime<Utc>) -> Resolution {
        let payload_hash = payload_fingerprint(
            &event.machine_id,
            &event.line_id,
            &event.factory_id,
            event_time,
            event.duration_ms,
            event.defect_count,
        );

        // Single clock read per event. The same instant flows through the
        // retry path, so losing a create race cannot change the logical
        // decision this event represents, only the mechanism.
        let received_time = self.clock.now();
        let incoming = build_record(event, event_time, received_time, payload_hash);

        let existing = match self.store.get(&event.event_id).await {
            Ok(existing) => existing,
            Err(e) => return self.store_failure(&event.event_id, e),
        };

        match existing {
            Some(current) => self.resolve_against_existing(current, incoming).await,
            None => match self.store.create(incoming.clone()).await {
                Ok(()) => Resolution::Accepted,
                Err(StoreError::DuplicateId(_)) => {
                    // Lost the create race to a concurrent writer. The
                    // re-read is guaranteed to observe the winner, so a
                    // single retry suffices.
                    match self.store.get(&event.event_id).await {
                        Ok(Some(current)) => {
                            self.resolve_against_existing(current, incoming).await
                        }
                        Ok(None) => self.store_failure(
                            &event.event_id,
                            StoreError::Backend(
                                "record missing after create conflict".to_string(),
                            ),
                        ),
                        Err(e) => self.store_failure(&event.event_id, e),
                    }
                }
                Err(e) => self.store_failure(&event.event_id, e),
            },
        }
    }

    /// The PRESENT-state rules: older submissions lose, equal content
    /// dedupes (ties resolve toward dedupe), newer content overwrites.
    async fn resolve_against_existing(
        &self,
        current: EventRecord,
        incoming: EventRecord,
    ) -> Resolution {
        if incoming.received_time < current.received_time {
            tracing::warn!(event_id = %incoming.event_id, "older data ignored");
            return Resolution::Rejected(RejectReason::OlderDataIgnored);
        }

        if incoming.payload_hash == current.payload_hash {
            tracing::debug!(event_id = %incoming.event_id, "duplicate submission deduped");
            return Resolution::Deduped;
        }

        let event_id = incoming.event_id.clone();
        match self.store.update(incoming).await {
            Ok(()) => {
                tracing::debug!(event_id = %event_id, "record updated with newer payload");
                Resolution::Updated
            }
            Err(e) => self.store_failure(&event_id, e),
        }
    }

    /// Unclassified store failure: fatal for this event only. The event
    /// still lands in a counter so nothing is silently dropped.
    fn store_failure(&self, event_id: &str, err: StoreError) -> Resolution {
        tracing::error!(event_id = %event_id, error = %err, "store failure while resolving event");
        Resolution::Rejected(RejectReason::StoreError)
    }
}

fn build_record(
    event: &RawEvent,
    event_time: DateTime<Utc>,
    received_time: DateTime<Utc>,
    payload_hash: i64,
) -> EventRecord {
    EventRecord {
        event_id: event.event_id.clone(),
        event_time,
        received_time,
        machine_id: event.machine_id.clone(),
        line_id: event.line_id.clone(),
        factory_id: event.factory_id.clone(),
        duration_ms: event.duration_ms,
        defect_count: event.defect_count,
        payload_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MockEventStore;
    use chrono::TimeZone;
    use mockall::Sequence;

    fn raw(event_id: &str, event_time: &str) -> RawEvent {
        RawEvent {
            event_id: event_id.to_string(),
            event_time: event_time.to_string(),
            received_time: None,
            machine_id: "m-1".to_string(),
            line_id: "l-1".to_string(),
            factory_id: "f-1".to_string(),
            duration_ms: 1_000,
            defect_count: 3,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn record_at(event_id: &str, received_time: DateTime<Utc>, payload_hash: i64) -> EventRecord {
        EventRecord {
            event_id: event_id.to_string(),
            event_time: t0() - Duration::hours(1),
            received_time,
            machine_id: "m-1".to_string(),
            line_id: "l-1".to_string(),
            factory_id: "f-1".to_string(),
            duration_ms: 500,
            defect_count: 7,
            payload_hash,
        }
    }

    fn service(store: MockEventStore, clock: Arc<ManualClock>) -> IngestService {
        IngestService::new(Arc::new(store), clock, IngestConfig::default())
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = payload_fingerprint("m-1", "l-1", "f-1", t0(), 1_000, 3);
        let b = payload_fingerprint("m-1", "l-1", "f-1", t0(), 1_000, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_reacts_to_every_field() {
        let base = payload_fingerprint("m-1", "l-1", "f-1", t0(), 1_000, 3);
        assert_ne!(base, payload_fingerprint("m-2", "l-1", "f-1", t0(), 1_000, 3));
        assert_ne!(base, payload_fingerprint("m-1", "l-2", "f-1", t0(), 1_000, 3));
        assert_ne!(base, payload_fingerprint("m-1", "l-1", "f-2", t0(), 1_000, 3));
        assert_ne!(
            base,
            payload_fingerprint("m-1", "l-1", "f-1", t0() + Duration::seconds(1), 1_000, 3)
        );
        assert_ne!(base, payload_fingerprint("m-1", "l-1", "f-1", t0(), 1_001, 3));
        assert_ne!(base, payload_fingerprint("m-1", "l-1", "f-1", t0(), 1_000, 4));
    }

    #[test]
    fn fingerprint_separates_adjacent_string_fields() {
        let a = payload_fingerprint("ab", "c", "f-1", t0(), 1_000, 3);
        let b = payload_fingerprint("a", "bc", "f-1", t0(), 1_000, 3);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn create_conflict_retries_with_captured_received_time() {
        // The winner of the race stored received_time = t0 + 5s. Our event
        // captured received_time = t0 before the conflict. Even though the
        // clock has moved past the winner by the time we retry, the captured
        // instant decides: older data, rejected.
        let clock = Arc::new(ManualClock::new(t0()));
        let winner = record_at("ev-1", t0() + Duration::seconds(5), 42);

        let mut store = MockEventStore::new();
        let mut seq = Sequence::new();
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        let clock_in_create = clock.clone();
        store
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |record| {
                // Time keeps moving while we lose the race
                clock_in_create.set(t0() + Duration::seconds(10));
                Err(StoreError::DuplicateId(record.event_id))
            });
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(winner.clone())));

        let service = service(store, clock);
        let summary = service
            .process_batch(vec![raw("ev-1", "2026-03-01T11:00:00Z")])
            .await;

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.rejections[0].reason, RejectReason::OlderDataIgnored);
    }

    #[tokio::test]
    async fn create_conflict_with_equal_content_dedupes() {
        let clock = Arc::new(ManualClock::new(t0()));
        let event = raw("ev-1", "2026-03-01T11:00:00Z");
        let hash = payload_fingerprint(
            "m-1",
            "l-1",
            "f-1",
            Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap(),
            1_000,
            3,
        );
        let winner = record_at("ev-1", t0(), hash);

        let mut store = MockEventStore::new();
        let mut seq = Sequence::new();
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        store
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|record| Err(StoreError::DuplicateId(record.event_id)));
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(winner.clone())));

        let service = service(store, clock);
        let summary = service.process_batch(vec![event]).await;

        assert_eq!(summary.deduped, 1);
        assert_eq!(summary.rejected, 0);
    }

    #[tokio::test]
    async fn create_conflict_with_newer_content_updates() {
        let clock = Arc::new(ManualClock::new(t0()));
        // Winner stored at the same instant with different content; a tie in
        // received_time with differing payload resolves to update.
        let winner = record_at("ev-1", t0(), 42);

        let mut store = MockEventStore::new();
        let mut seq = Sequence::new();
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        store
            .expect_create()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|record| Err(StoreError::DuplicateId(record.event_id)));
        store
            .expect_get()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(winner.clone())));
        store
            .expect_update()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|record| record.received_time == Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
            .returning(|_| Ok(()));

        let service = service(store, clock);
        let summary = service
            .process_batch(vec![raw("ev-1", "2026-03-01T11:00:00Z")])
            .await;

        assert_eq!(summary.updated, 1);
    }

    #[tokio::test]
    async fn backend_failure_rejects_event_and_continues_batch() {
        let clock = Arc::new(ManualClock::new(t0()));

        let mut store = MockEventStore::new();
        store
            .expect_get()
            .withf(|id| id == "ev-broken")
            .returning(|_| Err(StoreError::Backend("connection reset".to_string())));
        store
            .expect_get()
            .withf(|id| id == "ev-ok")
            .returning(|_| Ok(None));
        store.expect_create().times(1).returning(|_| Ok(()));

        let service = service(store, clock);
        let summary = service
            .process_batch(vec![
                raw("ev-broken", "2026-03-01T11:00:00Z"),
                raw("ev-ok", "2026-03-01T11:00:00Z"),
            ])
            .await;

        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.rejections[0].reason, RejectReason::StoreError);
    }
}
