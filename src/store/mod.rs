//! Keyed record store interface. The store is the engine's only
//! synchronization point: it must enforce key uniqueness on `create`
//! (exactly one winner among concurrent creators, a `DuplicateId` error for
//! the rest) and run each batch at an isolation level that keeps aggregate
//! reads from seeing half-applied writes.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::EventRecord;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Fetch the record for an event id, if one exists.
    async fn get(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError>;

    /// Insert a new record. Fails with `StoreError::DuplicateId` when a
    /// record for the same event id already exists.
    async fn create(&self, record: EventRecord) -> Result<(), StoreError>;

    /// Overwrite an existing record in place, keyed by event id.
    async fn update(&self, record: EventRecord) -> Result<(), StoreError>;

    /// Records for one machine with `event_time` in `[start, end)`.
    async fn machine_events(
        &self,
        machine_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, StoreError>;

    /// Records for one factory with `event_time` in `[from, to)`.
    async fn factory_events(
        &self,
        factory_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, StoreError>;
}
