//! In-memory reference store. Create is an atomic check-and-insert under a
//! write lock, which gives the key-uniqueness guarantee the engine's retry
//! protocol depends on. Used by the test suite and as an embedded store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::models::EventRecord;
use crate::store::EventStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, EventRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get(&self, event_id: &str) -> Result<Option<EventRecord>, StoreError> {
        Ok(self.records.read().unwrap().get(event_id).cloned())
    }

    async fn create(&self, record: EventRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(&record.event_id) {
            return Err(StoreError::DuplicateId(record.event_id));
        }
        records.insert(record.event_id.clone(), record);
        Ok(())
    }

    async fn update(&self, record: EventRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        if !records.contains_key(&record.event_id) {
            return Err(StoreError::MissingRecord(record.event_id));
        }
        records.insert(record.event_id.clone(), record);
        Ok(())
    }

    async fn machine_events(
        &self,
        machine_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .filter(|r| r.machine_id == machine_id && r.event_time >= start && r.event_time < end)
            .cloned()
            .collect())
    }

    async fn factory_events(
        &self,
        factory_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records
            .values()
            .filter(|r| r.factory_id == factory_id && r.event_time >= from && r.event_time < to)
            .cloned()
            .collect())
    }
}
