// Library root - exports for the ingestion engine and aggregation services

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IngestConfig;
pub use error::StoreError;
pub use models::*;
pub use services::ingest::IngestService;
pub use services::stats::StatsService;
pub use store::{memory::MemoryStore, EventStore};
