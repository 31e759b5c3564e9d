//! Shared types: raw inputs, the persisted event record, batch summaries and
//! aggregate responses. Timestamps are chrono types; raw inputs carry the
//! caller's RFC 3339 strings and are parsed during validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One submitted telemetry event, as it arrives from the edge.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub event_id: String,
    /// When the physical event occurred, RFC 3339. Parsed during validation.
    pub event_time: String,
    /// Caller-supplied receive time. Deserialized for wire compatibility but
    /// never trusted; the engine assigns its own.
    #[serde(default)]
    pub received_time: Option<String>,
    pub machine_id: String,
    pub line_id: String,
    pub factory_id: String,
    pub duration_ms: i64,
    /// `-1` means "unknown", distinct from a real count of zero.
    pub defect_count: i32,
}

/// The persisted entity. At most one record per `event_id`; `received_time`
/// never regresses across a record's update history.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_id: String,
    pub event_time: DateTime<Utc>,
    /// Assigned by the engine at processing time, never by the caller.
    pub received_time: DateTime<Utc>,
    pub machine_id: String,
    pub line_id: String,
    pub factory_id: String,
    pub duration_ms: i64,
    pub defect_count: i32,
    /// Fingerprint of the logical payload; always matches the fields above.
    pub payload_hash: i64,
}

/// Why an event was turned away. Serialized as the wire reason strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidDuration,
    InvalidDateFormat,
    FutureEventTime,
    OlderDataIgnored,
    StoreError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidDuration => "INVALID_DURATION",
            RejectReason::InvalidDateFormat => "INVALID_DATE_FORMAT",
            RejectReason::FutureEventTime => "FUTURE_EVENT_TIME",
            RejectReason::OlderDataIgnored => "OLDER_DATA_IGNORED",
            RejectReason::StoreError => "STORE_ERROR",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub event_id: String,
    pub reason: RejectReason,
}

/// Per-batch outcome counters. Every input event lands in exactly one
/// counter; `rejections` carries a reason for each rejected event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub accepted: u32,
    pub deduped: u32,
    pub updated: u32,
    pub rejected: u32,
    pub rejections: Vec<Rejection>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MachineStatus {
    Healthy,
    Warning,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Healthy => "HEALTHY",
            MachineStatus::Warning => "WARNING",
        }
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Windowed stats for one machine over a half-open window `[start, end)`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStats {
    pub machine_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub events_count: u64,
    /// Sum of known defect counts; `-1` sentinels are excluded.
    pub defects_count: i64,
    /// Defects per hour over the window, rounded to one decimal place.
    pub avg_defect_rate: f64,
    pub status: MachineStatus,
}

/// One production line's defect totals within a factory window.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDefects {
    pub line_id: String,
    pub total_defects: i64,
    pub event_count: u64,
    /// Defects per 100 events, rounded to two decimals. Not bounded to 100.
    pub defects_percent: f64,
}
