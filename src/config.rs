use std::env;

/// Engine tunables. Defaults match the production limits; env vars exist so
/// staging can loosen them without a rebuild.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Upper bound for `duration_ms`, inclusive. Default: 6 hours.
    pub max_duration_ms: i64,
    /// How far into the future an event_time may lie, in minutes.
    pub max_future_skew_min: i64,
    /// Defect-rate-per-hour threshold at which a machine reports WARNING.
    pub warning_defect_rate: f64,
}

impl IngestConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            max_duration_ms: env::var("INGEST_MAX_DURATION_MS")
                .unwrap_or_else(|_| "21600000".to_string())
                .parse()
                .unwrap_or(21_600_000),
            max_future_skew_min: env::var("INGEST_MAX_FUTURE_SKEW_MIN")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
            warning_defect_rate: env::var("INGEST_WARNING_DEFECT_RATE")
                .unwrap_or_else(|_| "2.0".to_string())
                .parse()
                .unwrap_or(2.0),
        })
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 21_600_000,
            max_future_skew_min: 15,
            warning_defect_rate: 2.0,
        }
    }
}
