//! Windowed aggregation over resolved records. Read-only: the ingestion
//! engine is the sole writer.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::error::StoreError;
use crate::models::{LineDefects, MachineStats, MachineStatus};
use crate::store::EventStore;

pub struct StatsService {
    store: Arc<dyn EventStore>,
    config: IngestConfig,
}

impl StatsService {
    pub fn new(store: Arc<dyn EventStore>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    /// Stats for one machine over the half-open window `[start, end)`.
    ///
    /// `-1` defect counts mean "unknown": the record counts toward
    /// `events_count` but is excluded from the defect sum. The rate is
    /// defects per hour; a zero-width window reports a rate of 0. Status is
    /// evaluated on the unrounded rate, the reported rate is rounded to one
    /// decimal place.
    pub async fn machine_stats(
        &self,
        machine_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<MachineStats, StoreError> {
        let events = self.store.machine_events(machine_id, start, end).await?;

        let events_count = events.len() as u64;
        let defects_count: i64 = events
            .iter()
            .map(|e| e.defect_count)
            .filter(|&d| d != -1)
            .map(i64::from)
            .sum();

        let window_hours = (end - start).num_seconds() as f64 / 3600.0;
        let avg_defect_rate = if window_hours > 0.0 {
            defects_count as f64 / window_hours
        } else {
            0.0
        };

        let status = if avg_defect_rate >= self.config.warning_defect_rate {
            MachineStatus::Warning
        } else {
            MachineStatus::Healthy
        };

        Ok(MachineStats {
            machine_id: machine_id.to_string(),
            start,
            end,
            events_count,
            defects_count,
            avg_defect_rate: round_to(avg_defect_rate, 10.0),
            status,
        })
    }

    /// The `limit` worst production lines of a factory by total defects in
    /// `[from, to)`, descending. `defects_percent` is defects per 100 events
    /// (can exceed 100). Order among lines with equal totals is unspecified.
    pub async fn top_defect_lines(
        &self,
        factory_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LineDefects>, StoreError> {
        let events = self.store.factory_events(factory_id, from, to).await?;

        let mut per_line: HashMap<String, (i64, u64)> = HashMap::new();
        for event in events {
            let entry = per_line.entry(event.line_id).or_insert((0, 0));
            if event.defect_count != -1 {
                entry.0 += i64::from(event.defect_count);
            }
            entry.1 += 1;
        }

        let mut lines: Vec<LineDefects> = per_line
            .into_iter()
            .map(|(line_id, (total_defects, event_count))| {
                let percent = if event_count > 0 {
                    total_defects as f64 * 100.0 / event_count as f64
                } else {
                    0.0
                };
                LineDefects {
                    line_id,
                    total_defects,
                    event_count,
                    defects_percent: round_to(percent, 100.0),
                }
            })
            .collect();

        lines.sort_by(|a, b| b.total_defects.cmp(&a.total_defects));
        lines.truncate(limit);
        Ok(lines)
    }
}

fn round_to(value: f64, factor: f64) -> f64 {
    (value * factor).round() / factor
}
