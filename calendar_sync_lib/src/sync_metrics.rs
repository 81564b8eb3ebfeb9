use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Timings and counters for one sync run. Serialized into the run's sync
/// log and returned to the caller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetrics {
    pub token_operations_ms: u64,
    pub google_api_fetch_ms: u64,
    pub event_processing_ms: u64,
    pub database_writes_ms: u64,
    pub total_ms: u64,
    pub api_calls_count: u64,
    pub pages_fetched: u64,
    pub retry_count: u64,
    pub events_fetched_total: u64,
    pub events_filtered_out: u64,
    pub batch_count: u64,
    pub sync_token_used: bool,
}

#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    duration_ms(start.elapsed())
}

#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
