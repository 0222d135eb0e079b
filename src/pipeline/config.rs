//! Pipeline configuration from environment variables

use std::env;

/// Configuration for the aggregation pipeline.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Quiet-gap duration per (feed, processor) window, in milliseconds.
    pub max_event_gap_millis: i64,

    /// Drained-count threshold above which a flushed batch is classified
    /// as stream traffic.
    pub stream_threshold: usize,

    /// Flush scheduler period in milliseconds.
    pub flush_interval_millis: u64,

    /// Downstream channel name for windowed stats batches.
    pub stats_channel: String,

    /// Downstream channel name for failed events.
    pub failed_events_channel: String,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `LINEFLOW_MAX_EVENT_GAP_MS` (default: 60000)
    /// - `LINEFLOW_STREAM_THRESHOLD` (default: 10)
    /// - `LINEFLOW_FLUSH_INTERVAL_MS` (default: 5000)
    /// - `LINEFLOW_STATS_CHANNEL` (default: lineflow.stats)
    /// - `LINEFLOW_FAILED_EVENTS_CHANNEL` (default: lineflow.failed-events)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_event_gap_millis: env::var("LINEFLOW_MAX_EVENT_GAP_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_event_gap_millis),

            stream_threshold: env::var("LINEFLOW_STREAM_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stream_threshold),

            flush_interval_millis: env::var("LINEFLOW_FLUSH_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.flush_interval_millis),

            stats_channel: env::var("LINEFLOW_STATS_CHANNEL")
                .unwrap_or(defaults.stats_channel),

            failed_events_channel: env::var("LINEFLOW_FAILED_EVENTS_CHANNEL")
                .unwrap_or(defaults.failed_events_channel),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_event_gap_millis: 60_000,
            stream_threshold: 10,
            flush_interval_millis: 5_000,
            stats_channel: "lineflow.stats".to_string(),
            failed_events_channel: "lineflow.failed-events".to_string(),
        }
    }
}
