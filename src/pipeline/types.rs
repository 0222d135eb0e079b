//! Core data structures shared across the pipeline
//!
//! Events arrive from the execution engine as `ProvenanceEvent` records and
//! travel through the pipeline behind `Arc` - graph nodes and queue entries
//! reference an event, they never own it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What happened to a flow file at a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Receive,
    Route,
    Send,
    Drop,
    Failure,
}

/// One occurrence at one processor for one flow file.
///
/// The failure flag is the only mutable field. It transitions false -> true
/// exactly once via [`ProvenanceEvent::mark_failed`], which is the guard
/// against duplicate failure emission under concurrent redelivery.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub event_id: u64,
    pub feed_name: String,
    /// Processor (stage) the event was recorded at.
    pub processor_id: String,
    pub flow_file_id: String,
    /// Direct parent flow files, if the execution engine reported any.
    #[serde(default)]
    pub parent_flow_file_ids: Vec<String>,
    pub kind: EventKind,
    pub event_time_millis: i64,
    #[serde(default)]
    pub file_size_bytes: u64,
    #[serde(default)]
    pub duration_millis: i64,
    /// True if this is the last event for this flow file.
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default)]
    failure: AtomicBool,
}

impl ProvenanceEvent {
    /// Create an event with empty lineage and zeroed measurements. Callers
    /// fill the remaining public fields directly.
    pub fn new(
        event_id: u64,
        feed_name: &str,
        processor_id: &str,
        flow_file_id: &str,
        kind: EventKind,
        event_time_millis: i64,
    ) -> Self {
        Self {
            event_id,
            feed_name: feed_name.to_string(),
            processor_id: processor_id.to_string(),
            flow_file_id: flow_file_id.to_string(),
            parent_flow_file_ids: Vec::new(),
            kind,
            event_time_millis,
            file_size_bytes: 0,
            duration_millis: 0,
            is_terminal: false,
            failure: AtomicBool::new(false),
        }
    }

    /// Grouping key for windowed aggregation.
    pub fn group_key(&self) -> String {
        format!("{}:{}", self.feed_name, self.processor_id)
    }

    /// Whether the event can participate in lineage tracking at all.
    pub fn has_lineage_identity(&self) -> bool {
        !self.flow_file_id.is_empty()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.load(Ordering::SeqCst)
    }

    /// Set the failure flag. Returns true only for the single caller that
    /// performed the false -> true transition.
    pub fn mark_failed(&self) -> bool {
        self.failure
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Clone for ProvenanceEvent {
    fn clone(&self) -> Self {
        Self {
            event_id: self.event_id,
            feed_name: self.feed_name.clone(),
            processor_id: self.processor_id.clone(),
            flow_file_id: self.flow_file_id.clone(),
            parent_flow_file_ids: self.parent_flow_file_ids.clone(),
            kind: self.kind,
            event_time_millis: self.event_time_millis,
            file_size_bytes: self.file_size_bytes,
            duration_millis: self.duration_millis,
            is_terminal: self.is_terminal,
            failure: AtomicBool::new(self.is_failure()),
        }
    }
}

/// Numeric aggregate for one event, grouped downstream by (feed, processor).
///
/// Immutable once produced. Owned by the window that accepted it until the
/// window is drained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStats {
    pub feed_name: String,
    pub processor_id: String,
    pub event_id: u64,
    pub time_millis: i64,
    pub event_count: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub duration_millis: i64,
    pub jobs_finished: u64,
    pub jobs_failed: u64,
}

/// Arrival-pattern label attached to a drained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchClass {
    Stream,
    Batch,
}

impl BatchClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchClass::Stream => "stream",
            BatchClass::Batch => "batch",
        }
    }
}

/// Output of one window drain, published to the stats channel.
///
/// `classification` and `window_quiet` are metadata for the downstream
/// consumer - they select no code path inside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsBatch {
    pub feed_name: String,
    pub processor_id: String,
    pub classification: BatchClass,
    /// True when the window had gone quiet (no insertion within the
    /// configured gap) at drain time - a trailing flush rather than live
    /// stream traffic.
    pub window_quiet: bool,
    pub collected_at_millis: i64,
    pub stats: Vec<EventStats>,
}

/// A failed event plus its failure stats, published to the failed-events
/// channel. At most one record ever exists per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub event: Arc<ProvenanceEvent>,
    pub stats: EventStats,
}
