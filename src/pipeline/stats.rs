//! Stats collaborators
//!
//! The raw statistics arithmetic and the failure lookup are external
//! concerns. The pipeline consumes them through the [`StatsProvider`] and
//! [`FailureLookup`] traits; the default implementations here derive numbers
//! straight from event fields so the runtime and tests have something real
//! to run against.

use crate::pipeline::types::{EventKind, EventStats, ProvenanceEvent};
use std::sync::Arc;

/// Computes per-event, completion, and failure statistics.
pub trait StatsProvider: Send + Sync {
    /// Stats for one event, keyed by the event's own feed/processor.
    fn event_stats(&self, event: &ProvenanceEvent) -> EventStats;

    /// Synthesized completion record for an ancestor whose lineage finished,
    /// keyed by the ancestor's feed and its own last event. None when no
    /// completion record should be emitted.
    fn completion_stats(&self, feed_name: &str, last_event: &ProvenanceEvent)
        -> Option<EventStats>;

    /// Stats for an event that was detected as failed.
    fn failure_stats(&self, event: &ProvenanceEvent) -> EventStats;
}

/// Identifies events that are newly identifiable as failed, given one
/// incoming event.
pub trait FailureLookup: Send + Sync {
    fn failure_events(&self, event: &Arc<ProvenanceEvent>) -> Vec<Arc<ProvenanceEvent>>;
}

/// Derives stats from the event record itself.
pub struct DefaultStatsProvider;

impl StatsProvider for DefaultStatsProvider {
    fn event_stats(&self, event: &ProvenanceEvent) -> EventStats {
        let (bytes_in, bytes_out) = match event.kind {
            EventKind::Create | EventKind::Receive => (event.file_size_bytes, 0),
            EventKind::Send | EventKind::Drop => (0, event.file_size_bytes),
            EventKind::Route | EventKind::Failure => (0, 0),
        };
        EventStats {
            feed_name: event.feed_name.clone(),
            processor_id: event.processor_id.clone(),
            event_id: event.event_id,
            time_millis: event.event_time_millis,
            event_count: 1,
            bytes_in,
            bytes_out,
            duration_millis: event.duration_millis,
            jobs_finished: 0,
            jobs_failed: 0,
        }
    }

    fn completion_stats(
        &self,
        feed_name: &str,
        last_event: &ProvenanceEvent,
    ) -> Option<EventStats> {
        Some(EventStats {
            feed_name: feed_name.to_string(),
            processor_id: last_event.processor_id.clone(),
            event_id: last_event.event_id,
            time_millis: last_event.event_time_millis,
            event_count: 0,
            bytes_in: 0,
            bytes_out: 0,
            duration_millis: 0,
            jobs_finished: 1,
            jobs_failed: 0,
        })
    }

    fn failure_stats(&self, event: &ProvenanceEvent) -> EventStats {
        EventStats {
            feed_name: event.feed_name.clone(),
            processor_id: event.processor_id.clone(),
            event_id: event.event_id,
            time_millis: event.event_time_millis,
            event_count: 0,
            bytes_in: 0,
            bytes_out: 0,
            duration_millis: event.duration_millis,
            jobs_finished: 0,
            jobs_failed: 1,
        }
    }
}

/// Flags the incoming event itself when its kind is `Failure`.
pub struct KindFailureLookup;

impl FailureLookup for KindFailureLookup {
    fn failure_events(&self, event: &Arc<ProvenanceEvent>) -> Vec<Arc<ProvenanceEvent>> {
        if event.kind == EventKind::Failure {
            vec![Arc::clone(event)]
        } else {
            Vec::new()
        }
    }
}
