//! Failure detection and isolation
//!
//! Failed events leave the pipeline on their own channel so failure-path
//! backpressure never touches the success path. The event's failure flag is
//! the idempotence guard: the check-and-set is one atomic step, so redelivery
//! can never emit a second record for the same event instance.

use crate::pipeline::stats::{FailureLookup, StatsProvider};
use crate::pipeline::types::{FailureRecord, ProvenanceEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct FailureCollector {
    lookup: Arc<dyn FailureLookup>,
    stats_provider: Arc<dyn StatsProvider>,
    failed_tx: mpsc::UnboundedSender<FailureRecord>,
}

impl FailureCollector {
    pub fn new(
        lookup: Arc<dyn FailureLookup>,
        stats_provider: Arc<dyn StatsProvider>,
        failed_tx: mpsc::UnboundedSender<FailureRecord>,
    ) -> Self {
        Self {
            lookup,
            stats_provider,
            failed_tx,
        }
    }

    /// Look up events newly identifiable as failed and emit one
    /// `FailureRecord` for each that was not already flagged. Returns the
    /// number of records emitted.
    pub fn collect(&self, event: &Arc<ProvenanceEvent>) -> usize {
        let mut emitted = 0;
        for failed in self.lookup.failure_events(event) {
            if !failed.mark_failed() {
                continue;
            }
            log::info!(
                "failure detected for event {} ({}:{})",
                failed.event_id,
                failed.feed_name,
                failed.processor_id
            );
            let stats = self.stats_provider.failure_stats(&failed);
            let record = FailureRecord {
                event: failed,
                stats,
            };
            if self.failed_tx.send(record).is_err() {
                log::warn!("failed-events channel closed, dropping failure record");
                continue;
            }
            emitted += 1;
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::{DefaultStatsProvider, KindFailureLookup};
    use crate::pipeline::types::EventKind;

    fn make_collector() -> (FailureCollector, mpsc::UnboundedReceiver<FailureRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let collector = FailureCollector::new(
            Arc::new(KindFailureLookup),
            Arc::new(DefaultStatsProvider),
            tx,
        );
        (collector, rx)
    }

    fn make_event(id: u64, kind: EventKind) -> Arc<ProvenanceEvent> {
        Arc::new(ProvenanceEvent::new(
            id,
            "sales",
            "extract",
            "ff-1",
            kind,
            1_000,
        ))
    }

    #[test]
    fn test_failure_event_emits_one_record() {
        let (collector, mut rx) = make_collector();
        let event = make_event(1, EventKind::Failure);

        assert_eq!(collector.collect(&event), 1);
        assert!(event.is_failure());

        let record = rx.try_recv().unwrap();
        assert_eq!(record.event.event_id, 1);
        assert_eq!(record.stats.jobs_failed, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_redelivery_emits_nothing() {
        // Test: second collect on the same event instance is a no-op
        let (collector, mut rx) = make_collector();
        let event = make_event(2, EventKind::Failure);

        assert_eq!(collector.collect(&event), 1);
        assert_eq!(collector.collect(&event), 0);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_healthy_event_is_ignored() {
        let (collector, mut rx) = make_collector();
        let event = make_event(3, EventKind::Receive);

        assert_eq!(collector.collect(&event), 0);
        assert!(!event.is_failure());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_collect_emits_exactly_one_record() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collector = Arc::new(FailureCollector::new(
            Arc::new(KindFailureLookup),
            Arc::new(DefaultStatsProvider),
            tx,
        ));
        let event = make_event(4, EventKind::Failure);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let collector = Arc::clone(&collector);
            let event = Arc::clone(&event);
            handles.push(std::thread::spawn(move || collector.collect(&event)));
        }
        let emitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(emitted, 1);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
