//! Event aggregator - orchestration core of the pipeline
//!
//! One `EventAggregator` owns the concurrent key -> window map and drives,
//! per event: lineage registration, stats computation, window insertion,
//! ancestor completion, and failure collection. `ingest` is callable from
//! any number of producer threads; the only critical sections are the
//! map insertion on first use of a key and the per-window pending list.

use crate::pipeline::completion::CompletionTracker;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::failures::FailureCollector;
use crate::pipeline::lineage::LineageGraph;
use crate::pipeline::stats::{FailureLookup, StatsProvider};
use crate::pipeline::types::{FailureRecord, ProvenanceEvent, StatsBatch};
use crate::pipeline::window::FeedProcessorWindow;
use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct EventAggregator {
    graph: Arc<LineageGraph>,
    stats_provider: Arc<dyn StatsProvider>,
    completion: CompletionTracker,
    failures: FailureCollector,
    windows: DashMap<String, Arc<FeedProcessorWindow>>,
    stats_tx: mpsc::UnboundedSender<StatsBatch>,
    max_gap_millis: i64,
    stream_threshold: usize,
    last_flush_millis: AtomicI64,
    now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl EventAggregator {
    pub fn new(
        config: &PipelineConfig,
        stats_provider: Arc<dyn StatsProvider>,
        failure_lookup: Arc<dyn FailureLookup>,
        stats_tx: mpsc::UnboundedSender<StatsBatch>,
        failed_tx: mpsc::UnboundedSender<FailureRecord>,
    ) -> Self {
        Self::with_timestamp_fn(
            config,
            stats_provider,
            failure_lookup,
            stats_tx,
            failed_tx,
            Box::new(|| chrono::Utc::now().timestamp_millis()),
        )
    }

    /// Construct with a custom timestamp function, for deterministic tests.
    pub fn with_timestamp_fn(
        config: &PipelineConfig,
        stats_provider: Arc<dyn StatsProvider>,
        failure_lookup: Arc<dyn FailureLookup>,
        stats_tx: mpsc::UnboundedSender<StatsBatch>,
        failed_tx: mpsc::UnboundedSender<FailureRecord>,
        now_fn: Box<dyn Fn() -> i64 + Send + Sync>,
    ) -> Self {
        let graph = Arc::new(LineageGraph::new());
        let completion = CompletionTracker::new(Arc::clone(&graph), Arc::clone(&stats_provider));
        let failures = FailureCollector::new(failure_lookup, Arc::clone(&stats_provider), failed_tx);
        Self {
            graph,
            stats_provider,
            completion,
            failures,
            windows: DashMap::new(),
            stats_tx,
            max_gap_millis: config.max_event_gap_millis,
            stream_threshold: config.stream_threshold,
            last_flush_millis: AtomicI64::new(0),
            now_fn,
        }
    }

    /// Process one event. Never propagates an error to the caller: a panic
    /// from a collaborator is caught here and logged with the offending
    /// event, and the pipeline keeps processing subsequent events.
    pub fn ingest(&self, event: Arc<ProvenanceEvent>) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.process(&event))) {
            log::error!(
                "error processing event {} ({}, flow file {:?}): {}",
                event.event_id,
                event.group_key(),
                event.flow_file_id,
                panic_message(&panic)
            );
        }
    }

    fn process(&self, event: &Arc<ProvenanceEvent>) {
        let now = (self.now_fn)();

        // 1. lineage - skipped for events with no flow file identity; stats
        // and queueing still proceed on feed/processor identity alone
        let linked = if event.has_lineage_identity() {
            self.graph.register(event);
            true
        } else {
            log::warn!(
                "event {} has no flow file id, continuing without lineage",
                event.event_id
            );
            false
        };

        // 2. stats
        let stats = self.stats_provider.event_stats(event);

        // 3. windowed aggregation
        self.window_for(&event.feed_name, &event.processor_id)
            .add(stats, now);

        // 4. ancestor completion
        if linked && event.is_terminal {
            for (last_event, completion_stats) in self.completion.complete_ancestors(event) {
                self.window_for(&last_event.feed_name, &last_event.processor_id)
                    .add(completion_stats, now);
            }
        }

        // 5. failure isolation
        self.failures.collect(event);
    }

    /// Drain every live window's pending stats into the stats output queue.
    /// Keys created while the pass is running are picked up on the next
    /// tick. Returns the number of batches queued.
    pub fn flush_all(&self, now_millis: i64) -> usize {
        let mut queued = 0;
        for entry in self.windows.iter() {
            if let Some(batch) = entry.value().collect_ready(now_millis) {
                let drained = batch.stats.len();
                if self.stats_tx.send(batch).is_err() {
                    log::error!(
                        "stats channel closed, dropping {} stats for {}",
                        drained,
                        entry.key()
                    );
                    continue;
                }
                queued += 1;
            }
        }
        self.last_flush_millis.store(now_millis, Ordering::SeqCst);
        if queued > 0 {
            log::debug!("flush pass queued {} window batches", queued);
        }
        queued
    }

    pub fn graph(&self) -> &Arc<LineageGraph> {
        &self.graph
    }

    /// Timestamp of the most recent flush pass, 0 before the first one.
    pub fn last_flush_millis(&self) -> i64 {
        self.last_flush_millis.load(Ordering::SeqCst)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn window_for(&self, feed_name: &str, processor_id: &str) -> Arc<FeedProcessorWindow> {
        let key = format!("{}:{}", feed_name, processor_id);
        self.windows
            .entry(key)
            .or_insert_with(|| {
                Arc::new(FeedProcessorWindow::new(
                    feed_name,
                    processor_id,
                    self.max_gap_millis,
                    self.stream_threshold,
                ))
            })
            .value()
            .clone()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
