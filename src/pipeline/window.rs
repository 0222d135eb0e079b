//! Per (feed, processor) aggregation window
//!
//! One window instance exists per key at any instant. Instances are re-used
//! across flush cycles: draining empties the pending sequence but never
//! destroys the window.
//!
//! Flush policy: everything currently pending is drained on every scheduler
//! tick, which bounds end-to-end latency to one flush interval. The quiet-gap
//! test against `max_gap_millis` does not gate draining; it travels on the
//! drained batch as `window_quiet` metadata so the downstream consumer can
//! tell a trailing flush from live traffic.

use crate::pipeline::types::{BatchClass, EventStats, StatsBatch};
use std::sync::Mutex;

pub struct FeedProcessorWindow {
    feed_name: String,
    processor_id: String,
    max_gap_millis: i64,
    stream_threshold: usize,
    inner: Mutex<WindowInner>,
}

struct WindowInner {
    pending: Vec<EventStats>,
    last_insertion_millis: i64,
}

impl FeedProcessorWindow {
    pub fn new(
        feed_name: &str,
        processor_id: &str,
        max_gap_millis: i64,
        stream_threshold: usize,
    ) -> Self {
        Self {
            feed_name: feed_name.to_string(),
            processor_id: processor_id.to_string(),
            max_gap_millis,
            stream_threshold,
            inner: Mutex::new(WindowInner {
                pending: Vec::new(),
                last_insertion_millis: 0,
            }),
        }
    }

    /// Append stats in arrival order and record the insertion time.
    /// Safe against concurrent callers targeting this instance.
    pub fn add(&self, stats: EventStats, now_millis: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending.push(stats);
        inner.last_insertion_millis = now_millis;
    }

    /// Drain everything currently pending into one classified batch.
    /// Returns None when nothing is pending. Stats leave in the same order
    /// they were added.
    pub fn collect_ready(&self, now_millis: i64) -> Option<StatsBatch> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.is_empty() {
            return None;
        }
        let window_quiet = now_millis - inner.last_insertion_millis >= self.max_gap_millis;
        let stats = std::mem::take(&mut inner.pending);
        let classification = if stats.len() > self.stream_threshold {
            BatchClass::Stream
        } else {
            BatchClass::Batch
        };
        Some(StatsBatch {
            feed_name: self.feed_name.clone(),
            processor_id: self.processor_id.clone(),
            classification,
            window_quiet,
            collected_at_millis: now_millis,
            stats,
        })
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }
}
