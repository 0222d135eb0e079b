//! Periodic flush scheduling
//!
//! The scheduler is a thin timer loop: all flush logic lives in
//! `EventAggregator::flush_all`, which takes an explicit timestamp so tests
//! can drive ticks deterministically instead of waiting on real time. The
//! timer fires whether or not events arrived in the interval - trailing
//! stats sitting in otherwise-idle windows still leave on schedule.

use crate::pipeline::engine::EventAggregator;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// Run the flush timer until the shutdown signal fires.
///
/// A failed cycle never stops the timer: `flush_all` reports its own
/// per-window errors and the loop continues on schedule.
pub async fn run_flush_scheduler(
    engine: Arc<EventAggregator>,
    interval_millis: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    log::info!("starting flush scheduler (interval: {}ms)", interval_millis);

    let mut timer = interval(Duration::from_millis(interval_millis));
    // The first tick completes immediately; consume it so the first real
    // flush happens one full interval after startup.
    timer.tick().await;

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let now = chrono::Utc::now().timestamp_millis();
                let queued = engine.flush_all(now);
                log::debug!("scheduled flush queued {} batches", queued);
            }
            _ = shutdown_rx.changed() => {
                log::info!("flush scheduler stopping");
                break;
            }
        }
    }
}
