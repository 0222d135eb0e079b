//! Pipeline runtime
//!
//! Wires the full aggregation pipeline and feeds it provenance events read
//! as JSON lines from stdin (one `ProvenanceEvent` per line). Flushed stats
//! batches and failure records are published through the log transport.
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime < events.jsonl
//!
//! Environment variables:
//!   LINEFLOW_MAX_EVENT_GAP_MS - per-window quiet gap (default: 60000)
//!   LINEFLOW_STREAM_THRESHOLD - stream classification threshold (default: 10)
//!   LINEFLOW_FLUSH_INTERVAL_MS - flush period (default: 5000)
//!   LINEFLOW_STATS_CHANNEL - stats channel name
//!   LINEFLOW_FAILED_EVENTS_CHANNEL - failed-events channel name
//!
//! Shutdown (stdin EOF or ctrl-c) stops the flush timer, runs one final
//! flush, and lets both publisher tasks drain their queues before exit.

use dotenv::dotenv;
use lineflow::pipeline::{
    config::PipelineConfig,
    engine::EventAggregator,
    publisher::{spawn_failed_event_publisher, spawn_stats_publisher, BatchPublisher, LogPublisher},
    scheduler::run_flush_scheduler,
    stats::{DefaultStatsProvider, KindFailureLookup},
    types::ProvenanceEvent,
};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let config = PipelineConfig::from_env();
    info!("lineflow pipeline runtime starting");
    info!("   ├─ flush interval: {}ms", config.flush_interval_millis);
    info!("   ├─ max event gap: {}ms", config.max_event_gap_millis);
    info!("   ├─ stream threshold: {} events", config.stream_threshold);
    info!("   ├─ stats channel: {}", config.stats_channel);
    info!("   └─ failed events channel: {}", config.failed_events_channel);

    let (stats_tx, stats_rx) = mpsc::unbounded_channel();
    let (failed_tx, failed_rx) = mpsc::unbounded_channel();

    let engine = Arc::new(EventAggregator::new(
        &config,
        Arc::new(DefaultStatsProvider),
        Arc::new(KindFailureLookup),
        stats_tx,
        failed_tx,
    ));

    let publisher: Arc<dyn BatchPublisher> = Arc::new(LogPublisher);
    info!("transport: {}", publisher.transport_type());

    let stats_handle =
        spawn_stats_publisher(stats_rx, Arc::clone(&publisher), config.stats_channel.clone());
    let failed_handle = spawn_failed_event_publisher(
        failed_rx,
        Arc::clone(&publisher),
        config.failed_events_channel.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(run_flush_scheduler(
        Arc::clone(&engine),
        config.flush_interval_millis,
        shutdown_rx,
    ));

    // Ingest loop: JSON lines from stdin until EOF or ctrl-c
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ingested = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ProvenanceEvent>(&line) {
                            Ok(event) => {
                                engine.ingest(Arc::new(event));
                                ingested += 1;
                                if ingested % 10_000 == 0 {
                                    info!(
                                        "ingested {} events across {} windows",
                                        ingested,
                                        engine.window_count()
                                    );
                                }
                            }
                            Err(e) => warn!("skipping unparseable event line: {}", e),
                        }
                    }
                    Ok(None) => {
                        info!("event stream closed after {} events", ingested);
                        break;
                    }
                    Err(e) => {
                        error!("error reading event stream: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received after {} events", ingested);
                break;
            }
        }
    }

    // Graceful drain: stop the timer, flush whatever is still buffered,
    // close the queues, and wait for both consumers to finish.
    info!("shutting down, flushing remaining aggregates");
    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        error!("flush scheduler task failed: {}", e);
    }

    let queued = engine.flush_all(chrono::Utc::now().timestamp_millis());
    info!("final flush queued {} batches", queued);

    drop(engine); // closes both queue senders
    if let Err(e) = stats_handle.await {
        error!("stats publisher task failed: {}", e);
    }
    if let Err(e) = failed_handle.await {
        error!("failed-event publisher task failed: {}", e);
    }

    info!("pipeline runtime stopped");
    Ok(())
}
