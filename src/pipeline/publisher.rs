//! Output queues and publisher tasks
//!
//! Two unbounded channels leave the pipeline: windowed stats batches and
//! failure records. Each is drained by exactly one dedicated consumer task,
//! which suspends while its queue is empty, batches whatever is immediately
//! available on wake-up, and hands the batch to the transport. The two
//! channels are fully independent - failure-path backpressure never touches
//! the success path, and there is no ordering guarantee between them.
//!
//! Delivery is fire-and-forget from the core's perspective: a transport
//! error is logged and the consumer moves on. Retries belong to the
//! transport implementation.

use crate::pipeline::types::{FailureRecord, StatsBatch};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum PublishError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Transport(String),
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Io(err)
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Io(e) => write!(f, "IO error: {}", e),
            PublishError::Serialization(e) => write!(f, "Serialization error: {}", e),
            PublishError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

/// Outbound messaging transport.
#[async_trait]
pub trait BatchPublisher: Send + Sync {
    /// Deliver a batch of windowed stats to the named channel.
    async fn publish_stats(&self, channel: &str, batch: &[StatsBatch]) -> Result<(), PublishError>;

    /// Deliver a batch of failure records to the named channel.
    async fn publish_events(
        &self,
        channel: &str,
        batch: &[FailureRecord],
    ) -> Result<(), PublishError>;

    /// Transport type for logging
    fn transport_type(&self) -> &'static str;
}

/// Transport that writes payloads to the application log. Default for the
/// runtime binary when no real broker is wired in.
pub struct LogPublisher;

#[async_trait]
impl BatchPublisher for LogPublisher {
    async fn publish_stats(&self, channel: &str, batch: &[StatsBatch]) -> Result<(), PublishError> {
        let payload = serde_json::to_string(batch)?;
        for item in batch {
            log::debug!(
                "  {}:{} [{}] {} stats",
                item.feed_name,
                item.processor_id,
                item.classification.as_str(),
                item.stats.len()
            );
        }
        log::info!("publish {} stats batches to {}: {}", batch.len(), channel, payload);
        Ok(())
    }

    async fn publish_events(
        &self,
        channel: &str,
        batch: &[FailureRecord],
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(batch)?;
        log::info!(
            "publish {} failed events to {}: {}",
            batch.len(),
            channel,
            payload
        );
        Ok(())
    }

    fn transport_type(&self) -> &'static str {
        "log"
    }
}

/// Spawn the consumer task for the stats channel. The task exits once the
/// sender side is dropped and the queue is fully drained.
pub fn spawn_stats_publisher(
    mut rx: mpsc::UnboundedReceiver<StatsBatch>,
    publisher: Arc<dyn BatchPublisher>,
    channel: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = rx.try_recv() {
                batch.push(next);
            }
            if let Err(e) = publisher.publish_stats(&channel, &batch).await {
                log::error!(
                    "failed to publish {} stats batches to {}: {}",
                    batch.len(),
                    channel,
                    e
                );
            }
        }
        log::info!("stats publisher for {} stopped", channel);
    })
}

/// Spawn the consumer task for the failed-events channel. Same drain
/// discipline as the stats consumer.
pub fn spawn_failed_event_publisher(
    mut rx: mpsc::UnboundedReceiver<FailureRecord>,
    publisher: Arc<dyn BatchPublisher>,
    channel: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            let mut batch = vec![first];
            while let Ok(next) = rx.try_recv() {
                batch.push(next);
            }
            if let Err(e) = publisher.publish_events(&channel, &batch).await {
                log::error!(
                    "failed to publish {} failed events to {}: {}",
                    batch.len(),
                    channel,
                    e
                );
            }
        }
        log::info!("failed-event publisher for {} stopped", channel);
    })
}
