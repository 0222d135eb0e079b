//! # Provenance aggregation pipeline
//!
//! In-memory pipeline that turns a stream of provenance events into
//! time-windowed stats batches:
//!
//! 1. Events arrive one at a time at [`engine::EventAggregator::ingest`],
//!    from any number of producer threads.
//! 2. Each event updates the lineage graph, produces an `EventStats`, and
//!    lands in the window for its (feed, processor) key.
//! 3. Terminal events re-check their direct parents; a parent whose own
//!    terminal event was already observed completes exactly once and gets a
//!    synthesized completion record in its own window.
//! 4. A timer task drains every window on a fixed interval into the stats
//!    queue; failed events leave on an independent queue. One dedicated
//!    consumer task per queue batches items and hands them to the
//!    transport.
//!
//! Raw events are never persisted: aggregation state is in-memory only, and
//! the downstream channels receive aggregates and failure records.
//!
//! ## Module Organization
//!
//! - `types` - events, stats, batches, failure records
//! - `lineage` - flow file graph with set-once completion flags
//! - `stats` - stats and failure-lookup collaborator traits
//! - `window` - per (feed, processor) aggregation window
//! - `completion` - ancestor completion tracking
//! - `failures` - idempotent failure detection
//! - `engine` - orchestrating aggregator
//! - `scheduler` - periodic flush timer
//! - `publisher` - output queues, consumer tasks, transport trait
//! - `config` - environment-driven configuration

pub mod completion;
pub mod config;
pub mod engine;
pub mod failures;
pub mod lineage;
pub mod publisher;
pub mod scheduler;
pub mod stats;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use engine::EventAggregator;
pub use lineage::{FlowFileNode, LineageGraph};
pub use publisher::{BatchPublisher, LogPublisher, PublishError};
pub use stats::{DefaultStatsProvider, FailureLookup, KindFailureLookup, StatsProvider};
pub use types::{BatchClass, EventKind, EventStats, FailureRecord, ProvenanceEvent, StatsBatch};
pub use window::FeedProcessorWindow;
