//! Lineage-aware provenance event aggregation pipeline.
//!
//! See [`pipeline`] for the full architecture overview.

pub mod pipeline;
