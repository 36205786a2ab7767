//! Metrics Collection Pipeline
//!
//! Polls the monitoring backend for every catalog entry, keeps the latest
//! point per series, and writes the resulting batch to the time-series store.

mod batch;
mod catalog;
mod collect;
mod extract;
mod persist;
mod pipeline;

#[cfg(test)]
mod testing;

pub use batch::BatchAccumulator;
pub use catalog::{CatalogError, Classification, MetricCatalog, MetricMapping};
pub use collect::{CollectSummary, Collector, EntryFailure};
pub use extract::{extract_series, latest_point};
pub use persist::persist_batch;
pub use pipeline::{MetricsPipeline, PassReport, SchedulerState, WriteOutcome};
