//! Domain logic for metric collection
//!
//! - `metrics` - catalog, extraction rules and the scheduled collection pipeline

pub mod metrics;

pub use metrics::MetricsPipeline;
