//! Shared data types for the query and write clients
//!
//! Series types model what the monitoring backend returns; normalized types
//! model what is handed to the time-series store.

mod normalized;
mod series;

// Re-export series types (query side)
pub use series::{Point, PointValue, TimeSeries, TimeWindow};

// Re-export normalized types (write side)
pub use normalized::{Batch, FieldValue, OutputRecord};
