//! Data layer
//!
//! Clients for the two external collaborators of the pipeline:
//! - `monitoring` - Cloud Monitoring time series query client
//! - `influx` - InfluxDB line-protocol write client
//! - `types` - Series and record types shared across the seams
//! - `traits` - `MonitoringSource` / `PointWriter` seams
//! - `error` - Unified error type for both clients

pub mod error;
pub mod influx;
pub mod monitoring;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use influx::InfluxClient;
pub use monitoring::{CloudMonitoringClient, TokenSource};
pub use traits::{MonitoringSource, PointWriter, SeriesStream};
pub use types::{Batch, FieldValue, OutputRecord, Point, PointValue, TimeSeries, TimeWindow};
