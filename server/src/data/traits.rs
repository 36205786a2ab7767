//! Client traits for the external collaborators
//!
//! The pipeline only ever talks to these seams. Production implementations
//! live in `monitoring` (Cloud Monitoring query client) and `influx`
//! (InfluxDB write client); tests substitute in-process fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::data::error::DataError;
use crate::data::types::{Batch, TimeSeries, TimeWindow};

/// Lazily paged sequence of series returned by a query
pub type SeriesStream<'a> = BoxStream<'a, Result<TimeSeries, DataError>>;

/// Query client for the monitoring backend
pub trait MonitoringSource: Send + Sync {
    /// Stream full-detail series for `metric_type` over `window`.
    ///
    /// Pages are fetched as the stream is polled. Any transport, auth or
    /// decode error surfaces as `DataError::QueryFailure` and ends the stream.
    fn list_time_series<'a>(&'a self, metric_type: &'a str, window: TimeWindow)
    -> SeriesStream<'a>;
}

/// Write client for the time-series store
#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Write one batch in a single network request.
    ///
    /// Returns the number of points actually sent. Records the store cannot
    /// represent are dropped, and when none remain no request is made.
    async fn write(&self, batch: &Batch) -> Result<usize, DataError>;
}
