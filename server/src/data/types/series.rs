//! Time series models returned by the monitoring backend

use std::collections::HashMap;
use std::time::Duration;

/// A sample value. The backend reports either an integer or a floating-point magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointValue {
    Int64(i64),
    Double(f64),
}

impl PointValue {
    /// Integer magnitude. Doubles are truncated toward zero (saturating at the i64 bounds).
    pub fn as_i64(&self) -> i64 {
        match *self {
            Self::Int64(i) => i,
            Self::Double(d) => d as i64,
        }
    }

    /// Floating-point magnitude.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int64(i) => i as f64,
            Self::Double(d) => d,
        }
    }
}

/// One sample of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Interval end, seconds since Unix epoch
    pub end_seconds: i64,
    pub value: PointValue,
}

impl Point {
    pub fn new(end_seconds: i64, value: PointValue) -> Self {
        Self { end_seconds, value }
    }
}

/// One stream of samples for a single metric/resource combination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Metric-scoped labels (e.g. `memory_type`)
    pub metric_labels: HashMap<String, String>,
    /// Resource-scoped labels (e.g. `instance_name`, `pod_name`)
    pub resource_labels: HashMap<String, String>,
    pub points: Vec<Point>,
}

impl TimeSeries {
    pub fn metric_label(&self, key: &str) -> Option<&str> {
        self.metric_labels.get(key).map(String::as_str)
    }

    pub fn resource_label(&self, key: &str) -> Option<&str> {
        self.resource_labels.get(key).map(String::as_str)
    }
}

/// Closed query interval `[start, end]` in seconds since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_seconds: i64,
    pub end_seconds: i64,
}

impl TimeWindow {
    /// Window of length `lookback` ending at `end_seconds`
    pub fn ending_at(end_seconds: i64, lookback: Duration) -> Self {
        let lookback_secs = i64::try_from(lookback.as_secs()).unwrap_or(i64::MAX);
        Self {
            start_seconds: end_seconds.saturating_sub(lookback_secs),
            end_seconds,
        }
    }
}
