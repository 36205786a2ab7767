//! In-process fakes for the client traits

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::traits::{MonitoringSource, PointWriter, SeriesStream};
use crate::data::types::{Batch, Point, PointValue, TimeSeries, TimeWindow};

#[derive(Debug, Clone)]
enum Step {
    Series(TimeSeries),
    Fail(String),
}

/// Scripted monitoring source. Each metric replays its steps on every query.
#[derive(Default)]
pub struct FakeSource {
    scripts: HashMap<String, Vec<Step>>,
    delays: HashMap<String, Duration>,
    queries: Mutex<Vec<(String, TimeWindow)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, metric: &str, series: TimeSeries) -> Self {
        self.scripts
            .entry(metric.to_string())
            .or_default()
            .push(Step::Series(series));
        self
    }

    /// Fail the query after any series scripted so far for `metric`
    pub fn with_failure(mut self, metric: &str, reason: &str) -> Self {
        self.scripts
            .entry(metric.to_string())
            .or_default()
            .push(Step::Fail(reason.to_string()));
        self
    }

    /// Sleep before the first series of every query for `metric`
    pub fn with_delay(mut self, metric: &str, delay: Duration) -> Self {
        self.delays.insert(metric.to_string(), delay);
        self
    }

    pub fn query_count(&self, metric: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == metric)
            .count()
    }

    pub fn windows(&self) -> Vec<TimeWindow> {
        self.queries.lock().unwrap().iter().map(|(_, w)| *w).collect()
    }
}

impl MonitoringSource for FakeSource {
    fn list_time_series<'a>(
        &'a self,
        metric_type: &'a str,
        window: TimeWindow,
    ) -> SeriesStream<'a> {
        self.queries
            .lock()
            .unwrap()
            .push((metric_type.to_string(), window));
        let steps = self.scripts.get(metric_type).cloned().unwrap_or_default();
        let delay = self.delays.get(metric_type).copied();

        Box::pin(stream! {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            for step in steps {
                match step {
                    Step::Series(series) => yield Ok(series),
                    Step::Fail(reason) => {
                        yield Err(DataError::query_failure(metric_type, reason));
                        return;
                    }
                }
            }
        })
    }
}

/// Writer that keeps every batch it receives
#[derive(Default)]
pub struct RecordingWriter {
    batches: Mutex<Vec<Batch>>,
    fail: AtomicBool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let writer = Self::default();
        writer.fail.store(true, Ordering::SeqCst);
        writer
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl PointWriter for RecordingWriter {
    async fn write(&self, batch: &Batch) -> Result<usize, DataError> {
        self.batches.lock().unwrap().push(batch.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(DataError::write_failure(&batch.database, "connection refused"));
        }
        Ok(batch.records.iter().filter(|r| r.value.is_finite()).count())
    }
}

/// Series with the given resource labels and `(end, value)` double points
pub fn series(resource: &[(&str, &str)], points: &[(i64, f64)]) -> TimeSeries {
    TimeSeries {
        metric_labels: HashMap::new(),
        resource_labels: resource
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        points: points
            .iter()
            .map(|(end, v)| Point::new(*end, PointValue::Double(*v)))
            .collect(),
    }
}

/// Primary-device VM series
pub fn vm_series(instance: &str, points: &[(i64, f64)]) -> TimeSeries {
    series(
        &[("instance_name", instance), ("device_name", instance)],
        points,
    )
}
