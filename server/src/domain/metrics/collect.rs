//! Catalog collection
//!
//! Queries every catalog entry for a window and feeds extracted records into
//! the pass accumulator. An entry's records are buffered until its query
//! completes, so a failure anywhere in an entry contributes nothing.

use std::sync::Arc;

use futures::TryStreamExt;
use tokio::sync::Mutex;

use super::batch::BatchAccumulator;
use super::catalog::{MetricCatalog, MetricMapping};
use super::extract::extract_series;
use crate::data::error::DataError;
use crate::data::traits::{MonitoringSource, SeriesStream};
use crate::data::types::{OutputRecord, TimeWindow};

/// Failure kind for entries still unfinished when the pass timed out
pub const TIMEOUT_KIND: &str = "timeout";

/// Entry that failed during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub source_metric_id: String,
    pub kind: &'static str,
}

/// Per-entry outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub entries_ok: usize,
    pub failed: Vec<EntryFailure>,
    /// Entries skipped because an earlier pass was still querying them
    pub busy: Vec<String>,
}

impl CollectSummary {
    /// Entries that reached an outcome, in catalog order
    pub fn settled(&self) -> usize {
        self.entries_ok + self.failed.len() + self.busy.len()
    }
}

pub struct Collector {
    source: Arc<dyn MonitoringSource>,
    catalog: Arc<MetricCatalog>,
    // One slot per catalog entry, same order
    in_flight: Vec<Mutex<()>>,
}

impl Collector {
    pub fn new(source: Arc<dyn MonitoringSource>, catalog: Arc<MetricCatalog>) -> Self {
        let in_flight = catalog.entries().iter().map(|_| Mutex::new(())).collect();
        Self {
            source,
            catalog,
            in_flight,
        }
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    /// Raw series for one mapping over `window`
    pub fn collect<'a>(&'a self, mapping: &'a MetricMapping, window: TimeWindow) -> SeriesStream<'a> {
        self.source
            .list_time_series(&mapping.source_metric_id, window)
    }

    /// Drain one mapping's series and extract its records
    pub async fn collect_records(
        &self,
        mapping: &MetricMapping,
        window: TimeWindow,
    ) -> Result<Vec<OutputRecord>, DataError> {
        let mut stream = self.collect(mapping, window);
        let mut records = Vec::new();
        let mut series_count = 0usize;

        while let Some(series) = stream.try_next().await? {
            series_count += 1;
            if let Some(record) = extract_series(mapping, &series) {
                records.push(record);
            }
        }

        tracing::debug!(
            metric = %mapping.source_metric_id,
            target = %mapping.target_measurement,
            series = series_count,
            records = records.len(),
            "Collected entry"
        );
        Ok(records)
    }

    /// Collect every catalog entry in order, isolating failures per entry.
    ///
    /// `summary` and `accumulator` only ever hold settled entries, so both stay
    /// consistent if this future is dropped part way through.
    pub async fn collect_pass(
        &self,
        window: TimeWindow,
        accumulator: &mut BatchAccumulator,
        summary: &mut CollectSummary,
    ) {
        for (mapping, slot) in self.catalog.entries().iter().zip(&self.in_flight) {
            let Ok(_guard) = slot.try_lock() else {
                tracing::warn!(
                    metric = %mapping.source_metric_id,
                    "Entry still in flight from previous pass, skipping"
                );
                summary.busy.push(mapping.source_metric_id.clone());
                continue;
            };

            match self.collect_records(mapping, window).await {
                Ok(records) => {
                    summary.entries_ok += 1;
                    accumulator.extend(records);
                }
                Err(e) => {
                    tracing::warn!(
                        metric = %mapping.source_metric_id,
                        target = %mapping.target_measurement,
                        kind = e.kind(),
                        error = %e,
                        "Failed to collect entry"
                    );
                    summary.failed.push(EntryFailure {
                        source_metric_id: mapping.source_metric_id.clone(),
                        kind: e.kind(),
                    });
                }
            }
        }
    }

    /// Record every entry without an outcome as timed out
    pub fn mark_timed_out(&self, summary: &mut CollectSummary) {
        for mapping in self.catalog.entries().iter().skip(summary.settled()) {
            tracing::warn!(
                metric = %mapping.source_metric_id,
                target = %mapping.target_measurement,
                kind = TIMEOUT_KIND,
                "Entry not collected before pass timeout"
            );
            summary.failed.push(EntryFailure {
                source_metric_id: mapping.source_metric_id.clone(),
                kind: TIMEOUT_KIND,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::types::FieldValue;
    use crate::domain::metrics::catalog::Classification;
    use crate::domain::metrics::testing::{FakeSource, vm_series};

    const WINDOW: TimeWindow = TimeWindow {
        start_seconds: 0,
        end_seconds: 4200,
    };

    fn catalog(ids: &[&str]) -> Arc<MetricCatalog> {
        let entries = ids
            .iter()
            .map(|id| MetricMapping::new(*id, format!("{}.out", id), Classification::Instance))
            .collect();
        Arc::new(MetricCatalog::new(entries).unwrap())
    }

    fn measurements(acc: &mut BatchAccumulator) -> Vec<String> {
        acc.finalize()
            .records
            .into_iter()
            .map(|r| r.measurement)
            .collect()
    }

    #[tokio::test]
    async fn test_collect_records_extracts_each_series() {
        let source = FakeSource::new()
            .with_series("a", vm_series("vm-1", &[(100, 1.0), (200, 2.0)]))
            .with_series("a", vm_series("vm-2", &[(150, 3.0)]));
        let collector = Collector::new(Arc::new(source), catalog(&["a"]));
        let mapping = collector.catalog().entries()[0].clone();

        let records = collector.collect_records(&mapping, WINDOW).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp_seconds, 200);
        assert_eq!(records[0].value, FieldValue::Float(2.0));
        assert_eq!(records[1].tags.get("instance").map(String::as_str), Some("vm-2"));
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_block_others() {
        let source = FakeSource::new()
            .with_failure("a", "HTTP 403")
            .with_series("b", vm_series("vm-1", &[(100, 1.0)]));
        let collector = Collector::new(Arc::new(source), catalog(&["a", "b"]));

        let mut acc = BatchAccumulator::new("db", "rp");
        let mut summary = CollectSummary::default();
        collector.collect_pass(WINDOW, &mut acc, &mut summary).await;

        assert_eq!(summary.entries_ok, 1);
        assert_eq!(
            summary.failed,
            vec![EntryFailure {
                source_metric_id: "a".to_string(),
                kind: "query_failure",
            }]
        );
        assert_eq!(measurements(&mut acc), vec!["b.out"]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_discards_entry() {
        let source = FakeSource::new()
            .with_series("a", vm_series("vm-1", &[(100, 1.0)]))
            .with_failure("a", "page 2 unavailable")
            .with_series("b", vm_series("vm-1", &[(100, 1.0)]));
        let collector = Collector::new(Arc::new(source), catalog(&["a", "b"]));

        let mut acc = BatchAccumulator::new("db", "rp");
        let mut summary = CollectSummary::default();
        collector.collect_pass(WINDOW, &mut acc, &mut summary).await;

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(measurements(&mut acc), vec!["b.out"]);
    }

    #[tokio::test]
    async fn test_skipped_series_are_not_records() {
        let source = FakeSource::new().with_series(
            "a",
            crate::domain::metrics::testing::series(
                &[("instance_name", "vm-1"), ("device_name", "vm-1-data")],
                &[(100, 1.0)],
            ),
        );
        let collector = Collector::new(Arc::new(source), catalog(&["a"]));

        let mut acc = BatchAccumulator::new("db", "rp");
        let mut summary = CollectSummary::default();
        collector.collect_pass(WINDOW, &mut acc, &mut summary).await;

        assert_eq!(summary.entries_ok, 1);
        assert!(acc.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_entry_is_skipped_by_overlapping_pass() {
        let source = Arc::new(
            FakeSource::new()
                .with_delay("slow", Duration::from_secs(10))
                .with_series("slow", vm_series("vm-1", &[(100, 1.0)]))
                .with_series("fast", vm_series("vm-1", &[(100, 2.0)])),
        );
        let collector = Collector::new(source.clone(), catalog(&["slow", "fast"]));

        let mut first_acc = BatchAccumulator::new("db", "rp");
        let mut second_acc = BatchAccumulator::new("db", "rp");
        let mut first = CollectSummary::default();
        let mut second = CollectSummary::default();
        tokio::join!(
            collector.collect_pass(WINDOW, &mut first_acc, &mut first),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                collector
                    .collect_pass(WINDOW, &mut second_acc, &mut second)
                    .await
            }
        );

        assert_eq!(first.entries_ok, 2);
        assert!(first.busy.is_empty());
        assert_eq!(second.entries_ok, 1);
        assert_eq!(second.busy, vec!["slow".to_string()]);
        assert_eq!(source.query_count("slow"), 1);
        assert_eq!(source.query_count("fast"), 2);
        assert_eq!(measurements(&mut second_acc), vec!["fast.out"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_pass_keeps_settled_entries() {
        let source = FakeSource::new()
            .with_series("a", vm_series("vm-1", &[(100, 1.0)]))
            .with_delay("b", Duration::from_secs(3600))
            .with_series("b", vm_series("vm-1", &[(100, 2.0)]))
            .with_series("c", vm_series("vm-1", &[(100, 3.0)]));
        let collector = Collector::new(Arc::new(source), catalog(&["a", "b", "c"]));

        let mut acc = BatchAccumulator::new("db", "rp");
        let mut summary = CollectSummary::default();
        let result = tokio::time::timeout(
            Duration::from_secs(50),
            collector.collect_pass(WINDOW, &mut acc, &mut summary),
        )
        .await;
        assert!(result.is_err());

        collector.mark_timed_out(&mut summary);
        assert_eq!(summary.entries_ok, 1);
        assert_eq!(
            summary.failed,
            vec![
                EntryFailure {
                    source_metric_id: "b".to_string(),
                    kind: TIMEOUT_KIND,
                },
                EntryFailure {
                    source_metric_id: "c".to_string(),
                    kind: TIMEOUT_KIND,
                },
            ]
        );
        assert_eq!(summary.settled(), 3);
        assert_eq!(measurements(&mut acc), vec!["a.out"]);
    }
}
