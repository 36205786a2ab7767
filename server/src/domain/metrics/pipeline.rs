//! Metrics Collection Pipeline
//!
//! Runs a collection pass on a fixed cadence: query every catalog entry over
//! the lookback window, extract records, write the batch to the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::batch::BatchAccumulator;
use super::collect::{CollectSummary, Collector, EntryFailure};
use super::persist::persist_batch;
use crate::core::config::{OverlapPolicy, ScheduleConfig};
use crate::data::traits::PointWriter;
use crate::data::types::TimeWindow;
use crate::utils::time::now_unix_seconds;

/// Whether a pass is currently in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// What happened to the batch at the end of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Nothing the store can represent was collected, no request sent
    Empty,
    Failed,
}

/// Result of one collection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub window: TimeWindow,
    pub entries_ok: usize,
    pub failed: Vec<EntryFailure>,
    pub busy: Vec<String>,
    pub records: usize,
    pub write: WriteOutcome,
    /// Collection hit the pass timeout; only settled entries were written
    pub timed_out: bool,
}

impl PassReport {
    pub fn written(&self) -> bool {
        self.write == WriteOutcome::Written
    }
}

struct PipelineInner {
    collector: Collector,
    writer: Arc<dyn PointWriter>,
    schedule: ScheduleConfig,
    database: String,
    retention_policy: String,
    running: AtomicUsize,
}

#[derive(Clone)]
pub struct MetricsPipeline {
    inner: Arc<PipelineInner>,
}

/// Marks a pass as running for as long as it is alive
struct PassGuard<'a>(&'a AtomicUsize);

impl<'a> PassGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MetricsPipeline {
    pub fn new(
        collector: Collector,
        writer: Arc<dyn PointWriter>,
        schedule: ScheduleConfig,
        database: impl Into<String>,
        retention_policy: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                collector,
                writer,
                schedule,
                database: database.into(),
                retention_policy: retention_policy.into(),
                running: AtomicUsize::new(0),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.running.load(Ordering::SeqCst) > 0 {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Run one pass for the window ending at `now_seconds`
    pub async fn run_pass(&self, now_seconds: i64) -> PassReport {
        let _guard = PassGuard::enter(&self.inner.running);
        let schedule = &self.inner.schedule;
        let window = TimeWindow::ending_at(now_seconds, schedule.lookback());
        let started = Instant::now();

        tracing::info!(
            start = window.start_seconds,
            end = window.end_seconds,
            entries = self.inner.collector.catalog().len(),
            "Starting collection pass"
        );

        let mut accumulator =
            BatchAccumulator::new(&self.inner.database, &self.inner.retention_policy);
        let mut summary = CollectSummary::default();
        let timed_out = tokio::time::timeout(
            schedule.pass_timeout(),
            self.inner
                .collector
                .collect_pass(window, &mut accumulator, &mut summary),
        )
        .await
        .is_err();

        if timed_out {
            self.inner.collector.mark_timed_out(&mut summary);
            tracing::warn!(
                timeout_secs = schedule.pass_timeout_secs,
                entries_ok = summary.entries_ok,
                records = accumulator.len(),
                "Collection pass timed out, writing settled entries only"
            );
        }

        let batch = accumulator.finalize();
        let records = batch.len();
        let write = match persist_batch(&batch, self.inner.writer.as_ref()).await {
            Ok(0) => WriteOutcome::Empty,
            Ok(_) => WriteOutcome::Written,
            Err(_) => WriteOutcome::Failed,
        };

        tracing::info!(
            entries_ok = summary.entries_ok,
            failed = summary.failed.len(),
            busy = summary.busy.len(),
            records,
            write = ?write,
            timed_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection pass complete"
        );

        PassReport {
            window,
            entries_ok: summary.entries_ok,
            failed: summary.failed,
            busy: summary.busy,
            records,
            write,
            timed_out,
        }
    }

    /// Spawn the scheduler loop. The first pass starts immediately.
    pub fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let schedule = self.inner.schedule.clone();
            let mut ticker = tokio::time::interval(schedule.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut passes: JoinSet<PassReport> = JoinSet::new();

            tracing::debug!(
                interval_secs = schedule.interval_secs,
                overlap = %schedule.overlap,
                "MetricsPipeline started"
            );

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!(
                                in_flight = passes.len(),
                                "MetricsPipeline received shutdown, draining..."
                            );
                            break;
                        }
                    }
                    Some(result) = passes.join_next(), if !passes.is_empty() => {
                        log_join_error(result);
                    }
                    _ = ticker.tick() => {
                        if !passes.is_empty() && schedule.overlap == OverlapPolicy::Skip {
                            tracing::warn!(
                                interval_secs = schedule.interval_secs,
                                "Previous pass still running, skipping tick"
                            );
                            continue;
                        }
                        let pipeline = self.clone();
                        passes.spawn(async move { pipeline.run_pass(now_unix_seconds()).await });
                    }
                }
            }

            while let Some(result) = passes.join_next().await {
                log_join_error(result);
            }
            tracing::debug!("MetricsPipeline shutdown complete");
        })
    }
}

fn log_join_error(result: Result<PassReport, JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Collection pass task failed");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::influx::encode_batch;
    use crate::domain::metrics::catalog::{Classification, MetricCatalog, MetricMapping};
    use crate::domain::metrics::collect::TIMEOUT_KIND;
    use crate::domain::metrics::testing::{FakeSource, RecordingWriter, vm_series};

    fn schedule(overlap: OverlapPolicy) -> ScheduleConfig {
        ScheduleConfig {
            interval_secs: 60,
            lookback_minutes: 70,
            pass_timeout_secs: 50,
            overlap,
        }
    }

    fn pipeline(
        source: Arc<FakeSource>,
        catalog: MetricCatalog,
        writer: Arc<RecordingWriter>,
        schedule: ScheduleConfig,
    ) -> MetricsPipeline {
        let collector = Collector::new(source, Arc::new(catalog));
        MetricsPipeline::new(collector, writer, schedule, "misows", "defaultPolicy")
    }

    fn instance_catalog(ids: &[&str]) -> MetricCatalog {
        MetricCatalog::new(
            ids.iter()
                .map(|id| MetricMapping::new(*id, format!("{}.out", id), Classification::Instance))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_pass_end_to_end() {
        let source = Arc::new(
            FakeSource::new().with_series("cpu/utilization", vm_series("vm-1", &[(1000, 0.73)])),
        );
        let writer = Arc::new(RecordingWriter::new());
        let catalog = MetricCatalog::new(vec![MetricMapping::new(
            "cpu/utilization",
            "cpu.percent",
            Classification::Instance,
        )])
        .unwrap();
        let pipeline = pipeline(
            source.clone(),
            catalog,
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let report = pipeline.run_pass(10_000).await;

        assert_eq!(report.entries_ok, 1);
        assert_eq!(report.records, 1);
        assert!(report.written());
        assert_eq!(
            report.window,
            TimeWindow {
                start_seconds: 10_000 - 4200,
                end_seconds: 10_000
            }
        );
        assert!(source.windows().iter().all(|w| *w == report.window));

        let batches = writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].database, "misows");
        assert_eq!(batches[0].retention_policy, "defaultPolicy");
        assert_eq!(
            encode_batch(&batches[0]),
            "cpu.percent,instance=vm-1 value=0.73 1000"
        );
        assert_eq!(pipeline.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_pass_write_failure_reported() {
        let source = Arc::new(FakeSource::new().with_series("a", vm_series("vm-1", &[(1, 1.0)])));
        let writer = Arc::new(RecordingWriter::failing());
        let pipeline = pipeline(
            source,
            instance_catalog(&["a"]),
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let report = pipeline.run_pass(100).await;
        assert_eq!(report.write, WriteOutcome::Failed);
        assert_eq!(report.records, 1);
        assert_eq!(writer.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_pass_with_nothing_collected_sends_nothing() {
        let source = Arc::new(FakeSource::new().with_failure("a", "HTTP 500"));
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source,
            instance_catalog(&["a", "b"]),
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let report = pipeline.run_pass(100).await;
        assert_eq!(report.write, WriteOutcome::Empty);
        assert_eq!(report.entries_ok, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(writer.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_timeout_writes_settled_entries() {
        let source = Arc::new(
            FakeSource::new()
                .with_series("fast", vm_series("vm-1", &[(1, 1.0)]))
                .with_delay("hung", Duration::from_secs(3600))
                .with_series("hung", vm_series("vm-1", &[(1, 1.0)])),
        );
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source,
            instance_catalog(&["fast", "hung"]),
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let report = pipeline.run_pass(100).await;
        assert!(report.timed_out);
        assert_eq!(report.write, WriteOutcome::Written);
        assert_eq!(report.entries_ok, 1);
        assert_eq!(
            report.failed,
            vec![EntryFailure {
                source_metric_id: "hung".to_string(),
                kind: TIMEOUT_KIND,
            }]
        );
        assert_eq!(report.records, 1);

        let batches = writer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records[0].measurement, "fast.out");
        assert_eq!(pipeline.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_timeout_with_nothing_settled_sends_nothing() {
        let source = Arc::new(
            FakeSource::new()
                .with_delay("hung", Duration::from_secs(3600))
                .with_series("hung", vm_series("vm-1", &[(1, 1.0)])),
        );
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source,
            instance_catalog(&["hung"]),
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let report = pipeline.run_pass(100).await;
        assert!(report.timed_out);
        assert_eq!(report.write, WriteOutcome::Empty);
        assert_eq!(report.failed.len(), 1);
        assert!(writer.batches().is_empty());
    }

    #[tokio::test]
    async fn test_pass_with_only_non_finite_values_is_empty() {
        let source = Arc::new(
            FakeSource::new().with_series("a", vm_series("vm-1", &[(1, f64::NAN)])),
        );
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source,
            instance_catalog(&["a"]),
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let report = pipeline.run_pass(100).await;
        assert_eq!(report.records, 1);
        assert_eq!(report.write, WriteOutcome::Empty);
        assert!(!report.written());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_immediately_then_every_interval() {
        let source = Arc::new(FakeSource::new().with_series("a", vm_series("vm-1", &[(1, 1.0)])));
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source.clone(),
            instance_catalog(&["a"]),
            writer.clone(),
            schedule(OverlapPolicy::Skip),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = pipeline.start(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at 0s, 60s and 120s
        assert_eq!(source.query_count("a"), 3);
        assert_eq!(writer.batches().len(), 3);
    }

    fn overlapping_source() -> Arc<FakeSource> {
        Arc::new(
            FakeSource::new()
                .with_delay("slow", Duration::from_secs(90))
                .with_series("slow", vm_series("vm-1", &[(1, 1.0)]))
                .with_series("fast", vm_series("vm-1", &[(1, 2.0)])),
        )
    }

    fn long_pass_schedule(overlap: OverlapPolicy) -> ScheduleConfig {
        ScheduleConfig {
            pass_timeout_secs: 300,
            ..schedule(overlap)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_policy_skips_tick_while_running() {
        let source = overlapping_source();
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source.clone(),
            instance_catalog(&["slow", "fast"]),
            writer.clone(),
            long_pass_schedule(OverlapPolicy::Skip),
        );
        let observer = pipeline.clone();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = pipeline.start(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(observer.state(), SchedulerState::Running);

        // Pass 1 ends at 90s; the 60s tick was skipped
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(observer.state(), SchedulerState::Idle);
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(source.query_count("slow"), 1);
        assert_eq!(source.query_count("fast"), 1);
        assert_eq!(writer.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_policy_skips_busy_entry() {
        let source = overlapping_source();
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source.clone(),
            instance_catalog(&["slow", "fast"]),
            writer.clone(),
            long_pass_schedule(OverlapPolicy::Concurrent),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = pipeline.start(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        // Pass 2 (60s) found "slow" in flight and only queried "fast"
        assert_eq!(source.query_count("slow"), 1);
        assert_eq!(source.query_count("fast"), 2);

        let batches = writer.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0].records[0].measurement, "fast.out");
        assert_eq!(batches[1].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_in_flight_pass() {
        let source = overlapping_source();
        let writer = Arc::new(RecordingWriter::new());
        let pipeline = pipeline(
            source,
            instance_catalog(&["slow", "fast"]),
            writer.clone(),
            long_pass_schedule(OverlapPolicy::Skip),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = pipeline.start(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(writer.batches().len(), 1);
        assert_eq!(writer.batches()[0].len(), 2);
    }
}
