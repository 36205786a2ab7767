//! Startup banner, catalog and pass report display

use super::config::AppConfig;
use super::constants::APP_NAME;
use crate::domain::metrics::{MetricCatalog, PassReport, WriteOutcome};
use crate::utils::time::unix_seconds_to_rfc3339;

// Label width: "Retention policy:" is 17 chars, pad to 19 for alignment
const W: usize = 19;

/// Print the startup banner with the effective source, target and schedule
pub fn print_banner(config: &AppConfig) {
    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} \x1b[90m({})\x1b[0m",
        "Project:", config.monitoring.project_id, config.monitoring.endpoint
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "InfluxDB:", config.influx.url
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Database:", config.influx.database
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Retention policy:", config.influx.retention_policy
    );
    println!(
        "  \x1b[35m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m every {}s, lookback {}m, overlap {}",
        "Schedule:",
        config.schedule.interval_secs,
        config.schedule.lookback_minutes,
        config.schedule.overlap
    );
    println!(
        "  \x1b[90m➜  {:<W$} {} metrics\x1b[0m",
        "Catalog:",
        config.catalog.len()
    );

    println!();
}

/// Render the catalog as an aligned table
pub fn format_catalog(catalog: &MetricCatalog) -> String {
    let source_width = catalog
        .entries()
        .iter()
        .map(|m| m.source_metric_id.len())
        .chain(std::iter::once("SOURCE".len()))
        .max()
        .unwrap_or_default();
    let target_width = catalog
        .entries()
        .iter()
        .map(|m| m.target_measurement.len())
        .chain(std::iter::once("TARGET".len()))
        .max()
        .unwrap_or_default();

    let mut out = format!(
        "{:<source_width$}  {:<target_width$}  CLASSIFICATION\n",
        "SOURCE", "TARGET"
    );
    for mapping in catalog.entries() {
        out.push_str(&format!(
            "{:<source_width$}  {:<target_width$}  {}\n",
            mapping.source_metric_id, mapping.target_measurement, mapping.classification
        ));
    }
    out
}

/// Render a one-off pass report
pub fn format_report(report: &PassReport) -> String {
    let write = match report.write {
        WriteOutcome::Written => "written",
        WriteOutcome::Empty => "nothing to write",
        WriteOutcome::Failed => "FAILED",
    };
    let partial = if report.timed_out {
        " (partial, pass timed out)"
    } else {
        ""
    };

    let mut out = format!(
        "Window:   {} .. {}\nEntries:  {} ok, {} failed, {} busy\nRecords:  {}\nWrite:    {}{}\n",
        unix_seconds_to_rfc3339(report.window.start_seconds),
        unix_seconds_to_rfc3339(report.window.end_seconds),
        report.entries_ok,
        report.failed.len(),
        report.busy.len(),
        report.records,
        write,
        partial
    );
    for failure in &report.failed {
        out.push_str(&format!(
            "  failed: {} ({})\n",
            failure.source_metric_id, failure.kind
        ));
    }
    out
}
