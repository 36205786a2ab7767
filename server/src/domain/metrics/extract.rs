//! Series extraction
//!
//! Reduces one series to at most one output record: keeps the latest point,
//! coerces its value and derives tags according to the mapping's
//! classification.

use std::collections::BTreeMap;

use crate::data::types::{FieldValue, OutputRecord, Point, TimeSeries};

use super::catalog::{Classification, MetricMapping};

/// Label keys read from the monitoring backend
pub mod labels {
    pub const INSTANCE_NAME: &str = "instance_name";
    pub const DEVICE_NAME: &str = "device_name";
    pub const POD_NAME: &str = "pod_name";
    pub const CONTAINER_NAME: &str = "container_name";
    pub const MEMORY_TYPE: &str = "memory_type";
}

/// Tag keys written to the store
pub mod tags {
    pub const INSTANCE: &str = "instance";
    pub const POD: &str = "pod";
    pub const CONTAINER: &str = "container";
    pub const MEMORY_TYPE: &str = "memory_type";
}

/// Instance measurements containing this marker carry integer counts
const OPS_COUNT_MARKER: &str = "ops_count";

/// Extract the record for one series, or `None` if the series is skipped
pub fn extract_series(mapping: &MetricMapping, series: &TimeSeries) -> Option<OutputRecord> {
    match mapping.classification {
        Classification::Instance => extract_instance(mapping, series),
        Classification::Memory => extract_memory(mapping, series),
        Classification::Cpu => extract_cpu(mapping, series),
    }
}

/// Point with the greatest interval end. Ties resolve to the last such point.
pub fn latest_point(series: &TimeSeries) -> Option<&Point> {
    series.points.iter().max_by_key(|p| p.end_seconds)
}

fn extract_instance(mapping: &MetricMapping, series: &TimeSeries) -> Option<OutputRecord> {
    let device_name = series.resource_label(labels::DEVICE_NAME);
    let Some(instance_name) = series.resource_label(labels::INSTANCE_NAME) else {
        tracing::debug!(
            metric = %mapping.source_metric_id,
            device = device_name.unwrap_or_default(),
            "Skipping series without instance name"
        );
        return None;
    };

    // A differing device name is a secondary disk attached to the instance
    if device_name != Some(instance_name) {
        tracing::debug!(
            metric = %mapping.source_metric_id,
            instance = instance_name,
            device = device_name.unwrap_or_default(),
            "Skipping device"
        );
        return None;
    }

    let point = latest_point(series)?;
    let value = if mapping.target_measurement.contains(OPS_COUNT_MARKER) {
        FieldValue::Integer(point.value.as_i64())
    } else {
        FieldValue::Float(point.value.as_f64())
    };

    let mut tag_set = BTreeMap::new();
    insert_tag(&mut tag_set, tags::INSTANCE, Some(instance_name));

    Some(build_record(mapping, point, value, tag_set))
}

fn extract_memory(mapping: &MetricMapping, series: &TimeSeries) -> Option<OutputRecord> {
    let point = latest_point(series)?;

    let mut tag_set = container_tags(series);
    tag_set.insert(
        tags::MEMORY_TYPE.to_string(),
        series
            .metric_label(labels::MEMORY_TYPE)
            .unwrap_or_default()
            .to_string(),
    );

    let value = FieldValue::Integer(point.value.as_i64());
    Some(build_record(mapping, point, value, tag_set))
}

fn extract_cpu(mapping: &MetricMapping, series: &TimeSeries) -> Option<OutputRecord> {
    let point = latest_point(series)?;
    let value = FieldValue::Float(point.value.as_f64());
    Some(build_record(mapping, point, value, container_tags(series)))
}

/// `pod` and `container` tags from resource labels (absent labels are omitted)
fn container_tags(series: &TimeSeries) -> BTreeMap<String, String> {
    let mut tag_set = BTreeMap::new();
    insert_tag(
        &mut tag_set,
        tags::CONTAINER,
        series.resource_label(labels::CONTAINER_NAME),
    );
    insert_tag(&mut tag_set, tags::POD, series.resource_label(labels::POD_NAME));
    tag_set
}

fn insert_tag(tag_set: &mut BTreeMap<String, String>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        tag_set.insert(key.to_string(), value.to_string());
    }
}

fn build_record(
    mapping: &MetricMapping,
    point: &Point,
    value: FieldValue,
    tags: BTreeMap<String, String>,
) -> OutputRecord {
    OutputRecord {
        measurement: mapping.target_measurement.clone(),
        timestamp_seconds: point.end_seconds,
        value,
        tags,
    }
}
