//! Metric catalog
//!
//! Static table translating source metric types (monitoring backend namespace)
//! into target measurement names and the classification that selects the
//! extraction rules.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rule-set selector for tag derivation and value coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// VM-level metrics keyed by instance
    Instance,
    /// Container memory, keyed by pod/container/memory type
    Memory,
    /// Container CPU, keyed by pod/container
    Cpu,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Memory => "memory",
            Self::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog row
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MetricMapping {
    #[serde(rename = "source")]
    pub source_metric_id: String,
    #[serde(rename = "target")]
    pub target_measurement: String,
    pub classification: Classification,
}

impl MetricMapping {
    pub fn new(
        source_metric_id: impl Into<String>,
        target_measurement: impl Into<String>,
        classification: Classification,
    ) -> Self {
        Self {
            source_metric_id: source_metric_id.into(),
            target_measurement: target_measurement.into(),
            classification,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate source metric in catalog: {0}")]
    DuplicateSource(String),

    #[error("Catalog entry has an empty {0}")]
    EmptyField(&'static str),
}

/// Mappings collected by default
const STANDARD_MAPPINGS: &[(&str, &str, Classification)] = &[
    (
        "compute.googleapis.com/instance/disk/read_ops_count",
        "iops.read",
        Classification::Instance,
    ),
    (
        "compute.googleapis.com/instance/disk/write_ops_count",
        "iops.write",
        Classification::Instance,
    ),
    (
        "kubernetes.io/container/memory/used_bytes",
        "memory.bytes",
        Classification::Memory,
    ),
    (
        "compute.googleapis.com/instance/cpu/utilization",
        "cpu.percent",
        Classification::Instance,
    ),
];

/// Immutable set of mappings; source metric ids are unique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCatalog {
    entries: Vec<MetricMapping>,
}

impl MetricCatalog {
    /// Build a catalog, rejecting duplicate source metric ids and blank names
    pub fn new(entries: Vec<MetricMapping>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.source_metric_id.trim().is_empty() {
                return Err(CatalogError::EmptyField("source"));
            }
            if entry.target_measurement.trim().is_empty() {
                return Err(CatalogError::EmptyField("target"));
            }
            if !seen.insert(entry.source_metric_id.as_str()) {
                return Err(CatalogError::DuplicateSource(
                    entry.source_metric_id.clone(),
                ));
            }
        }
        Ok(Self { entries })
    }

    /// The built-in catalog
    pub fn standard() -> Self {
        Self {
            entries: Self::standard_mappings(),
        }
    }

    pub fn standard_mappings() -> Vec<MetricMapping> {
        STANDARD_MAPPINGS
            .iter()
            .map(|(source, target, classification)| {
                MetricMapping::new(*source, *target, *classification)
            })
            .collect()
    }

    pub fn entries(&self) -> &[MetricMapping] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
