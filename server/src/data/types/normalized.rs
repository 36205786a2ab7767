//! Normalized records ready for the time-series store

use std::collections::BTreeMap;

/// Field value of an output record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
}

impl FieldValue {
    /// Whether the store can represent this value
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Integer(_) => true,
            FieldValue::Float(f) => f.is_finite(),
        }
    }
}

/// One tagged point destined for the store
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub measurement: String,
    pub timestamp_seconds: i64,
    pub value: FieldValue,
    /// Ordered by key; keys are unique
    pub tags: BTreeMap<String, String>,
}

/// A single write unit: all records of one pass plus their destination
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub database: String,
    pub retention_policy: String,
    pub records: Vec<OutputRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
