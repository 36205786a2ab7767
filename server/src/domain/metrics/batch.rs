//! Batch accumulation for a single pass

use std::mem;

use crate::data::types::{Batch, OutputRecord};

/// Collects records for one pass under a fixed database and retention policy.
///
/// `finalize` hands the records off and leaves the accumulator empty so it
/// can be reused for the next pass.
#[derive(Debug)]
pub struct BatchAccumulator {
    database: String,
    retention_policy: String,
    records: Vec<OutputRecord>,
}

impl BatchAccumulator {
    pub fn new(database: impl Into<String>, retention_policy: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            retention_policy: retention_policy.into(),
            records: Vec::new(),
        }
    }

    pub fn append(&mut self, record: OutputRecord) {
        tracing::trace!(
            measurement = %record.measurement,
            timestamp = record.timestamp_seconds,
            "Appending record"
        );
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = OutputRecord>) {
        for record in records {
            self.append(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take the accumulated records as a batch; an empty batch is valid
    pub fn finalize(&mut self) -> Batch {
        Batch {
            database: self.database.clone(),
            retention_policy: self.retention_policy.clone(),
            records: mem::take(&mut self.records),
        }
    }
}
