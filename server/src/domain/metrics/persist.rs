//! Metric persistence (single write per pass, no retry)

use crate::data::error::DataError;
use crate::data::traits::PointWriter;
use crate::data::types::Batch;

/// Hand a finalized batch to the store and return the points it accepted.
/// Empty batches are not sent.
pub async fn persist_batch(batch: &Batch, writer: &dyn PointWriter) -> Result<usize, DataError> {
    let record_count = batch.len();
    if record_count == 0 {
        tracing::debug!(database = %batch.database, "No records to write");
        return Ok(0);
    }

    match writer.write(batch).await {
        Ok(points) => {
            tracing::info!(
                records = record_count,
                points,
                database = %batch.database,
                retention_policy = %batch.retention_policy,
                "Wrote metrics batch"
            );
            Ok(points)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                kind = e.kind(),
                records = record_count,
                database = %batch.database,
                "Failed to write metrics batch"
            );
            Err(e)
        }
    }
}
