//! Unified error type for the data layer
//!
//! Wraps failures from the monitoring query client and the time-series store
//! write client while preserving which metric or database was involved.

use thiserror::Error;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Monitoring backend query failed (network, auth, malformed filter, bad response)
    #[error("Query failed for {metric}: {reason}")]
    QueryFailure { metric: String, reason: String },

    /// Time-series store write failed
    #[error("Write to {database} failed: {reason}")]
    WriteFailure { database: String, reason: String },

    /// Credential acquisition failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Client construction error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// Create a query failure for a source metric
    pub fn query_failure(metric: &str, reason: impl Into<String>) -> Self {
        Self::QueryFailure {
            metric: metric.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a write failure for a target database
    pub fn write_failure(database: &str, reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            database: database.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable error kind for structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QueryFailure { .. } => "query_failure",
            Self::WriteFailure { .. } => "write_failure",
            Self::Auth(_) => "auth",
            Self::Config(_) => "config",
        }
    }
}

impl From<gcp_auth::Error> for DataError {
    fn from(e: gcp_auth::Error) -> Self {
        Self::Auth(e.to_string())
    }
}
