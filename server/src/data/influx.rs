//! InfluxDB write client
//!
//! Serializes a batch to line protocol and sends it to the InfluxDB 1.x
//! `/write` endpoint in a single request.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::config::InfluxConfig;
use crate::core::constants::USER_AGENT_PREFIX;
use crate::data::error::DataError;
use crate::data::traits::PointWriter;
use crate::data::types::{Batch, FieldValue, OutputRecord};
use crate::utils::string::{ERROR_BODY_MAX_LENGTH, truncate_preview};

/// Field key every record is written under
const FIELD_KEY: &str = "value";

pub struct InfluxClient {
    http: reqwest::Client,
    write_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("{}/{}", USER_AGENT_PREFIX, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            write_url: format!("{}/write", config.url.trim_end_matches('/')),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl PointWriter for InfluxClient {
    async fn write(&self, batch: &Batch) -> Result<usize, DataError> {
        if batch.is_empty() {
            tracing::debug!(database = %batch.database, "Empty batch, nothing to write");
            return Ok(0);
        }

        let lines = encode_lines(batch);
        if lines.is_empty() {
            tracing::warn!(
                database = %batch.database,
                records = batch.len(),
                "No encodable records in batch, nothing sent"
            );
            return Ok(0);
        }
        let points = lines.len();
        let body = lines.join("\n");

        let mut request = self.http.post(&self.write_url).query(&[
            ("db", batch.database.as_str()),
            ("rp", batch.retention_policy.as_str()),
            ("precision", "s"),
        ]);
        if let Some(ref username) = self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let resp = request.body(body).send().await.map_err(|e| {
            DataError::write_failure(&batch.database, format!("Request failed: {}", e))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DataError::write_failure(
                &batch.database,
                format!(
                    "HTTP {}: {}",
                    status,
                    truncate_preview(&body, ERROR_BODY_MAX_LENGTH)
                ),
            ));
        }

        Ok(points)
    }
}

// ============================================================================
// LINE PROTOCOL
// ============================================================================

/// Encode a batch as newline-separated line protocol.
///
/// Records with non-finite float values are dropped since the protocol cannot
/// represent them.
pub fn encode_batch(batch: &Batch) -> String {
    encode_lines(batch).join("\n")
}

fn encode_lines(batch: &Batch) -> Vec<String> {
    batch
        .records
        .iter()
        .filter_map(|record| {
            let line = encode_record(record);
            if line.is_none() {
                tracing::warn!(
                    measurement = %record.measurement,
                    timestamp = record.timestamp_seconds,
                    "Dropping record with non-finite value"
                );
            }
            line
        })
        .collect()
}

/// Encode a single record: `measurement[,tag=value...] value=<v> <ts>`.
///
/// Tags are emitted in key order. Tags with empty values are omitted.
pub fn encode_record(record: &OutputRecord) -> Option<String> {
    let field = match record.value {
        FieldValue::Integer(i) => format!("{}i", i),
        _ if !record.value.is_finite() => return None,
        FieldValue::Float(f) => format!("{}", f),
    };

    let mut line = escape(&record.measurement, &[',', ' ']);
    for (key, value) in &record.tags {
        if value.is_empty() {
            continue;
        }
        let _ = write!(
            line,
            ",{}={}",
            escape(key, &[',', '=', ' ']),
            escape(value, &[',', '=', ' '])
        );
    }
    let _ = write!(line, " {}={} {}", FIELD_KEY, field, record.timestamp_seconds);
    Some(line)
}

fn escape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
