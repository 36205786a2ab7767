//! Cloud Monitoring query client
//!
//! Lists time series through the Monitoring v3 REST API
//! (`projects.timeSeries.list`), following `nextPageToken` lazily as the
//! returned stream is polled.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use gcp_auth::TokenProvider;
use serde::Deserialize;

use crate::core::config::MonitoringConfig;
use crate::core::constants::{MONITORING_READ_SCOPE, USER_AGENT_PREFIX};
use crate::data::error::DataError;
use crate::data::traits::{MonitoringSource, SeriesStream};
use crate::data::types::{Point, PointValue, TimeSeries, TimeWindow};
use crate::utils::string::{ERROR_BODY_MAX_LENGTH, truncate_preview};
use crate::utils::time::{rfc3339_to_unix_seconds, unix_seconds_to_rfc3339};

/// Where bearer tokens come from
#[derive(Clone)]
pub enum TokenSource {
    /// Application default credentials (metadata server, service account file, gcloud)
    Gcp(Arc<dyn TokenProvider>),
    /// Fixed token, used against emulators and in tests
    Static(String),
}

impl TokenSource {
    /// Detect application default credentials
    pub async fn detect() -> Result<Self, DataError> {
        let provider = gcp_auth::provider().await?;
        Ok(Self::Gcp(provider))
    }

    async fn bearer(&self) -> Result<String, DataError> {
        match self {
            Self::Gcp(provider) => {
                let token = provider.token(&[MONITORING_READ_SCOPE]).await?;
                Ok(token.as_str().to_string())
            }
            Self::Static(token) => Ok(token.clone()),
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gcp(_) => f.write_str("TokenSource::Gcp"),
            Self::Static(_) => f.write_str("TokenSource::Static([REDACTED])"),
        }
    }
}

/// Monitoring v3 REST client bound to one project
#[derive(Debug)]
pub struct CloudMonitoringClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: TokenSource,
}

impl CloudMonitoringClient {
    pub fn new(config: &MonitoringConfig, tokens: TokenSource) -> Result<Self, DataError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("{}/{}", USER_AGENT_PREFIX, env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            tokens,
        })
    }

    fn series_url(&self) -> String {
        format!(
            "{}/v3/projects/{}/timeSeries",
            self.endpoint, self.project_id
        )
    }

    async fn fetch_page(
        &self,
        metric_type: &str,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> Result<ListTimeSeriesResponse, DataError> {
        let token = self
            .tokens
            .bearer()
            .await
            .map_err(|e| DataError::query_failure(metric_type, e.to_string()))?;

        let mut query = vec![
            ("filter", format!("metric.type=\"{}\"", metric_type)),
            (
                "interval.startTime",
                unix_seconds_to_rfc3339(window.start_seconds),
            ),
            ("interval.endTime", unix_seconds_to_rfc3339(window.end_seconds)),
            ("view", "FULL".to_string()),
        ];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let resp = self
            .http
            .get(self.series_url())
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| DataError::query_failure(metric_type, format!("Request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DataError::query_failure(
                metric_type,
                format!(
                    "HTTP {}: {}",
                    status,
                    truncate_preview(&body, ERROR_BODY_MAX_LENGTH)
                ),
            ));
        }

        resp.json::<ListTimeSeriesResponse>()
            .await
            .map_err(|e| DataError::query_failure(metric_type, format!("Parse failed: {}", e)))
    }
}

impl MonitoringSource for CloudMonitoringClient {
    fn list_time_series<'a>(
        &'a self,
        metric_type: &'a str,
        window: TimeWindow,
    ) -> SeriesStream<'a> {
        Box::pin(try_stream! {
            let mut page_token: Option<String> = None;
            let mut pages = 0u32;

            loop {
                let page = self
                    .fetch_page(metric_type, &window, page_token.as_deref())
                    .await?;
                pages += 1;

                for series in page.time_series {
                    yield series.into_series(metric_type);
                }

                match page.next_page_token.filter(|t| !t.is_empty()) {
                    Some(next) => page_token = Some(next),
                    None => break,
                }
            }

            tracing::trace!(metric = %metric_type, pages, "Listed time series");
        })
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<WireTimeSeries>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireTimeSeries {
    #[serde(default)]
    metric: WireLabels,
    #[serde(default)]
    resource: WireLabels,
    #[serde(default)]
    points: Vec<WirePoint>,
}

/// Shared shape of `metric` and `resource` (the `type` field is ignored)
#[derive(Debug, Default, Deserialize)]
struct WireLabels {
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    interval: WireInterval,
    value: WireTypedValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInterval {
    end_time: String,
}

/// `TypedValue` union. Only numeric and boolean variants are carried over.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTypedValue {
    #[serde(default)]
    int64_value: Option<WireInt64>,
    #[serde(default)]
    double_value: Option<f64>,
    #[serde(default)]
    bool_value: Option<bool>,
}

/// int64 is encoded as a JSON string by the REST API; accept bare numbers too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireInt64 {
    Number(i64),
    Text(String),
}

impl WireTypedValue {
    fn to_point_value(&self) -> Option<PointValue> {
        if let Some(ref int) = self.int64_value {
            return match int {
                WireInt64::Number(i) => Some(PointValue::Int64(*i)),
                WireInt64::Text(s) => s.parse().ok().map(PointValue::Int64),
            };
        }
        if let Some(d) = self.double_value {
            return Some(PointValue::Double(d));
        }
        self.bool_value.map(|b| PointValue::Int64(i64::from(b)))
    }
}

impl WireTimeSeries {
    fn into_series(self, metric_type: &str) -> TimeSeries {
        let points = self
            .points
            .into_iter()
            .filter_map(|p| {
                let point = p.to_point();
                if point.is_none() {
                    tracing::debug!(
                        metric = %metric_type,
                        end_time = %p.interval.end_time,
                        "Dropping point with unsupported value or timestamp"
                    );
                }
                point
            })
            .collect();

        TimeSeries {
            metric_labels: self.metric.labels,
            resource_labels: self.resource.labels,
            points,
        }
    }
}

impl WirePoint {
    fn to_point(&self) -> Option<Point> {
        let end_seconds = rfc3339_to_unix_seconds(&self.interval.end_time)?;
        let value = self.value.to_point_value()?;
        Some(Point::new(end_seconds, value))
    }
}
