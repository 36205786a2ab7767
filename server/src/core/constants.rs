// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths, identifiers and the binary)
pub const APP_NAME: &str = "metricbridge";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".metricbridge";

/// User agent prefix for outbound HTTP requests
pub const USER_AGENT_PREFIX: &str = "metricbridge";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "metricbridge.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "METRICBRIDGE_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "METRICBRIDGE_LOG";

/// Filter used when neither `METRICBRIDGE_LOG` nor `RUST_LOG` is set
pub const DEFAULT_LOG_FILTER: &str = "info,metricbridge=info";

// =============================================================================
// Monitoring Backend
// =============================================================================

pub const ENV_PROJECT_ID: &str = "METRICBRIDGE_PROJECT_ID";
pub const ENV_MONITORING_ENDPOINT: &str = "METRICBRIDGE_MONITORING_ENDPOINT";

/// Cloud Monitoring REST endpoint
pub const DEFAULT_MONITORING_ENDPOINT: &str = "https://monitoring.googleapis.com";

/// OAuth scope for read-only monitoring queries
pub const MONITORING_READ_SCOPE: &str = "https://www.googleapis.com/auth/monitoring.read";

/// Per-request timeout for monitoring queries
pub const DEFAULT_MONITORING_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Time-Series Store
// =============================================================================

pub const ENV_INFLUX_URL: &str = "METRICBRIDGE_INFLUX_URL";
pub const ENV_INFLUX_USERNAME: &str = "METRICBRIDGE_INFLUX_USERNAME";
pub const ENV_INFLUX_PASSWORD: &str = "METRICBRIDGE_INFLUX_PASSWORD";
pub const ENV_INFLUX_DATABASE: &str = "METRICBRIDGE_INFLUX_DATABASE";
pub const ENV_INFLUX_RETENTION_POLICY: &str = "METRICBRIDGE_INFLUX_RETENTION_POLICY";

pub const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";
pub const DEFAULT_INFLUX_DATABASE: &str = "misows";
pub const DEFAULT_RETENTION_POLICY: &str = "defaultPolicy";

/// Per-request timeout for batch writes
pub const DEFAULT_INFLUX_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Schedule
// =============================================================================

pub const ENV_INTERVAL_SECS: &str = "METRICBRIDGE_INTERVAL_SECS";
pub const ENV_LOOKBACK_MINUTES: &str = "METRICBRIDGE_LOOKBACK_MINUTES";
pub const ENV_PASS_TIMEOUT_SECS: &str = "METRICBRIDGE_PASS_TIMEOUT_SECS";
pub const ENV_OVERLAP: &str = "METRICBRIDGE_OVERLAP";

/// Cadence between pass starts
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Query window length ending at the pass start
pub const DEFAULT_LOOKBACK_MINUTES: u64 = 70;

/// Longest accepted lookback: six weeks, the backend's retention for most metrics
pub const MAX_LOOKBACK_MINUTES: u64 = 6 * 7 * 24 * 60;

/// Upper bound on the collection phase of a pass
pub const DEFAULT_PASS_TIMEOUT_SECS: u64 = 50;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout (wait for in-flight passes)
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 120;
