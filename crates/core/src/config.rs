//! Library configuration.
//!
//! The recognized options form a closed set, built once at initialization and
//! threaded through the engine explicitly; there are no process-global
//! settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP request timeout applied to every upstream call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Total attempts (initial + retries) for transient upstream failures.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for the adapter retry backoff.
pub const DEFAULT_RETRY_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Ceiling for the adapter retry backoff.
pub const DEFAULT_RETRY_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Barchart pacing: gap between calls for different symbols.
pub const DEFAULT_BARCHART_INTER_REQUEST_DELAY: Duration = Duration::from_secs(2);

/// Barchart pacing: a long pause is inserted after this many distinct-symbol
/// calls.
pub const DEFAULT_BARCHART_LONG_PAUSE_EVERY: u32 = 10;

/// Barchart pacing: length of the periodic long pause.
pub const DEFAULT_BARCHART_LONG_PAUSE: Duration = Duration::from_secs(30);

/// Tiingo pacing: minimum spacing between consecutive calls. The free tier
/// documents 50 requests/hour; paid tiers are faster, so this stays
/// configurable rather than hardcoded.
pub const DEFAULT_TIINGO_MIN_REQUEST_SPACING: Duration = Duration::from_millis(500);

/// Tiingo quota: emit a soft warning once per-minute call volume crosses
/// this.
pub const DEFAULT_TIINGO_RPM_WARN_THRESHOLD: u32 = 45;

/// Configuration for the retrieval engine and its collaborators.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path of the SQLite bar store file.
    pub db_path: PathBuf,
    /// Directory holding `credentials.json` and `barchart_cookies.json`.
    pub config_dir: PathBuf,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Total attempts for transient upstream failures.
    pub retry_attempts: u32,
    /// Exponential backoff base between retry attempts.
    pub retry_backoff_base: Duration,
    /// Exponential backoff ceiling.
    pub retry_backoff_cap: Duration,
    /// Gap between Barchart calls for different symbols.
    pub barchart_inter_request_delay: Duration,
    /// Number of distinct-symbol Barchart calls between long pauses.
    pub barchart_long_pause_every: u32,
    /// Length of the periodic Barchart long pause.
    pub barchart_long_pause: Duration,
    /// Minimum spacing between consecutive Tiingo calls.
    pub tiingo_min_request_spacing: Duration,
    /// Per-minute Tiingo call count that triggers a soft quota warning.
    pub tiingo_rpm_warn_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = default_config_dir();
        Self {
            db_path: config_dir.join("prices.db"),
            config_dir,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff_base: DEFAULT_RETRY_BACKOFF_BASE,
            retry_backoff_cap: DEFAULT_RETRY_BACKOFF_CAP,
            barchart_inter_request_delay: DEFAULT_BARCHART_INTER_REQUEST_DELAY,
            barchart_long_pause_every: DEFAULT_BARCHART_LONG_PAUSE_EVERY,
            barchart_long_pause: DEFAULT_BARCHART_LONG_PAUSE,
            tiingo_min_request_spacing: DEFAULT_TIINGO_MIN_REQUEST_SPACING,
            tiingo_rpm_warn_threshold: DEFAULT_TIINGO_RPM_WARN_THRESHOLD,
        }
    }
}

impl Config {
    /// Configuration rooted at a custom directory, with the store file placed
    /// alongside the credential files.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            db_path: config_dir.join("prices.db"),
            config_dir,
            ..Self::default()
        }
    }
}

/// `~/.config/market-data` on Linux, the platform equivalent elsewhere.
fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("market-data")
}
