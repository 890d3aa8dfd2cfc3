//! Credential bundle consumption.
//!
//! The bundle is produced by external collaborators: `credentials.json` is
//! user-maintained, and `barchart_cookies.json` is replaced atomically by the
//! cookie capture tool. This module only reads them. Each file is loaded in a
//! single open/read so a mid-replace file is never observed half-written.
//!
//! Secret values never reach the log: the `Debug` impls redact them, and
//! [`CredentialBundle::secret_values`] feeds the response-body scrubber.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::Deserialize;

/// File name of the user-maintained credential file.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// File name of the capture-tool-produced cookie session file.
pub const COOKIE_FILE: &str = "barchart_cookies.json";

/// Cookie sessions older than this log a staleness warning. Age is a warning,
/// not a veto - only an upstream 401/403 proves the session dead.
pub const SESSION_FRESH_HOURS: i64 = 24;

/// Contents of `credentials.json`. All fields optional; presence is checked
/// only when the corresponding provider is actually invoked.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    pub tiingo_api_key: Option<String>,
    /// Consumed by the external cookie capture tool, not by this library.
    pub barchart_username: Option<String>,
    /// Names the environment variable the capture tool reads the password
    /// from. The password itself never appears in any file.
    pub barchart_password_env: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tiingo_api_key", &self.tiingo_api_key.as_ref().map(|_| "[redacted]"))
            .field("barchart_username", &self.barchart_username)
            .field("barchart_password_env", &self.barchart_password_env)
            .finish()
    }
}

/// Browser-session bundle from `barchart_cookies.json`.
#[derive(Clone, Deserialize)]
pub struct CookieSession {
    pub cookie_string: String,
    pub xsrf_token: String,
    pub user_agent: String,
    pub captured_at: DateTime<Utc>,
}

impl CookieSession {
    /// Age of the session relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// Whether the session was captured within the freshness window.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now) <= Duration::hours(SESSION_FRESH_HOURS)
    }
}

impl fmt::Debug for CookieSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSession")
            .field("cookie_string", &"[redacted]")
            .field("xsrf_token", &"[redacted]")
            .field("user_agent", &self.user_agent)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Immutable per-request snapshot of both credential files.
///
/// Re-read at the top of every `get_prices` call so a refreshed cookie file
/// takes effect on the next request without restarting the process.
#[derive(Clone, Debug, Default)]
pub struct CredentialBundle {
    pub credentials: Credentials,
    pub cookie_session: Option<CookieSession>,
    config_dir: PathBuf,
}

impl CredentialBundle {
    /// Load a snapshot from `config_dir`. Missing files yield empty fields,
    /// not errors; unparseable files are logged and treated as absent.
    pub fn load(config_dir: &Path) -> Self {
        let credentials = read_json::<Credentials>(&config_dir.join(CREDENTIALS_FILE))
            .unwrap_or_default();
        let cookie_session = read_json::<CookieSession>(&config_dir.join(COOKIE_FILE));

        if let Some(session) = &cookie_session {
            let age_hours = session.age(Utc::now()).num_hours();
            if age_hours > SESSION_FRESH_HOURS {
                warn!(
                    "barchart cookie session is {} hours old (captured {}); \
                     it may be rejected upstream",
                    age_hours, session.captured_at
                );
            }
        }

        Self {
            credentials,
            cookie_session,
            config_dir: config_dir.to_path_buf(),
        }
    }

    /// Build a bundle directly from parts. Used by tests and embedders that
    /// manage credentials themselves.
    pub fn from_parts(
        credentials: Credentials,
        cookie_session: Option<CookieSession>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            credentials,
            cookie_session,
            config_dir: config_dir.into(),
        }
    }

    /// Path of the credential file, for error messages.
    pub fn credentials_path(&self) -> PathBuf {
        self.config_dir.join(CREDENTIALS_FILE)
    }

    /// Path of the cookie session file, for error messages.
    pub fn cookie_path(&self) -> PathBuf {
        self.config_dir.join(COOKIE_FILE)
    }

    /// Every secret string in the bundle, for scrubbing response bodies
    /// before they are embedded in errors or logs.
    pub fn secret_values(&self) -> Vec<&str> {
        let mut values = Vec::new();
        if let Some(key) = &self.credentials.tiingo_api_key {
            values.push(key.as_str());
        }
        if let Some(session) = &self.cookie_session {
            values.push(session.cookie_string.as_str());
            values.push(session.xsrf_token.as_str());
        }
        values.retain(|v| !v.is_empty());
        values
    }
}

/// Read and parse a JSON file in one shot. Returns `None` if the file is
/// missing or malformed.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("credential file {} not present", path.display());
            return None;
        }
        Err(e) => {
            warn!("failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("failed to parse {}: {}", path.display(), e);
            None
        }
    }
}
