//! Core error types for marketbars.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to [`StoreError`] by the storage
//! layer. Each variant is classified via [`Error::retry_class`], which
//! determines how the adapter HTTP loop handles it; the retrieval engine
//! itself recovers only [`Error::CredentialStale`], and only under AUTO
//! provider selection.

use std::path::PathBuf;

use thiserror::Error;

use crate::bars::ProviderId;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed symbol, reversed or out-of-range date interval, or an
    /// unsupported frequency. Raised locally before any store or network
    /// activity; never retried. The message aggregates every violation found.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The selected provider requires a credential that is absent from the
    /// credential bundle.
    #[error("missing credential '{field}' (expected in {})", .path.display())]
    CredentialMissing { field: &'static str, path: PathBuf },

    /// Cookie-session authentication was rejected upstream (HTTP 401/403).
    /// Under AUTO selection this triggers fallback to the token provider;
    /// under explicit selection it surfaces to the caller.
    #[error("{provider} session rejected upstream; re-run the cookie capture tool")]
    CredentialStale { provider: ProviderId },

    /// Non-transient upstream failure, or a transient one that survived the
    /// retry budget. The message carries a redacted response body.
    #[error("{provider} request failed{}: {message}", fmt_status(.status))]
    Provider {
        provider: ProviderId,
        status: Option<u16>,
        message: String,
    },

    /// The upstream response body could not be decoded into the expected
    /// shape.
    #[error("{provider} returned an unparseable response: {message}")]
    Parse {
        provider: ProviderId,
        message: String,
    },

    /// Bar store failure, converted from the storage layer.
    #[error("bar store error: {0}")]
    Store(#[from] StoreError),

    /// The caller's cancellation token fired between sub-intervals.
    #[error("request cancelled")]
    Cancelled,

    /// The per-request HTTP deadline elapsed.
    #[error("{provider} request timed out")]
    Timeout { provider: ProviderId },
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

/// Classification used by the adapter HTTP loop.
///
/// Transient upstream statuses (429/5xx) and timeouts are retried with
/// bounded exponential backoff inside the adapter; everything else surfaces
/// immediately.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal for the current attempt chain; surface to the engine.
    Never,
    /// Retry the same request with exponential backoff.
    WithBackoff,
}

impl Error {
    /// Returns the retry classification for this error.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Provider {
                status: Some(code), ..
            } if matches!(code, 429 | 500 | 502 | 503 | 504) => RetryClass::WithBackoff,
            Self::Timeout { .. } => RetryClass::WithBackoff,
            _ => RetryClass::Never,
        }
    }
}

/// Database-agnostic error type for bar store operations.
///
/// The storage crate converts Diesel/r2d2 failures into these variants at the
/// boundary so the core stays free of storage dependencies.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file failed integrity checks at open or during an operation.
    #[error("store at {} failed integrity checks ({detail}); delete the file to rebuild the cache", .path.display())]
    Corruption { path: PathBuf, detail: String },

    /// A write transaction lost a lock race. Transient; the storage layer
    /// retries once before surfacing this.
    #[error("write conflict: {0}")]
    WriteConflict(String),

    /// The filesystem holding the store is out of space. Fatal.
    #[error("disk full: {0}")]
    DiskFull(String),

    /// Failed to open the store file or obtain a pooled connection.
    #[error("failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// A query failed to execute.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("record not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_retry_with_backoff() {
        for code in [429u16, 500, 502, 503, 504] {
            let err = Error::Provider {
                provider: ProviderId::Tiingo,
                status: Some(code),
                message: "upstream hiccup".to_string(),
            };
            assert_eq!(err.retry_class(), RetryClass::WithBackoff, "status {code}");
        }
    }

    #[test]
    fn non_transient_statuses_never_retry() {
        for code in [400u16, 401, 403, 404, 422] {
            let err = Error::Provider {
                provider: ProviderId::Barchart,
                status: Some(code),
                message: "rejected".to_string(),
            };
            assert_eq!(err.retry_class(), RetryClass::Never, "status {code}");
        }
    }

    #[test]
    fn timeout_retries_with_backoff() {
        let err = Error::Timeout {
            provider: ProviderId::Tiingo,
        };
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn local_errors_never_retry() {
        assert_eq!(
            Error::InvalidInput("bad symbol".to_string()).retry_class(),
            RetryClass::Never
        );
        assert_eq!(
            Error::CredentialStale {
                provider: ProviderId::Barchart
            }
            .retry_class(),
            RetryClass::Never
        );
        assert_eq!(Error::Cancelled.retry_class(), RetryClass::Never);
    }

    #[test]
    fn provider_error_display_includes_status() {
        let err = Error::Provider {
            provider: ProviderId::Tiingo,
            status: Some(404),
            message: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "tiingo request failed (HTTP 404): not found"
        );

        let err = Error::Provider {
            provider: ProviderId::Tiingo,
            status: None,
            message: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "tiingo request failed: connection reset");
    }

    #[test]
    fn corruption_display_carries_recovery_hint() {
        let err = StoreError::Corruption {
            path: PathBuf::from("/tmp/prices.db"),
            detail: "malformed page".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/prices.db"));
        assert!(msg.contains("delete the file"));
    }
}
