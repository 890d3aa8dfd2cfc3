//! Shared HTTP plumbing for provider adapters: bounded retry with
//! exponential backoff, and response-body redaction.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::sleep;

use crate::bars::ProviderId;
use crate::config::Config;
use crate::errors::{Error, Result, RetryClass};

/// Bodies embedded in errors are cut to this many characters.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Retry policy for one adapter, derived from [`Config`].
#[derive(Clone, Debug)]
pub(crate) struct HttpPolicy {
    /// Total attempts, initial call included.
    pub attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl HttpPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff_base: config.retry_backoff_base,
            backoff_cap: config.retry_backoff_cap,
        }
    }

    /// Delay before retry number `attempt` (1-based): base doubled per
    /// attempt, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }
}

/// Issue a request, retrying transient upstream failures (429/5xx, timeouts)
/// per the policy. Returns the response body on 2xx; otherwise a typed error
/// whose embedded body has been truncated and scrubbed of every secret in
/// `secrets`.
pub(crate) async fn send_with_retry<F>(
    provider: ProviderId,
    policy: &HttpPolicy,
    secrets: &[&str],
    build_request: F,
) -> Result<String>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let error = match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        return Err(Error::Provider {
                            provider,
                            status: Some(status.as_u16()),
                            message: format!("failed to read response body: {e}"),
                        })
                    }
                };

                if status.is_success() {
                    return Ok(body);
                }

                Error::Provider {
                    provider,
                    status: Some(status.as_u16()),
                    message: redact(&body, secrets),
                }
            }
            Err(e) if e.is_timeout() => Error::Timeout { provider },
            Err(e) => Error::Provider {
                provider,
                status: None,
                message: e.without_url().to_string(),
            },
        };

        if error.retry_class() == RetryClass::WithBackoff && attempt < policy.attempts {
            let delay = policy.backoff_delay(attempt);
            debug!(
                "{provider}: transient failure on attempt {attempt}/{}, retrying in {:?}: {error}",
                policy.attempts, delay
            );
            sleep(delay).await;
            continue;
        }

        if attempt > 1 {
            warn!("{provider}: giving up after {attempt} attempts");
        }
        return Err(error);
    }
}

/// Truncate a response body and blank out every credential value before it
/// can reach an error message or a log line.
pub(crate) fn redact(body: &str, secrets: &[&str]) -> String {
    let mut out: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        out.push_str("...");
    }
    for secret in secrets {
        if !secret.is_empty() {
            out = out.replace(secret, "[redacted]");
        }
    }
    out
}
