//! Barchart provider implementation.
//!
//! Cookie-session authenticated, dual-call: producing the ten canonical
//! columns takes two requests per sub-interval - one raw series for
//! `open..volume` and one split/dividend-adjusted series for the `adj_*`
//! columns - joined on date. The pair is issued back-to-back with no pacing
//! between the calls; if either call fails, the pair fails and nothing is
//! written.
//!
//! The session (cookie header, XSRF token, user-agent) comes from the
//! capture-tool-produced `barchart_cookies.json`. An upstream 401/403 means
//! the session expired and is reported as [`Error::CredentialStale`] so AUTO
//! selection can fall back to the token provider.

mod models;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use reqwest::header;
use reqwest::Client;

use crate::bars::{Bar, Frequency, ProviderId};
use crate::config::Config;
use crate::credentials::{CookieSession, CredentialBundle, SESSION_FRESH_HOURS};
use crate::errors::{Error, Result};
use crate::intervals::DateInterval;
use crate::pacing::{CallKind, RateLimiter};
use crate::provider::http::{send_with_retry, HttpPolicy};
use crate::provider::{ensure_valid_symbol, CredentialStatus, PriceProvider};

use models::{BarchartHistoricalResponse, BarchartHistoricalRow};

const BASE_URL: &str = "https://www.barchart.com/proxies/core-api/v1/historical/get";

/// Which series a single historical call asks for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Adjustment {
    Raw,
    SplitDividend,
}

/// Barchart end-of-day price provider.
pub struct BarchartProvider {
    client: Client,
    policy: HttpPolicy,
    limiter: Arc<RateLimiter>,
}

impl BarchartProvider {
    pub fn new(config: &Config, limiter: Arc<RateLimiter>) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            policy: HttpPolicy::from_config(config),
            limiter,
        }
    }

    fn session<'a>(&self, bundle: &'a CredentialBundle) -> Result<&'a CookieSession> {
        bundle
            .cookie_session
            .as_ref()
            .ok_or_else(|| Error::CredentialMissing {
                field: "barchart_cookies",
                path: bundle.cookie_path(),
            })
    }

    /// One historical call for one series. 401/403 is remapped to
    /// credential-stale; other failures keep their typed form.
    async fn fetch_series(
        &self,
        session: &CookieSession,
        secrets: &[&str],
        symbol: &str,
        interval: DateInterval,
        adjustment: Adjustment,
    ) -> Result<Vec<BarchartHistoricalRow>> {
        let start = interval.start.format("%Y-%m-%d").to_string();
        let end = interval.end.format("%Y-%m-%d").to_string();
        let adjusted_flag = match adjustment {
            Adjustment::Raw => "0",
            Adjustment::SplitDividend => "1",
        };

        let body = send_with_retry(self.id(), &self.policy, secrets, || {
            self.client
                .get(BASE_URL)
                .header(header::COOKIE, &session.cookie_string)
                .header("x-xsrf-token", &session.xsrf_token)
                .header(header::USER_AGENT, &session.user_agent)
                .query(&[
                    ("symbol", symbol),
                    ("type", "eod"),
                    ("frequency", "daily"),
                    ("startDate", start.as_str()),
                    ("endDate", end.as_str()),
                    ("splits", adjusted_flag),
                    ("dividends", adjusted_flag),
                    (
                        "fields",
                        "tradeTime,openPrice,highPrice,lowPrice,lastPrice,volume",
                    ),
                ])
        })
        .await
        .map_err(|e| match e {
            Error::Provider {
                status: Some(401 | 403),
                ..
            } => Error::CredentialStale { provider: self.id() },
            other => other,
        })?;

        let response: BarchartHistoricalResponse =
            serde_json::from_str(&body).map_err(|e| Error::Parse {
                provider: self.id(),
                message: e.to_string(),
            })?;

        debug!(
            "barchart: {symbol} {adjustment:?} series returned {} rows (count={:?})",
            response.data.len(),
            response.count
        );
        Ok(response.data)
    }
}

#[async_trait]
impl PriceProvider for BarchartProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Barchart
    }

    fn probe_credentials(&self, bundle: &CredentialBundle) -> CredentialStatus {
        match &bundle.cookie_session {
            None => CredentialStatus::Missing {
                field: "barchart_cookies",
                path: bundle.cookie_path(),
            },
            Some(session) => {
                let age_hours = session.age(Utc::now()).num_hours();
                if age_hours > SESSION_FRESH_HOURS {
                    CredentialStatus::Stale { age_hours }
                } else {
                    CredentialStatus::Ready
                }
            }
        }
    }

    async fn fetch(
        &self,
        bundle: &CredentialBundle,
        symbol: &str,
        frequency: Frequency,
        interval: DateInterval,
    ) -> Result<Vec<Bar>> {
        ensure_valid_symbol(symbol)?;
        let session = self.session(bundle)?;
        let secrets = bundle.secret_values();

        debug!("barchart: fetching {symbol} {interval} (raw + adjusted)");

        let raw = self
            .fetch_series(session, &secrets, symbol, interval, Adjustment::Raw)
            .await?;

        // The second half of the pair goes out unpaced.
        self.limiter.pace(self.id(), CallKind::SameSymbol).await;

        let adjusted = self
            .fetch_series(session, &secrets, symbol, interval, Adjustment::SplitDividend)
            .await?;

        let fetched_at = Utc::now();
        let mut by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();

        for row in raw {
            let Some(date) = row.trade_date() else {
                return Err(Error::Parse {
                    provider: self.id(),
                    message: format!("unrecognized tradeTime '{}'", row.trade_time),
                });
            };
            if !interval.contains(date) {
                continue;
            }
            let bar = by_date
                .entry(date)
                .or_insert_with(|| Bar::empty(symbol, date, frequency, ProviderId::Barchart));
            bar.open = models::decimal(row.open_price);
            bar.high = models::decimal(row.high_price);
            bar.low = models::decimal(row.low_price);
            bar.close = models::decimal(row.last_price);
            bar.volume = models::decimal(row.volume);
            bar.fetched_at = fetched_at;
        }

        for row in adjusted {
            let Some(date) = row.trade_date() else {
                return Err(Error::Parse {
                    provider: self.id(),
                    message: format!("unrecognized tradeTime '{}'", row.trade_time),
                });
            };
            if !interval.contains(date) {
                continue;
            }
            let bar = by_date
                .entry(date)
                .or_insert_with(|| Bar::empty(symbol, date, frequency, ProviderId::Barchart));
            bar.adj_open = models::decimal(row.open_price);
            bar.adj_high = models::decimal(row.high_price);
            bar.adj_low = models::decimal(row.low_price);
            bar.adj_close = models::decimal(row.last_price);
            bar.adj_volume = models::decimal(row.volume);
            bar.fetched_at = fetched_at;
        }

        let bars: Vec<Bar> = by_date.into_values().collect();
        debug!("barchart: {symbol} {interval} returned {} bars", bars.len());
        Ok(bars)
    }
}
