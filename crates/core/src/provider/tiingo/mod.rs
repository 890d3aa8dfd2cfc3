//! Tiingo provider implementation.
//!
//! Token-authenticated, single-call: one GET per sub-interval against the
//! end-of-day endpoint returns adjusted and unadjusted prices in the same
//! payload. The token travels in the `Authorization` header, never in the
//! URL, so request URLs are always safe to log.

mod models;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::header;
use reqwest::Client;

use crate::bars::{Bar, Frequency, ProviderId};
use crate::config::Config;
use crate::credentials::CredentialBundle;
use crate::errors::{Error, Result};
use crate::intervals::DateInterval;
use crate::provider::http::{send_with_retry, HttpPolicy};
use crate::provider::{ensure_valid_symbol, CredentialStatus, PriceProvider};

use models::TiingoDailyPrice;

const BASE_URL: &str = "https://api.tiingo.com/tiingo/daily";

/// Tiingo end-of-day price provider.
pub struct TiingoProvider {
    client: Client,
    policy: HttpPolicy,
}

impl TiingoProvider {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            policy: HttpPolicy::from_config(config),
        }
    }

    fn api_key<'a>(&self, bundle: &'a CredentialBundle) -> Result<&'a str> {
        bundle
            .credentials
            .tiingo_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::CredentialMissing {
                field: "tiingo_api_key",
                path: bundle.credentials_path(),
            })
    }
}

#[async_trait]
impl PriceProvider for TiingoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Tiingo
    }

    fn probe_credentials(&self, bundle: &CredentialBundle) -> CredentialStatus {
        match self.api_key(bundle) {
            Ok(_) => CredentialStatus::Ready,
            Err(_) => CredentialStatus::Missing {
                field: "tiingo_api_key",
                path: bundle.credentials_path(),
            },
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
        let key = self.api_key(bundle)?;
        let secrets = bundle.secret_values();

        let url = format!("{BASE_URL}/{symbol}/prices");
        let start = interval.start.format("%Y-%m-%d").to_string();
        let end = interval.end.format("%Y-%m-%d").to_string();

        debug!("tiingo: fetching {symbol} {interval}");

        let body = send_with_retry(self.id(), &self.policy, &secrets, || {
            self.client
                .get(url.as_str())
                .header(header::AUTHORIZATION, format!("Token {key}"))
                .query(&[
                    ("startDate", start.as_str()),
                    ("endDate", end.as_str()),
                    ("format", "json"),
                ])
        })
        .await?;

        let rows: Vec<TiingoDailyPrice> =
            serde_json::from_str(&body).map_err(|e| Error::Parse {
                provider: self.id(),
                message: e.to_string(),
            })?;

        let fetched_at = Utc::now();
        let mut bars = Vec::with_capacity(rows.len());

        for row in rows {
            let date = row.trade_date().ok_or_else(|| Error::Parse {
                provider: self.id(),
                message: format!("unrecognized date '{}'", row.date),
            })?;

            // Rows outside the requested interval are dropped rather than
            // cached under a range they were not asked for.
            if !interval.contains(date) {
                continue;
            }

            let mut bar = Bar::empty(symbol, date, frequency, self.id());
            bar.open = models::decimal(row.open);
            bar.high = models::decimal(row.high);
            bar.low = models::decimal(row.low);
            bar.close = models::decimal(row.close);
            bar.volume = models::decimal(row.volume);
            bar.adj_open = models::decimal(row.adj_open);
            bar.adj_high = models::decimal(row.adj_high);
            bar.adj_low = models::decimal(row.adj_low);
            bar.adj_close = models::decimal(row.adj_close);
            bar.adj_volume = models::decimal(row.adj_volume);
            bar.fetched_at = fetched_at;
            bars.push(bar);
        }

        bars.sort_by_key(|bar| bar.date);
        debug!("tiingo: {symbol} {interval} returned {} bars", bars.len());
        Ok(bars)
    }
}
