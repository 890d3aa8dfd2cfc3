use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::bars::{Bar, BarStore, Frequency, ProviderId, ProviderSelection};
use crate::config::Config;
use crate::credentials::CredentialBundle;
use crate::errors::{Error, Result};
use crate::intervals::{missing_intervals, DateInterval};
use crate::pacing::{CallKind, RateLimiter};
use crate::provider::{
    is_valid_symbol, BarchartProvider, CredentialStatus, PriceProvider, TiingoProvider,
};

use super::assembler::assemble;

/// One `get_prices` request.
#[derive(Clone, Debug)]
pub struct PriceRequest {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub frequency: Frequency,
    pub provider: ProviderSelection,
    /// Bypass the cache and re-fetch the whole interval; existing rows under
    /// the chosen provider are replaced.
    pub refresh: bool,
    /// Checked between sub-intervals and pacing waits. Completed
    /// sub-intervals stay written when a request is cancelled.
    pub cancel: CancellationToken,
}

impl PriceRequest {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
            frequency: Frequency::Daily,
            provider: ProviderSelection::Auto,
            refresh: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_provider(mut self, provider: ProviderSelection) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Result bundle returned to callers.
#[derive(Clone, Debug, Serialize)]
pub struct PriceData {
    /// Strictly date-ascending, no duplicate dates.
    pub bars: Vec<Bar>,
    /// The resolved (uppercased) symbol.
    pub symbol: String,
    /// The provider that served the request; under AUTO fallback, the one
    /// that fetched the majority of bars this call (ties toward Tiingo).
    pub provider: ProviderId,
    /// Bars already in the store before this call.
    pub from_cache: usize,
    /// Bars fetched upstream during this call.
    pub from_api: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The retrieval engine. Composes the bar store, the interval algebra, the
/// rate limiter and the provider adapters to drive one request end-to-end:
/// validate, diff the request against cached coverage, fetch the gaps in
/// ascending order with pacing, write each sub-interval atomically, and
/// assemble the final table with provenance counts.
pub struct PriceService {
    store: Arc<dyn BarStore>,
    barchart: Arc<dyn PriceProvider>,
    tiingo: Arc<dyn PriceProvider>,
    limiter: Arc<RateLimiter>,
    config: Config,
}

impl PriceService {
    /// Build a service with the real provider adapters.
    pub fn new(config: Config, store: Arc<dyn BarStore>) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config));
        let barchart = Arc::new(BarchartProvider::new(&config, limiter.clone()));
        let tiingo = Arc::new(TiingoProvider::new(&config));
        Self {
            store,
            barchart,
            tiingo,
            limiter,
            config,
        }
    }

    /// Build a service with injected adapters. Used by tests and embedders
    /// that stub the upstream.
    pub fn with_providers(
        config: Config,
        store: Arc<dyn BarStore>,
        barchart: Arc<dyn PriceProvider>,
        tiingo: Arc<dyn PriceProvider>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            store,
            barchart,
            tiingo,
            limiter,
            config,
        }
    }

    /// Fetch daily bars for a closed date interval, cache-first.
    pub async fn get_prices(&self, request: &PriceRequest) -> Result<PriceData> {
        let symbol = request.symbol.trim().to_uppercase();
        validate_request(&symbol, request)?;

        let request_started = Utc::now();
        let requested = DateInterval::new(request.start, request.end);

        // Fresh snapshot per call so a refreshed cookie file takes effect
        // without restarting the process.
        let bundle = CredentialBundle::load(&self.config.config_dir);

        let selected = match request.provider {
            ProviderSelection::Barchart => ProviderId::Barchart,
            ProviderSelection::Tiingo => ProviderId::Tiingo,
            ProviderSelection::Auto => self.pick_auto(&bundle),
        };

        let covered: BTreeSet<NaiveDate> = if request.refresh {
            BTreeSet::new()
        } else {
            self.store.covered_dates(
                &symbol,
                request.frequency,
                selected,
                requested.start,
                requested.end,
            )?
        };

        let gaps = missing_intervals(requested, &covered);
        debug!(
            "{symbol} {requested}: {} cached dates, {} gap(s) via {selected}",
            covered.len(),
            gaps.len()
        );

        let mut serving = selected;
        let mut fell_back = false;
        let mut fetched_counts: HashMap<ProviderId, usize> = HashMap::new();
        let mut first_call = true;

        for gap in gaps {
            if request.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let kind = if first_call {
                CallKind::NewSymbol
            } else {
                CallKind::SameSymbol
            };
            first_call = false;
            self.limiter.pace(serving, kind).await;

            if request.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let adapter = self.adapter(serving);
            let bars = match adapter
                .fetch(&bundle, &symbol, request.frequency, gap)
                .await
            {
                Ok(bars) => bars,
                Err(Error::CredentialStale { .. })
                    if request.provider == ProviderSelection::Auto
                        && serving == ProviderId::Barchart =>
                {
                    warn!(
                        "{symbol}: barchart session rejected upstream, \
                         falling back to tiingo for the remaining sub-intervals"
                    );
                    serving = ProviderId::Tiingo;
                    fell_back = true;
                    self.limiter.pace(serving, CallKind::NewSymbol).await;
                    self.adapter(serving)
                        .fetch(&bundle, &symbol, request.frequency, gap)
                        .await?
                }
                Err(e) => return Err(e),
            };

            // A gap with no trading days legitimately yields nothing.
            if !bars.is_empty() {
                self.store.write_range(&bars).await?;
            }
            *fetched_counts.entry(serving).or_insert(0) += bars.len();
        }

        let bars = if fell_back {
            // The store may now hold the interval under both providers.
            let barchart_rows = self.store.read_range(
                &symbol,
                request.frequency,
                ProviderId::Barchart,
                requested.start,
                requested.end,
            )?;
            let tiingo_rows = self.store.read_range(
                &symbol,
                request.frequency,
                ProviderId::Tiingo,
                requested.start,
                requested.end,
            )?;
            assemble(vec![barchart_rows, tiingo_rows])
        } else {
            assemble(vec![self.store.read_range(
                &symbol,
                request.frequency,
                serving,
                requested.start,
                requested.end,
            )?])
        };

        let from_api = bars
            .iter()
            .filter(|bar| bar.fetched_at >= request_started)
            .count();
        let from_cache = bars.len() - from_api;

        let provider = if fell_back {
            majority_provider(&fetched_counts)
        } else {
            serving
        };

        info!(
            "{symbol} {requested}: {} bars via {provider} ({from_cache} cached, {from_api} fetched)",
            bars.len()
        );

        Ok(PriceData {
            bars,
            symbol,
            provider,
            from_cache,
            from_api,
            start: request.start,
            end: request.end,
        })
    }

    fn adapter(&self, provider: ProviderId) -> &Arc<dyn PriceProvider> {
        match provider {
            ProviderId::Barchart => &self.barchart,
            ProviderId::Tiingo => &self.tiingo,
        }
    }

    /// AUTO prefers the cookie provider when a session is present; age alone
    /// is a warning, not a veto. No session means the token provider.
    fn pick_auto(&self, bundle: &CredentialBundle) -> ProviderId {
        match self.barchart.probe_credentials(bundle) {
            CredentialStatus::Ready => ProviderId::Barchart,
            CredentialStatus::Stale { age_hours } => {
                warn!("barchart session is {age_hours}h old; trying it anyway");
                ProviderId::Barchart
            }
            CredentialStatus::Missing { .. } => {
                debug!("no barchart session present; AUTO selects tiingo");
                ProviderId::Tiingo
            }
        }
    }
}

/// Majority of bars fetched this request; ties break toward Tiingo.
fn majority_provider(fetched_counts: &HashMap<ProviderId, usize>) -> ProviderId {
    let barchart = fetched_counts
        .get(&ProviderId::Barchart)
        .copied()
        .unwrap_or(0);
    let tiingo = fetched_counts.get(&ProviderId::Tiingo).copied().unwrap_or(0);
    if barchart > tiingo {
        ProviderId::Barchart
    } else {
        ProviderId::Tiingo
    }
}

/// Validate a request, aggregating every violation into one message so the
/// caller sees all problems at once.
fn validate_request(symbol: &str, request: &PriceRequest) -> Result<()> {
    let mut problems: Vec<String> = Vec::new();

    if symbol.is_empty() {
        problems.push("symbol is empty".to_string());
    } else if !is_valid_symbol(symbol) {
        problems.push(format!(
            "symbol '{}' does not match [A-Z0-9.\\-]{{1,10}}",
            request.symbol
        ));
    }

    if request.start > request.end {
        problems.push(format!(
            "start {} is after end {}",
            request.start, request.end
        ));
    }

    let today = Utc::now().date_naive();
    if request.start > today || request.end > today {
        problems.push(format!(
            "interval [{}, {}] extends past today",
            request.start, request.end
        ));
    }

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    if request.start < epoch || request.end < epoch {
        problems.push(format!(
            "interval [{}, {}] precedes 1970-01-01",
            request.start, request.end
        ));
    }

    // Only daily bars exist today; the match keeps this honest if the enum
    // ever grows.
    match request.frequency {
        Frequency::Daily => {}
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(problems.join("; ")))
    }
}
