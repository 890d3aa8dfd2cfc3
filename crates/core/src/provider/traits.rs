//! Provider trait definition.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::bars::{Bar, Frequency, ProviderId};
use crate::credentials::CredentialBundle;
use crate::errors::Result;
use crate::intervals::DateInterval;

/// Result of inspecting the credential bundle without any network call.
#[derive(Clone, Debug)]
pub enum CredentialStatus {
    /// The credential the provider needs is present and looks current.
    Ready,
    /// Present but older than the freshness window. Usable - only an
    /// upstream rejection proves it dead - but worth a warning.
    Stale { age_hours: i64 },
    /// Absent from the bundle.
    Missing { field: &'static str, path: PathBuf },
}

/// A market-data provider adapter.
///
/// Adapters are stateless over the per-request [`CredentialBundle`]; they own
/// only their HTTP client and retry policy. Implementations handle their own
/// transient-error retries and report everything else as typed failures.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// The origin tag this adapter writes into every bar.
    fn id(&self) -> ProviderId;

    /// Check whether the bundle carries what this provider needs. No network
    /// activity.
    fn probe_credentials(&self, bundle: &CredentialBundle) -> CredentialStatus;

    /// Fetch daily bars for the closed interval, populating all ten canonical
    /// fields the provider supplies and leaving the rest `None`. Returns bars
    /// ascending by date; an empty list means the interval held no trading
    /// days, which is not an error.
    async fn fetch(
        &self,
        bundle: &CredentialBundle,
        symbol: &str,
        frequency: Frequency,
        interval: DateInterval,
    ) -> Result<Vec<Bar>>;
}
