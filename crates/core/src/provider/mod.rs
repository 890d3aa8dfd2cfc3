//! Provider adapters for upstream market-data sources.
//!
//! Each adapter implements [`PriceProvider`]: stateless over the per-request
//! credential bundle, it turns `(symbol, frequency, interval)` into a list of
//! canonical [`Bar`](crate::bars::Bar)s or a typed failure. Transient upstream
//! statuses are recovered inside the adapter via bounded exponential backoff;
//! everything else surfaces to the engine.

pub(crate) mod http;
mod traits;

pub mod barchart;
pub mod tiingo;

pub use barchart::BarchartProvider;
pub use tiingo::TiingoProvider;
pub use traits::{CredentialStatus, PriceProvider};

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Error, Result};

/// Symbols are 1-10 characters from `[A-Z0-9.\-]`, uppercase required.
static SYMBOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9.\-]{1,10}$").unwrap());

pub fn is_valid_symbol(symbol: &str) -> bool {
    SYMBOL_PATTERN.is_match(symbol)
}

/// Adapter-side guard; the engine validates earlier with a friendlier
/// aggregated message, this catches direct adapter use.
pub(crate) fn ensure_valid_symbol(symbol: &str) -> Result<()> {
    if is_valid_symbol(symbol) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "symbol '{symbol}' does not match [A-Z0-9.\\-]{{1,10}}"
        )))
    }
}
