//! marketbars core - cache-first retrieval of daily equity price bars.
//!
//! This crate contains the domain logic: it is database-agnostic and defines
//! the [`BarStore`] trait that the `storage-sqlite` crate implements.
//!
//! # Overview
//!
//! Analytical programs make repeated, overlapping queries for historical
//! daily OHLCV bars (split/dividend-adjusted and unadjusted). This library
//! answers them cache-first: every bar ever fetched is kept in a persistent
//! store keyed by `(symbol, date, frequency, provider)`, and only the missing
//! sub-intervals of a request go upstream - paced per provider, retried on
//! transient failures, and written back atomically per sub-interval.
//!
//! # Architecture
//!
//! ```text
//! get_prices(symbol, start, end, ...)
//!         |
//!         v
//! +------------------+     +------------------+
//! |  PriceService    | --> |    BarStore      |  covered_dates / read_range
//! +------------------+     +------------------+
//!         |
//!         |  missing_intervals(requested, covered)
//!         v
//! +------------------+     +------------------+
//! |   RateLimiter    | --> |  PriceProvider   |  Barchart (cookie, 2 calls)
//! +------------------+     +------------------+  Tiingo   (token,  1 call)
//!         |
//!         v
//! +------------------+
//! |    assemble      |  date-sorted, de-duplicated result + provenance
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceService`] - the retrieval engine behind `get_prices`
//! - [`PriceRequest`] / [`PriceData`] - request and result bundle
//! - [`Bar`] - one trading-day record with ten nullable price/volume fields
//! - [`BarStore`] - persistence trait implemented by the storage crate
//! - [`DateInterval`] / [`missing_intervals`] - the pure interval algebra
//! - [`CredentialBundle`] - per-request snapshot of the credential files

pub mod bars;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod errors;
pub mod intervals;
pub mod pacing;
pub mod provider;

// Re-export the public surface
pub use bars::{Bar, BarStore, Frequency, ProviderId, ProviderSelection, StoreStats};
pub use config::Config;
pub use credentials::{CookieSession, CredentialBundle, Credentials};
pub use engine::{assemble, PriceData, PriceRequest, PriceService};
pub use errors::{Error, Result, RetryClass, StoreError};
pub use intervals::{missing_intervals, DateInterval};
pub use pacing::{CallKind, RateLimiter};
pub use provider::{
    is_valid_symbol, BarchartProvider, CredentialStatus, PriceProvider, TiingoProvider,
};
