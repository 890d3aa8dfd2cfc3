use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::bar_model::{Bar, Frequency, ProviderId, StoreStats};
use crate::errors::Result;

/// Persistent bar store keyed by `(symbol, date, frequency, provider)`.
///
/// Implemented by the storage crate. Reads are synchronous pool lookups;
/// writes go through a serialized writer and are atomic per call - a failed
/// `write_range` leaves the store unchanged. Multiple in-process readers are
/// safe; cross-process concurrent writers are out of scope.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Bars matching the key whose date falls in `[start, end]`, ascending by
    /// date.
    fn read_range(
        &self,
        symbol: &str,
        frequency: Frequency,
        provider: ProviderId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>>;

    /// Date-only projection of [`read_range`](Self::read_range), used for gap
    /// detection before fetching.
    fn covered_dates(
        &self,
        symbol: &str,
        frequency: Frequency,
        provider: ProviderId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>>;

    /// Insert-or-replace all rows in a single atomic transaction. The store
    /// stamps `fetched_at` on every row at write time. Returns the number of
    /// rows written.
    async fn write_range(&self, bars: &[Bar]) -> Result<usize>;

    /// Delete rows matching the optional filters. With no filters, clears the
    /// entire store. Returns the number of rows deleted.
    async fn clear(&self, symbol: Option<&str>, provider: Option<ProviderId>) -> Result<usize>;

    /// Aggregate statistics over the whole store.
    fn stats(&self) -> Result<StoreStats>;
}
