//! Response models for the Tiingo end-of-day endpoint.

use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

/// One row of `/tiingo/daily/{symbol}/prices`. Adjusted and unadjusted values
/// arrive in the same payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TiingoDailyPrice {
    /// Instant string, e.g. `2024-01-02T00:00:00.000Z`.
    pub date: String,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub adj_open: Option<f64>,
    #[serde(default)]
    pub adj_high: Option<f64>,
    #[serde(default)]
    pub adj_low: Option<f64>,
    #[serde(default)]
    pub adj_close: Option<f64>,
    #[serde(default)]
    pub adj_volume: Option<f64>,
}

impl TiingoDailyPrice {
    /// The trading date of the row. Tiingo sends an RFC 3339 instant; some
    /// responses carry a bare date.
    pub fn trade_date(&self) -> Option<NaiveDate> {
        if let Ok(instant) = DateTime::parse_from_rfc3339(&self.date) {
            return Some(instant.date_naive());
        }
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

pub(crate) fn decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}
