use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bar frequency. Only daily bars are supported; the enum exists so the
/// store key and the wire types stay stable if more frequencies are added.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            other => Err(format!("unsupported frequency '{other}'")),
        }
    }
}

/// Origin tag recorded per bar.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Barchart,
    Tiingo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Barchart => "barchart",
            ProviderId::Tiingo => "tiingo",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "barchart" => Ok(ProviderId::Barchart),
            "tiingo" => Ok(ProviderId::Tiingo),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Provider selection for a request. `Auto` prefers the cookie-authenticated
/// provider and falls back to the token provider on stale credentials.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderSelection {
    Barchart,
    Tiingo,
    #[default]
    Auto,
}

/// A single trading-day record for one symbol from one provider.
///
/// Identity is the 4-tuple `(symbol, date, frequency, provider)`; the store
/// keeps at most one row per key and re-writes replace in full. All ten
/// price/volume fields are nullable - fields a provider does not supply stay
/// `None` and are never imputed. `fetched_at` is stamped by the store on
/// write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub frequency: Frequency,
    pub provider: ProviderId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_open: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_high: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_low: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adj_volume: Option<Decimal>,

    pub fetched_at: DateTime<Utc>,
}

impl Bar {
    /// Create a bar with all price fields empty. Adapters fill in what the
    /// provider supplies.
    pub fn empty(symbol: &str, date: NaiveDate, frequency: Frequency, provider: ProviderId) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            frequency,
            provider,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            adj_open: None,
            adj_high: None,
            adj_low: None,
            adj_close: None,
            adj_volume: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Aggregate statistics over the bar store.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_rows: u64,
    pub distinct_symbols: u64,
    pub oldest_date: Option<NaiveDate>,
    pub newest_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_round_trips_through_str() {
        assert_eq!(Frequency::Daily.as_str(), "daily");
        assert_eq!("daily".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert!("weekly".parse::<Frequency>().is_err());
    }

    #[test]
    fn provider_round_trips_through_str() {
        assert_eq!("barchart".parse::<ProviderId>().unwrap(), ProviderId::Barchart);
        assert_eq!("tiingo".parse::<ProviderId>().unwrap(), ProviderId::Tiingo);
        assert!("yahoo".parse::<ProviderId>().is_err());
    }

    #[test]
    fn provider_selection_defaults_to_auto() {
        assert_eq!(ProviderSelection::default(), ProviderSelection::Auto);
    }

    #[test]
    fn empty_bar_has_no_prices() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bar = Bar::empty("SPY", date, Frequency::Daily, ProviderId::Tiingo);
        assert_eq!(bar.symbol, "SPY");
        assert!(bar.close.is_none());
        assert!(bar.adj_close.is_none());
    }
}
