//! Database model for bars, with conversions to and from the domain type.
//!
//! Decimals are stored as TEXT to keep full precision, dates as `YYYY-MM-DD`
//! (which sorts correctly as text), and `fetched_at` as RFC 3339.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use marketbars_core::bars::{Bar, Frequency, ProviderId};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::bars)]
#[diesel(primary_key(symbol, date, frequency, provider))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BarRecord {
    pub symbol: String,
    pub date: String,
    pub frequency: String,
    pub provider: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
    pub adj_open: Option<String>,
    pub adj_high: Option<String>,
    pub adj_low: Option<String>,
    pub adj_close: Option<String>,
    pub adj_volume: Option<String>,
    pub fetched_at: String,
}

impl From<&Bar> for BarRecord {
    fn from(bar: &Bar) -> Self {
        let price = |value: &Option<Decimal>| value.map(|d| d.to_string());
        Self {
            symbol: bar.symbol.clone(),
            date: bar.date.format(DATE_FORMAT).to_string(),
            frequency: bar.frequency.as_str().to_string(),
            provider: bar.provider.as_str().to_string(),
            open: price(&bar.open),
            high: price(&bar.high),
            low: price(&bar.low),
            close: price(&bar.close),
            volume: price(&bar.volume),
            adj_open: price(&bar.adj_open),
            adj_high: price(&bar.adj_high),
            adj_low: price(&bar.adj_low),
            adj_close: price(&bar.adj_close),
            adj_volume: price(&bar.adj_volume),
            fetched_at: bar.fetched_at.to_rfc3339(),
        }
    }
}

/// A row that fails to decode indicates a damaged store; the repository
/// turns the returned detail into a corruption error.
impl TryFrom<BarRecord> for Bar {
    type Error = String;

    fn try_from(record: BarRecord) -> std::result::Result<Self, String> {
        let date = NaiveDate::parse_from_str(&record.date, DATE_FORMAT)
            .map_err(|_| format!("unreadable date '{}'", record.date))?;
        let frequency = record
            .frequency
            .parse::<Frequency>()
            .map_err(|e| format!("unreadable frequency: {e}"))?;
        let provider = record
            .provider
            .parse::<ProviderId>()
            .map_err(|e| format!("unreadable provider: {e}"))?;
        let fetched_at = DateTime::parse_from_rfc3339(&record.fetched_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| format!("unreadable fetched_at '{}'", record.fetched_at))?;

        let price = |field: &str, value: &Option<String>| {
            value
                .as_deref()
                .map(|s| {
                    Decimal::from_str(s).map_err(|_| format!("unreadable {field} '{s}'"))
                })
                .transpose()
        };

        Ok(Bar {
            symbol: record.symbol,
            date,
            frequency,
            provider,
            open: price("open", &record.open)?,
            high: price("high", &record.high)?,
            low: price("low", &record.low)?,
            close: price("close", &record.close)?,
            volume: price("volume", &record.volume)?,
            adj_open: price("adj_open", &record.adj_open)?,
            adj_high: price("adj_high", &record.adj_high)?,
            adj_low: price("adj_low", &record.adj_low)?,
            adj_close: price("adj_close", &record.adj_close)?,
            adj_volume: price("adj_volume", &record.adj_volume)?,
            fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_bar() -> Bar {
        let mut bar = Bar::empty(
            "SPY",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            Frequency::Daily,
            ProviderId::Tiingo,
        );
        bar.open = Some(dec!(472.16));
        bar.close = Some(dec!(472.65));
        bar.volume = Some(dec!(123488300));
        bar.adj_close = Some(dec!(468.78));
        bar
    }

    #[test]
    fn bar_round_trips_through_record() {
        let bar = sample_bar();
        let record = BarRecord::from(&bar);
        assert_eq!(record.date, "2024-01-02");
        assert_eq!(record.provider, "tiingo");
        assert_eq!(record.close.as_deref(), Some("472.65"));
        assert_eq!(record.high, None);

        let restored = Bar::try_from(record).unwrap();
        assert_eq!(restored, bar);
    }

    #[test]
    fn unreadable_rows_are_reported_with_the_offending_field() {
        let mut record = BarRecord::from(&sample_bar());
        record.close = Some("not-a-number".to_string());
        let err = Bar::try_from(record).unwrap_err();
        assert!(err.contains("close"), "error was: {err}");

        let mut record = BarRecord::from(&sample_bar());
        record.date = "02/01/2024".to_string();
        let err = Bar::try_from(record).unwrap_err();
        assert!(err.contains("date"), "error was: {err}");

        let mut record = BarRecord::from(&sample_bar());
        record.provider = "yahoo".to_string();
        assert!(Bar::try_from(record).is_err());
    }
}
