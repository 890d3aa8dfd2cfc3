//! Response models for the Barchart historical endpoint.

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Envelope of the historical endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct BarchartHistoricalResponse {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub data: Vec<BarchartHistoricalRow>,
}

/// One end-of-day row. The same shape comes back for raw and
/// split/dividend-adjusted series; which one it is depends on the request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BarchartHistoricalRow {
    /// Trading date, `YYYY-MM-DD`.
    pub trade_time: String,
    #[serde(default)]
    pub open_price: Option<f64>,
    #[serde(default)]
    pub high_price: Option<f64>,
    #[serde(default)]
    pub low_price: Option<f64>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl BarchartHistoricalRow {
    pub fn trade_date(&self) -> Option<NaiveDate> {
        // Some responses append a time component; the date prefix is enough.
        let prefix = self.trade_time.get(..10).unwrap_or(&self.trade_time);
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }
}

pub(crate) fn decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deserializes_envelope_and_rows() {
        let json = r#"{
            "count": 2,
            "total": 2,
            "data": [
                {
                    "tradeTime": "2024-01-02",
                    "openPrice": 472.16,
                    "highPrice": 473.67,
                    "lowPrice": 470.49,
                    "lastPrice": 472.65,
                    "volume": 123488300
                },
                {
                    "tradeTime": "2024-01-03 00:00:00",
                    "lastPrice": 468.79
                }
            ]
        }"#;

        let response: BarchartHistoricalResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.count, Some(2));
        assert_eq!(response.data.len(), 2);

        let first = &response.data[0];
        assert_eq!(first.trade_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(decimal(first.last_price), Some(dec!(472.65)));

        let second = &response.data[1];
        assert_eq!(second.trade_date(), NaiveDate::from_ymd_opt(2024, 1, 3));
        assert!(second.open_price.is_none());
    }

    #[test]
    fn empty_payload_yields_no_rows() {
        let response: BarchartHistoricalResponse = serde_json::from_str(r#"{"count": 0}"#).unwrap();
        assert!(response.data.is_empty());
    }

    #[test]
    fn bad_trade_time_is_rejected() {
        let row: BarchartHistoricalRow =
            serde_json::from_str(r#"{"tradeTime": "yesterday"}"#).unwrap();
        assert!(row.trade_date().is_none());
    }
}
