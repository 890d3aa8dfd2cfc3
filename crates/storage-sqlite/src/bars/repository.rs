use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::dsl::{count_distinct, count_star, max, min};
use diesel::prelude::*;
use log::debug;

use marketbars_core::bars::{Bar, BarStore, Frequency, ProviderId, StoreStats};
use marketbars_core::errors::{Error as CoreError, Result, StoreError};

use super::model::{BarRecord, DATE_FORMAT};
use crate::db::{self, get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::bars::dsl as bars_dsl;

const WRITE_CHUNK_SIZE: usize = 500;

/// SQLite-backed [`BarStore`].
///
/// Reads go straight to the pool; every mutation runs on the single writer
/// actor inside an immediate transaction, which is what makes `write_range`
/// atomic and serializes concurrent in-process writers.
pub struct SqliteBarStore {
    pool: DbPool,
    writer: WriteHandle,
    db_path: PathBuf,
}

impl SqliteBarStore {
    /// Open the store at `db_path`, creating the file and schema if absent.
    /// An existing file that fails integrity checks is reported as
    /// store-corruption with the path and a recovery hint.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let (pool, writer) = db::init(&db_path)?;
        debug!("bar store open at {}", db_path.display());
        Ok(Self {
            pool,
            writer,
            db_path,
        })
    }

    fn record_to_bar(&self, record: BarRecord) -> Result<Bar> {
        Bar::try_from(record).map_err(|detail| {
            CoreError::Store(StoreError::Corruption {
                path: self.db_path.clone(),
                detail,
            })
        })
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[async_trait]
impl BarStore for SqliteBarStore {
    fn read_range(
        &self,
        symbol: &str,
        frequency: Frequency,
        provider: ProviderId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>> {
        let mut conn = get_connection(&self.pool)?;

        let records = bars_dsl::bars
            .filter(bars_dsl::symbol.eq(symbol))
            .filter(bars_dsl::frequency.eq(frequency.as_str()))
            .filter(bars_dsl::provider.eq(provider.as_str()))
            .filter(bars_dsl::date.ge(fmt_date(start)))
            .filter(bars_dsl::date.le(fmt_date(end)))
            .order(bars_dsl::date.asc())
            .load::<BarRecord>(&mut conn)
            .into_core(&self.db_path)?;

        records
            .into_iter()
            .map(|record| self.record_to_bar(record))
            .collect()
    }

    fn covered_dates(
        &self,
        symbol: &str,
        frequency: Frequency,
        provider: ProviderId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;

        let dates: Vec<String> = bars_dsl::bars
            .filter(bars_dsl::symbol.eq(symbol))
            .filter(bars_dsl::frequency.eq(frequency.as_str()))
            .filter(bars_dsl::provider.eq(provider.as_str()))
            .filter(bars_dsl::date.ge(fmt_date(start)))
            .filter(bars_dsl::date.le(fmt_date(end)))
            .select(bars_dsl::date)
            .load::<String>(&mut conn)
            .into_core(&self.db_path)?;

        dates
            .into_iter()
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| {
                    CoreError::Store(StoreError::Corruption {
                        path: self.db_path.clone(),
                        detail: format!("unreadable date '{raw}'"),
                    })
                })
            })
            .collect()
    }

    async fn write_range(&self, bars: &[Bar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        // The store stamps fetch time at write, not the adapter at parse.
        let fetched_at = Utc::now().to_rfc3339();
        let records: Vec<BarRecord> = bars
            .iter()
            .map(|bar| {
                let mut record = BarRecord::from(bar);
                record.fetched_at = fetched_at.clone();
                record
            })
            .collect();

        let db_path = self.db_path.clone();
        self.writer
            .exec(move |conn| {
                let mut written = 0;
                for chunk in records.chunks(WRITE_CHUNK_SIZE) {
                    written += diesel::replace_into(bars_dsl::bars)
                        .values(chunk)
                        .execute(conn)
                        .into_core(&db_path)?;
                }
                Ok(written)
            })
            .await
    }

    async fn clear(&self, symbol: Option<&str>, provider: Option<ProviderId>) -> Result<usize> {
        let symbol = symbol.map(str::to_string);
        let db_path = self.db_path.clone();

        self.writer
            .exec(move |conn| {
                let deleted = match (&symbol, provider) {
                    (Some(s), Some(p)) => diesel::delete(
                        bars_dsl::bars
                            .filter(bars_dsl::symbol.eq(s))
                            .filter(bars_dsl::provider.eq(p.as_str())),
                    )
                    .execute(conn),
                    (Some(s), None) => {
                        diesel::delete(bars_dsl::bars.filter(bars_dsl::symbol.eq(s))).execute(conn)
                    }
                    (None, Some(p)) => {
                        diesel::delete(bars_dsl::bars.filter(bars_dsl::provider.eq(p.as_str())))
                            .execute(conn)
                    }
                    (None, None) => diesel::delete(bars_dsl::bars).execute(conn),
                };
                deleted.into_core(&db_path)
            })
            .await
    }

    fn stats(&self) -> Result<StoreStats> {
        let mut conn = get_connection(&self.pool)?;

        let total_rows: i64 = bars_dsl::bars
            .select(count_star())
            .first(&mut conn)
            .into_core(&self.db_path)?;
        let distinct_symbols: i64 = bars_dsl::bars
            .select(count_distinct(bars_dsl::symbol))
            .first(&mut conn)
            .into_core(&self.db_path)?;
        let oldest: Option<String> = bars_dsl::bars
            .select(min(bars_dsl::date))
            .first(&mut conn)
            .into_core(&self.db_path)?;
        let newest: Option<String> = bars_dsl::bars
            .select(max(bars_dsl::date))
            .first(&mut conn)
            .into_core(&self.db_path)?;

        let parse = |raw: Option<String>| {
            raw.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
        };

        Ok(StoreStats {
            total_rows: total_rows as u64,
            distinct_symbols: distinct_symbols as u64,
            oldest_date: parse(oldest),
            newest_date: parse(newest),
        })
    }
}
