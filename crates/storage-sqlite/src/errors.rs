//! Storage-specific error types and conversion to the core taxonomy.
//!
//! Diesel and r2d2 failures are classified here into the database-agnostic
//! [`StoreError`] variants the core crate defines. SQLite reports
//! corruption, lock contention and disk exhaustion only through its error
//! messages, so classification is by message inspection at this boundary.

use std::path::Path;

use diesel::result::Error as DieselError;
use thiserror::Error;

use marketbars_core::errors::{Error as CoreError, StoreError};

/// Failures that occur before a query runs: pool setup, filesystem,
/// migrations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Store(match err {
            StorageError::Pool(e) => StoreError::ConnectionFailed(e.to_string()),
            StorageError::Io(e) => StoreError::ConnectionFailed(e.to_string()),
            StorageError::MigrationFailed(m) => StoreError::QueryFailed(format!("migration: {m}")),
        })
    }
}

/// Classify a Diesel error into the core store taxonomy.
pub fn classify_diesel_error(db_path: &Path, error: DieselError) -> StoreError {
    match &error {
        DieselError::NotFound => StoreError::NotFound("record not found".to_string()),
        DieselError::DatabaseError(_, info) => {
            let message = info.message().to_string();
            let lowered = message.to_lowercase();
            if lowered.contains("database is locked") || lowered.contains("table is locked") {
                StoreError::WriteConflict(message)
            } else if lowered.contains("malformed")
                || lowered.contains("not a database")
                || lowered.contains("corrupt")
            {
                StoreError::Corruption {
                    path: db_path.to_path_buf(),
                    detail: message,
                }
            } else if lowered.contains("disk is full") || lowered.contains("disk full") {
                StoreError::DiskFull(message)
            } else {
                StoreError::QueryFailed(message)
            }
        }
        _ => StoreError::QueryFailed(error.to_string()),
    }
}

/// Whether an already-classified error is the transient lock-contention case
/// the writer retries once.
pub(crate) fn is_write_conflict(error: &StoreError) -> bool {
    matches!(error, StoreError::WriteConflict(_))
}

/// Extension trait converting Diesel results to core results with
/// classification. Orphan rules block a plain `From` impl, since both the
/// Diesel error and the core error live in other crates.
pub trait IntoCore<T> {
    fn into_core(self, db_path: &Path) -> marketbars_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self, db_path: &Path) -> marketbars_core::Result<T> {
        self.map_err(|e| CoreError::Store(classify_diesel_error(db_path, e)))
    }
}
