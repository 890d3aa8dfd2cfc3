//! SQLite storage implementation for marketbars.
//!
//! This crate is the only place where Diesel dependencies exist. The core
//! crate is database-agnostic and defines the
//! [`BarStore`](marketbars_core::bars::BarStore) trait; [`SqliteBarStore`]
//! implements it against a single-file embedded database.
//!
//! # Architecture
//!
//! ```text
//!          core (domain, engine)
//!                   |
//!                   v
//!        storage-sqlite (this crate)
//!                   |
//!                   v
//!        prices.db (single file, WAL)
//! ```
//!
//! Reads come from a connection pool; all mutations funnel through one
//! writer actor holding a dedicated connection, each job wrapped in an
//! immediate transaction. That gives `write_range` its atomicity guarantee
//! and keeps concurrent in-process writers serialized. Cross-process writers
//! are out of scope.

pub mod bars;
pub mod db;
pub mod errors;
pub mod schema;

// Re-export the store and database utilities
pub use bars::{BarRecord, SqliteBarStore};
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};
pub use errors::{classify_diesel_error, IntoCore, StorageError};

// Re-export from the core crate for convenience
pub use marketbars_core::errors::{Error, Result, StoreError};
