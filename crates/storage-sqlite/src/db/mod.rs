//! Database connection pooling, migrations and store initialization.

mod write_actor;

pub use write_actor::{spawn_writer, WriteHandle};

use std::fs;
use std::path::Path;
use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::debug;

use marketbars_core::errors::{Error as CoreError, Result, StoreError};

use crate::errors::StorageError;

pub type DbPool = Arc<Pool<ConnectionManager<SqliteConnection>>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Pragmas applied to every pooled connection. WAL keeps readers unblocked
/// while the writer holds its transaction; the busy timeout covers brief
/// lock handoffs between them.
#[derive(Clone, Copy, Debug)]
struct ConnectionOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(
            "PRAGMA journal_mode = WAL; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Build a connection pool for the store file, creating the parent directory
/// if needed.
pub fn create_pool(db_path: &Path) -> std::result::Result<DbPool, StorageError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?;

    Ok(Arc::new(pool))
}

/// Get a pooled connection, converting pool errors to the core taxonomy.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| CoreError::Store(StoreError::ConnectionFailed(e.to_string())))
}

/// Run pending migrations, creating the schema on first use.
pub fn run_migrations(conn: &mut SqliteConnection) -> std::result::Result<(), StorageError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| {
            if !applied.is_empty() {
                debug!("applied {} store migration(s)", applied.len());
            }
        })
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))
}

#[derive(QueryableByName)]
struct IntegrityRow {
    #[diesel(sql_type = Text)]
    integrity_check: String,
}

/// Run SQLite's integrity check. Anything but a single `ok` row means the
/// file is damaged and the caller gets the corruption error with the path
/// and the recovery hint.
fn check_integrity(conn: &mut SqliteConnection, db_path: &Path) -> Result<()> {
    let rows: Vec<IntegrityRow> = diesel::sql_query("PRAGMA integrity_check")
        .load(conn)
        .map_err(|e| {
            CoreError::Store(StoreError::Corruption {
                path: db_path.to_path_buf(),
                detail: format!("integrity check could not run: {e}"),
            })
        })?;

    let ok = rows.len() == 1 && rows[0].integrity_check.eq_ignore_ascii_case("ok");
    if ok {
        Ok(())
    } else {
        let detail = rows
            .iter()
            .map(|r| r.integrity_check.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Err(CoreError::Store(StoreError::Corruption {
            path: db_path.to_path_buf(),
            detail,
        }))
    }
}

/// Open the store: pool, integrity check, migrations, and the single writer
/// actor. Must be called from within a Tokio runtime (the writer is a
/// spawned task).
pub fn init(db_path: &Path) -> Result<(DbPool, WriteHandle)> {
    let pool = create_pool(db_path).map_err(CoreError::from)?;

    let mut conn = get_connection(&pool)?;
    check_integrity(&mut conn, db_path)?;
    run_migrations(&mut conn).map_err(CoreError::from)?;
    drop(conn);

    let writer = spawn_writer(pool.clone(), db_path.to_path_buf());
    Ok((pool, writer))
}
