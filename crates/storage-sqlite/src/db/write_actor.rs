//! Single-writer actor serializing all store mutations.
//!
//! SQLite allows one writer at a time; funneling every write through one
//! dedicated connection turns concurrent in-process writers into a queue
//! instead of a lock fight. Each job runs inside an immediate transaction,
//! so a failed job leaves the store exactly as it was. A job that still
//! loses a lock race (another process touching the file) is retried once
//! before the conflict surfaces.

use std::any::Any;
use std::path::{Path, PathBuf};

use diesel::result::Error as DieselError;
use diesel::{Connection, SqliteConnection};
use log::warn;
use tokio::sync::{mpsc, oneshot};

use marketbars_core::errors::{Error as CoreError, Result};

use super::DbPool;
use crate::errors::{classify_diesel_error, is_write_conflict};

/// Error type threaded through the transaction closure: either a Diesel
/// failure from the transaction machinery itself, or whatever the job
/// returned. Keeps the job's typed core error intact across the transaction
/// boundary.
enum TxError {
    Diesel(DieselError),
    Core(CoreError),
}

impl From<DieselError> for TxError {
    fn from(e: DieselError) -> Self {
        TxError::Diesel(e)
    }
}

type ErasedResult = Result<Box<dyn Any + Send + 'static>>;
type Job = Box<dyn Fn(&mut SqliteConnection) -> ErasedResult + Send + 'static>;

/// Handle for submitting write jobs to the actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(Job, oneshot::Sender<ErasedResult>)>,
}

impl WriteHandle {
    /// Run `job` on the writer's dedicated connection, inside an immediate
    /// transaction. `job` must be re-runnable (`Fn`): it is invoked a second
    /// time if the first transaction loses a lock race.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: Fn(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + Any + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let erased: Job = Box::new(move |conn| {
            job(conn).map(|value| Box::new(value) as Box<dyn Any + Send>)
        });

        self.tx
            .send((erased, reply_tx))
            .await
            .expect("store writer task stopped; was the runtime shut down?");

        reply_rx
            .await
            .expect("store writer dropped a reply without answering")
            .map(|boxed| {
                *boxed
                    .downcast::<T>()
                    .unwrap_or_else(|_| panic!("store writer returned an unexpected type"))
            })
    }
}

/// Spawn the writer task. It owns one connection from the pool for its whole
/// lifetime and processes jobs strictly in order.
pub fn spawn_writer(pool: DbPool, db_path: PathBuf) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(Job, oneshot::Sender<ErasedResult>)>(256);

    tokio::spawn(async move {
        let mut conn = pool
            .get()
            .expect("failed to reserve the store writer connection");

        while let Some((job, reply_tx)) = rx.recv().await {
            let mut result = run_job(&mut conn, &job, &db_path);

            if let Err(CoreError::Store(store_err)) = &result {
                if is_write_conflict(store_err) {
                    warn!("store write hit a lock conflict, retrying once");
                    result = run_job(&mut conn, &job, &db_path);
                }
            }

            // The receiver may have been cancelled; nothing to do then.
            let _ = reply_tx.send(result);
        }
        // Channel closed: every WriteHandle is gone, the actor winds down.
    });

    WriteHandle { tx }
}

fn run_job(conn: &mut SqliteConnection, job: &Job, db_path: &Path) -> ErasedResult {
    conn.immediate_transaction::<_, TxError, _>(|c| job(c).map_err(TxError::Core))
        .map_err(|e| match e {
            TxError::Diesel(diesel_err) => {
                CoreError::Store(classify_diesel_error(db_path, diesel_err))
            }
            TxError::Core(core_err) => core_err,
        })
}
