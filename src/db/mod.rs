pub mod migrations;
pub mod queries;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::errors::AppError;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// How many times a transaction is retried when SQLite reports the
/// database as busy before the request gives up with a conflict.
const MAX_TX_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = init_db(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` inside an immediate transaction. The closure sees a
    /// consistent snapshot; any error rolls the whole transaction back.
    /// Busy/locked failures are retried a bounded number of times, after
    /// which the caller gets a `Conflict` and should retry the request.
    pub fn run_transaction<T, F>(&self, mut f: F) -> Result<T, AppError>
    where
        F: FnMut(&Transaction) -> Result<T, AppError>,
    {
        let mut attempts: u32 = 0;
        loop {
            let mut conn = self.conn.lock().unwrap();
            let outcome = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
                Err(e) => Err(AppError::from(e)),
                Ok(tx) => match f(&tx) {
                    Ok(value) => tx.commit().map(|()| value).map_err(AppError::from),
                    Err(err) => {
                        let _ = tx.rollback();
                        Err(err)
                    }
                },
            };
            drop(conn);

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if busy_app_error(&err) => {
                    if attempts >= MAX_TX_RETRIES {
                        return Err(AppError::Conflict);
                    }
                    attempts += 1;
                    std::thread::sleep(std::time::Duration::from_millis(10 * attempts as u64));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn busy_app_error(err: &AppError) -> bool {
    match err {
        AppError::Database(e) => is_busy(e),
        AppError::Internal(e) => e
            .downcast_ref::<rusqlite::Error>()
            .map(is_busy)
            .unwrap_or(false),
        _ => false,
    }
}
