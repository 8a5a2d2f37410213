pub mod error;
pub mod identity;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod retry;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

pub use error::{StoreError, is_transient};
pub use identity::{EditOutcome, InboundMessage, Mapping};
pub use models::{ChannelRow, MessageRow, NewMessage, UserRow};
pub use retry::{RetryPolicy, retry_transient};

/// How long SQLite waits on a locked database before reporting `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A storage session: one SQLite connection. Each execution context opens its
/// own; clones share the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode so the two bridge sessions don't block each other's reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Override how long a write waits on another session's lock before
    /// failing with `SQLITE_BUSY`.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("DB lock poisoned: {}", e)))?;
        conn.busy_timeout(timeout)?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` inside a fresh unit of work. Commits when `f` returns `Ok`,
    /// rolls back otherwise.
    pub fn transact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("DB lock poisoned: {}", e)))?;

        let uow = UnitOfWork {
            tx: conn.transaction_with_behavior(TransactionBehavior::Immediate)?,
        };

        match f(&uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!("Rolling back unit of work: {}", e);
                if let Err(rollback_err) = uow.rollback() {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// [`Database::transact`] on the blocking pool, for use from async handlers.
    pub async fn unit_of_work<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.transact(f))
            .await
            .map_err(|e| anyhow!("storage task join error: {}", e))?
    }
}

/// One transaction against the bridge tables. Obtained per logical operation
/// through [`Database::transact`]; never stored.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn error_in_closure_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.transact(|uow| {
            uow.upsert_channel(10, Utc::now())?;
            Err(anyhow!("boom"))
        });
        assert!(result.is_err());

        let channel = db.transact(|uow| uow.channel_by_origin(10)).unwrap();
        assert!(channel.is_none());
    }

    #[test]
    fn ok_closure_commits() {
        let db = Database::open_in_memory().unwrap();
        let created = db.transact(|uow| uow.upsert_channel(10, Utc::now())).unwrap();
        let found = db.transact(|uow| uow.channel_by_origin(10)).unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn unit_of_work_runs_off_the_runtime() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .unit_of_work(|uow| uow.insert_user("Ada"))
            .await
            .unwrap();
        let loaded = db.unit_of_work(move |uow| uow.user(user.id)).await.unwrap();
        assert_eq!(loaded.unwrap().display_name, "Ada");
    }
}
