//! # Immediate Write Transactions
//!
//! SQLite's default `BEGIN` is DEFERRED: the write lock is taken at the first
//! write, after the stock reads. Two registers could then both read
//! `Water=3`, both sell 3, and one would fail late or oversell.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Register A                       Register B                           │
//! │  BEGIN IMMEDIATE  ── lock ──┐                                          │
//! │  SELECT stock (Water=3)     │     BEGIN IMMEDIATE ... waits             │
//! │  UPDATE stock (Water=0)     │          (busy_timeout)                   │
//! │  INSERT sale + lines        │                                          │
//! │  COMMIT ────────────────────┘     ... acquires lock                    │
//! │                                   SELECT stock (Water=0) → reject      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every statement of the operation must run on [`ImmediateTx::conn`]. The
//! transaction owns its pool connection, so going back to the pool from
//! inside it would wait on a second connection (or deadlock on a pool of one).

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// An open `BEGIN IMMEDIATE` transaction on a dedicated pool connection.
///
/// Finish it with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping it while open discards the connection instead of returning a
/// connection with a live transaction to the pool.
pub struct ImmediateTx {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl ImmediateTx {
    /// Acquires a connection and takes the write lock.
    ///
    /// Fails with [`DbError::Busy`] if another writer holds the lock past the
    /// configured busy timeout.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        debug!("Write transaction started");
        Ok(ImmediateTx { conn, open: true })
    }

    /// The transaction's connection. Pass it to every repository call.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Commits. On failure the transaction is rolled back before returning.
    pub async fn commit(mut self) -> DbResult<()> {
        match sqlx::query("COMMIT").execute(&mut *self.conn).await {
            Ok(_) => {
                self.open = false;
                debug!("Write transaction committed");
                Ok(())
            }
            Err(err) => {
                let err = DbError::from(err);
                warn!(error = %err, "Commit failed, rolling back");
                self.rollback_in_place().await;
                Err(err)
            }
        }
    }

    /// Rolls back every statement run on this transaction.
    pub async fn rollback(mut self) -> DbResult<()> {
        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        self.open = false;
        debug!("Write transaction rolled back");
        Ok(())
    }

    async fn rollback_in_place(&mut self) {
        match sqlx::query("ROLLBACK").execute(&mut *self.conn).await {
            Ok(_) => self.open = false,
            Err(e) => warn!(error = %e, "Rollback after failed commit also failed"),
        }
    }
}

impl Drop for ImmediateTx {
    fn drop(&mut self) {
        if self.open {
            warn!("Write transaction dropped while open; discarding connection");
            // SQLite rolls back an open transaction when the connection closes.
            self.conn.close_on_drop();
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_immediate().await.unwrap();
        sqlx::query("INSERT INTO inventory (item, quantity, updated_at) VALUES ('Beer', 5, '2026-10-18T00:00:00Z')")
            .execute(tx.conn())
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(db.inventory().stock("Beer").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_persists_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin_immediate().await.unwrap();
        sqlx::query("INSERT INTO inventory (item, quantity, updated_at) VALUES ('Beer', 5, '2026-10-18T00:00:00Z')")
            .execute(tx.conn())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.inventory().stock("Beer").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_second_writer_waits_then_reports_busy() {
        let path = std::env::temp_dir().join(format!("till-tx-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(
            DbConfig::new(&path)
                .max_connections(2)
                .busy_timeout(std::time::Duration::from_millis(100)),
        )
        .await
        .unwrap();

        let first = db.begin_immediate().await.unwrap();
        let second = db.begin_immediate().await;
        assert!(matches!(second, Err(ref e) if e.is_retryable()));

        first.rollback().await.unwrap();
        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
