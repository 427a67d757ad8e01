//! # Ledger Store
//!
//! The handle every engine is built from: the database, the busy-retry
//! policy, and the transaction id source. Cheap to clone.
//!
//! Engines never reach for a global connection. Tests build a store over an
//! in-memory database, production builds one from [`LedgerConfig`].

use std::sync::Arc;
use till_core::{RandomTransactionIds, TransactionIdSource};
use till_db::{Database, ImmediateTx};
use tracing::warn;

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::retry::RetryPolicy;

#[derive(Clone)]
pub struct LedgerStore {
    db: Database,
    retry: RetryPolicy,
    ids: Arc<dyn TransactionIdSource>,
}

impl LedgerStore {
    /// Wraps an open database with the default retry policy and random ids.
    pub fn new(db: Database) -> Self {
        LedgerStore {
            db,
            retry: RetryPolicy::default(),
            ids: Arc::new(RandomTransactionIds),
        }
    }

    /// Opens the configured database and applies the configured retry policy.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        if let Some(parent) = config.database.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    till_db::DbError::ConnectionFailed(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = Database::new(config.db_config()).await?;
        Ok(Self::new(db).with_retry_policy(config.retry_policy()))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_id_source(mut self, ids: Arc<dyn TransactionIdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn ids(&self) -> &dyn TransactionIdSource {
        self.ids.as_ref()
    }
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Commits on success, rolls back on failure. The original error wins over a
/// failed rollback.
pub(crate) async fn finish<T>(tx: ImmediateTx, result: LedgerResult<T>) -> LedgerResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed after {}", e);
            }
            Err(e)
        }
    }
}
