//! # Supervisor Session Repository
//!
//! One row per authorization attempt: who was asked, by whom, for what, and
//! how it ended. DENIED rows are written in their own transaction so a
//! failed PIN leaves a trace even though the correction itself never runs.

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::DbResult;
use till_core::{AuthorizationOutcome, SupervisorAction, SupervisorSession};

const SESSION_COLUMNS: &str =
    "id, supervisor_name, session_start, cashier_name, action_type, outcome, sale_id";

/// Session values for an insert.
#[derive(Debug, Clone)]
pub struct NewSupervisorSession<'a> {
    pub supervisor_name: &'a str,
    pub session_start: DateTime<Utc>,
    pub cashier_name: &'a str,
    pub action_type: SupervisorAction,
    pub outcome: AuthorizationOutcome,
    pub sale_id: Option<i64>,
}

/// Repository for the authorization trail.
#[derive(Debug, Clone)]
pub struct SupervisorSessionRepository {
    pool: SqlitePool,
}

impl SupervisorSessionRepository {
    /// Creates a new SupervisorSessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SupervisorSessionRepository { pool }
    }

    /// Records an attempt outside any other transaction.
    pub async fn record(&self, session: &NewSupervisorSession<'_>) -> DbResult<i64> {
        insert_session(&self.pool, session).await
    }

    /// Most recent attempts, newest first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<SupervisorSession>> {
        let sql = format!(
            "SELECT {} FROM supervisor_sessions ORDER BY id DESC LIMIT ?1",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SupervisorSession>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Attempts that named a sale, oldest first.
    pub async fn for_sale(&self, sale_id: i64) -> DbResult<Vec<SupervisorSession>> {
        let sql = format!(
            "SELECT {} FROM supervisor_sessions WHERE sale_id = ?1 ORDER BY id",
            SESSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SupervisorSession>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Attempts with a given outcome.
    pub async fn count_by_outcome(&self, outcome: AuthorizationOutcome) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM supervisor_sessions WHERE outcome = ?1")
            .bind(outcome)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Inserts an attempt and returns its id.
pub async fn insert_session<'e, E>(executor: E, session: &NewSupervisorSession<'_>) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO supervisor_sessions (supervisor_name, session_start, cashier_name, action_type, outcome, sale_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(session.supervisor_name)
    .bind(session.session_start)
    .bind(session.cashier_name)
    .bind(session.action_type)
    .bind(session.outcome)
    .bind(session.sale_id)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.supervisor_sessions();

        for outcome in [AuthorizationOutcome::Denied, AuthorizationOutcome::Granted] {
            repo.record(&NewSupervisorSession {
                supervisor_name: "sam",
                session_start: Utc::now(),
                cashier_name: "alice",
                action_type: SupervisorAction::Void,
                outcome,
                sale_id: Some(7),
            })
            .await
            .unwrap();
        }

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].outcome, AuthorizationOutcome::Granted);
        assert_eq!(repo.for_sale(7).await.unwrap().len(), 2);
        assert_eq!(repo.count_by_outcome(AuthorizationOutcome::Denied).await.unwrap(), 1);
    }
}
