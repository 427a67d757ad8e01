//! # Database Migrations
//!
//! Embedded SQL migrations for the till ledger.
//!
//! ```text
//! migrations/
//! ├── 0001_ledger_schema.sql   # inventory, sales, sale_lines, corrections,
//! │                            # supervisor_sessions
//! └── 0002_audit_guards.sql    # sale_audit_log + append-only triggers
//! ```
//!
//! Never modify an applied migration. The append-only guarantees live in
//! triggers, so loosening them takes a new migration that drops a trigger,
//! and that shows up in review.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Migrations embedded at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Runs all pending database migrations.
///
/// Idempotent. Each migration runs in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}
