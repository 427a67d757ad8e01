//! # Correction Repository
//!
//! VOID and REFUND records. Insert-only: the triggers in
//! `0002_audit_guards.sql` refuse UPDATE and DELETE, and a partial unique
//! index allows at most one VOID per sale.

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{Correction, CorrectionType};

const CORRECTION_COLUMNS: &str = "id, original_sale_id, correction_type, reason, requested_by, \
     authorized_by, created_at, original_line_id, original_item, original_quantity, \
     original_price_cents, original_total_cents, corrected_quantity, correction_amount_cents, \
     refund_sale_id, line_snapshot";

/// Correction values for an insert.
#[derive(Debug, Clone)]
pub struct NewCorrection<'a> {
    pub original_sale_id: i64,
    pub correction_type: CorrectionType,
    pub reason: &'a str,
    pub requested_by: &'a str,
    pub authorized_by: &'a str,
    pub created_at: DateTime<Utc>,
    pub original_line_id: Option<i64>,
    pub original_item: &'a str,
    pub original_quantity: i64,
    pub original_price_cents: Option<i64>,
    pub original_total_cents: i64,
    pub corrected_quantity: i64,
    pub correction_amount_cents: i64,
    pub refund_sale_id: Option<i64>,
    pub line_snapshot: Option<&'a str>,
}

/// Repository for correction reads.
#[derive(Debug, Clone)]
pub struct CorrectionRepository {
    pool: SqlitePool,
}

impl CorrectionRepository {
    /// Creates a new CorrectionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CorrectionRepository { pool }
    }

    /// Corrections recorded against a sale, oldest first.
    pub async fn for_sale(&self, sale_id: i64) -> DbResult<Vec<Correction>> {
        fetch_for_sale(&self.pool, sale_id).await
    }

    /// Units already refunded on a line.
    pub async fn refunded_quantity(&self, line_id: i64) -> DbResult<i64> {
        refunded_quantity(&self.pool, line_id).await
    }

    /// Number of corrections of the given type.
    pub async fn count(&self, correction_type: CorrectionType) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corrections WHERE correction_type = ?1")
            .bind(correction_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Statements
// =============================================================================

/// Corrections recorded against a sale, oldest first.
pub async fn fetch_for_sale<'e, E>(executor: E, sale_id: i64) -> DbResult<Vec<Correction>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!(
        "SELECT {} FROM corrections WHERE original_sale_id = ?1 ORDER BY id",
        CORRECTION_COLUMNS
    );
    let rows = sqlx::query_as::<_, Correction>(&sql)
        .bind(sale_id)
        .fetch_all(executor)
        .await?;

    Ok(rows)
}

/// Inserts a correction and returns its id.
///
/// A second VOID for the same sale surfaces as
/// [`DbError::UniqueViolation`](crate::DbError::UniqueViolation).
pub async fn insert_correction<'e, E>(executor: E, c: &NewCorrection<'_>) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    debug!(
        sale_id = c.original_sale_id,
        correction_type = c.correction_type.as_str(),
        "Recording correction"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO corrections (
            original_sale_id, correction_type, reason, requested_by, authorized_by,
            created_at, original_line_id, original_item, original_quantity,
            original_price_cents, original_total_cents, corrected_quantity,
            correction_amount_cents, refund_sale_id, line_snapshot
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(c.original_sale_id)
    .bind(c.correction_type)
    .bind(c.reason)
    .bind(c.requested_by)
    .bind(c.authorized_by)
    .bind(c.created_at)
    .bind(c.original_line_id)
    .bind(c.original_item)
    .bind(c.original_quantity)
    .bind(c.original_price_cents)
    .bind(c.original_total_cents)
    .bind(c.corrected_quantity)
    .bind(c.correction_amount_cents)
    .bind(c.refund_sale_id)
    .bind(c.line_snapshot)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Units already refunded on a line.
pub async fn refunded_quantity<'e, E>(executor: E, line_id: i64) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let refunded: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(corrected_quantity), 0) FROM corrections
        WHERE original_line_id = ?1 AND correction_type = 'REFUND'
        "#,
    )
    .bind(line_id)
    .fetch_one(executor)
    .await?;

    Ok(refunded)
}

/// Units refunded across every line of a sale.
pub async fn refunded_units_for_sale<'e, E>(executor: E, sale_id: i64) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let refunded: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(corrected_quantity), 0) FROM corrections
        WHERE original_sale_id = ?1 AND correction_type = 'REFUND'
        "#,
    )
    .bind(sale_id)
    .fetch_one(executor)
    .await?;

    Ok(refunded)
}

// =============================================================================
// Unit Tests
// =============================================================================
