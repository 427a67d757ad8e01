//! # Audit Repository
//!
//! The sale change trail written by the `sales_update_audit` trigger, and
//! the read-only queries behind the integrity sweep.
//!
//! ## Integrity Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Check                          Query                                  │
//! │  ─────                          ─────                                  │
//! │  void_without_authorizer        VOIDED and void_authorized_by empty    │
//! │  refund_without_correction      REFUND header, no REFUND correction    │
//! │  refund_without_original        REFUND header, original_sale_id NULL   │
//! │  unclassified_negative_total    total < 0 and not a classified refund  │
//! │  total_mismatch                 total ≠ Σ line subtotals               │
//! │  over_refunded_line             Σ refunded > sold on a line            │
//! │  negative_stock                 inventory.quantity < 0                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these can happen through the engines. They catch raw edits and
//! schema drift.

use sqlx::SqlitePool;

use crate::error::DbResult;
use till_core::{IntegrityViolation, SaleAuditEntry};

/// Repository for the change trail and integrity queries.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Field-level changes recorded for a sale, oldest first.
    pub async fn trail_for(&self, sale_id: i64) -> DbResult<Vec<SaleAuditEntry>> {
        let rows = sqlx::query_as::<_, SaleAuditEntry>(
            r#"
            SELECT id, sale_id, field_changed, old_value, new_value, changed_by, changed_at
            FROM sale_audit_log
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn voided_without_authorizer(&self) -> DbResult<Vec<IntegrityViolation>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM sales
            WHERE status = 'VOIDED'
              AND (void_authorized_by IS NULL OR TRIM(void_authorized_by) = '')
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .into_iter()
            .map(|sale_id| IntegrityViolation::VoidWithoutAuthorizer { sale_id })
            .collect())
    }

    pub async fn refunds_without_correction(&self) -> DbResult<Vec<IntegrityViolation>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT s.id FROM sales s
            WHERE s.kind = 'REFUND'
              AND NOT EXISTS (
                  SELECT 1 FROM corrections c
                  WHERE c.refund_sale_id = s.id AND c.correction_type = 'REFUND'
              )
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .into_iter()
            .map(|sale_id| IntegrityViolation::RefundWithoutCorrection { sale_id })
            .collect())
    }

    pub async fn refunds_without_original(&self) -> DbResult<Vec<IntegrityViolation>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM sales WHERE kind = 'REFUND' AND original_sale_id IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids
            .into_iter()
            .map(|sale_id| IntegrityViolation::RefundWithoutOriginal { sale_id })
            .collect())
    }

    /// Negative totals are only legitimate on REFUND headers that carry an
    /// adjustment reason and authorizer.
    pub async fn unclassified_negative_totals(&self) -> DbResult<Vec<IntegrityViolation>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, total_cents FROM sales
            WHERE total_cents < 0
              AND NOT (
                  kind = 'REFUND'
                  AND COALESCE(TRIM(adjustment_reason), '') <> ''
                  AND COALESCE(TRIM(adjustment_authorized_by), '') <> ''
              )
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(sale_id, total_cents)| IntegrityViolation::UnclassifiedNegativeTotal {
                sale_id,
                total_cents,
            })
            .collect())
    }

    pub async fn total_mismatches(&self) -> DbResult<Vec<IntegrityViolation>> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT s.id, s.total_cents, COALESCE(SUM(l.subtotal_cents), 0) AS lines_cents
            FROM sales s
            LEFT JOIN sale_lines l ON l.sale_id = s.id
            GROUP BY s.id, s.total_cents
            HAVING s.total_cents <> COALESCE(SUM(l.subtotal_cents), 0)
            ORDER BY s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(sale_id, total_cents, lines_cents)| IntegrityViolation::TotalMismatch {
                sale_id,
                total_cents,
                lines_cents,
            })
            .collect())
    }

    pub async fn over_refunded_lines(&self) -> DbResult<Vec<IntegrityViolation>> {
        let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT l.sale_id, l.id, l.quantity, SUM(c.corrected_quantity) AS refunded
            FROM sale_lines l
            JOIN corrections c
              ON c.original_line_id = l.id AND c.correction_type = 'REFUND'
            GROUP BY l.id, l.sale_id, l.quantity
            HAVING SUM(c.corrected_quantity) > l.quantity
            ORDER BY l.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(sale_id, line_id, sold, refunded)| IntegrityViolation::OverRefundedLine {
                sale_id,
                line_id,
                sold,
                refunded,
            })
            .collect())
    }

    pub async fn negative_stock(&self) -> DbResult<Vec<IntegrityViolation>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT item, quantity FROM inventory WHERE quantity < 0 ORDER BY item")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(item, quantity)| IntegrityViolation::NegativeStock { item, quantity })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::sale::{insert_header, insert_line, mark_voided, NewSale, NewSaleLine};
    use chrono::Utc;
    use till_core::SaleKind;

    async fn header(db: &Database, txid: &str, kind: SaleKind, total: i64) -> i64 {
        insert_header(
            db.pool(),
            &NewSale {
                transaction_id: txid,
                kind,
                original_sale_id: None,
                cashier: "alice",
                total_cents: total,
                created_at: Utc::now(),
                adjustment_reason: None,
                adjustment_authorized_by: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_void_writes_change_trail() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = header(&db, "TX-20261018143005-000001", SaleKind::Sale, 0).await;
        mark_voided(db.pool(), id, "test", "sam", Utc::now()).await.unwrap();

        let trail = db.audit().trail_for(id).await.unwrap();
        let fields: Vec<_> = trail.iter().map(|e| e.field_changed.as_str()).collect();
        assert_eq!(fields, vec!["status", "void_reason", "void_authorized_by", "voided_at"]);
        assert_eq!(trail[0].old_value.as_deref(), Some("ACTIVE"));
        assert_eq!(trail[0].new_value.as_deref(), Some("VOIDED"));
        assert_eq!(trail[0].changed_by.as_deref(), Some("sam"));
    }

    #[tokio::test]
    async fn test_clean_ledger_has_no_violations() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = header(&db, "TX-20261018143005-000001", SaleKind::Sale, 4000).await;
        insert_line(
            db.pool(),
            &NewSaleLine {
                sale_id: id,
                item: "Beer",
                quantity: 2,
                unit_price_cents: 2000,
                refunded_line_id: None,
            },
        )
        .await
        .unwrap();

        let audit = db.audit();
        assert!(audit.voided_without_authorizer().await.unwrap().is_empty());
        assert!(audit.refunds_without_correction().await.unwrap().is_empty());
        assert!(audit.unclassified_negative_totals().await.unwrap().is_empty());
        assert!(audit.total_mismatches().await.unwrap().is_empty());
        assert!(audit.over_refunded_lines().await.unwrap().is_empty());
        assert!(audit.negative_stock().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detects_bare_refund_header() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = header(&db, "TX-20261018143005-000002", SaleKind::Refund, -500).await;

        let audit = db.audit();
        assert_eq!(
            audit.refunds_without_correction().await.unwrap(),
            vec![IntegrityViolation::RefundWithoutCorrection { sale_id: id }]
        );
        assert_eq!(
            audit.refunds_without_original().await.unwrap(),
            vec![IntegrityViolation::RefundWithoutOriginal { sale_id: id }]
        );
        assert_eq!(
            audit.unclassified_negative_totals().await.unwrap(),
            vec![IntegrityViolation::UnclassifiedNegativeTotal {
                sale_id: id,
                total_cents: -500
            }]
        );
        assert_eq!(
            audit.total_mismatches().await.unwrap(),
            vec![IntegrityViolation::TotalMismatch {
                sale_id: id,
                total_cents: -500,
                lines_cents: 0
            }]
        );
    }
}
