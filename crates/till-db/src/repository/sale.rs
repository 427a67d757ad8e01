//! # Sale Repository
//!
//! Sale headers and lines.
//!
//! ## Header Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  insert_header(kind=SALE) + insert_line × N       status = ACTIVE      │
//! │       │                                                                 │
//! │       ├── mark_voided()  ──► status = VOIDED (final; trigger-enforced) │
//! │       │                                                                 │
//! │       └── refund ──► insert_header(kind=REFUND, original_sale_id)      │
//! │                      insert_line(refunded_line_id, negative price)     │
//! │                                                                         │
//! │  Nothing else about a header ever changes, and nothing is deleted.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::correction;
use till_core::{Receipt, Sale, SaleKind, SaleLine};

macro_rules! sale_columns {
    () => {
        "id, transaction_id, kind, original_sale_id, cashier, total_cents, created_at, status, \
         void_reason, void_authorized_by, voided_at, adjustment_reason, adjustment_authorized_by"
    };
}

macro_rules! line_columns {
    () => {
        "id, sale_id, item, quantity, unit_price_cents, subtotal_cents, refunded_line_id"
    };
}

/// Header values for an insert. The id is assigned by SQLite.
#[derive(Debug, Clone)]
pub struct NewSale<'a> {
    pub transaction_id: &'a str,
    pub kind: SaleKind,
    pub original_sale_id: Option<i64>,
    pub cashier: &'a str,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub adjustment_reason: Option<&'a str>,
    pub adjustment_authorized_by: Option<&'a str>,
}

/// Line values for an insert. The subtotal is derived.
#[derive(Debug, Clone)]
pub struct NewSaleLine<'a> {
    pub sale_id: i64,
    pub item: &'a str,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub refunded_line_id: Option<i64>,
}

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Sale>> {
        fetch_sale(&self.pool, id).await
    }

    /// Gets a sale header by its receipt transaction id.
    pub async fn get_by_transaction_id(&self, transaction_id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(concat!(
            "SELECT ",
            sale_columns!(),
            " FROM sales WHERE transaction_id = ?1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Lines of a sale in insertion order.
    pub async fn lines(&self, sale_id: i64) -> DbResult<Vec<SaleLine>> {
        fetch_lines(&self.pool, sale_id).await
    }

    /// REFUND headers issued against a sale, oldest first.
    pub async fn refunds_of(&self, sale_id: i64) -> DbResult<Vec<Sale>> {
        let refunds = sqlx::query_as::<_, Sale>(concat!(
            "SELECT ",
            sale_columns!(),
            " FROM sales WHERE original_sale_id = ?1 AND kind = 'REFUND' ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(refunds)
    }

    /// Most recent headers of any kind, newest first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(concat!(
            "SELECT ",
            sale_columns!(),
            " FROM sales ORDER BY id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Header, lines and corrections of one sale, read from one snapshot.
    ///
    /// Returns `None` if the sale does not exist.
    pub async fn receipt(&self, sale_id: i64) -> DbResult<Option<Receipt>> {
        let mut tx = self.pool.begin().await?;

        let Some(sale) = fetch_sale(&mut *tx, sale_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let lines = fetch_lines(&mut *tx, sale_id).await?;
        let corrections = correction::fetch_for_sale(&mut *tx, sale_id).await?;

        tx.commit().await?;

        Ok(Some(Receipt {
            sale,
            lines,
            corrections,
        }))
    }

    /// Number of sale headers of the given kind.
    pub async fn count(&self, kind: SaleKind) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE kind = ?1")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Statements
// =============================================================================

/// Gets a sale header by id.
pub async fn fetch_sale<'e, E>(executor: E, id: i64) -> DbResult<Option<Sale>>
where
    E: SqliteExecutor<'e>,
{
    let sale = sqlx::query_as::<_, Sale>(concat!(
        "SELECT ",
        sale_columns!(),
        " FROM sales WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(sale)
}

/// Lines of a sale in insertion order.
pub async fn fetch_lines<'e, E>(executor: E, sale_id: i64) -> DbResult<Vec<SaleLine>>
where
    E: SqliteExecutor<'e>,
{
    let lines = sqlx::query_as::<_, SaleLine>(concat!(
        "SELECT ",
        line_columns!(),
        " FROM sale_lines WHERE sale_id = ?1 ORDER BY id"
    ))
    .bind(sale_id)
    .fetch_all(executor)
    .await?;

    Ok(lines)
}

/// One line, only if it belongs to the given sale.
pub async fn fetch_line<'e, E>(executor: E, sale_id: i64, line_id: i64) -> DbResult<Option<SaleLine>>
where
    E: SqliteExecutor<'e>,
{
    let line = sqlx::query_as::<_, SaleLine>(concat!(
        "SELECT ",
        line_columns!(),
        " FROM sale_lines WHERE id = ?1 AND sale_id = ?2"
    ))
    .bind(line_id)
    .bind(sale_id)
    .fetch_optional(executor)
    .await?;

    Ok(line)
}

/// Inserts a header and returns its id.
///
/// A duplicate `transaction_id` surfaces as
/// [`DbError::UniqueViolation`](crate::DbError::UniqueViolation).
pub async fn insert_header<'e, E>(executor: E, sale: &NewSale<'_>) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    debug!(transaction_id = %sale.transaction_id, kind = sale.kind.as_str(), "Inserting sale header");

    let result = sqlx::query(
        r#"
        INSERT INTO sales (
            transaction_id, kind, original_sale_id, cashier, total_cents,
            created_at, status, adjustment_reason, adjustment_authorized_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'ACTIVE', ?7, ?8)
        "#,
    )
    .bind(sale.transaction_id)
    .bind(sale.kind)
    .bind(sale.original_sale_id)
    .bind(sale.cashier)
    .bind(sale.total_cents)
    .bind(sale.created_at)
    .bind(sale.adjustment_reason)
    .bind(sale.adjustment_authorized_by)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Inserts a line and returns its id.
pub async fn insert_line<'e, E>(executor: E, line: &NewSaleLine<'_>) -> DbResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO sale_lines (sale_id, item, quantity, unit_price_cents, subtotal_cents, refunded_line_id)
        VALUES (?1, ?2, ?3, ?4, ?3 * ?4, ?5)
        "#,
    )
    .bind(line.sale_id)
    .bind(line.item)
    .bind(line.quantity)
    .bind(line.unit_price_cents)
    .bind(line.refunded_line_id)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Flips an ACTIVE header to VOIDED. Returns rows affected (0 if not ACTIVE).
pub async fn mark_voided<'e, E>(
    executor: E,
    sale_id: i64,
    reason: &str,
    authorized_by: &str,
    at: DateTime<Utc>,
) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE sales SET
            status = 'VOIDED',
            void_reason = ?2,
            void_authorized_by = ?3,
            voided_at = ?4
        WHERE id = ?1 AND status = 'ACTIVE'
        "#,
    )
    .bind(sale_id)
    .bind(reason)
    .bind(authorized_by)
    .bind(at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::DbError;
    use till_core::SaleStatus;

    async fn insert_sale(db: &Database, txid: &str) -> i64 {
        let id = insert_header(
            db.pool(),
            &NewSale {
                transaction_id: txid,
                kind: SaleKind::Sale,
                original_sale_id: None,
                cashier: "alice",
                total_cents: 4800,
                created_at: Utc::now(),
                adjustment_reason: None,
                adjustment_authorized_by: None,
            },
        )
        .await
        .unwrap();
        for (item, qty, price) in [("Beer", 2, 2000), ("Water", 1, 800)] {
            insert_line(
                db.pool(),
                &NewSaleLine {
                    sale_id: id,
                    item,
                    quantity: qty,
                    unit_price_cents: price,
                    refunded_line_id: None,
                },
            )
            .await
            .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = insert_sale(&db, "TX-20261018143005-000001").await;

        let sale = db.sales().get(id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Active);
        assert_eq!(sale.kind, SaleKind::Sale);
        assert_eq!(sale.total_cents, 4800);

        let lines = db.sales().lines(id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].subtotal_cents, 4000);
        assert_eq!(lines.iter().map(|l| l.subtotal_cents).sum::<i64>(), sale.total_cents);

        let by_txid = db
            .sales()
            .get_by_transaction_id("TX-20261018143005-000001")
            .await
            .unwrap();
        assert_eq!(by_txid.map(|s| s.id), Some(id));
    }

    #[tokio::test]
    async fn test_duplicate_transaction_id_is_unique_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert_sale(&db, "TX-20261018143005-000001").await;

        let err = insert_header(
            db.pool(),
            &NewSale {
                transaction_id: "TX-20261018143005-000001",
                kind: SaleKind::Sale,
                original_sale_id: None,
                cashier: "bob",
                total_cents: 100,
                created_at: Utc::now(),
                adjustment_reason: None,
                adjustment_authorized_by: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_unique_violation_on("transaction_id"));
    }

    #[tokio::test]
    async fn test_voided_sale_is_final() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let id = insert_sale(&db, "TX-20261018143005-000001").await;

        assert_eq!(mark_voided(db.pool(), id, "wrong order", "sam", Utc::now()).await.unwrap(), 1);
        assert_eq!(mark_voided(db.pool(), id, "again", "sam", Utc::now()).await.unwrap(), 0);

        let err = sqlx::query("UPDATE sales SET status = 'ACTIVE' WHERE id = ?1")
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::AppendOnlyViolation { .. }));
    }

    #[tokio::test]
    async fn test_receipt_for_missing_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.sales().receipt(99).await.unwrap().is_none());

        let id = insert_sale(&db, "TX-20261018143005-000001").await;
        let receipt = db.sales().receipt(id).await.unwrap().unwrap();
        assert_eq!(receipt.lines.len(), 2);
        assert!(receipt.corrections.is_empty());
        assert_eq!(receipt.lines_total(), receipt.sale.total());
    }
}
