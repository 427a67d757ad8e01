//! # Report Repository
//!
//! Read-only queries over committed data.
//!
//! ## Counting Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Header              Counted in revenue?   Why                         │
//! │  ──────              ───────────────────   ───                         │
//! │  SALE   / ACTIVE     yes (+)                                           │
//! │  SALE   / VOIDED     no                    voided_cents only           │
//! │  REFUND / ACTIVE     yes (−)               negative total              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Days are UTC calendar dates of `created_at`. Every query here runs on the
//! pool and never blocks a register's write transaction (WAL).

use chrono::NaiveDate;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::DbResult;
use till_core::{
    CashierPerformance, CashierTotal, CorrectionReportRow, DailySummary, DailyTotal, ExportColumn,
    ExportTable, ItemRollup, ItemSaleHistory, RefundableLine,
};

/// Items listed in a daily summary.
pub const TOP_ITEMS: i64 = 5;

/// Repository for reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    /// Creates a new ReportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// End-of-day summary for one business date.
    pub async fn daily_summary(&self, date: NaiveDate) -> DbResult<DailySummary> {
        let (gross, refunds, voided, sale_count, refund_count, void_count): (i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN kind = 'SALE' AND status = 'ACTIVE' THEN total_cents END), 0),
                    COALESCE(SUM(CASE WHEN kind = 'REFUND' AND status = 'ACTIVE' THEN total_cents END), 0),
                    COALESCE(SUM(CASE WHEN status = 'VOIDED' THEN total_cents END), 0),
                    COUNT(CASE WHEN kind = 'SALE' AND status = 'ACTIVE' THEN 1 END),
                    COUNT(CASE WHEN kind = 'REFUND' AND status = 'ACTIVE' THEN 1 END),
                    COUNT(CASE WHEN status = 'VOIDED' THEN 1 END)
                FROM sales
                WHERE date(created_at) = ?1
                "#,
            )
            .bind(date)
            .fetch_one(&self.pool)
            .await?;

        let top_items = self.item_rollup(date, date, TOP_ITEMS).await?;
        let cashier_totals = self.cashier_totals(date).await?;

        Ok(DailySummary {
            date,
            gross_sales_cents: gross,
            refunds_cents: refunds,
            voided_cents: voided,
            net_sales_cents: gross + refunds,
            sale_count,
            refund_count,
            void_count,
            top_items,
            cashier_totals,
        })
    }

    /// Transactions and net total per day, for days with activity.
    pub async fn daily_totals(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailyTotal>> {
        let rows = sqlx::query_as::<_, DailyTotal>(
            r#"
            SELECT date(created_at) AS date,
                   COUNT(*) AS transactions,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM sales
            WHERE status = 'ACTIVE' AND date(created_at) BETWEEN ?1 AND ?2
            GROUP BY date(created_at)
            ORDER BY date(created_at)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Net units and revenue per item, best sellers first.
    ///
    /// Refund lines subtract; voided sales are excluded.
    pub async fn item_rollup(&self, from: NaiveDate, to: NaiveDate, limit: i64) -> DbResult<Vec<ItemRollup>> {
        let rows = sqlx::query_as::<_, ItemRollup>(
            r#"
            SELECT l.item AS item,
                   SUM(CASE WHEN s.kind = 'REFUND' THEN -l.quantity ELSE l.quantity END) AS quantity,
                   SUM(l.subtotal_cents) AS revenue_cents
            FROM sale_lines l
            JOIN sales s ON s.id = l.sale_id
            WHERE s.status = 'ACTIVE' AND date(s.created_at) BETWEEN ?1 AND ?2
            GROUP BY l.item
            ORDER BY revenue_cents DESC, item ASC
            LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Net takings per cashier for one day, highest first.
    pub async fn cashier_totals(&self, date: NaiveDate) -> DbResult<Vec<CashierTotal>> {
        let rows = sqlx::query_as::<_, CashierTotal>(
            r#"
            SELECT cashier,
                   COUNT(*) AS transactions,
                   COALESCE(SUM(total_cents), 0) AS total_cents
            FROM sales
            WHERE status = 'ACTIVE' AND date(created_at) = ?1
            GROUP BY cashier
            ORDER BY total_cents DESC, cashier ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sales attempted, voided and refunded per cashier, with an error rate.
    ///
    /// A sale counts as refunded once, however many refunds it received.
    pub async fn cashier_performance(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<CashierPerformance>> {
        let rows: Vec<(String, i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT s.cashier,
                   COUNT(CASE WHEN s.kind = 'SALE' THEN 1 END) AS attempted,
                   COUNT(CASE WHEN s.kind = 'SALE' AND s.status = 'VOIDED' THEN 1 END) AS voided,
                   COUNT(CASE WHEN s.kind = 'SALE' AND EXISTS (
                       SELECT 1 FROM sales r WHERE r.original_sale_id = s.id AND r.kind = 'REFUND'
                   ) THEN 1 END) AS refunded,
                   COALESCE(SUM(CASE WHEN s.status = 'ACTIVE' THEN s.total_cents END), 0) AS net_sales_cents
            FROM sales s
            WHERE date(s.created_at) BETWEEN ?1 AND ?2
            GROUP BY s.cashier
            ORDER BY s.cashier
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cashier, attempted, voided, refunded, net_sales_cents)| CashierPerformance {
                error_rate: CashierPerformance::compute_error_rate(attempted, voided, refunded),
                cashier,
                attempted,
                voided,
                refunded,
                net_sales_cents,
            })
            .collect())
    }

    /// Corrections recorded in the date range, with the receipt id they hit.
    pub async fn corrections_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<CorrectionReportRow>> {
        let rows = sqlx::query_as::<_, CorrectionReportRow>(
            r#"
            SELECT c.id AS correction_id,
                   c.original_sale_id,
                   s.transaction_id,
                   c.correction_type,
                   c.reason,
                   c.requested_by,
                   c.authorized_by,
                   c.created_at,
                   c.original_item,
                   c.corrected_quantity,
                   c.correction_amount_cents
            FROM corrections c
            JOIN sales s ON s.id = c.original_sale_id
            WHERE date(c.created_at) BETWEEN ?1 AND ?2
            ORDER BY c.id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Every line that sold or refunded an item, newest first.
    pub async fn item_history(&self, item: &str, limit: i64) -> DbResult<Vec<ItemSaleHistory>> {
        let rows = sqlx::query_as::<_, ItemSaleHistory>(
            r#"
            SELECT s.id AS sale_id,
                   s.transaction_id,
                   s.kind,
                   s.status,
                   s.cashier,
                   s.created_at,
                   l.quantity,
                   l.unit_price_cents,
                   l.subtotal_cents
            FROM sale_lines l
            JOIN sales s ON s.id = l.sale_id
            WHERE l.item = ?1
            ORDER BY s.id DESC, l.id DESC
            LIMIT ?2
            "#,
        )
        .bind(item)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Lines of a sale with refunded and remaining quantities.
    ///
    /// Lines of a voided sale have nothing remaining.
    pub async fn refundable_lines(&self, sale_id: i64) -> DbResult<Vec<RefundableLine>> {
        let rows = sqlx::query_as::<_, RefundableLine>(
            r#"
            SELECT line_id, item, quantity, unit_price_cents, refunded,
                   CASE WHEN status = 'VOIDED' OR kind = 'REFUND' THEN 0
                        ELSE quantity - refunded END AS remaining
            FROM (
                SELECT l.id AS line_id, l.item, l.quantity, l.unit_price_cents,
                       s.status, s.kind,
                       COALESCE((
                           SELECT SUM(c.corrected_quantity) FROM corrections c
                           WHERE c.original_line_id = l.id AND c.correction_type = 'REFUND'
                       ), 0) AS refunded
                FROM sale_lines l
                JOIN sales s ON s.id = l.sale_id
                WHERE l.sale_id = ?1
            )
            ORDER BY line_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Raw sales rows in a date range, restricted to whitelisted columns.
    ///
    /// An empty selection exports [`ExportColumn::DEFAULT`]. `total` cells are
    /// integer cents.
    pub async fn export_sales(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        columns: &[ExportColumn],
    ) -> DbResult<ExportTable> {
        let columns: Vec<ExportColumn> = if columns.is_empty() {
            ExportColumn::DEFAULT.to_vec()
        } else {
            columns.to_vec()
        };

        // Only whitelisted expressions reach the SQL text.
        let select_list = columns
            .iter()
            .map(|c| c.sql_expr())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM sales WHERE date(created_at) BETWEEN ?1 AND ?2 ORDER BY id",
            select_list
        );

        let rows = sqlx::query(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let mut table = ExportTable {
            columns: columns.iter().map(|c| c.name().to_string()).collect(),
            rows: Vec::with_capacity(rows.len()),
        };
        for row in &rows {
            let cells = columns
                .iter()
                .enumerate()
                .map(|(idx, col)| export_cell(row, idx, *col))
                .collect::<DbResult<Vec<_>>>()?;
            table.rows.push(cells);
        }

        Ok(table)
    }
}

fn export_cell(row: &SqliteRow, idx: usize, column: ExportColumn) -> DbResult<Value> {
    let value = match column {
        ExportColumn::Id | ExportColumn::Total | ExportColumn::OriginalSaleId => row
            .try_get::<Option<i64>, _>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(idx)?
            .map(Value::from)
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::correction::{insert_correction, NewCorrection};
    use crate::repository::sale::{insert_header, insert_line, mark_voided, NewSale, NewSaleLine};
    use chrono::{TimeZone, Utc};
    use till_core::{CorrectionType, SaleKind};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    async fn sale(db: &Database, txid: &str, cashier: &str, lines: &[(&str, i64, i64)]) -> (i64, Vec<i64>) {
        let total: i64 = lines.iter().map(|(_, q, p)| q * p).sum();
        let id = insert_header(
            db.pool(),
            &NewSale {
                transaction_id: txid,
                kind: SaleKind::Sale,
                original_sale_id: None,
                cashier,
                total_cents: total,
                created_at: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
                adjustment_reason: None,
                adjustment_authorized_by: None,
            },
        )
        .await
        .unwrap();
        let mut line_ids = Vec::new();
        for (item, qty, price) in lines {
            line_ids.push(
                insert_line(
                    db.pool(),
                    &NewSaleLine {
                        sale_id: id,
                        item,
                        quantity: *qty,
                        unit_price_cents: *price,
                        refunded_line_id: None,
                    },
                )
                .await
                .unwrap(),
            );
        }
        (id, line_ids)
    }

    async fn refund(db: &Database, original: i64, line_id: i64, item: &str, qty: i64, price: i64) {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap();
        let refund_id = insert_header(
            db.pool(),
            &NewSale {
                transaction_id: "TX-20261018150000-00000F",
                kind: SaleKind::Refund,
                original_sale_id: Some(original),
                cashier: "alice",
                total_cents: -qty * price,
                created_at: at,
                adjustment_reason: Some("flat"),
                adjustment_authorized_by: Some("sam"),
            },
        )
        .await
        .unwrap();
        insert_line(
            db.pool(),
            &NewSaleLine {
                sale_id: refund_id,
                item,
                quantity: qty,
                unit_price_cents: -price,
                refunded_line_id: Some(line_id),
            },
        )
        .await
        .unwrap();
        insert_correction(
            db.pool(),
            &NewCorrection {
                original_sale_id: original,
                correction_type: CorrectionType::Refund,
                reason: "flat",
                requested_by: "alice",
                authorized_by: "sam",
                created_at: at,
                original_line_id: Some(line_id),
                original_item: item,
                original_quantity: 3,
                original_price_cents: Some(price),
                original_total_cents: 3 * price,
                corrected_quantity: qty,
                correction_amount_cents: -qty * price,
                refund_sale_id: Some(refund_id),
                line_snapshot: None,
            },
        )
        .await
        .unwrap();
    }

    /// alice: Beer ×2 @ $20 (voided), Soda ×3 @ $5 (1 refunded)
    /// bob:   Water ×5 @ $8
    async fn ledger() -> (Database, i64, Vec<i64>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (beer_sale, _) = sale(&db, "TX-20261018120000-000001", "alice", &[("Beer", 2, 2000)]).await;
        mark_voided(db.pool(), beer_sale, "wrong tab", "sam", Utc::now()).await.unwrap();
        let (soda_sale, soda_lines) = sale(&db, "TX-20261018120000-000002", "alice", &[("Soda", 3, 500)]).await;
        sale(&db, "TX-20261018120000-000003", "bob", &[("Water", 5, 800)]).await;
        refund(&db, soda_sale, soda_lines[0], "Soda", 1, 500).await;
        (db, soda_sale, soda_lines)
    }

    #[tokio::test]
    async fn test_daily_summary_excludes_voided_and_nets_refunds() {
        let (db, _, _) = ledger().await;
        let summary = db.reports().daily_summary(day()).await.unwrap();

        assert_eq!(summary.gross_sales_cents, 1500 + 4000);
        assert_eq!(summary.refunds_cents, -500);
        assert_eq!(summary.voided_cents, 4000);
        assert_eq!(summary.net_sales_cents, 5000);
        assert_eq!(summary.sale_count, 2);
        assert_eq!(summary.refund_count, 1);
        assert_eq!(summary.void_count, 1);

        assert_eq!(summary.top_items[0].item, "Water");
        let soda = summary.top_items.iter().find(|r| r.item == "Soda").unwrap();
        assert_eq!(soda.quantity, 2);
        assert_eq!(soda.revenue_cents, 1000);
        assert!(summary.top_items.iter().all(|r| r.item != "Beer"));
    }

    #[tokio::test]
    async fn test_cashier_performance_error_rate() {
        let (db, _, _) = ledger().await;
        let perf = db.reports().cashier_performance(day(), day()).await.unwrap();

        let alice = perf.iter().find(|p| p.cashier == "alice").unwrap();
        assert_eq!(alice.attempted, 2);
        assert_eq!(alice.voided, 1);
        assert_eq!(alice.refunded, 1);
        assert_eq!(alice.error_rate, 100.0);
        assert_eq!(alice.net_sales_cents, 1000);

        let bob = perf.iter().find(|p| p.cashier == "bob").unwrap();
        assert_eq!(bob.error_rate, 0.0);
    }

    #[tokio::test]
    async fn test_refundable_lines_and_corrections() {
        let (db, soda_sale, soda_lines) = ledger().await;

        let lines = db.reports().refundable_lines(soda_sale).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_id, soda_lines[0]);
        assert_eq!(lines[0].refunded, 1);
        assert_eq!(lines[0].remaining, 2);

        let corrections = db.reports().corrections_between(day(), day()).await.unwrap();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].transaction_id, "TX-20261018120000-000002");
        assert_eq!(corrections[0].correction_amount_cents, -500);

        let history = db.reports().item_history("Soda", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, SaleKind::Refund);
    }

    #[tokio::test]
    async fn test_daily_totals_and_export() {
        let (db, _, _) = ledger().await;

        let totals = db.reports().daily_totals(day(), day()).await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].date, day());
        assert_eq!(totals[0].transactions, 3);
        assert_eq!(totals[0].total_cents, 5000);

        let table = db
            .reports()
            .export_sales(day(), day(), &[ExportColumn::TransactionId, ExportColumn::Total, ExportColumn::Status])
            .await
            .unwrap();
        assert_eq!(table.columns, vec!["transaction_id", "total", "status"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0][1], Value::from(4000));
        assert_eq!(table.rows[0][2], Value::from("VOIDED"));

        let default = db.reports().export_sales(day(), day(), &[]).await.unwrap();
        assert_eq!(default.columns.len(), ExportColumn::DEFAULT.len());
    }
}
