//! # Report Types
//!
//! Read-only aggregates over the ledger, shaped for the register's report
//! screens and the export writer.
//!
//! Revenue figures exclude VOIDED headers and include REFUND headers, whose
//! negative totals net out the original sale.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Daily Summary
// =============================================================================

/// Quantity and revenue for one item over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ItemRollup {
    pub item: String,
    /// Units sold minus units refunded.
    pub quantity: i64,
    pub revenue_cents: i64,
}

/// Net takings of one cashier over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashierTotal {
    pub cashier: String,
    pub transactions: i64,
    pub total_cents: i64,
}

/// One business day at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySummary {
    #[ts(as = "String")]
    pub date: NaiveDate,
    /// Sum of non-voided SALE headers.
    pub gross_sales_cents: i64,
    /// Sum of REFUND headers (negative or zero).
    pub refunds_cents: i64,
    /// Sum of VOIDED SALE headers, reported separately.
    pub voided_cents: i64,
    /// `gross + refunds`.
    pub net_sales_cents: i64,
    pub sale_count: i64,
    pub refund_count: i64,
    pub void_count: i64,
    pub top_items: Vec<ItemRollup>,
    pub cashier_totals: Vec<CashierTotal>,
}

impl DailySummary {
    #[inline]
    pub fn net_sales(&self) -> Money {
        Money::from_cents(self.net_sales_cents)
    }
}

/// Net total for one day of a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailyTotal {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub transactions: i64,
    pub total_cents: i64,
}

// =============================================================================
// Cashier Performance
// =============================================================================

/// Per-cashier counters plus error rate.
///
/// `error_rate = (voided + refunded) / attempted × 100`, rounded to two
/// decimals, where `attempted` counts every SALE header the cashier rang up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashierPerformance {
    pub cashier: String,
    pub attempted: i64,
    pub voided: i64,
    pub refunded: i64,
    pub net_sales_cents: i64,
    pub error_rate: f64,
}

impl CashierPerformance {
    /// Error rate in percent, two decimals. Zero when nothing was attempted.
    pub fn compute_error_rate(attempted: i64, voided: i64, refunded: i64) -> f64 {
        if attempted <= 0 {
            return 0.0;
        }
        let pct = (voided + refunded) as f64 / attempted as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

// =============================================================================
// Corrections & History
// =============================================================================

/// Correction joined with the header it corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CorrectionReportRow {
    pub correction_id: i64,
    pub original_sale_id: i64,
    pub transaction_id: String,
    pub correction_type: crate::types::CorrectionType,
    pub reason: String,
    pub requested_by: String,
    pub authorized_by: String,
    #[ts(as = "String")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub original_item: String,
    pub corrected_quantity: i64,
    pub correction_amount_cents: i64,
}

/// One appearance of an item on a sale or refund line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ItemSaleHistory {
    pub sale_id: i64,
    pub transaction_id: String,
    pub kind: crate::types::SaleKind,
    pub status: crate::types::SaleStatus,
    pub cashier: String,
    #[ts(as = "String")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// A line of a sale with how much of it can still be refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RefundableLine {
    pub line_id: i64,
    pub item: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub refunded: i64,
    pub remaining: i64,
}

// =============================================================================
// Export
// =============================================================================

/// Columns of the sales export, the only ones a caller may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExportColumn {
    Id,
    TransactionId,
    Kind,
    Cashier,
    Total,
    Timestamp,
    Status,
    VoidReason,
    VoidAuthorizedBy,
    VoidedAt,
    OriginalSaleId,
}

impl ExportColumn {
    /// Every selectable column, in display order.
    pub const ALL: [ExportColumn; 11] = [
        ExportColumn::Id,
        ExportColumn::TransactionId,
        ExportColumn::Kind,
        ExportColumn::Cashier,
        ExportColumn::Total,
        ExportColumn::Timestamp,
        ExportColumn::Status,
        ExportColumn::VoidReason,
        ExportColumn::VoidAuthorizedBy,
        ExportColumn::VoidedAt,
        ExportColumn::OriginalSaleId,
    ];

    /// Columns used when the caller selects nothing valid.
    pub const DEFAULT: [ExportColumn; 6] = [
        ExportColumn::Id,
        ExportColumn::TransactionId,
        ExportColumn::Cashier,
        ExportColumn::Total,
        ExportColumn::Timestamp,
        ExportColumn::Status,
    ];

    /// Header name as shown in the export.
    pub fn name(&self) -> &'static str {
        match self {
            ExportColumn::Id => "id",
            ExportColumn::TransactionId => "transaction_id",
            ExportColumn::Kind => "kind",
            ExportColumn::Cashier => "cashier",
            ExportColumn::Total => "total",
            ExportColumn::Timestamp => "timestamp",
            ExportColumn::Status => "status",
            ExportColumn::VoidReason => "void_reason",
            ExportColumn::VoidAuthorizedBy => "void_authorized_by",
            ExportColumn::VoidedAt => "voided_at",
            ExportColumn::OriginalSaleId => "original_sale_id",
        }
    }

    /// SQL expression selecting this column from `sales`.
    pub fn sql_expr(&self) -> &'static str {
        match self {
            ExportColumn::Id => "id",
            ExportColumn::TransactionId => "transaction_id",
            ExportColumn::Kind => "kind",
            ExportColumn::Cashier => "cashier",
            ExportColumn::Total => "total_cents",
            ExportColumn::Timestamp => "created_at",
            ExportColumn::Status => "status",
            ExportColumn::VoidReason => "void_reason",
            ExportColumn::VoidAuthorizedBy => "void_authorized_by",
            ExportColumn::VoidedAt => "voided_at",
            ExportColumn::OriginalSaleId => "original_sale_id",
        }
    }

    /// Parses a comma-separated selection, dropping unknown names and
    /// duplicates. Falls back to [`ExportColumn::DEFAULT`] when nothing
    /// valid remains.
    pub fn parse_selection(selection: &str) -> Vec<ExportColumn> {
        let mut columns = Vec::new();
        for name in selection.split(',') {
            if let Ok(col) = name.parse::<ExportColumn>() {
                if !columns.contains(&col) {
                    columns.push(col);
                }
            }
        }
        if columns.is_empty() {
            columns.extend_from_slice(&ExportColumn::DEFAULT);
        }
        columns
    }
}

impl fmt::Display for ExportColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportColumn {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ExportColumn::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "column".to_string(),
                reason: format!("unknown export column '{}'", s.trim()),
            })
    }
}

/// Raw export: header names plus one JSON cell per selected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_rate_rounding() {
        assert_eq!(CashierPerformance::compute_error_rate(3, 1, 0), 33.33);
        assert_eq!(CashierPerformance::compute_error_rate(8, 1, 1), 25.0);
        assert_eq!(CashierPerformance::compute_error_rate(0, 0, 0), 0.0);
    }

    #[test]
    fn test_export_selection_whitelist() {
        let cols = ExportColumn::parse_selection("cashier, total,password,total");
        assert_eq!(cols, vec![ExportColumn::Cashier, ExportColumn::Total]);
    }

    #[test]
    fn test_export_selection_falls_back_to_default() {
        let cols = ExportColumn::parse_selection("drop table sales");
        assert_eq!(cols, ExportColumn::DEFAULT.to_vec());
    }
}
