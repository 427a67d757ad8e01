//! # Domain Types
//!
//! Rows and values that flow through the order ledger.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ InventoryItem   │   │  Sale (header)  │   │    SaleLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  item (key)     │   │  id             │   │  id             │       │
//! │  │  quantity ≥ 0   │   │  transaction_id │   │  sale_id (FK)   │       │
//! │  │  cost / sell    │   │  kind           │   │  item, quantity │       │
//! │  │  category       │   │  status         │   │  unit_price     │       │
//! │  └─────────────────┘   │  total_cents    │   │  subtotal       │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐                            │
//! │  │   Correction    │   │ SupervisorSession│  append-only audit rows    │
//! │  │  VOID | REFUND  │   │ GRANTED | DENIED │                            │
//! │  └─────────────────┘   │ | REJECTED       │                            │
//! │                        └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale lines carry the item name and price by value, so deleting an item
//! from the catalog never rewrites history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Inventory
// =============================================================================

/// A catalog row with its stock on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryItem {
    /// Item name, unique key of the catalog.
    pub item: String,
    /// Units on hand, never negative.
    pub quantity: i64,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    pub category: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }
}

/// One row of the stock listing: `(item, quantity, category)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub item: String,
    pub quantity: i64,
    pub category: Option<String>,
}

/// Cost and selling price of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ItemPrices {
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
}

// =============================================================================
// Sessions
// =============================================================================

/// Role of the person operating the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cashier,
    Supervisor,
    Manager,
}

/// Who is operating the register.
///
/// Passed explicitly into every engine call; the ledger keeps no notion of a
/// "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Session {
    pub cashier: String,
    pub role: Role,
}

impl Session {
    pub fn new(cashier: impl Into<String>, role: Role) -> Self {
        Session {
            cashier: cashier.into(),
            role,
        }
    }

    /// Shorthand for a plain cashier session.
    pub fn cashier(cashier: impl Into<String>) -> Self {
        Session::new(cashier, Role::Cashier)
    }
}

/// Name and PIN presented by a supervisor to authorize a correction.
#[derive(Clone, Deserialize)]
pub struct SupervisorCredential {
    pub name: String,
    pin: String,
}

impl SupervisorCredential {
    pub fn new(name: impl Into<String>, pin: impl Into<String>) -> Self {
        SupervisorCredential {
            name: name.into(),
            pin: pin.into(),
        }
    }

    pub fn pin(&self) -> &str {
        &self.pin
    }
}

impl fmt::Debug for SupervisorCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorCredential")
            .field("name", &self.name)
            .field("pin", &"***")
            .finish()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One `(item, quantity, unit price)` line handed over by the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub item: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl CartLine {
    pub fn new(item: impl Into<String>, quantity: i64, unit_price: Money) -> Self {
        CartLine {
            item: item.into(),
            quantity,
            unit_price_cents: unit_price.cents(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sale Status / Kind
// =============================================================================

/// Lifecycle state of a sale header. `Voided` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    #[default]
    Active,
    Voided,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Active => "ACTIVE",
            SaleStatus::Voided => "VOIDED",
        }
    }
}

/// Whether a header records a checkout or a refund against an earlier sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleKind {
    #[default]
    Sale,
    Refund,
}

impl SaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleKind::Sale => "SALE",
            SaleKind::Refund => "REFUND",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale header.
///
/// Refund entries are headers too (`kind = Refund`), linked to the sale they
/// correct through `original_sale_id` and carrying a negative total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub transaction_id: String,
    pub kind: SaleKind,
    pub original_sale_id: Option<i64>,
    pub cashier: String,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub status: SaleStatus,
    pub void_reason: Option<String>,
    pub void_authorized_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    pub adjustment_reason: Option<String>,
    pub adjustment_authorized_by: Option<String>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_voided(&self) -> bool {
        self.status == SaleStatus::Voided
    }

    #[inline]
    pub fn is_refund(&self) -> bool {
        self.kind == SaleKind::Refund
    }
}

/// One line of a sale header. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    pub item: String,
    pub quantity: i64,
    /// Negated original price on refund lines.
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
    /// Line of the original sale this refund line reverses.
    pub refunded_line_id: Option<i64>,
}

impl SaleLine {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// What the register gets back from a committed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommittedSale {
    pub sale_id: i64,
    pub transaction_id: String,
    pub total: Money,
}

// =============================================================================
// Corrections
// =============================================================================

/// Kind of correction applied to a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrectionType {
    Void,
    Refund,
}

impl CorrectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionType::Void => "VOID",
            CorrectionType::Refund => "REFUND",
        }
    }
}

/// Append-only record of one void or refund.
///
/// `original_*` fields snapshot the corrected sale as it was before the
/// correction. A void of a multi-line sale joins item names, sums the
/// quantities and leaves `original_price_cents` empty; the full per-line
/// snapshot is kept as JSON in `line_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Correction {
    pub id: i64,
    pub original_sale_id: i64,
    pub correction_type: CorrectionType,
    pub reason: String,
    pub requested_by: String,
    pub authorized_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub original_line_id: Option<i64>,
    pub original_item: String,
    pub original_quantity: i64,
    pub original_price_cents: Option<i64>,
    pub original_total_cents: i64,
    /// Units put back on the shelf by this correction.
    pub corrected_quantity: i64,
    /// Signed; negative for money returned.
    pub correction_amount_cents: i64,
    /// Refund header created by a REFUND correction.
    pub refund_sale_id: Option<i64>,
    pub line_snapshot: Option<String>,
}

impl Correction {
    #[inline]
    pub fn correction_amount(&self) -> Money {
        Money::from_cents(self.correction_amount_cents)
    }
}

/// Refund of part of one sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundRequest {
    pub sale_id: i64,
    pub line_id: i64,
    pub quantity: i64,
    pub reason: String,
}

/// Result of a committed void.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoidRecord {
    pub sale_id: i64,
    pub correction_id: i64,
    pub restored_units: i64,
    pub amount: Money,
}

/// Result of a committed refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundRecord {
    /// Header id of the negative-valued refund entry.
    pub refund_sale_id: i64,
    pub transaction_id: String,
    pub correction_id: i64,
    pub amount: Money,
    /// Units of the original line that can still be refunded.
    pub remaining_refundable: i64,
}

// =============================================================================
// Supervisor Sessions
// =============================================================================

/// Privileged action a supervisor was asked to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorAction {
    Void,
    Refund,
}

impl From<CorrectionType> for SupervisorAction {
    fn from(kind: CorrectionType) -> Self {
        match kind {
            CorrectionType::Void => SupervisorAction::Void,
            CorrectionType::Refund => SupervisorAction::Refund,
        }
    }
}

/// How an authorization attempt ended.
///
/// - `Granted`: credential accepted and the correction committed
/// - `Denied`: credential rejected, nothing applied
/// - `Rejected`: credential accepted but the correction was refused
///   (already voided, over-refund, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationOutcome {
    Granted,
    Denied,
    Rejected,
}

/// Append-only trail of every authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SupervisorSession {
    pub id: i64,
    pub supervisor_name: String,
    #[ts(as = "String")]
    pub session_start: DateTime<Utc>,
    pub cashier_name: String,
    pub action_type: SupervisorAction,
    pub outcome: AuthorizationOutcome,
    pub sale_id: Option<i64>,
}

// =============================================================================
// Receipt
// =============================================================================

/// Everything the presentation layer needs to render a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receipt {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
    pub corrections: Vec<Correction>,
}

impl Receipt {
    /// Sum of line subtotals.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(SaleLine::subtotal).sum()
    }
}

// =============================================================================
// Audit Trail
// =============================================================================

/// Before/after values captured by the storage-level change trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleAuditEntry {
    pub id: i64,
    pub sale_id: i64,
    pub field_changed: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_by: Option<String>,
    #[ts(as = "String")]
    pub changed_at: DateTime<Utc>,
}

/// Invariant breach found by the integrity sweep. Logged, never auto-repaired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// VOIDED header without `void_authorized_by`.
    VoidWithoutAuthorizer { sale_id: i64 },
    /// REFUND header with no REFUND correction pointing at it.
    RefundWithoutCorrection { sale_id: i64 },
    /// REFUND header that does not name the sale it corrects.
    RefundWithoutOriginal { sale_id: i64 },
    /// Negative total on a header that is not a classified adjustment.
    UnclassifiedNegativeTotal { sale_id: i64, total_cents: i64 },
    /// Header total differs from the sum of its line subtotals.
    TotalMismatch {
        sale_id: i64,
        total_cents: i64,
        lines_cents: i64,
    },
    /// More units refunded on a line than were sold.
    OverRefundedLine {
        sale_id: i64,
        line_id: i64,
        sold: i64,
        refunded: i64,
    },
    /// Catalog row with negative stock.
    NegativeStock { item: String, quantity: i64 },
}

impl IntegrityViolation {
    /// Short machine-readable tag for logs.
    pub fn code(&self) -> &'static str {
        match self {
            IntegrityViolation::VoidWithoutAuthorizer { .. } => "void_without_authorizer",
            IntegrityViolation::RefundWithoutCorrection { .. } => "refund_without_correction",
            IntegrityViolation::RefundWithoutOriginal { .. } => "refund_without_original",
            IntegrityViolation::UnclassifiedNegativeTotal { .. } => "unclassified_negative_total",
            IntegrityViolation::TotalMismatch { .. } => "total_mismatch",
            IntegrityViolation::OverRefundedLine { .. } => "over_refunded_line",
            IntegrityViolation::NegativeStock { .. } => "negative_stock",
        }
    }
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::VoidWithoutAuthorizer { sale_id } => {
                write!(f, "sale {} is voided without an authorizing supervisor", sale_id)
            }
            IntegrityViolation::RefundWithoutCorrection { sale_id } => {
                write!(f, "refund entry {} has no matching correction record", sale_id)
            }
            IntegrityViolation::RefundWithoutOriginal { sale_id } => {
                write!(f, "refund entry {} does not reference an original sale", sale_id)
            }
            IntegrityViolation::UnclassifiedNegativeTotal {
                sale_id,
                total_cents,
            } => write!(
                f,
                "sale {} has negative total {} without an adjustment classification",
                sale_id,
                Money::from_cents(*total_cents)
            ),
            IntegrityViolation::TotalMismatch {
                sale_id,
                total_cents,
                lines_cents,
            } => write!(
                f,
                "sale {} total {} differs from line sum {}",
                sale_id,
                Money::from_cents(*total_cents),
                Money::from_cents(*lines_cents)
            ),
            IntegrityViolation::OverRefundedLine {
                sale_id,
                line_id,
                sold,
                refunded,
            } => write!(
                f,
                "sale {} line {} refunded {} of {} sold",
                sale_id, line_id, refunded, sold
            ),
            IntegrityViolation::NegativeStock { item, quantity } => {
                write!(f, "item {} has negative stock {}", item, quantity)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_line_subtotal() {
        let line = CartLine::new("Water", 5, Money::from_cents(800));
        assert_eq!(line.subtotal(), Money::from_cents(4000));
    }

    #[test]
    fn test_credential_debug_hides_pin() {
        let cred = SupervisorCredential::new("Maria", "4321");
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("Maria"));
        assert!(!rendered.contains("4321"));
        assert_eq!(cred.pin(), "4321");
    }

    #[test]
    fn test_status_defaults_to_active() {
        assert_eq!(SaleStatus::default(), SaleStatus::Active);
        assert_eq!(SaleStatus::Voided.as_str(), "VOIDED");
        assert_eq!(SaleKind::Refund.as_str(), "REFUND");
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&SaleStatus::Voided).unwrap();
        assert_eq!(json, "\"VOIDED\"");
    }

    #[test]
    fn test_violation_display() {
        let v = IntegrityViolation::TotalMismatch {
            sale_id: 4,
            total_cents: 4000,
            lines_cents: 3500,
        };
        assert_eq!(v.to_string(), "sale 4 total $40.00 differs from line sum $35.00");
        assert_eq!(v.code(), "total_mismatch");
    }
}
