//! # till-core: Pure Domain Logic for the Till Order Ledger
//!
//! This crate holds the vocabulary of the ledger: money, sale headers and
//! lines, corrections, supervisor audit rows, the transaction id format and
//! the validation rules applied before anything touches storage.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Architecture                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Register UI / export writer (external)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Session + CartLine values              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     till-ledger: SaleEngine, CorrectionEngine, InventoryLedger  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   txid    │  │ validation│  │   │
//! │  │   │   Sale    │  │   Money   │  │ TX-...-id │  │   rules   │  │   │
//! │  │   │ Correction│  │           │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 till-db (SQLite, audit triggers)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (InventoryItem, Sale, SaleLine, Correction, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`report`] - Report rows (daily summary, cashier performance, export)
//! - [`error`] - Domain error types
//! - [`validation`] - Cart, refund and name validation
//! - [`txid`] - `TX-<YYYYMMDDHHMMSS>-<6 hex>` transaction identifiers
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//! use till_core::types::CartLine;
//!
//! let line = CartLine::new("Beer", 2, Money::from_cents(2000));
//! assert_eq!(line.subtotal().to_string(), "$40.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod report;
pub mod txid;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use report::*;
pub use txid::{RandomTransactionIds, TransactionId, TransactionIdSource};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
///
/// Keeps one sale inside a single short write transaction.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typing 1000 instead of 10 at the register.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Maximum length of a void/refund reason.
pub const MAX_REASON_LEN: usize = 500;

/// Maximum length of an item, cashier or supervisor name.
pub const MAX_NAME_LEN: usize = 100;
