//! # till-ledger: Sale and Correction Engines for the Till Order Ledger
//!
//! Every operation that moves stock or money: checkout, voids, refunds and
//! stock adjustments, each in one exclusive write transaction, retried with
//! backoff while another register holds the lock.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Register / operator                                                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌────────────┐   ┌──────────────────┐   ┌─────────────────┐          │
//! │  │ SaleEngine │   │ CorrectionEngine │   │ InventoryLedger │          │
//! │  └─────┬──────┘   └────────┬─────────┘   └────────┬────────┘          │
//! │        │     SupervisorVerifier (PIN check)        │                   │
//! │        └───────────────────┼───────────────────────┘                   │
//! │                            ▼                                            │
//! │             with_retry ─► LedgerStore ─► till-db (BEGIN IMMEDIATE)     │
//! │                                                                         │
//! │   IntegritySweep (periodic, read-only) ─► tracing + EventLog           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`auth`] - Supervisor verification and Argon2 PIN directory
//! - [`config`] - `ledger.toml` plus `TILL_*` environment overrides
//! - [`correction`] - Voids and refunds
//! - [`error`] - Ledger error types
//! - [`event_log`] - Plain-text operator event log
//! - [`integrity`] - Read-only consistency sweep
//! - [`inventory`] - Stock counters and catalog maintenance
//! - [`retry`] - Busy-database retry with exponential backoff
//! - [`sale`] - Checkout
//! - [`store`] - Shared database handle
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_core::{CartLine, Money, Session, SupervisorCredential};
//! use till_ledger::{CorrectionEngine, LedgerConfig, LedgerStore, PinDirectory, SaleEngine};
//!
//! let config = LedgerConfig::load_or_default(None);
//! let store = LedgerStore::open(&config).await?;
//!
//! let sale = SaleEngine::new(store.clone())
//!     .create_sale(&Session::cashier("alice"), &[CartLine::new("Beer", 2, Money::from_cents(2000))])
//!     .await?;
//!
//! let mut pins = PinDirectory::new();
//! pins.enroll("sam", "4321")?;
//! CorrectionEngine::new(store, pins)
//!     .void_sale(&Session::cashier("alice"), sale.sale_id, "Customer changed mind",
//!                &SupervisorCredential::new("sam", "4321"))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod config;
pub mod correction;
pub mod error;
pub mod event_log;
pub mod integrity;
pub mod inventory;
pub mod retry;
pub mod sale;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{hash_pin, PinDirectory, SupervisorVerifier};
pub use config::LedgerConfig;
pub use correction::CorrectionEngine;
pub use error::{ConfigError, ConfigResult, LedgerError, LedgerResult};
pub use event_log::EventLog;
pub use integrity::{IntegrityReport, IntegritySweep, SweepHandle};
pub use inventory::InventoryLedger;
pub use retry::{with_retry, RetryPolicy};
pub use sale::SaleEngine;
pub use store::LedgerStore;
