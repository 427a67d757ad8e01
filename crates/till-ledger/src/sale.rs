//! # Sale Engine
//!
//! Commits a cart as one atomic unit.
//!
//! ## Create Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_sale(session, cart)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_cart ─────────────── invalid ──► Validation error            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN IMMEDIATE  (write lock held until COMMIT/ROLLBACK)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  check stock for every item ── short ──► ROLLBACK, InsufficientStock   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT header (fresh TX id; redraw on collision)                      │
//! │  INSERT lines                                                          │
//! │  decrement stock                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ──► CommittedSale { sale_id, transaction_id, total }           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is checked and decremented under the same write lock, so two
//! registers racing for the last units cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use till_core::validation::{demand_by_item, validate_cart, validate_name};
use till_core::{CartLine, CommittedSale, CoreError, Money, SaleKind, Session, TransactionIdSource};
use till_db::repository::{inventory, sale};
use till_db::repository::sale::{NewSale, NewSaleLine};
use till_db::DbError;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::inventory::adjust_stock_in;
use crate::retry::with_retry;
use crate::store::{finish, LedgerStore};

/// Fresh transaction ids drawn before giving up on a header insert.
pub const MAX_TRANSACTION_ID_ATTEMPTS: u32 = 5;

/// Records sales.
#[derive(Debug, Clone)]
pub struct SaleEngine {
    store: LedgerStore,
}

impl SaleEngine {
    pub fn new(store: LedgerStore) -> Self {
        SaleEngine { store }
    }

    /// Commits a cart for the session's cashier.
    ///
    /// Either every line, header and stock decrement is committed, or
    /// nothing is.
    pub async fn create_sale(&self, session: &Session, lines: &[CartLine]) -> LedgerResult<CommittedSale> {
        validate_name("cashier", &session.cashier)?;
        let total = validate_cart(lines)?;

        let committed = with_retry(self.store.retry_policy(), "create_sale", move || {
            self.try_create_sale(session, lines, total)
        })
        .await?;

        info!(
            sale_id = committed.sale_id,
            transaction_id = %committed.transaction_id,
            cashier = %session.cashier,
            total = %committed.total,
            items = lines.len(),
            "Sale created"
        );

        Ok(committed)
    }

    async fn try_create_sale(
        &self,
        session: &Session,
        lines: &[CartLine],
        total: Money,
    ) -> LedgerResult<CommittedSale> {
        let mut tx = self.store.db().begin_immediate().await?;
        let result = write_sale(tx.conn(), self.store.ids(), session, lines, total).await;

        if let Err(LedgerError::Domain(e)) = &result {
            debug!(cashier = %session.cashier, error = %e, "Sale rejected");
        }

        finish(tx, result).await
    }
}

async fn write_sale(
    conn: &mut SqliteConnection,
    ids: &dyn TransactionIdSource,
    session: &Session,
    lines: &[CartLine],
    total: Money,
) -> LedgerResult<CommittedSale> {
    // All-or-nothing: check every item before touching any row.
    for (item, requested) in demand_by_item(lines) {
        let available = inventory::stock_of(&mut *conn, item).await?.unwrap_or(0);
        if requested > available {
            return Err(CoreError::InsufficientStock {
                item: item.to_string(),
                available,
                requested,
            }
            .into());
        }
    }

    let now = Utc::now();
    let header = HeaderFields {
        kind: SaleKind::Sale,
        original_sale_id: None,
        cashier: &session.cashier,
        total_cents: total.cents(),
        created_at: now,
        adjustment_reason: None,
        adjustment_authorized_by: None,
    };
    let (sale_id, transaction_id) = insert_header_with_fresh_id(&mut *conn, ids, &header).await?;

    for line in lines {
        sale::insert_line(
            &mut *conn,
            &NewSaleLine {
                sale_id,
                item: &line.item,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                refunded_line_id: None,
            },
        )
        .await?;
        adjust_stock_in(&mut *conn, &line.item, -line.quantity, now).await?;
    }

    Ok(CommittedSale {
        sale_id,
        transaction_id,
        total,
    })
}

/// Header fields other than the transaction id.
pub(crate) struct HeaderFields<'a> {
    pub kind: SaleKind,
    pub original_sale_id: Option<i64>,
    pub cashier: &'a str,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub adjustment_reason: Option<&'a str>,
    pub adjustment_authorized_by: Option<&'a str>,
}

/// Inserts a sales header, drawing a new transaction id whenever the unique
/// index rejects one. A failed INSERT leaves the surrounding transaction
/// intact.
pub(crate) async fn insert_header_with_fresh_id(
    conn: &mut SqliteConnection,
    ids: &dyn TransactionIdSource,
    header: &HeaderFields<'_>,
) -> LedgerResult<(i64, String)> {
    let mut last_err = None;

    for attempt in 1..=MAX_TRANSACTION_ID_ATTEMPTS {
        let transaction_id = ids.next_id(header.created_at).into_string();

        let row = NewSale {
            transaction_id: &transaction_id,
            kind: header.kind,
            original_sale_id: header.original_sale_id,
            cashier: header.cashier,
            total_cents: header.total_cents,
            created_at: header.created_at,
            adjustment_reason: header.adjustment_reason,
            adjustment_authorized_by: header.adjustment_authorized_by,
        };

        match sale::insert_header(&mut *conn, &row).await {
            Ok(id) => return Ok((id, transaction_id)),
            Err(e) if e.is_unique_violation_on("transaction_id") => {
                warn!(transaction_id = %transaction_id, attempt, "Transaction id collision, drawing another");
                last_err = Some(e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(last_err
        .unwrap_or_else(|| DbError::Internal("no transaction id attempts made".into()))
        .into())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryLedger;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use till_core::TransactionId;
    use till_db::{Database, DbConfig};

    /// Hands out a scripted sequence of suffixes, then repeats the last one.
    struct ScriptedIds(Mutex<VecDeque<[u8; 3]>>);

    impl ScriptedIds {
        fn new(suffixes: &[[u8; 3]]) -> Arc<Self> {
            Arc::new(ScriptedIds(Mutex::new(suffixes.iter().copied().collect())))
        }
    }

    impl TransactionIdSource for ScriptedIds {
        fn next_id(&self, _now: DateTime<Utc>) -> TransactionId {
            let mut queue = self.0.lock().unwrap();
            let suffix = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue[0]
            };
            let fixed = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
            TransactionId::from_parts(fixed, suffix)
        }
    }

    async fn store() -> LedgerStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        LedgerStore::new(db)
    }

    async fn stock(store: &LedgerStore, items: &[(&str, i64)]) {
        let inventory = InventoryLedger::new(store.clone());
        for (item, qty) in items {
            inventory.adjust_stock(item, *qty).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_sale_decrements_stock() {
        let store = store().await;
        stock(&store, &[("Beer", 10), ("Water", 10)]).await;
        let engine = SaleEngine::new(store.clone());

        let committed = engine
            .create_sale(
                &Session::cashier("alice"),
                &[
                    CartLine::new("Beer", 2, Money::from_cents(2000)),
                    CartLine::new("Water", 1, Money::from_cents(800)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(committed.total, Money::from_cents(4800));
        assert!(committed.transaction_id.parse::<TransactionId>().is_ok());

        let inventory = store.db().inventory();
        assert_eq!(inventory.stock("Beer").await.unwrap(), 8);
        assert_eq!(inventory.stock("Water").await.unwrap(), 9);

        let sale = store.db().sales().get(committed.sale_id).await.unwrap().unwrap();
        assert_eq!(sale.cashier, "alice");
        assert_eq!(sale.total_cents, 4800);
        assert_eq!(sale.kind, SaleKind::Sale);

        let lines = store.db().sales().lines(committed.sale_id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.iter().map(|l| l.subtotal_cents).sum::<i64>(), 4800);
    }

    #[tokio::test]
    async fn test_short_line_rolls_back_whole_cart() {
        let store = store().await;
        stock(&store, &[("Beer", 10), ("Water", 3)]).await;
        let engine = SaleEngine::new(store.clone());

        let err = engine
            .create_sale(
                &Session::cashier("alice"),
                &[
                    CartLine::new("Beer", 2, Money::from_cents(2000)),
                    CartLine::new("Water", 5, Money::from_cents(800)),
                ],
            )
            .await
            .unwrap_err();

        match err {
            LedgerError::Domain(CoreError::InsufficientStock {
                item,
                available,
                requested,
            }) => {
                assert_eq!(item, "Water");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(store.db().inventory().stock("Beer").await.unwrap(), 10);
        assert_eq!(store.db().inventory().stock("Water").await.unwrap(), 3);
        assert_eq!(store.db().sales().count(SaleKind::Sale).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_item_uses_combined_demand() {
        let store = store().await;
        stock(&store, &[("Soda", 4)]).await;
        let engine = SaleEngine::new(store.clone());

        let err = engine
            .create_sale(
                &Session::cashier("bob"),
                &[
                    CartLine::new("Soda", 3, Money::from_cents(500)),
                    CartLine::new("Soda", 2, Money::from_cents(500)),
                ],
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        assert_eq!(store.db().inventory().stock("Soda").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_unknown_item_is_insufficient_stock() {
        let store = store().await;
        let engine = SaleEngine::new(store.clone());

        let err = engine
            .create_sale(&Session::cashier("bob"), &[CartLine::new("Ghost", 1, Money::from_cents(100))])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[tokio::test]
    async fn test_invalid_cart_is_rejected_before_storage() {
        let store = store().await;
        let engine = SaleEngine::new(store.clone());

        let err = engine.create_sale(&Session::cashier("bob"), &[]).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = engine
            .create_sale(&Session::cashier("  "), &[CartLine::new("Beer", 1, Money::from_cents(100))])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = engine
            .create_sale(&Session::cashier("bob"), &[CartLine::new("Beer", 0, Money::from_cents(100))])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_transaction_id_collision_draws_again() {
        let base = store().await;
        stock(&base, &[("Beer", 10)]).await;

        let ids = ScriptedIds::new(&[[0xaa, 0, 0], [0xaa, 0, 0], [0xbb, 0, 0]]);
        let engine = SaleEngine::new(base.clone().with_id_source(ids));
        let session = Session::cashier("alice");
        let cart = [CartLine::new("Beer", 1, Money::from_cents(2000))];

        let first = engine.create_sale(&session, &cart).await.unwrap();
        let second = engine.create_sale(&session, &cart).await.unwrap();

        assert_eq!(first.transaction_id, "TX-20261018120000-AA0000");
        assert_eq!(second.transaction_id, "TX-20261018120000-BB0000");
        assert_eq!(base.db().inventory().stock("Beer").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_persistent_collision_fails_without_partial_writes() {
        let base = store().await;
        stock(&base, &[("Beer", 10)]).await;

        let ids = ScriptedIds::new(&[[0xcc, 0, 0]]);
        let engine = SaleEngine::new(base.clone().with_id_source(ids));
        let session = Session::cashier("alice");
        let cart = [CartLine::new("Beer", 1, Money::from_cents(2000))];

        engine.create_sale(&session, &cart).await.unwrap();
        let err = engine.create_sale(&session, &cart).await.unwrap_err();

        assert!(matches!(err, LedgerError::Storage(DbError::UniqueViolation { .. })));
        assert_eq!(base.db().inventory().stock("Beer").await.unwrap(), 9);
        assert_eq!(base.db().sales().count(SaleKind::Sale).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_registers_cannot_oversell() {
        let path = std::env::temp_dir().join(format!("till-race-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).busy_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        let store = LedgerStore::new(db);
        stock(&store, &[("Water", 3)]).await;

        let register_a = SaleEngine::new(store.clone());
        let register_b = SaleEngine::new(store.clone());
        let alice = Session::cashier("alice");
        let bob = Session::cashier("bob");
        let cart = [CartLine::new("Water", 3, Money::from_cents(800))];

        let (a, b) = tokio::join!(
            register_a.create_sale(&alice, &cart),
            register_b.create_sale(&bob, &cart)
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert_eq!(loser.code(), "INSUFFICIENT_STOCK");
        assert_eq!(store.db().inventory().stock("Water").await.unwrap(), 0);

        store.db().close().await;
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }
}
