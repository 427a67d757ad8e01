//! # Inventory Ledger
//!
//! Stock counters and catalog maintenance.
//!
//! ## Stock Adjustment Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust_stock(item, delta)                                             │
//! │                                                                         │
//! │  known item    stock + delta >= 0  ──► update, return new stock        │
//! │                stock + delta <  0  ──► InsufficientStock, no change    │
//! │                                                                         │
//! │  unknown item  delta > 0           ──► create row with stock = delta   │
//! │                delta = 0           ──► no-op, stock 0                  │
//! │                delta < 0           ──► InsufficientStock (available 0) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sale and correction engines call [`adjust_stock_in`] on their own
//! write transaction so stock moves commit or roll back with the sale rows.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use till_core::validation::{validate_item_name, validate_name, validate_price_cents};
use till_core::{CoreError, InventoryItem, ItemPrices, Money, StockLevel, ValidationError};
use till_db::repository::inventory;
use tracing::info;

use crate::error::LedgerResult;
use crate::retry::with_retry;
use crate::store::{finish, LedgerStore};

/// Catalog and stock operations.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    store: LedgerStore,
}

impl InventoryLedger {
    pub fn new(store: LedgerStore) -> Self {
        InventoryLedger { store }
    }

    /// Units on hand. Unknown items report 0.
    pub async fn get_stock(&self, item: &str) -> LedgerResult<i64> {
        Ok(self.store.db().inventory().stock(item).await?)
    }

    pub async fn get_item(&self, item: &str) -> LedgerResult<Option<InventoryItem>> {
        Ok(self.store.db().inventory().get(item).await?)
    }

    pub async fn get_prices(&self, item: &str) -> LedgerResult<Option<ItemPrices>> {
        Ok(self.store.db().inventory().prices(item).await?)
    }

    /// Every item with its stock, ordered by name.
    pub async fn list_all(&self) -> LedgerResult<Vec<StockLevel>> {
        Ok(self.store.db().inventory().list_all().await?)
    }

    pub async fn categories(&self) -> LedgerResult<Vec<String>> {
        Ok(self.store.db().inventory().categories().await?)
    }

    /// Applies a stock delta in its own write transaction and returns the new
    /// stock level.
    pub async fn adjust_stock(&self, item: &str, delta: i64) -> LedgerResult<i64> {
        validate_item_name(item)?;
        units_removed(delta)?;

        let quantity = with_retry(self.store.retry_policy(), "adjust_stock", move || {
            self.try_adjust_stock(item, delta)
        })
        .await?;

        info!(item = %item, delta = delta, quantity = quantity, "Stock adjusted");
        Ok(quantity)
    }

    async fn try_adjust_stock(&self, item: &str, delta: i64) -> LedgerResult<i64> {
        let mut tx = self.store.db().begin_immediate().await?;
        let result = adjust_stock_in(tx.conn(), item, delta, Utc::now()).await;
        finish(tx, result).await
    }

    /// Updates cost and/or selling price. `None` leaves a price unchanged.
    pub async fn set_prices(
        &self,
        item: &str,
        cost_price: Option<Money>,
        selling_price: Option<Money>,
    ) -> LedgerResult<()> {
        if let Some(cost) = cost_price {
            validate_price_cents("cost price", cost.cents())?;
        }
        if let Some(sell) = selling_price {
            validate_price_cents("selling price", sell.cents())?;
        }

        let updated = with_retry(self.store.retry_policy(), "set_prices", move || async move {
            Ok(inventory::update_prices(
                self.store.db().pool(),
                item,
                cost_price.map(|m| m.cents()),
                selling_price.map(|m| m.cents()),
                Utc::now(),
            )
            .await?)
        })
        .await?;

        if updated == 0 {
            return Err(CoreError::ItemNotFound(item.to_string()).into());
        }

        info!(item = %item, ?cost_price, ?selling_price, "Prices updated");
        Ok(())
    }

    /// Sets or clears the item's category.
    pub async fn set_category(&self, item: &str, category: Option<&str>) -> LedgerResult<()> {
        if let Some(category) = category {
            validate_name("category", category)?;
        }

        let updated = with_retry(self.store.retry_policy(), "set_category", move || async move {
            Ok(inventory::update_category(self.store.db().pool(), item, category, Utc::now()).await?)
        })
        .await?;

        if updated == 0 {
            return Err(CoreError::ItemNotFound(item.to_string()).into());
        }
        Ok(())
    }

    /// Removes an item from the catalog. Committed sale lines keep their
    /// item name; the sales history is unaffected.
    pub async fn delete_item(&self, item: &str) -> LedgerResult<()> {
        let deleted = with_retry(self.store.retry_policy(), "delete_item", move || async move {
            Ok(inventory::delete_item(self.store.db().pool(), item).await?)
        })
        .await?;

        if deleted == 0 {
            return Err(CoreError::ItemNotFound(item.to_string()).into());
        }

        info!(item = %item, "Item removed from catalog");
        Ok(())
    }
}

/// Applies `delta` to `item` on an open write transaction.
///
/// Returns the new stock level. Nothing is written when the delta is
/// rejected.
pub async fn adjust_stock_in(
    conn: &mut SqliteConnection,
    item: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> LedgerResult<i64> {
    let requested = units_removed(delta)?;

    match inventory::stock_of(&mut *conn, item).await? {
        Some(current) => {
            let next = current.checked_add(delta).ok_or_else(|| ValidationError::Overflow {
                field: "stock".to_string(),
            })?;

            if next < 0 {
                return Err(CoreError::InsufficientStock {
                    item: item.to_string(),
                    available: current,
                    requested,
                }
                .into());
            }

            inventory::set_quantity(&mut *conn, item, next, now).await?;
            Ok(next)
        }
        None if delta > 0 => {
            inventory::insert_item(&mut *conn, item, delta, now).await?;
            Ok(delta)
        }
        None if delta == 0 => Ok(0),
        None => Err(CoreError::InsufficientStock {
            item: item.to_string(),
            available: 0,
            requested,
        }
        .into()),
    }
}

/// Units a delta takes out of stock. `i64::MIN` has no positive
/// counterpart and is rejected.
fn units_removed(delta: i64) -> LedgerResult<i64> {
    delta.checked_neg().ok_or_else(|| {
        ValidationError::Overflow {
            field: "delta".to_string(),
        }
        .into()
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
