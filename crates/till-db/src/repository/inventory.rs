//! # Inventory Repository
//!
//! Catalog rows keyed by item name, and the stock counter on each.
//!
//! Stock only moves through [`set_quantity`] and [`insert_item`], and only
//! inside a write transaction. The `CHECK (quantity >= 0)` constraint is the
//! last line of defence if a caller ever gets the arithmetic wrong.

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{InventoryItem, ItemPrices, StockLevel};

const ITEM_COLUMNS: &str =
    "item, quantity, cost_price_cents, selling_price_cents, category, updated_at";

/// Repository for catalog reads.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets a catalog row by item name.
    pub async fn get(&self, item: &str) -> DbResult<Option<InventoryItem>> {
        fetch_item(&self.pool, item).await
    }

    /// Units on hand. Unknown items report 0.
    pub async fn stock(&self, item: &str) -> DbResult<i64> {
        Ok(stock_of(&self.pool, item).await?.unwrap_or(0))
    }

    /// Cost and selling price of an item.
    pub async fn prices(&self, item: &str) -> DbResult<Option<ItemPrices>> {
        let prices = sqlx::query_as::<_, ItemPrices>(
            "SELECT cost_price_cents, selling_price_cents FROM inventory WHERE item = ?1",
        )
        .bind(item)
        .fetch_optional(&self.pool)
        .await?;

        Ok(prices)
    }

    /// Stock levels for every item, alphabetical.
    pub async fn list_all(&self) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            "SELECT item, quantity, category FROM inventory ORDER BY item",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    /// Full catalog rows, alphabetical.
    pub async fn list_items(&self) -> DbResult<Vec<InventoryItem>> {
        let sql = format!("SELECT {} FROM inventory ORDER BY item", ITEM_COLUMNS);
        let items = sqlx::query_as::<_, InventoryItem>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Items in one category, alphabetical.
    pub async fn list_by_category(&self, category: &str) -> DbResult<Vec<InventoryItem>> {
        let sql = format!(
            "SELECT {} FROM inventory WHERE category = ?1 ORDER BY item",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Distinct non-empty categories, alphabetical.
    pub async fn categories(&self) -> DbResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT category FROM inventory
            WHERE category IS NOT NULL AND category <> ''
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Number of catalog rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Statements (usable on the pool or inside a write transaction)
// =============================================================================

/// Gets a catalog row by item name.
pub async fn fetch_item<'e, E>(executor: E, item: &str) -> DbResult<Option<InventoryItem>>
where
    E: SqliteExecutor<'e>,
{
    let sql = format!("SELECT {} FROM inventory WHERE item = ?1", ITEM_COLUMNS);
    let row = sqlx::query_as::<_, InventoryItem>(&sql)
        .bind(item)
        .fetch_optional(executor)
        .await?;

    Ok(row)
}

/// Units on hand, or `None` if the item is not in the catalog.
pub async fn stock_of<'e, E>(executor: E, item: &str) -> DbResult<Option<i64>>
where
    E: SqliteExecutor<'e>,
{
    let quantity: Option<i64> = sqlx::query_scalar("SELECT quantity FROM inventory WHERE item = ?1")
        .bind(item)
        .fetch_optional(executor)
        .await?;

    Ok(quantity)
}

/// Overwrites the stock counter. Returns rows affected (0 if unknown item).
pub async fn set_quantity<'e, E>(
    executor: E,
    item: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    debug!(item = %item, quantity = quantity, "Setting stock");

    let result = sqlx::query("UPDATE inventory SET quantity = ?2, updated_at = ?3 WHERE item = ?1")
        .bind(item)
        .bind(quantity)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Inserts a new catalog row with zero prices and no category.
pub async fn insert_item<'e, E>(
    executor: E,
    item: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    debug!(item = %item, quantity = quantity, "Creating catalog item");

    sqlx::query(
        r#"
        INSERT INTO inventory (item, quantity, cost_price_cents, selling_price_cents, category, updated_at)
        VALUES (?1, ?2, 0, 0, NULL, ?3)
        "#,
    )
    .bind(item)
    .bind(quantity)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(())
}

/// Inserts or fully replaces a catalog row (seeding and imports).
pub async fn upsert_item<'e, E>(executor: E, row: &InventoryItem) -> DbResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO inventory (item, quantity, cost_price_cents, selling_price_cents, category, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(item) DO UPDATE SET
            quantity = excluded.quantity,
            cost_price_cents = excluded.cost_price_cents,
            selling_price_cents = excluded.selling_price_cents,
            category = excluded.category,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&row.item)
    .bind(row.quantity)
    .bind(row.cost_price_cents)
    .bind(row.selling_price_cents)
    .bind(&row.category)
    .bind(row.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Updates either price, leaving `None` ones untouched. Returns rows affected.
pub async fn update_prices<'e, E>(
    executor: E,
    item: &str,
    cost_price_cents: Option<i64>,
    selling_price_cents: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE inventory SET
            cost_price_cents = COALESCE(?2, cost_price_cents),
            selling_price_cents = COALESCE(?3, selling_price_cents),
            updated_at = ?4
        WHERE item = ?1
        "#,
    )
    .bind(item)
    .bind(cost_price_cents)
    .bind(selling_price_cents)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Sets or clears the category. Returns rows affected.
pub async fn update_category<'e, E>(
    executor: E,
    item: &str,
    category: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE inventory SET category = ?2, updated_at = ?3 WHERE item = ?1")
        .bind(item)
        .bind(category)
        .bind(now)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Removes a catalog row. Sale history keeps the name by value.
pub async fn delete_item<'e, E>(executor: E, item: &str) -> DbResult<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM inventory WHERE item = ?1")
        .bind(item)
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

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        for (item, qty, category) in [("Beer", 10, Some("Drinks")), ("Water", 3, Some("Drinks")), ("Nuts", 4, None)] {
            upsert_item(
                db.pool(),
                &InventoryItem {
                    item: item.to_string(),
                    quantity: qty,
                    cost_price_cents: 500,
                    selling_price_cents: 2000,
                    category: category.map(str::to_string),
                    updated_at: now,
                },
            )
            .await
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_stock_of_unknown_item_is_zero() {
        let db = seeded().await;
        assert_eq!(db.inventory().stock("Beer").await.unwrap(), 10);
        assert_eq!(db.inventory().stock("Whisky").await.unwrap(), 0);
        assert_eq!(stock_of(db.pool(), "Whisky").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_negative_quantity_rejected_by_schema() {
        let db = seeded().await;
        let err = set_quantity(db.pool(), "Water", -1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, crate::DbError::CheckViolation { .. }));
        assert_eq!(db.inventory().stock("Water").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_prices_partial_update() {
        let db = seeded().await;
        let rows = update_prices(db.pool(), "Beer", None, Some(2200), Utc::now()).await.unwrap();
        assert_eq!(rows, 1);

        let prices = db.inventory().prices("Beer").await.unwrap().unwrap();
        assert_eq!(prices.cost_price_cents, 500);
        assert_eq!(prices.selling_price_cents, 2200);

        assert_eq!(update_prices(db.pool(), "Whisky", Some(1), None, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_categories_and_listing() {
        let db = seeded().await;
        assert_eq!(db.inventory().categories().await.unwrap(), vec!["Drinks".to_string()]);
        assert_eq!(db.inventory().list_by_category("Drinks").await.unwrap().len(), 2);

        let all = db.inventory().list_all().await.unwrap();
        let names: Vec<_> = all.iter().map(|l| l.item.as_str()).collect();
        assert_eq!(names, vec!["Beer", "Nuts", "Water"]);

        assert_eq!(delete_item(db.pool(), "Nuts").await.unwrap(), 1);
        assert_eq!(db.inventory().count().await.unwrap(), 2);
    }
}
