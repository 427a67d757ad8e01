//! # Seed Inventory
//!
//! Stocks a development database with a bar menu.
//!
//! ## Usage
//! ```bash
//! # Default path, default stock levels
//! cargo run -p till-db --bin seed
//!
//! # Custom path, every item stocked to 50
//! cargo run -p till-db --bin seed -- --db ./data/till.db --stock 50
//! ```
//!
//! Each item gets a cost price of roughly a third of its selling price.
//! Existing catalogs are left alone.

use chrono::Utc;
use std::env;
use till_core::InventoryItem;
use till_db::repository::inventory;
use till_db::{Database, DbConfig};

/// (category, item, selling price in cents, default stock)
const MENU: &[(&str, &str, i64, i64)] = &[
    ("Beer", "Beer", 2000, 48),
    ("Beer", "Lager", 2200, 48),
    ("Beer", "Stout", 2500, 24),
    ("Beer", "IPA", 2600, 24),
    ("Soft Drinks", "Water", 800, 60),
    ("Soft Drinks", "Soda", 500, 60),
    ("Soft Drinks", "Juice", 900, 30),
    ("Soft Drinks", "Energy Drink", 1500, 24),
    ("Spirits", "Whisky Shot", 3000, 40),
    ("Spirits", "Vodka Shot", 2500, 40),
    ("Spirits", "Gin & Tonic", 3500, 30),
    ("Spirits", "Rum & Cola", 3200, 30),
    ("Wine", "House Red", 3000, 20),
    ("Wine", "House White", 3000, 20),
    ("Wine", "Sparkling", 4500, 12),
    ("Snacks", "Peanuts", 600, 40),
    ("Snacks", "Crisps", 700, 40),
    ("Snacks", "Olives", 1200, 15),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./till_dev.db");
    let mut stock_override: Option<i64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock_override = args[i + 1].parse().ok().filter(|n: &i64| *n >= 0);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till Seed Inventory");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./till_dev.db)");
                println!("  -s, --stock <N>    Stock every item to N units");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Till Seed Inventory");
    println!("===================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.inventory().count().await?;
    if existing > 0 {
        println!("⚠ Catalog already has {} items, skipping seed.", existing);
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let mut tx = db.begin_immediate().await?;
    for (category, item, price_cents, stock) in MENU {
        let row = InventoryItem {
            item: item.to_string(),
            quantity: stock_override.unwrap_or(*stock),
            cost_price_cents: price_cents * 35 / 100,
            selling_price_cents: *price_cents,
            category: Some(category.to_string()),
            updated_at: now,
        };
        if let Err(e) = inventory::upsert_item(tx.conn(), &row).await {
            eprintln!("Failed to insert {}: {}", row.item, e);
            tx.rollback().await?;
            return Err(e.into());
        }
    }
    tx.commit().await?;

    println!("✓ Stocked {} items", MENU.len());
    for category in db.inventory().categories().await? {
        let items = db.inventory().list_by_category(&category).await?;
        println!("  {:<12} {} items", category, items.len());
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}
