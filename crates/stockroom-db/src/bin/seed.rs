//! # Seed Data Generator
//!
//! Populates the database with a small catalog and two users for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p stockroom-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p stockroom-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p stockroom-db --bin seed -- --db ./data/stockroom.db
//! ```
//!
//! ## Generated Data
//! - One category per catalog group
//! - Products with SKU `{GROUP}-{NAME}-{INDEX}`, opening stock written to
//!   the ledger as `IN` movements
//! - An `admin` and a `cashier` user
//!
//! Re-running is safe: existing users, categories and SKUs are kept.

use std::env;

use anyhow::Context;
use stockroom_core::{Role, User};
use stockroom_db::{Database, DbConfig, NewProduct};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Catalog groups: (SKU prefix, category name, product names).
const CATALOG: &[(&str, &str, &[&str])] = &[
    (
        "BEV",
        "Beverages",
        &[
            "Coca-Cola", "Pepsi", "Sprite", "Fanta", "Orange Juice", "Apple Juice",
            "Iced Tea", "Mineral Water", "Sparkling Water", "Energy Drink",
        ],
    ),
    (
        "SNK",
        "Snacks",
        &[
            "Potato Chips", "Tortilla Chips", "Pretzels", "Salted Peanuts", "Popcorn",
            "Chocolate Bar", "Gummy Bears", "Cookies", "Crackers", "Granola Bar",
        ],
    ),
    (
        "DRY",
        "Dairy",
        &[
            "Whole Milk", "Skim Milk", "Oat Milk", "Cheddar", "Mozzarella",
            "Butter", "Greek Yogurt", "Cream Cheese", "Eggs Dozen", "Sour Cream",
        ],
    ),
    (
        "GRO",
        "Grocery",
        &[
            "Spaghetti", "Basmati Rice", "Canned Tomatoes", "Olive Oil", "Flour",
            "Sugar", "Coffee Beans", "Black Tea", "Honey", "Peanut Butter",
        ],
    ),
];

/// Size variants: (label, price addon in cents).
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("Family", 450),
    ("Multipack", 650),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./stockroom.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1]
                        .parse()
                        .with_context(|| format!("invalid --count value: {}", args[i + 1]))?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockroom Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./stockroom.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(database = %db_path, products = count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("opening database")?;

    let admin = ensure_user(&db, "admin", "Store Admin", Role::Admin).await?;
    let cashier = ensure_user(&db, "cashier", "Front Cashier", Role::Cashier).await?;
    info!(admin = %admin.id, cashier = %cashier.id, "Users ready");

    let existing = db.categories().list().await?;

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut skipped = 0;

    'catalog: for (group_idx, (prefix, category_name, names)) in CATALOG.iter().enumerate() {
        let category = match existing.iter().find(|c| c.name == *category_name) {
            Some(category) => category.clone(),
            None => db.categories().create(category_name).await?,
        };

        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated + skipped >= count {
                    break 'catalog;
                }

                let seed = group_idx * 1000 + name_idx * 10 + size_idx;
                let new = generate_product(prefix, name, size, *price_addon, seed)
                    .category(&category.id);

                // Re-running the seed leaves earlier rows and their ledger alone.
                if db.products().get_by_sku(&new.sku).await?.is_some() {
                    skipped += 1;
                    continue;
                }

                if let Err(e) = db.products().create(new).await {
                    warn!(error = %e, seed, "Failed to insert product");
                    continue;
                }

                generated += 1;
                if generated % 100 == 0 {
                    info!(generated, "Progress");
                }
            }
        }
    }

    info!(generated, skipped, elapsed = ?start.elapsed(), "Products generated");

    let products = db.products().count().await?;
    let users = db.users().count().await?;
    let low = db.products().list_low_stock().await?;
    info!(products, users, low_stock = low.len(), "Seed complete");

    db.close().await;
    Ok(())
}

/// Returns the user with `username`, creating it on first run.
async fn ensure_user(db: &Database, username: &str, full_name: &str, role: Role) -> anyhow::Result<User> {
    if let Some(user) = db.users().get_by_username(username).await? {
        return Ok(user);
    }
    Ok(db.users().create(username, full_name, role).await?)
}

/// Builds one product with deterministic pseudo-random data.
fn generate_product(prefix: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> NewProduct {
    let code: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{prefix}-{code}-{seed:04}");

    // 1.99 - 9.99 base price + size addon
    let price_cents = 199 + ((seed * 17) % 800) as i64 + price_addon;
    // 60-80% of price
    let cost_cents = price_cents * (60 + (seed % 20) as i64) / 100;

    NewProduct::new(sku, format!("{name} {size}"), price_cents)
        .cost(cost_cents)
        .stock((seed % 41) as i64)
        .min_stock(5)
}
