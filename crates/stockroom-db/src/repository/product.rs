//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Create (with the opening `IN` movement)
//! - Lookups by ID / SKU
//! - Stock receipt (increment + `IN` movement, one transaction)
//! - Low-stock listing
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: Absolute update (loses concurrent changes)              │
//! │     UPDATE products SET stock_cached = 7 WHERE id = ?              │
//! │                                                                     │
//! │  ✅ CORRECT: Delta update + ledger row in the same transaction     │
//! │     UPDATE products SET stock_cached = stock_cached + 12           │
//! │     INSERT INTO stock_movements (..., 'IN', 12, ...)               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::generate_id;
use super::movement::insert_movement;
use crate::error::{DbError, DbResult};
use stockroom_core::validation::{
    validate_min_stock, validate_name, validate_price_cents, validate_quantity, validate_sku,
};
use stockroom_core::{CoreError, MovementType, Product, StockMovement};

/// Fields needed to create a product.
///
/// ## Example
/// ```rust,ignore
/// let product = db.products()
///     .create(NewProduct::new("COKE-330", "Coca-Cola 330ml", 1000).stock(10).min_stock(2))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category_id: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    /// Opening stock. `None` creates an untracked product.
    pub stock: Option<i64>,
    pub min_stock: i64,
}

impl NewProduct {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        NewProduct {
            sku: sku.into(),
            name: name.into(),
            category_id: None,
            price_cents,
            cost_cents: 0,
            stock: None,
            min_stock: 0,
        }
    }

    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn cost(mut self, cost_cents: i64) -> Self {
        self.cost_cents = cost_cents;
        self
    }

    /// Tracks stock, starting at `stock` units.
    pub fn stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn min_stock(mut self, min_stock: i64) -> Self {
        self.min_stock = min_stock;
        self
    }

    fn validate(&self) -> Result<(), CoreError> {
        validate_sku(&self.sku)?;
        validate_name("name", &self.name)?;
        validate_price_cents(self.price_cents)?;
        validate_price_cents(self.cost_cents)?;
        validate_min_stock(self.min_stock)?;
        if let Some(stock) = self.stock {
            validate_min_stock(stock)?;
        }
        Ok(())
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product.
    ///
    /// Opening stock above zero is written to the ledger as an `IN`
    /// movement in the same transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    /// * `Err(DbError::ForeignKeyViolation)` - unknown category
    pub async fn create(&self, new: NewProduct) -> DbResult<Product> {
        new.validate()?;

        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            category_id: new.category_id,
            price_cents: new.price_cents,
            cost_cents: new.cost_cents,
            stock_cached: new.stock,
            min_stock: new.min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category_id,
                price_cents, cost_cents,
                stock_cached, min_stock,
                is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8,
                ?9, ?10, ?11
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock_cached)
        .bind(product.min_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(opening) = product.stock_cached.filter(|s| *s > 0) {
            let movement = StockMovement {
                id: generate_id(),
                product_id: product.id.clone(),
                movement_type: MovementType::In,
                quantity: opening,
                sale_item_id: None,
                note: Some("opening stock".to_string()),
                created_at: now,
            };
            insert_movement(&mut tx, &movement).await?;
        }

        tx.commit().await?;

        Ok(product)
    }

    /// Gets a product by its ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id,
                price_cents, cost_cents,
                stock_cached, min_stock,
                is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU (e.g., "COKE-330").
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id,
                price_cents, cost_cents,
                stock_cached, min_stock,
                is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Active, tracked products at or below their minimum stock.
    ///
    /// Emptiest first, then by SKU.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id,
                price_cents, cost_cents,
                stock_cached, min_stock,
                is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
              AND stock_cached IS NOT NULL
              AND stock_cached <= min_stock
            ORDER BY stock_cached, sku
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Low-stock products");
        Ok(products)
    }

    /// Receives stock: increments `stock_cached` and appends an `IN`
    /// movement atomically.
    ///
    /// An untracked product starts being tracked from zero.
    ///
    /// ## Returns
    /// The updated product and the ledger row.
    pub async fn receive_stock(
        &self,
        product_id: &str,
        quantity: i64,
        note: Option<String>,
    ) -> DbResult<(Product, StockMovement)> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // The update is the first statement so the transaction holds the
        // write lock before it reads the product back.
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_cached = COALESCE(stock_cached, 0) + ?2,
                updated_at = ?3
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }

        let movement = StockMovement {
            id: generate_id(),
            product_id: product_id.to_string(),
            movement_type: MovementType::In,
            quantity,
            sale_item_id: None,
            note,
            created_at: now,
        };
        insert_movement(&mut tx, &movement).await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id,
                price_cents, cost_cents,
                stock_cached, min_stock,
                is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            product_id = %product.id,
            sku = %product.sku,
            quantity,
            stock = ?product.stock_cached,
            "Stock received"
        );

        Ok((product, movement))
    }

    /// Soft-deletes a product. Past sales keep referencing it.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
