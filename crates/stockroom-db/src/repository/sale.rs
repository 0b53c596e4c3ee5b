//! # Sale Repository
//!
//! The sale transaction and the sale read models.
//!
//! ## Sale Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    record_sale(draft)                                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   │                                                                     │
//! │   ├── INSERT sales            ← first statement: takes the write lock  │
//! │   ├── SELECT users            ← missing / inactive → UserNotFound      │
//! │   │                                                                     │
//! │   ├── for each line (input order)                                      │
//! │   │    ├── SELECT products    ← missing / inactive → ProductNotFound   │
//! │   │    ├── UPDATE products    ← guarded: stock_cached >= qty           │
//! │   │    │     0 rows → InsufficientStock                                │
//! │   │    ├── INSERT sale_items                                           │
//! │   │    └── INSERT stock_movements ('OUT', qty, sale_item_id)           │
//! │   │                                                                     │
//! │  COMMIT                         any error before here → ROLLBACK       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! SQLite admits one writer at a time. Because the first statement writes,
//! a competing sale waits (up to the busy timeout) before it reads any
//! stock, and then sees the committed result of the sale ahead of it. The
//! guarded `UPDATE` makes check-and-decrement one statement regardless.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::generate_id;
use super::movement::insert_movement;
use crate::error::{DbError, DbResult};
use stockroom_core::pricing::PricedLine;
use stockroom_core::summary::{SalesTally, UserTally};
use stockroom_core::{
    CategorySummary, CoreError, MovementType, Product, ProductSummary, Role, Sale, SaleDetail,
    SaleItem, SaleItemDetail, StockMovement, TaxBreakdown, TaxRate, UserSummary,
};

/// Sale ids per `IN (...)` batch when hydrating items.
const ITEM_BATCH: usize = 500;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// A priced sale ready to be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleDraft {
    pub user_id: String,
    pub tax_rate: TaxRate,
    pub tax_included: bool,
    pub breakdown: TaxBreakdown,
    pub lines: Vec<DraftLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: String,
    pub priced: PricedLine,
}

/// A tracked product left at or below its minimum stock by a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub product_id: String,
    pub sku: String,
    pub stock: i64,
    pub min_stock: i64,
}

/// Result of a committed sale.
///
/// `detail` is read inside the sale's transaction, so a committed sale
/// always comes back hydrated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedSale {
    pub detail: SaleDetail,
    pub alerts: Vec<StockAlert>,
}

/// Filter for listing sales. All bounds are inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleQuery {
    pub user_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct SaleRow {
    #[sqlx(flatten)]
    sale: Sale,
    username: String,
    full_name: String,
    role: Role,
}

impl SaleRow {
    fn into_detail(self, items: Vec<SaleItemDetail>) -> SaleDetail {
        SaleDetail {
            user: UserSummary {
                id: self.sale.user_id.clone(),
                username: self.username,
                full_name: self.full_name,
                role: self.role,
            },
            sale: self.sale,
            items,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    #[sqlx(flatten)]
    item: SaleItem,
    sku: String,
    product_name: String,
    category_id: Option<String>,
    category_name: Option<String>,
}

impl From<ItemRow> for SaleItemDetail {
    fn from(row: ItemRow) -> Self {
        let category = match (row.category_id, row.category_name) {
            (Some(id), Some(name)) => Some(CategorySummary { id, name }),
            _ => None,
        };

        SaleItemDetail {
            product: ProductSummary {
                id: row.item.product_id.clone(),
                sku: row.sku,
                name: row.product_name,
                category,
            },
            item: row.item,
        }
    }
}

const SALE_SELECT: &str = r#"
    SELECT
        s.id, s.user_id, s.subtotal_cents, s.tax_cents, s.tax_rate_bps,
        s.tax_included, s.total_cents, s.created_at,
        u.username, u.full_name, u.role
    FROM sales s
    INNER JOIN users u ON u.id = s.user_id
"#;

const ITEM_SELECT: &str = r#"
    SELECT
        si.id, si.sale_id, si.product_id, si.quantity, si.unit_price_cents,
        si.discount_bps, si.line_total_cents, si.created_at,
        p.sku, p.name AS product_name,
        c.id AS category_id, c.name AS category_name
    FROM sale_items si
    INNER JOIN products p ON p.id = si.product_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Persists a sale with its items, stock decrements and ledger rows as
    /// one transaction.
    ///
    /// ## Errors
    /// * `DbError::Core(UserNotFound)` - acting user missing or inactive
    /// * `DbError::Core(ProductNotFound)` - a product missing or inactive
    /// * `DbError::Core(InsufficientStock)` - a line exceeds current stock
    ///
    /// On any error nothing is persisted: the transaction is dropped
    /// without commit, which rolls it back.
    pub async fn record_sale(&self, draft: &SaleDraft) -> DbResult<RecordedSale> {
        let now = Utc::now();
        let sale = Sale {
            id: generate_id(),
            user_id: draft.user_id.clone(),
            subtotal_cents: draft.breakdown.subtotal.cents(),
            tax_cents: draft.breakdown.tax.cents(),
            tax_rate_bps: draft.tax_rate.bps(),
            tax_included: draft.tax_included,
            total_cents: draft.breakdown.total.cents(),
            created_at: now,
        };

        debug!(id = %sale.id, user_id = %sale.user_id, lines = draft.lines.len(), "Recording sale");

        let mut tx = self.pool.begin().await?;

        insert_sale(&mut tx, &sale).await?;

        let user_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM users WHERE id = ?1")
                .bind(&sale.user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if user_active != Some(true) {
            return Err(CoreError::UserNotFound(sale.user_id.clone()).into());
        }

        let mut alerts: Vec<StockAlert> = Vec::new();

        for line in &draft.lines {
            let quantity = line.priced.quantity;
            let mut product = load_active_product(&mut tx, &line.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            // The write lock is held, so the read above is current; the
            // guarded UPDATE still decides.
            if !product.can_sell(quantity)
                || !decrement_stock(&mut tx, &product.id, quantity, now).await?
            {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    available: product.stock_cached.unwrap_or(0),
                    requested: quantity,
                }
                .into());
            }

            let item = SaleItem {
                id: generate_id(),
                sale_id: sale.id.clone(),
                product_id: product.id.clone(),
                quantity,
                unit_price_cents: line.priced.unit_price.cents(),
                discount_bps: line.priced.discount_bps,
                line_total_cents: line.priced.line_total.cents(),
                created_at: now,
            };
            insert_item(&mut tx, &item).await?;

            let movement = StockMovement {
                id: generate_id(),
                product_id: product.id.clone(),
                movement_type: MovementType::Out,
                quantity,
                sale_item_id: Some(item.id.clone()),
                note: None,
                created_at: now,
            };
            insert_movement(&mut tx, &movement).await?;

            product.stock_cached = product.stock_cached.map(|stock| stock - quantity);
            alerts.retain(|a| a.product_id != product.id);
            if let Some(stock) = product.stock_cached.filter(|_| product.is_low_stock()) {
                alerts.push(StockAlert {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    stock,
                    min_stock: product.min_stock,
                });
            }
        }

        let detail = fetch_detail(&mut tx, &sale.id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", &sale.id))?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            user_id = %sale.user_id,
            total_cents = sale.total_cents,
            lines = draft.lines.len(),
            "Sale committed"
        );

        Ok(RecordedSale { detail, alerts })
    }

    /// Gets a hydrated sale by ID.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        fetch_detail(&mut conn, id).await
    }

    /// Lists hydrated sales, newest first (ties broken by id descending).
    pub async fn list_details(&self, query: &SaleQuery) -> DbResult<Vec<SaleDetail>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SALE_SELECT);
        builder.push(" WHERE 1 = 1");

        if let Some(user_id) = &query.user_id {
            builder.push(" AND s.user_id = ").push_bind(user_id.clone());
        }
        if let Some(start) = query.start {
            builder.push(" AND s.created_at >= ").push_bind(start);
        }
        if let Some(end) = query.end {
            builder.push(" AND s.created_at <= ").push_bind(end);
        }
        builder.push(" ORDER BY s.created_at DESC, s.id DESC");

        let rows: Vec<SaleRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        debug!(count = rows.len(), "Listed sales");

        let ids: Vec<String> = rows.iter().map(|r| r.sale.id.clone()).collect();
        let mut items = self.items_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let sale_items = items.remove(&row.sale.id).unwrap_or_default();
                row.into_detail(sale_items)
            })
            .collect())
    }

    /// Items of many sales keyed by sale id, each list in insertion order.
    async fn items_for(&self, sale_ids: &[String]) -> DbResult<HashMap<String, Vec<SaleItemDetail>>> {
        let mut by_sale: HashMap<String, Vec<SaleItemDetail>> = HashMap::new();

        for chunk in sale_ids.chunks(ITEM_BATCH) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(ITEM_SELECT);
            builder.push(" WHERE si.sale_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id.clone());
            }
            separated.push_unseparated(") ORDER BY si.rowid");

            let rows: Vec<ItemRow> = builder.build_query_as().fetch_all(&self.pool).await?;
            for row in rows {
                by_sale
                    .entry(row.item.sale_id.clone())
                    .or_default()
                    .push(SaleItemDetail::from(row));
            }
        }

        Ok(by_sale)
    }

    /// Count and amount of all sales created at or after `since`
    /// (all sales when `None`).
    pub async fn tally_since(&self, since: Option<DateTime<Utc>>) -> DbResult<SalesTally> {
        let tally = sqlx::query_as::<_, SalesTally>(
            r#"
            SELECT COUNT(*) AS count, COALESCE(SUM(total_cents), 0) AS amount_cents
            FROM sales
            WHERE ?1 IS NULL OR created_at >= ?1
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(tally)
    }

    /// Per-user count and amount over all sales, amount descending.
    pub async fn tally_by_user(&self) -> DbResult<Vec<UserTally>> {
        let tallies = sqlx::query_as::<_, UserTally>(
            r#"
            SELECT
                u.id AS user_id, u.username, u.full_name,
                COUNT(s.id) AS count,
                COALESCE(SUM(s.total_cents), 0) AS amount_cents
            FROM sales s
            INNER JOIN users u ON u.id = s.user_id
            GROUP BY u.id, u.username, u.full_name
            ORDER BY amount_cents DESC, MIN(s.rowid)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tallies)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

async fn fetch_detail(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<SaleDetail>> {
    let sql = format!("{SALE_SELECT} WHERE s.id = ?1");
    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let sql = format!("{ITEM_SELECT} WHERE si.sale_id = ?1 ORDER BY si.rowid");
    let items = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(SaleItemDetail::from)
        .collect();

    Ok(Some(row.into_detail(items)))
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, user_id,
            subtotal_cents, tax_cents, tax_rate_bps, tax_included, total_cents,
            created_at
        ) VALUES (
            ?1, ?2,
            ?3, ?4, ?5, ?6, ?7,
            ?8
        )
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.user_id)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_cents)
    .bind(sale.tax_rate_bps)
    .bind(sale.tax_included)
    .bind(sale.total_cents)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load_active_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT
            id, sku, name, category_id,
            price_cents, cost_cents,
            stock_cached, min_stock,
            is_active, created_at, updated_at
        FROM products
        WHERE id = ?1 AND is_active = 1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Decrements tracked stock only if enough is left; untracked products
/// pass through unchanged. Returns `false` when the guard rejected it.
async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_cached = CASE
                WHEN stock_cached IS NULL THEN NULL
                ELSE stock_cached - ?2
            END,
            updated_at = ?3
        WHERE id = ?1
          AND (stock_cached IS NULL OR stock_cached >= ?2)
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    debug!(sale_id = %item.sale_id, product_id = %item.product_id, quantity = item.quantity, "Adding sale item");

    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id,
            quantity, unit_price_cents, discount_bps, line_total_cents,
            created_at
        ) VALUES (
            ?1, ?2, ?3,
            ?4, ?5, ?6, ?7,
            ?8
        )
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.discount_bps)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::NewProduct;
    use crate::{Database, DbConfig, DbError};
    use stockroom_core::money::Money;
    use stockroom_core::pricing::{price_line, price_sale};
    use stockroom_core::User;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn cashier(db: &Database, name: &str) -> User {
        db.users().create(name, name, Role::Cashier).await.unwrap()
    }

    async fn coke(db: &Database, stock: i64) -> Product {
        db.products()
            .create(NewProduct::new("COKE-330", "Coca-Cola 330ml", 1000).stock(stock).min_stock(2))
            .await
            .unwrap()
    }

    fn draft(user_id: &str, lines: &[(&str, i64, i64)]) -> SaleDraft {
        let priced: Vec<PricedLine> = lines
            .iter()
            .map(|(_, qty, unit)| price_line(Money::from_cents(*unit), *qty, 0).unwrap())
            .collect();
        let rate = TaxRate::from_bps(1900);
        let sale = price_sale(priced, false, rate).unwrap();

        SaleDraft {
            user_id: user_id.to_string(),
            tax_rate: rate,
            tax_included: false,
            breakdown: sale.breakdown,
            lines: lines
                .iter()
                .zip(sale.lines)
                .map(|((product_id, _, _), priced)| DraftLine {
                    product_id: product_id.to_string(),
                    priced,
                })
                .collect(),
        }
    }

    async fn table_count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_sale_decrements_and_writes_ledger() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 10).await;

        let recorded = db
            .sales()
            .record_sale(&draft(&user.id, &[(&product.id, 3, 1000)]))
            .await
            .unwrap();

        assert_eq!(recorded.detail.sale.subtotal_cents, 3000);
        assert_eq!(recorded.detail.sale.tax_cents, 570);
        assert_eq!(recorded.detail.sale.total_cents, 3570);
        assert!(recorded.alerts.is_empty());

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_cached, Some(7));

        let movements = db.movements().for_product(&product.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[1].movement_type, MovementType::Out);
        assert_eq!(movements[1].quantity, 3);
        assert_eq!(
            movements[1].sale_item_id.as_deref(),
            Some(recorded.detail.items[0].item.id.as_str())
        );
        assert_eq!(db.movements().ledger_total(&product.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 7).await;
        let other = db
            .products()
            .create(NewProduct::new("TEA", "Tea", 300).stock(5))
            .await
            .unwrap();

        // First line succeeds inside the transaction, second one fails.
        let err = db
            .sales()
            .record_sale(&draft(&user.id, &[(&other.id, 2, 300), (&product.id, 8, 1000)]))
            .await
            .unwrap_err();

        match err {
            DbError::Core(CoreError::InsufficientStock {
                available,
                requested,
                ref sku,
                ..
            }) => {
                assert_eq!(available, 7);
                assert_eq!(requested, 8);
                assert_eq!(sku, "COKE-330");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(table_count(&db, "sales").await, 0);
        assert_eq!(table_count(&db, "sale_items").await, 0);
        // only the two opening movements
        assert_eq!(table_count(&db, "stock_movements").await, 2);

        let tea = db.products().get_by_id(&other.id).await.unwrap().unwrap();
        assert_eq!(tea.stock_cached, Some(5));
        let coke = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(coke.stock_cached, Some(7));
    }

    #[tokio::test]
    async fn test_same_product_twice_is_checked_cumulatively() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 5).await;

        let err = db
            .sales()
            .record_sale(&draft(&user.id, &[(&product.id, 3, 1000), (&product.id, 3, 1000)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_cached, Some(5));
    }

    #[tokio::test]
    async fn test_unknown_user_and_product() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 5).await;

        let err = db
            .sales()
            .record_sale(&draft("ghost", &[(&product.id, 1, 1000)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UserNotFound(_))));

        let err = db
            .sales()
            .record_sale(&draft(&user.id, &[("ghost", 1, 1000)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::ProductNotFound(_))));

        db.users().deactivate(&user.id).await.unwrap();
        let err = db
            .sales()
            .record_sale(&draft(&user.id, &[(&product.id, 1, 1000)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::UserNotFound(_))));

        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_untracked_product_sells_without_decrement() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let bag = db
            .products()
            .create(NewProduct::new("BAG", "Carrier bag", 10))
            .await
            .unwrap();

        let recorded = db
            .sales()
            .record_sale(&draft(&user.id, &[(&bag.id, 500, 10)]))
            .await
            .unwrap();

        let after = db.products().get_by_id(&bag.id).await.unwrap().unwrap();
        assert_eq!(after.stock_cached, None);
        let movements = db.movements().for_product(&bag.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Out);
        assert_eq!(movements[0].quantity, 500);
    }

    #[tokio::test]
    async fn test_low_stock_alert() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 5).await;

        let recorded = db
            .sales()
            .record_sale(&draft(&user.id, &[(&product.id, 3, 1000)]))
            .await
            .unwrap();

        assert_eq!(
            recorded.alerts,
            vec![StockAlert {
                product_id: product.id.clone(),
                sku: "COKE-330".to_string(),
                stock: 2,
                min_stock: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_get_detail_hydrates() {
        let db = db().await;
        let user = cashier(&db, "ana").await;
        let drinks = db.categories().create("Drinks").await.unwrap();
        let product = db
            .products()
            .create(NewProduct::new("COKE-330", "Coca-Cola", 1000).stock(10).category(&drinks.id))
            .await
            .unwrap();
        let bag = db
            .products()
            .create(NewProduct::new("BAG", "Carrier bag", 10))
            .await
            .unwrap();

        let recorded = db
            .sales()
            .record_sale(&draft(&user.id, &[(&product.id, 2, 1000), (&bag.id, 1, 10)]))
            .await
            .unwrap();

        let detail = db.sales().get_detail(&recorded.detail.sale.id).await.unwrap().unwrap();
        assert_eq!(detail.user.username, "ana");
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product.sku, "COKE-330");
        assert_eq!(
            detail.items[0].product.category.as_ref().map(|c| c.name.as_str()),
            Some("Drinks")
        );
        assert_eq!(detail.items[1].product.category, None);
        let lines: i64 = detail.items.iter().map(|i| i.item.line_total_cents).sum();
        assert_eq!(lines, detail.sale.subtotal_cents);

        // record_sale hands back the same hydrated view
        assert_eq!(recorded.detail.user, detail.user);
        assert_eq!(recorded.detail.items.len(), 2);
        assert_eq!(recorded.detail.items[0].product, detail.items[0].product);
        assert_eq!(recorded.detail.items[1].product, detail.items[1].product);

        assert!(db.sales().get_detail("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_details_filters_and_orders() {
        let db = db().await;
        let ana = cashier(&db, "ana").await;
        let ben = cashier(&db, "ben").await;
        let product = coke(&db, 100).await;

        let first = db
            .sales()
            .record_sale(&draft(&ana.id, &[(&product.id, 1, 1000)]))
            .await
            .unwrap();
        let second = db
            .sales()
            .record_sale(&draft(&ben.id, &[(&product.id, 2, 1000)]))
            .await
            .unwrap();

        let all = db.sales().list_details(&SaleQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].sale.created_at >= all[1].sale.created_at);
        assert!(all.iter().all(|d| d.items.len() == 1));

        let ana_only = db
            .sales()
            .list_details(&SaleQuery {
                user_id: Some(ana.id.clone()),
                ..SaleQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(ana_only.len(), 1);
        assert_eq!(ana_only[0].sale.id, first.detail.sale.id);

        // inclusive bounds on the exact timestamp
        let exact = db
            .sales()
            .list_details(&SaleQuery {
                user_id: None,
                start: Some(second.detail.sale.created_at),
                end: Some(second.detail.sale.created_at),
            })
            .await
            .unwrap();
        assert!(exact.iter().any(|d| d.sale.id == second.detail.sale.id));
    }

    /// File-backed so that several pooled connections share one database.
    async fn file_db() -> (Database, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("stockroom-race-{}.db", generate_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        (db, path)
    }

    async fn remove_db(db: Database, path: std::path::PathBuf) {
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let (db, path) = file_db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 10).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db = db.clone();
                let sale = draft(&user.id, &[(&product.id, 6, 1000)]);
                tokio::spawn(async move { db.sales().record_sale(&sale).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(DbError::Core(CoreError::InsufficientStock { available: 4, requested: 6, .. }))
        )));

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_cached, Some(4));
        assert_eq!(db.movements().ledger_total(&product.id).await.unwrap(), 4);

        remove_db(db, path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_sales_keep_ledger_in_sync() {
        let (db, path) = file_db().await;
        let user = cashier(&db, "ana").await;
        let product = coke(&db, 10).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let sale = draft(&user.id, &[(&product.id, 3, 1000)]);
                tokio::spawn(async move { db.sales().record_sale(&sale).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::Core(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(succeeded, 3);
        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_cached, Some(1));
        assert_eq!(db.movements().ledger_total(&product.id).await.unwrap(), 1);
        assert_eq!(db.sales().count().await.unwrap(), 3);

        remove_db(db, path).await;
    }

    #[tokio::test]
    async fn test_tallies() {
        let db = db().await;
        let ana = cashier(&db, "ana").await;
        let ben = cashier(&db, "ben").await;
        let product = coke(&db, 100).await;

        db.sales()
            .record_sale(&draft(&ana.id, &[(&product.id, 3, 1000)]))
            .await
            .unwrap();
        db.sales()
            .record_sale(&draft(&ben.id, &[(&product.id, 1, 1000)]))
            .await
            .unwrap();

        let all = db.sales().tally_since(None).await.unwrap();
        assert_eq!(all, SalesTally { count: 2, amount_cents: 3570 + 1190 });

        let future = Utc::now() + chrono::Duration::days(1);
        let none = db.sales().tally_since(Some(future)).await.unwrap();
        assert_eq!(none, SalesTally::default());

        let by_user = db.sales().tally_by_user().await.unwrap();
        assert_eq!(by_user.len(), 2);
        assert_eq!(by_user[0].username, "ana");
        assert_eq!(by_user[0].amount_cents, 3570);
        assert_eq!(by_user[1].count, 1);
    }
}
