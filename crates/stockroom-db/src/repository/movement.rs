//! # Stock Movement Repository
//!
//! The append-only ledger behind `products.stock_cached`.
//!
//! ## Ledger Invariant
//! ```text
//! Σ (IN quantity) - Σ (OUT quantity)  ==  products.stock_cached
//! ```
//! Every code path that changes `stock_cached` appends its movement in the
//! same transaction. Rows are never updated or deleted (the schema enforces
//! this with triggers).

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::StockMovement;

/// Repository for reading the stock ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Ledger history of one product, oldest first.
    pub async fn for_product(&self, product_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, quantity, sale_item_id, note, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Replays the ledger: signed sum of all movements of a product.
    pub async fn ledger_total(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                CASE movement_type WHEN 'IN' THEN quantity ELSE -quantity END
            ), 0)
            FROM stock_movements
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

/// Appends one movement on an open connection or transaction.
pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &StockMovement,
) -> DbResult<()> {
    debug!(
        product_id = %movement.product_id,
        movement_type = movement.movement_type.as_str(),
        quantity = movement.quantity,
        "Appending stock movement"
    );

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity, sale_item_id, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(&movement.sale_item_id)
    .bind(&movement.note)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::repository::product::NewProduct;
    use crate::{Database, DbConfig, DbError};
    use stockroom_core::MovementType;

    #[tokio::test]
    async fn test_ledger_follows_receipts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(NewProduct::new("TEA-01", "Green Tea", 450).stock(5))
            .await
            .unwrap();

        db.products()
            .receive_stock(&product.id, 7, Some("delivery".to_string()))
            .await
            .unwrap();

        let movements = db.movements().for_product(&product.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.movement_type == MovementType::In));
        assert_eq!(movements[1].note.as_deref(), Some("delivery"));

        assert_eq!(db.movements().ledger_total(&product.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_ledger_rows_cannot_be_rewritten() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(NewProduct::new("TEA-02", "Black Tea", 450).stock(3))
            .await
            .unwrap();

        let update: Result<_, DbError> = sqlx::query("UPDATE stock_movements SET quantity = 99")
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM stock_movements")
            .execute(db.pool())
            .await;
        assert!(delete.is_err());

        assert_eq!(db.movements().ledger_total(&product.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_product_has_empty_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(db.movements().ledger_total("nope").await.unwrap(), 0);
        assert!(db.movements().for_product("nope").await.unwrap().is_empty());
    }
}
