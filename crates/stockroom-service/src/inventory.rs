//! # Inventory Service
//!
//! Stock receiving and the read side of the stock-movement ledger.
//!
//! `stock_cached` is the authoritative figure that sales decrement. The
//! ledger is append-only, so replaying it must give the same number;
//! [`InventoryService::reconcile`] reports when it does not and leaves the
//! cache untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use ts_rs::TS;

use stockroom_core::validation::{validate_id, validate_quantity};
use stockroom_core::{Product, StockMovement};
use stockroom_db::Database;

use crate::audit::{AuditEntry, AuditSink, STOCK_RECEIVED};
use crate::error::{ServiceError, ServiceResult};

/// Cached stock compared with the ledger replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockReconciliation {
    pub product_id: String,
    pub stock_cached: Option<i64>,
    /// Signed sum of all movements.
    pub ledger_total: i64,
    /// Always true for untracked products.
    pub in_sync: bool,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl InventoryService {
    pub fn new(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        InventoryService { db, audit }
    }

    /// Adds stock and records one `IN` movement, atomically.
    pub async fn receive_stock(
        &self,
        product_id: &str,
        quantity: i64,
        acting_user_id: &str,
        note: Option<String>,
    ) -> ServiceResult<Product> {
        validate_id("product_id", product_id)?;
        validate_id("acting_user_id", acting_user_id)?;
        validate_quantity(quantity)?;

        let (product, movement) = self
            .db
            .products()
            .receive_stock(product_id, quantity, note)
            .await?;

        self.audit.record(AuditEntry::new(
            acting_user_id,
            STOCK_RECEIVED,
            format!("Received {} x {}", quantity, product.sku),
            json!({
                "product_id": product.id,
                "movement_id": movement.id,
                "quantity": quantity,
                "stock": product.stock_cached,
            }),
        ));

        Ok(product)
    }

    /// Compares `stock_cached` with the ledger. Read-only.
    pub async fn reconcile(&self, product_id: &str) -> ServiceResult<StockReconciliation> {
        let product = self.product(product_id).await?;
        let ledger_total = self.db.movements().ledger_total(product_id).await?;

        let in_sync = product.stock_cached.map_or(true, |stock| stock == ledger_total);
        if !in_sync {
            warn!(
                product_id = %product.id,
                sku = %product.sku,
                stock_cached = ?product.stock_cached,
                ledger_total,
                "Stock cache differs from ledger"
            );
        }

        Ok(StockReconciliation {
            product_id: product.id,
            stock_cached: product.stock_cached,
            ledger_total,
            in_sync,
        })
    }

    /// Active tracked products at or below their threshold.
    pub async fn low_stock(&self) -> ServiceResult<Vec<Product>> {
        Ok(self.db.products().list_low_stock().await?)
    }

    /// Ledger history of a product, oldest first.
    pub async fn movements(&self, product_id: &str) -> ServiceResult<Vec<StockMovement>> {
        self.product(product_id).await?;
        Ok(self.db.movements().for_product(product_id).await?)
    }

    async fn product(&self, product_id: &str) -> ServiceResult<Product> {
        self.db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))
    }
}
