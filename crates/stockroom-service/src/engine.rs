//! # Sale Transaction Engine
//!
//! Turns a [`CreateSaleRequest`] into a committed sale.
//!
//! ## Phases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate     pure    line count, quantity, price, discount, ids    │
//! │  2. price        pure    per-line discount, sale-level tax             │
//! │  3. record       db tx   sale, items, guarded decrements, OUT ledger   │
//! │                          SaleDetail read before commit                 │
//! │  4. after commit         audit SALE_CREATED, low-stock warnings        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Phases 1 and 2 fail before any connection is taken. Phase 3 either
//! commits everything, hydrated detail included, or nothing. Phase 4
//! cannot fail the sale, so an error from `create_sale` always means no
//! sale was written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use ts_rs::TS;

use stockroom_core::pricing::{price_line, price_sale};
use stockroom_core::validation::{
    validate_discount_bps, validate_id, validate_line_count, validate_price_cents,
    validate_quantity,
};
use stockroom_core::{Money, SaleDetail, TaxRate};
use stockroom_db::{Database, DraftLine, SaleDraft};

use crate::audit::{AuditEntry, AuditSink, SALE_CREATED};
use crate::error::ServiceResult;

// =============================================================================
// Request Types
// =============================================================================

/// One requested sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    /// Price charged per unit, before discount.
    pub unit_price_cents: i64,
    /// Per-line discount in basis points; `None` means no discount.
    pub discount_bps: Option<u32>,
}

/// A sale as submitted by the register.
///
/// Tax settings left out fall back to the engine's [`TaxDefaults`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLine>,
    #[serde(default)]
    #[ts(optional)]
    pub tax_included: Option<bool>,
    #[serde(default)]
    #[ts(optional)]
    pub tax_rate: Option<TaxRate>,
    pub acting_user_id: String,
}

/// Store-wide tax settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaxDefaults {
    pub rate: TaxRate,
    pub included: bool,
}

impl CreateSaleRequest {
    /// Validates and prices the request.
    pub fn to_draft(&self, defaults: TaxDefaults) -> ServiceResult<SaleDraft> {
        let tax_rate = self.tax_rate.unwrap_or(defaults.rate);
        let tax_included = self.tax_included.unwrap_or(defaults.included);

        validate_id("acting_user_id", &self.acting_user_id)?;
        validate_line_count(self.items.len())?;

        let mut lines = Vec::with_capacity(self.items.len());
        for line in &self.items {
            validate_id("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_price_cents(line.unit_price_cents)?;
            let discount_bps = line.discount_bps.unwrap_or(0);
            validate_discount_bps(discount_bps)?;

            lines.push(price_line(
                Money::from_cents(line.unit_price_cents),
                line.quantity,
                discount_bps,
            )?);
        }

        let priced = price_sale(lines, tax_included, tax_rate)?;

        let lines = self
            .items
            .iter()
            .zip(priced.lines)
            .map(|(line, priced)| DraftLine {
                product_id: line.product_id.clone(),
                priced,
            })
            .collect();

        Ok(SaleDraft {
            user_id: self.acting_user_id.clone(),
            tax_rate,
            tax_included,
            breakdown: priced.breakdown,
            lines,
        })
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Creates sales.
#[derive(Clone)]
pub struct SaleEngine {
    db: Database,
    audit: Arc<dyn AuditSink>,
    tax: TaxDefaults,
}

impl SaleEngine {
    /// Creates an engine with no default tax (0 bps, exclusive).
    pub fn new(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        SaleEngine {
            db,
            audit,
            tax: TaxDefaults::default(),
        }
    }

    pub fn with_tax_defaults(mut self, tax: TaxDefaults) -> Self {
        self.tax = tax;
        self
    }

    /// Validates, prices and records a sale.
    ///
    /// ## Errors
    /// * `Validation` - malformed request; nothing was written
    /// * `NotFound` - acting user or a product is missing or inactive
    /// * `InsufficientStock` - a line exceeds stock; the whole sale is rolled back
    /// * `Internal` - storage failure
    pub async fn create_sale(&self, request: CreateSaleRequest) -> ServiceResult<SaleDetail> {
        let draft = request.to_draft(self.tax)?;

        debug!(
            user_id = %draft.user_id,
            lines = draft.lines.len(),
            total_cents = draft.breakdown.total.cents(),
            "Sale priced"
        );

        let recorded = self.db.sales().record_sale(&draft).await?;
        let sale = &recorded.detail.sale;

        self.audit.record(AuditEntry::new(
            &sale.user_id,
            SALE_CREATED,
            format!("Sale {} created, total {}", sale.id, sale.total()),
            json!({
                "sale_id": sale.id,
                "total_cents": sale.total_cents,
                "lines": draft.lines.len(),
            }),
        ));

        for alert in &recorded.alerts {
            warn!(
                product_id = %alert.product_id,
                sku = %alert.sku,
                stock = alert.stock,
                min_stock = alert.min_stock,
                "Low stock"
            );
        }

        Ok(recorded.detail)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
