//! # Domain Types
//!
//! Records persisted by stockroom-db and the hydrated read models returned
//! to callers.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │     User        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku            │   │  user_id (FK)   │   │  username       │       │
//! │  │  price_cents    │   │  subtotal/tax   │   │  role           │       │
//! │  │  stock_cached   │◄┐ │  total_cents    │   └─────────────────┘       │
//! │  │  min_stock      │ │ └────────┬────────┘                             │
//! │  └─────────────────┘ │          │ owns (cascade)                       │
//! │                      │ ┌────────▼────────┐   ┌─────────────────┐       │
//! │                      └─│    SaleItem     │◄──│  StockMovement  │       │
//! │                        │  quantity       │   │  IN / OUT       │       │
//! │                        │  unit_price     │   │  append-only    │       │
//! │                        │  discount_bps   │   └─────────────────┘       │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every record carries a UUID v4 `id`; products also carry a business `sku`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Category
// =============================================================================

/// A product category used for grouping in reports.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Category, when the product has one.
    pub category_id: Option<String>,

    /// Unit sale price in cents.
    pub price_cents: i64,

    /// Unit cost price in cents.
    pub cost_cents: i64,

    /// Cached stock level. `None` means stock is not tracked.
    ///
    /// Only ever changed together with a [`StockMovement`].
    pub stock_cached: Option<i64>,

    /// Minimum-stock threshold for low-stock alerts.
    pub min_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks if `quantity` can be sold from current stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        match self.stock_cached {
            Some(stock) => stock >= quantity,
            None => true,
        }
    }

    /// Tracked and at or below its minimum-stock threshold.
    pub fn is_low_stock(&self) -> bool {
        matches!(self.stock_cached, Some(stock) if stock <= self.min_stock)
    }
}

// =============================================================================
// Users
// =============================================================================

/// Role of a user.
///
/// `Admin` and `Manager` are elevated and may read everyone's sales.
/// `Cashier` is restricted to their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Cashier,
}

impl Role {
    /// Whether this role sees data beyond its own sales.
    #[inline]
    pub const fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

/// A user of the system (cashier, manager, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// The user who rang up the sale.
    pub user_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_included: bool,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale.
///
/// The unit price is captured at sale time and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in cents before discount (frozen).
    pub unit_price_cents: i64,
    /// Discount in basis points (0..=10000).
    pub discount_bps: u32,
    /// Discounted unit price × quantity.
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement Ledger
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
        }
    }
}

/// One append-only entry of the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Always positive; direction comes from `movement_type`.
    pub quantity: i64,
    /// The sale line that caused an `OUT` movement.
    pub sale_item_id: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Activity Log
// =============================================================================

/// A row of the activity (audit) log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ActivityLog {
    pub id: String,
    pub user_id: Option<String>,
    /// Machine-readable action, e.g. `SALE_CREATED`.
    pub action: String,
    pub description: String,
    /// JSON document with action-specific details.
    pub metadata: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Hydrated Read Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSummary {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: Option<CategorySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

/// A sale line with its product resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemDetail {
    pub item: SaleItem,
    pub product: ProductSummary,
}

/// A sale with its items, products and acting user resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetail {
    pub sale: Sale,
    pub user: UserSummary,
    pub items: Vec<SaleItemDetail>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: Option<i64>, min_stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            sku: "COKE-330".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            category_id: None,
            price_cents: 1000,
            cost_cents: 600,
            stock_cached: stock,
            min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_can_sell() {
        assert!(product(Some(10), 2).can_sell(10));
        assert!(!product(Some(7), 2).can_sell(8));
        assert!(product(None, 0).can_sell(1_000));
    }

    #[test]
    fn test_low_stock() {
        assert!(product(Some(2), 2).is_low_stock());
        assert!(!product(Some(3), 2).is_low_stock());
        assert!(!product(None, 2).is_low_stock());
    }

    #[test]
    fn test_role_elevation() {
        assert!(Role::Admin.is_elevated());
        assert!(Role::Manager.is_elevated());
        assert!(!Role::Cashier.is_elevated());
    }
}
