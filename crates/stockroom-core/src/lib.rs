//! # stockroom-core: Pure Business Logic for Stockroom
//!
//! This crate holds the arithmetic and rules behind every sale: money,
//! tax, line pricing, validation and report aggregation. It never touches
//! the database, the network or the clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer (outside this workspace)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         stockroom-service (engine, reports, audit)              │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼────────────────────┐  │
//! │  │  ★ stockroom-core ★         │  │  stockroom-db                   │  │
//! │  │  money · tax · pricing      │◄─│  SQLite, migrations,            │  │
//! │  │  types · validation         │  │  repositories, transactions     │  │
//! │  │  summary                    │  │                                 │  │
//! │  └─────────────────────────────┘  └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money and TaxRate with integer arithmetic (no floating point!)
//! - [`tax`] - Inclusive / exclusive tax calculator
//! - [`pricing`] - Discounted line totals and sale totals
//! - [`types`] - Domain records (Product, Sale, StockMovement, User, ...)
//! - [`summary`] - Daily summaries and sales tallies
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockroom_core::money::{Money, TaxRate};
//! use stockroom_core::tax::compute_tax;
//!
//! // 3 × 10.00 at 19% on top
//! let breakdown = compute_tax(Money::from_cents(3000), false, TaxRate::from_bps(1900)).unwrap();
//! assert_eq!(breakdown.tax.cents(), 570);
//! assert_eq!(breakdown.total.cents(), 3570);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod summary;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use tax::TaxBreakdown;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines accepted in a single sale.
///
/// ## Business Reason
/// Keeps one sale inside one short write transaction.
pub const MAX_SALE_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Basis points in 100%.
pub const BPS_PER_UNIT: u32 = 10_000;

/// Number of entries kept in each "top" list of a daily summary.
pub const TOP_ENTRIES: usize = 5;
