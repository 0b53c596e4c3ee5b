//! # Repository Module
//!
//! Database repository implementations for Stockroom.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Service                                                               │
//! │       │                                                                 │
//! │       │  db.sales().record_sale(&draft)                                │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── record_sale(&self, draft)     ← the one multi-table transaction   │
//! │  ├── get_detail(&self, id)                                             │
//! │  ├── list_details(&self, query)                                        │
//! │  └── tally_since / tally_by_user                                       │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Each repository holds a clone of the pool; they are cheap to create.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`category::CategoryRepository`] - Product categories
//! - [`product::ProductRepository`] - Products, stock receipt, low-stock listing
//! - [`user::UserRepository`] - Users and roles
//! - [`sale::SaleRepository`] - The sale transaction and sale read models
//! - [`movement::MovementRepository`] - The stock movement ledger
//! - [`activity_log::ActivityLogRepository`] - Audit trail

use uuid::Uuid;

pub mod activity_log;
pub mod category;
pub mod movement;
pub mod product;
pub mod sale;
pub mod user;

/// Generates a new record ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
