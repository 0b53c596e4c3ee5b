//! # stockroom-service: Sale Engine and Reporting
//!
//! The layer an HTTP handler (or the `stockroom` binary) talks to. Each
//! service receives the [`Database`](stockroom_db::Database) and, where it
//! writes, an [`AuditSink`](audit::AuditSink); nothing here holds global
//! state.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_sale                                      │
//! │                                                                         │
//! │  CreateSaleRequest                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validation (core) ──── ServiceError::Validation                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pricing + tax (core)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRepository::record_sale (db, one transaction)                      │
//! │       │          └──── NotFound / InsufficientStock (rolled back)      │
//! │       ▼                                                                 │
//! │  AuditSink::record ───► mpsc queue ───► worker ───► activity_logs      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleDetail                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - Sale creation
//! - [`reports`] - Sale listing, daily summaries, dashboard stats
//! - [`inventory`] - Stock receiving and ledger reconciliation
//! - [`audit`] - Fire-and-forget activity logging
//! - [`config`] - Environment configuration
//! - [`error`] - Caller-facing error taxonomy

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod reports;

pub use audit::{AuditDispatcher, AuditEntry, AuditSink, AuditWorkerHandle};
pub use config::{ConfigError, ServiceConfig};
pub use engine::{CreateSaleRequest, SaleEngine, SaleLine, TaxDefaults};
pub use error::{ServiceError, ServiceResult};
pub use inventory::{InventoryService, StockReconciliation};
pub use reports::{ReportService, SalesFilter};
