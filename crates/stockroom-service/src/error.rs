//! # Service Error Type
//!
//! The error taxonomy callers see. Database and core errors are folded into
//! five kinds; anything that is not the caller's fault becomes `Internal`
//! with the detail logged and stripped.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ValidationError ──┐                                                    │
//! │                    ▼                                                    │
//! │  CoreError ───────► ServiceError ───► HTTP layer / CLI                 │
//! │                    ▲   │                                                │
//! │  DbError ──────────┘   ├─ Validation          (400)                     │
//! │    QueryFailed ...     ├─ NotFound            (404)                     │
//! │    (logged, hidden)    ├─ InsufficientStock   (409)                     │
//! │                        ├─ Unauthorized        (403)                     │
//! │                        └─ Internal            (500)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! { "code": "INSUFFICIENT_STOCK",
//!   "detail": { "product_id": "…", "sku": "COKE-330", "available": 7, "requested": 8 } }
//! ```

use serde::Serialize;
use stockroom_core::{CoreError, ValidationError};
use stockroom_db::DbError;
use thiserror::Error;

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceError {
    /// Request rejected before any write.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A sale line asked for more than the product has in stock.
    #[error("Insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: String,
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Storage failure. The message never carries the underlying cause.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        ServiceError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION",
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ServiceError::not_found("Product", &id),
            CoreError::UserNotFound(id) => ServiceError::not_found("User", &id),
            CoreError::SaleNotFound(id) => ServiceError::not_found("Sale", &id),
            CoreError::InsufficientStock {
                product_id,
                sku,
                available,
                requested,
            } => ServiceError::InsufficientStock {
                product_id,
                sku,
                available,
                requested,
            },
            CoreError::Unauthorized(reason) => ServiceError::Unauthorized(reason),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(e) => e.into(),
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                ServiceError::Validation(format!("{field} '{value}' already exists"))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ServiceError::Validation("Invalid reference".to_string())
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ServiceError::Internal("Database unavailable".to_string())
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ServiceError::Internal("Database unavailable".to_string())
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ServiceError::Internal("Database operation failed".to_string())
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ServiceError::Internal("Database busy".to_string())
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ServiceError::Internal("Database operation failed".to_string())
            }
        }
    }
}
