//! Error types for the Libris lending core

use thiserror::Error;

use crate::models::order::OrderStatus;

/// Errors raised by the resource pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("resource pool exhausted: no resource became available within the acquire timeout")]
    Exhausted,

    #[error("resource pool is shut down")]
    Shutdown,

    #[error("failed to create pooled resource: {0}")]
    CreationFailed(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// An update expected to affect exactly one row affected zero. This is a
    /// data-integrity failure, not a soft "not found".
    #[error("no rows affected: {0}")]
    ZeroRowsAffected(String),

    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Errors raised by the order lifecycle.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no copies available for book: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("order {order_id} is in status {actual}, expected {expected}")]
    InvalidState {
        order_id: i64,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("user {user_id} is not authorized to modify order {order_id}")]
    Unauthorized { user_id: i64, order_id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for lifecycle operations
pub type ServiceResult<T> = Result<T, ServiceError>;
