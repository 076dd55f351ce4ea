//! Repository layer for database operations

pub mod books;
pub mod orders;

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::StoreResult;
use crate::models::{Book, NewOrder, Order, OrderStatus};
use crate::pool::postgres::PgPool;

/// Access contract for book inventory.
///
/// `adjust_available_copies` is the only way the available-copy counter is
/// mutated; callers never write the field directly.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_book(&self, id: i64) -> StoreResult<Book>;

    /// Apply a signed delta to a book's available-copy counter. The counter
    /// stays within `0..=total_copies`; an adjustment that would leave it
    /// out of bounds (or targets a missing book) affects zero rows and fails
    /// with `StoreError::ZeroRowsAffected`.
    async fn adjust_available_copies(&self, book_id: i64, delta: i32) -> StoreResult<()>;
}

/// Access contract for orders.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StoreResult<Order>;

    /// Persist a new order and return it with its generated id.
    async fn save(&self, order: NewOrder) -> StoreResult<Order>;

    /// Persist an order mutation, conditional on the row still holding
    /// `expected_status`. A concurrent transition that already moved the
    /// order off `expected_status` makes this affect zero rows and fail
    /// with `StoreError::ZeroRowsAffected`.
    async fn update(&self, order: &Order, expected_status: OrderStatus) -> StoreResult<Order>;

    /// Latest PENDING or ISSUED order for this (user, book) pair, if any.
    async fn find_active_order(&self, user_id: i64, book_id: i64) -> StoreResult<Option<Order>>;

    async fn find_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>>;

    async fn find_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>>;
}

/// Main repository struct holding the connection pool and the stores
#[derive(Clone)]
pub struct Repository {
    pub pool: Arc<PgPool>,
    pub books: books::PgInventoryStore,
    pub orders: orders::PgOrderStore,
}

impl Repository {
    /// Create a new repository over the given connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            books: books::PgInventoryStore::new(pool.clone()),
            orders: orders::PgOrderStore::new(pool.clone()),
            pool,
        }
    }
}
