//! Orders repository for database operations

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Row};

use crate::error::{StoreError, StoreResult};
use crate::models::order::{NewOrder, Order, OrderStatus, OrderType};
use crate::pool::postgres::PgPool;
use crate::repository::OrderStore;

#[derive(Clone)]
pub struct PgOrderStore {
    pool: Arc<PgPool>,
}

impl PgOrderStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn find_by_id_on(conn: &mut PgConnection, id: i64) -> StoreResult<Order> {
        let row = sqlx::query("SELECT * FROM book_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => map_order_row(&row),
            None => Err(StoreError::NotFound(format!("order {} not found", id))),
        }
    }

    async fn save_on(conn: &mut PgConnection, order: NewOrder) -> StoreResult<Order> {
        let mut tx = conn.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO book_orders (user_id, book_id, book_copy_id, order_type, status, order_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(order.user_id)
        .bind(order.book_id)
        .bind(order.book_copy_id)
        .bind(order.order_type.as_str())
        .bind(order.status.as_str())
        .bind(order.order_date)
        .bind(&order.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(order_id = id, "order saved");

        Ok(Order {
            id,
            user_id: order.user_id,
            book_id: order.book_id,
            book_copy_id: order.book_copy_id,
            order_type: order.order_type,
            status: order.status,
            order_date: order.order_date,
            issue_date: None,
            due_date: None,
            return_date: None,
            librarian_id: None,
            notes: order.notes,
        })
    }

    async fn update_on(
        conn: &mut PgConnection,
        order: &Order,
        expected_status: OrderStatus,
    ) -> StoreResult<Order> {
        let mut tx = conn.begin().await?;

        // Conditional update: only lands if the persisted status still
        // matches what the caller read, so two racing transitions on the
        // same order cannot both succeed.
        let result = sqlx::query(
            r#"
            UPDATE book_orders
            SET status = $1, issue_date = $2, due_date = $3, return_date = $4,
                librarian_id = $5, notes = $6
            WHERE id = $7 AND status = $8
            "#,
        )
        .bind(order.status.as_str())
        .bind(order.issue_date)
        .bind(order.due_date)
        .bind(order.return_date)
        .bind(order.librarian_id)
        .bind(&order.notes)
        .bind(order.id)
        .bind(expected_status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ZeroRowsAffected(format!(
                "updating order {} affected no rows (expected status {})",
                order.id, expected_status
            )));
        }

        tx.commit().await?;
        tracing::info!(order_id = order.id, status = %order.status, "order updated");
        Ok(order.clone())
    }

    async fn find_active_on(
        conn: &mut PgConnection,
        user_id: i64,
        book_id: i64,
    ) -> StoreResult<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM book_orders
            WHERE user_id = $1 AND book_id = $2 AND status IN ('PENDING', 'ISSUED')
            ORDER BY order_date DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(map_order_row).transpose()
    }

    async fn find_by_user_on(conn: &mut PgConnection, user_id: i64) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM book_orders WHERE user_id = $1 ORDER BY order_date DESC")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(map_order_row).collect()
    }

    async fn find_by_status_on(
        conn: &mut PgConnection,
        status: OrderStatus,
    ) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM book_orders WHERE status = $1 ORDER BY order_date DESC")
            .bind(status.as_str())
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(map_order_row).collect()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_id(&self, id: i64) -> StoreResult<Order> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::find_by_id_on(&mut conn, id).await;
        self.pool.release(conn).await;
        result
    }

    async fn save(&self, order: NewOrder) -> StoreResult<Order> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::save_on(&mut conn, order).await;
        // release() rolls the connection back if the transaction never
        // committed
        self.pool.release(conn).await;
        result
    }

    async fn update(&self, order: &Order, expected_status: OrderStatus) -> StoreResult<Order> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::update_on(&mut conn, order, expected_status).await;
        self.pool.release(conn).await;
        result
    }

    async fn find_active_order(&self, user_id: i64, book_id: i64) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::find_active_on(&mut conn, user_id, book_id).await;
        self.pool.release(conn).await;
        result
    }

    async fn find_by_user(&self, user_id: i64) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::find_by_user_on(&mut conn, user_id).await;
        self.pool.release(conn).await;
        result
    }

    async fn find_by_status(&self, status: OrderStatus) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::find_by_status_on(&mut conn, status).await;
        self.pool.release(conn).await;
        result
    }
}

fn map_order_row(row: &PgRow) -> StoreResult<Order> {
    let order_type: String = row.try_get("order_type")?;
    let order_type = OrderType::parse(&order_type).ok_or_else(|| {
        StoreError::Unavailable(sqlx::Error::Decode(
            format!("unknown order type: {}", order_type).into(),
        ))
    })?;

    let status: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status).ok_or_else(|| {
        StoreError::Unavailable(sqlx::Error::Decode(
            format!("unknown order status: {}", status).into(),
        ))
    })?;

    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        book_copy_id: row.try_get("book_copy_id")?,
        order_type,
        status,
        order_date: row.try_get("order_date")?,
        issue_date: row.try_get("issue_date")?,
        due_date: row.try_get("due_date")?,
        return_date: row.try_get("return_date")?,
        librarian_id: row.try_get("librarian_id")?,
        notes: row.try_get("notes")?,
    })
}
