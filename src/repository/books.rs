//! Books repository: the inventory side of the lending core

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::Row;

use crate::error::{StoreError, StoreResult};
use crate::models::Book;
use crate::pool::postgres::PgPool;
use crate::repository::InventoryStore;

#[derive(Clone)]
pub struct PgInventoryStore {
    pool: Arc<PgPool>,
}

impl PgInventoryStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn find_book_on(conn: &mut PgConnection, id: i64) -> StoreResult<Book> {
        let row = sqlx::query("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => map_book_row(&row),
            None => Err(StoreError::NotFound(format!("book {} not found", id))),
        }
    }

    async fn adjust_on(conn: &mut PgConnection, book_id: i64, delta: i32) -> StoreResult<()> {
        // The predicate keeps the counter within 0..=total_copies; an
        // out-of-bounds adjustment affects zero rows instead of corrupting
        // the inventory.
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + $1
            WHERE id = $2
              AND available_copies + $1 >= 0
              AND available_copies + $1 <= total_copies
            "#,
        )
        .bind(delta)
        .bind(book_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ZeroRowsAffected(format!(
                "adjusting available copies by {} for book {} affected no rows",
                delta, book_id
            )));
        }

        tracing::info!(book_id, delta, "available copies updated");
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn find_book(&self, id: i64) -> StoreResult<Book> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::find_book_on(&mut conn, id).await;
        self.pool.release(conn).await;
        result
    }

    async fn adjust_available_copies(&self, book_id: i64, delta: i32) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        let result = Self::adjust_on(&mut conn, book_id, delta).await;
        self.pool.release(conn).await;
        result
    }
}

fn map_book_row(row: &PgRow) -> StoreResult<Book> {
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        isbn: row.try_get("isbn")?,
        genre: row.try_get("genre")?,
        description: row.try_get("description")?,
        publication_year: row.try_get("publication_year")?,
        total_copies: row.try_get("total_copies")?,
        available_copies: row.try_get("available_copies")?,
    })
}
