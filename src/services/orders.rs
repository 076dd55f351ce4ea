//! Order lifecycle service
//!
//! The state machine governing an order's progression and its coupling to
//! the book inventory:
//!
//! ```text
//! PENDING --issue--> ISSUED --return--> RETURNED
//!    \--cancel--> CANCELLED
//! ```
//!
//! Issue takes one copy out of the inventory, return puts it back. Guard
//! violations come back as typed errors; nothing is retried here.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::models::order::{NewOrder, Order, OrderStatus, OrderType};
use crate::repository::{InventoryStore, OrderStore};

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    inventory: Arc<dyn InventoryStore>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, inventory: Arc<dyn InventoryStore>) -> Self {
        Self { orders, inventory }
    }

    /// Create a PENDING order for a (user, book) pair.
    ///
    /// Fails with `NotFound` if the book does not exist, `Unavailable` if it
    /// has no free copies, and `Conflict` if the user already has an active
    /// order for it. No store write happens on any guard failure.
    pub async fn create(
        &self,
        user_id: i64,
        book_id: i64,
        order_type: OrderType,
    ) -> ServiceResult<Order> {
        let book = match self.inventory.find_book(book_id).await {
            Ok(book) => book,
            Err(StoreError::NotFound(msg)) => return Err(ServiceError::NotFound(msg)),
            Err(e) => return Err(e.into()),
        };

        if book.available_copies <= 0 {
            return Err(ServiceError::Unavailable(book.title));
        }

        if self.orders.find_active_order(user_id, book_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "user {} already has an active order for book {}",
                user_id, book_id
            )));
        }

        tracing::info!(user_id, book_id, "creating order");
        Ok(self
            .orders
            .save(NewOrder::pending(user_id, book_id, order_type))
            .await?)
    }

    /// Issue a PENDING order: hand the book to the reader.
    ///
    /// Decrements the book's available copies and stamps issue date, due date
    /// (now + `lending_days`) and the issuing librarian.
    pub async fn issue(
        &self,
        order_id: i64,
        librarian_id: i64,
        lending_days: i64,
    ) -> ServiceResult<Order> {
        let mut order = self.load_order(order_id).await?;
        self.require_status(&order, OrderStatus::Pending)?;

        // Take the copy first; a bounds-rejected decrement means another
        // borrower got the last one.
        match self.inventory.adjust_available_copies(order.book_id, -1).await {
            Ok(()) => {}
            Err(StoreError::ZeroRowsAffected(_)) => {
                return Err(ServiceError::Unavailable(format!("book {}", order.book_id)));
            }
            Err(e) => return Err(e.into()),
        }

        let now = Utc::now();
        order.status = OrderStatus::Issued;
        order.librarian_id = Some(librarian_id);
        order.issue_date = Some(now);
        order.due_date = Some(now + Duration::days(lending_days));

        match self.orders.update(&order, OrderStatus::Pending).await {
            Ok(updated) => {
                tracing::info!(order_id, librarian_id, "order issued");
                Ok(updated)
            }
            Err(StoreError::ZeroRowsAffected(_)) => {
                // A concurrent transition won the race for this order; put
                // the copy back before reporting the stale read.
                if let Err(e) = self.inventory.adjust_available_copies(order.book_id, 1).await {
                    tracing::error!(
                        book_id = order.book_id,
                        "failed to restore available copies after issue race: {}",
                        e
                    );
                }
                let current = self.load_order(order_id).await?;
                Err(ServiceError::InvalidState {
                    order_id,
                    expected: OrderStatus::Pending,
                    actual: current.status,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return an ISSUED order: the reader brings the book back.
    ///
    /// The order moves to RETURNED first, then the copy goes back into the
    /// inventory, so a double return can never over-increment the counter.
    pub async fn return_order(&self, order_id: i64, librarian_id: i64) -> ServiceResult<Order> {
        let mut order = self.load_order(order_id).await?;
        self.require_status(&order, OrderStatus::Issued)?;

        order.status = OrderStatus::Returned;
        order.return_date = Some(Utc::now());
        order.librarian_id = Some(librarian_id);

        let updated = match self.orders.update(&order, OrderStatus::Issued).await {
            Ok(updated) => updated,
            Err(StoreError::ZeroRowsAffected(_)) => {
                let current = self.load_order(order_id).await?;
                return Err(ServiceError::InvalidState {
                    order_id,
                    expected: OrderStatus::Issued,
                    actual: current.status,
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.inventory.adjust_available_copies(order.book_id, 1).await?;

        tracing::info!(order_id, librarian_id, "order returned");
        Ok(updated)
    }

    /// Cancel a PENDING order. Only the owning user may cancel.
    pub async fn cancel(&self, order_id: i64, user_id: i64) -> ServiceResult<Order> {
        let mut order = self.load_order(order_id).await?;

        if order.user_id != user_id {
            return Err(ServiceError::Unauthorized { user_id, order_id });
        }
        self.require_status(&order, OrderStatus::Pending)?;

        order.status = OrderStatus::Cancelled;

        match self.orders.update(&order, OrderStatus::Pending).await {
            Ok(updated) => {
                tracing::info!(order_id, user_id, "order cancelled");
                Ok(updated)
            }
            Err(StoreError::ZeroRowsAffected(_)) => {
                let current = self.load_order(order_id).await?;
                Err(ServiceError::InvalidState {
                    order_id,
                    expected: OrderStatus::Pending,
                    actual: current.status,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, order_id: i64) -> ServiceResult<Order> {
        self.load_order(order_id).await
    }

    pub async fn find_by_user(&self, user_id: i64) -> ServiceResult<Vec<Order>> {
        Ok(self.orders.find_by_user(user_id).await?)
    }

    pub async fn find_by_status(&self, status: OrderStatus) -> ServiceResult<Vec<Order>> {
        Ok(self.orders.find_by_status(status).await?)
    }

    pub async fn has_active_order(&self, user_id: i64, book_id: i64) -> ServiceResult<bool> {
        Ok(self.orders.find_active_order(user_id, book_id).await?.is_some())
    }

    async fn load_order(&self, order_id: i64) -> ServiceResult<Order> {
        match self.orders.find_by_id(order_id).await {
            Ok(order) => Ok(order),
            Err(StoreError::NotFound(msg)) => Err(ServiceError::NotFound(msg)),
            Err(e) => Err(e.into()),
        }
    }

    fn require_status(&self, order: &Order, expected: OrderStatus) -> ServiceResult<()> {
        if order.status != expected {
            return Err(ServiceError::InvalidState {
                order_id: order.id,
                expected,
                actual: order.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::Book;
    use crate::repository::{MockInventoryStore, MockOrderStore};
    use chrono::{DateTime, Utc};

    fn book(id: i64, available: i32) -> Book {
        Book {
            id,
            title: "Test Book".to_string(),
            author: "Test Author".to_string(),
            isbn: None,
            genre: None,
            description: None,
            publication_year: None,
            total_copies: 3,
            available_copies: available,
        }
    }

    fn order(id: i64, user_id: i64, book_id: i64, status: OrderStatus) -> Order {
        Order {
            id,
            user_id,
            book_id,
            book_copy_id: None,
            order_type: OrderType::Home,
            status,
            order_date: Utc::now(),
            issue_date: None,
            due_date: None,
            return_date: None,
            librarian_id: None,
            notes: None,
        }
    }

    fn service(orders: MockOrderStore, inventory: MockInventoryStore) -> OrderService {
        OrderService::new(Arc::new(orders), Arc::new(inventory))
    }

    #[tokio::test]
    async fn create_persists_pending_order() {
        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_find_book()
            .withf(|&id| id == 1)
            .returning(|id| Ok(book(id, 3)));

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_active_order()
            .returning(|_, _| Ok(None));
        orders.expect_save().times(1).returning(|new| {
            Ok(Order {
                id: 10,
                user_id: new.user_id,
                book_id: new.book_id,
                book_copy_id: new.book_copy_id,
                order_type: new.order_type,
                status: new.status,
                order_date: new.order_date,
                issue_date: None,
                due_date: None,
                return_date: None,
                librarian_id: None,
                notes: new.notes,
            })
        });

        let result = service(orders, inventory)
            .create(1, 1, OrderType::Home)
            .await
            .unwrap();

        assert_eq!(result.id, 10);
        assert_eq!(result.user_id, 1);
        assert_eq!(result.book_id, 1);
        assert_eq!(result.status, OrderStatus::Pending);
        assert_eq!(result.order_type, OrderType::Home);
    }

    #[tokio::test]
    async fn create_fails_when_book_missing() {
        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_find_book()
            .returning(|id| Err(StoreError::NotFound(format!("book {} not found", id))));

        // No expectations on the order store: any call would panic
        let orders = MockOrderStore::new();

        let err = service(orders, inventory)
            .create(1, 999, OrderType::Home)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_fails_when_no_copies_available() {
        let mut inventory = MockInventoryStore::new();
        inventory.expect_find_book().returning(|id| Ok(book(id, 0)));

        let orders = MockOrderStore::new();

        let err = service(orders, inventory)
            .create(1, 1, OrderType::Home)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn create_fails_when_user_has_active_order() {
        let mut inventory = MockInventoryStore::new();
        inventory.expect_find_book().returning(|id| Ok(book(id, 3)));

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_active_order()
            .returning(|user_id, book_id| Ok(Some(order(5, user_id, book_id, OrderStatus::Pending))));

        let err = service(orders, inventory)
            .create(1, 1, OrderType::ReadingRoom)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn issue_decrements_inventory_and_sets_dates() {
        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_adjust_available_copies()
            .withf(|&book_id, &delta| book_id == 2 && delta == -1)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Pending)));
        orders
            .expect_update()
            .withf(|order, expected| {
                order.status == OrderStatus::Issued && *expected == OrderStatus::Pending
            })
            .times(1)
            .returning(|order, _| Ok(order.clone()));

        let result = service(orders, inventory).issue(7, 42, 14).await.unwrap();

        assert_eq!(result.status, OrderStatus::Issued);
        assert_eq!(result.librarian_id, Some(42));
        let issue_date: DateTime<Utc> = result.issue_date.unwrap();
        let due_date: DateTime<Utc> = result.due_date.unwrap();
        assert_eq!(due_date - issue_date, Duration::days(14));
    }

    #[tokio::test]
    async fn issue_fails_when_order_not_pending() {
        // The inventory must not be touched
        let inventory = MockInventoryStore::new();

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Issued)));

        let err = service(orders, inventory).issue(7, 42, 14).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Issued,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn issue_fails_when_order_missing() {
        let inventory = MockInventoryStore::new();
        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Err(StoreError::NotFound(format!("order {} not found", id))));

        let err = service(orders, inventory).issue(404, 42, 14).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn issue_maps_bounds_rejection_to_unavailable() {
        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_adjust_available_copies()
            .returning(|book_id, delta| {
                Err(StoreError::ZeroRowsAffected(format!(
                    "adjusting available copies by {} for book {} affected no rows",
                    delta, book_id
                )))
            });

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Pending)));

        let err = service(orders, inventory).issue(7, 42, 14).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn issue_compensates_when_conditional_update_loses_race() {
        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_adjust_available_copies()
            .withf(|_, &delta| delta == -1)
            .times(1)
            .returning(|_, _| Ok(()));
        // The decrement must be undone when the status update misses
        inventory
            .expect_adjust_available_copies()
            .withf(|_, &delta| delta == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut orders = MockOrderStore::new();
        let mut loads = 0;
        orders.expect_find_by_id().returning(move |id| {
            loads += 1;
            if loads == 1 {
                Ok(order(id, 1, 2, OrderStatus::Pending))
            } else {
                // What the racing transition left behind
                Ok(order(id, 1, 2, OrderStatus::Cancelled))
            }
        });
        orders.expect_update().returning(|order, expected| {
            Err(StoreError::ZeroRowsAffected(format!(
                "updating order {} affected no rows (expected status {})",
                order.id, expected
            )))
        });

        let err = service(orders, inventory).issue(7, 42, 14).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                actual: OrderStatus::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn return_increments_inventory_and_sets_return_date() {
        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_adjust_available_copies()
            .withf(|&book_id, &delta| book_id == 2 && delta == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Issued)));
        orders
            .expect_update()
            .withf(|order, expected| {
                order.status == OrderStatus::Returned && *expected == OrderStatus::Issued
            })
            .times(1)
            .returning(|order, _| Ok(order.clone()));

        let result = service(orders, inventory).return_order(7, 42).await.unwrap();

        assert_eq!(result.status, OrderStatus::Returned);
        assert!(result.return_date.is_some());
        assert_eq!(result.librarian_id, Some(42));
    }

    #[tokio::test]
    async fn return_fails_when_order_not_issued() {
        let inventory = MockInventoryStore::new();

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Returned)));

        let err = service(orders, inventory).return_order(7, 42).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                expected: OrderStatus::Issued,
                actual: OrderStatus::Returned,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancel_requires_owner() {
        let inventory = MockInventoryStore::new();

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Pending)));

        let err = service(orders, inventory).cancel(7, 99).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unauthorized {
                user_id: 99,
                order_id: 7
            }
        ));
    }

    #[tokio::test]
    async fn cancel_requires_pending_status() {
        let inventory = MockInventoryStore::new();

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Issued)));

        let err = service(orders, inventory).cancel(7, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidState {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Issued,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancel_updates_status() {
        let inventory = MockInventoryStore::new();

        let mut orders = MockOrderStore::new();
        orders
            .expect_find_by_id()
            .returning(|id| Ok(order(id, 1, 2, OrderStatus::Pending)));
        orders
            .expect_update()
            .withf(|order, expected| {
                order.status == OrderStatus::Cancelled && *expected == OrderStatus::Pending
            })
            .times(1)
            .returning(|order, _| Ok(order.clone()));

        let result = service(orders, inventory).cancel(7, 1).await.unwrap();
        assert_eq!(result.status, OrderStatus::Cancelled);
    }
}
