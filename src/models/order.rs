//! Order model and related enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderType
// ---------------------------------------------------------------------------

/// How the reader wants the book: taken home or read on site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Home,
    ReadingRoom,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Home => "HOME",
            OrderType::ReadingRoom => "READING_ROOM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HOME" => Some(OrderType::Home),
            "READING_ROOM" => Some(OrderType::ReadingRoom),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Order lifecycle status.
///
/// Transitions are monotonic along a fixed graph:
/// `PENDING -> ISSUED -> RETURNED` and `PENDING -> CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Issued,
    Returned,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Issued => "ISSUED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "ISSUED" => Some(OrderStatus::Issued),
            "RETURNED" => Some(OrderStatus::Returned),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Active orders count against the one-active-order-per-user-per-book rule.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Issued)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Order record: one user's request to borrow a book copy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub book_copy_id: Option<i64>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub librarian_id: Option<i64>,
    pub notes: Option<String>,
}

/// A new order before it has been persisted and given an id
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub book_id: i64,
    pub book_copy_id: Option<i64>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewOrder {
    /// A pending order created now, the only state new orders start in
    pub fn pending(user_id: i64, book_id: i64, order_type: OrderType) -> Self {
        Self {
            user_id,
            book_id,
            book_copy_id: None,
            order_type,
            status: OrderStatus::Pending,
            order_date: Utc::now(),
            notes: None,
        }
    }
}
