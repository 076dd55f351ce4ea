//! Data models for Libris

pub mod book;
pub mod order;

// Re-export commonly used types
pub use book::Book;
pub use order::{NewOrder, Order, OrderStatus, OrderType};
