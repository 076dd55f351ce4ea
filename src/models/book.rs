//! Book model

use serde::{Deserialize, Serialize};

/// Book record from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub publication_year: Option<i32>,
    pub total_copies: i32,
    /// Copies not currently on loan. Bounded: `0 <= available_copies <= total_copies`.
    /// Mutated only through `InventoryStore::adjust_available_copies`.
    pub available_copies: i32,
}
