//! Libris lending core
//!
//! The resource-pooling and order-lifecycle core of a library lending
//! application: a bounded pool of exclusive database connections and the
//! state machine that moves orders through create, issue, return and cancel
//! while keeping the book inventory counter in bounds.
//!
//! The host application initializes the pool once at startup
//! (`pool::postgres::init`), wires `Repository` and `Services` from it, and
//! shuts the pool down on graceful exit.

pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{PoolError, ServiceError, StoreError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for the host process.
///
/// Respects `RUST_LOG` when set, otherwise falls back to the configured
/// level for this crate.
pub fn init_tracing(config: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("libris_core={}", config.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
