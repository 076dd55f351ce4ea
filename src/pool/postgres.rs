//! Postgres-backed resource manager and process-wide pool lifecycle

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::error::{PoolError, PoolResult};
use crate::pool::{ManageResource, PoolConfig, ResourcePool};

/// Pool of raw Postgres connections
pub type PgPool = ResourcePool<PgManager>;

/// Connection lifecycle for `sqlx::PgConnection` resources
pub struct PgManager {
    options: PgConnectOptions,
}

impl PgManager {
    pub fn from_config(config: &DatabaseConfig) -> PoolResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| PoolError::CreationFailed(Box::new(e)))?
            .username(&config.username)
            .password(&config.password);
        Ok(Self { options })
    }
}

#[async_trait]
impl ManageResource for PgManager {
    type Resource = PgConnection;

    async fn create(&self) -> PoolResult<PgConnection> {
        self.options
            .connect()
            .await
            .map_err(|e| PoolError::CreationFailed(Box::new(e)))
    }

    async fn is_alive(&self, conn: &mut PgConnection) -> bool {
        conn.ping().await.is_ok()
    }

    async fn reset(&self, conn: &mut PgConnection) {
        // Outside a transaction this is a server notice, not an error
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            tracing::warn!("failed to roll back connection on release: {}", e);
        }
    }

    async fn close(&self, conn: PgConnection) {
        if let Err(e) = conn.close().await {
            tracing::error!("error closing connection: {}", e);
        }
    }
}

static POOL: OnceCell<Arc<PgPool>> = OnceCell::const_new();

/// Initialize the process-wide connection pool.
///
/// Idempotent and safe under a concurrent first-call race: exactly one pool
/// is ever constructed, and later calls return the same instance. The handle
/// is meant to be threaded through store constructors rather than fetched
/// from here at call sites.
pub async fn init(config: &DatabaseConfig) -> PoolResult<Arc<PgPool>> {
    POOL.get_or_try_init(|| async {
        let manager = PgManager::from_config(config)?;
        let pool = ResourcePool::new(
            manager,
            PoolConfig {
                initial_size: config.initial_pool_size,
                max_size: config.max_pool_size,
                acquire_timeout: config.acquire_timeout(),
            },
        )
        .await?;
        Ok(Arc::new(pool))
    })
    .await
    .cloned()
}

/// Shut the process-wide pool down, if it was initialized.
pub async fn shutdown() {
    if let Some(pool) = POOL.get() {
        pool.shutdown().await;
    }
}
