//! Business logic services

pub mod orders;

use std::sync::Arc;

use crate::repository::Repository;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub orders: orders::OrderService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: &Repository) -> Self {
        Self {
            orders: orders::OrderService::new(
                Arc::new(repository.orders.clone()),
                Arc::new(repository.books.clone()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::config::DatabaseConfig;
    use crate::pool::postgres::PgManager;
    use crate::pool::{PoolConfig, ResourcePool};

    #[tokio::test]
    async fn wires_services_from_a_pool() {
        let config = DatabaseConfig::default();
        let manager = PgManager::from_config(&config).unwrap();
        // No eager connections, so wiring needs no running database
        let pool = ResourcePool::new(
            manager,
            PoolConfig {
                initial_size: 0,
                max_size: 4,
                acquire_timeout: Duration::from_millis(100),
            },
        )
        .await
        .unwrap();

        let repository = Repository::new(Arc::new(pool));
        let services = Services::new(&repository);

        // There is no database behind this pool; the call must surface an
        // error instead of hanging
        assert!(services.orders.find_by_id(1).await.is_err());
    }
}
