//! Bounded pool of exclusive, reusable resources.
//!
//! The pool hands out resources on demand, reusing idle ones and lazily
//! creating new ones up to `max_size`. Capacity is gated by a semaphore, so
//! a resource is only ever created while the caller holds a capacity permit:
//! `idle + leased` can never exceed `max_size`. `acquire` waits at most
//! `acquire_timeout` for a permit before failing with `PoolError::Exhausted`.
//!
//! Resources are validated on checkout (invalid ones are closed and replaced)
//! and reset on checkin, so a resource never re-enters the pool holding
//! uncommitted state from a failed caller.

pub mod postgres;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{PoolError, PoolResult};

/// Creation, validation and teardown of one kind of pooled resource.
///
/// The pool itself is storage-agnostic; the manager supplies the actual
/// resource lifecycle (a database connection in production, a fake in tests).
#[async_trait]
pub trait ManageResource: Send + Sync {
    type Resource: Send;

    /// Establish a fresh resource.
    async fn create(&self) -> PoolResult<Self::Resource>;

    /// Whether the resource can still be handed to a caller.
    async fn is_alive(&self, resource: &mut Self::Resource) -> bool;

    /// Clear any caller-visible state (e.g. roll back an open transaction)
    /// before the resource goes back to the idle queue.
    async fn reset(&self, resource: &mut Self::Resource);

    /// Permanently close the resource. Errors are logged, not propagated.
    async fn close(&self, resource: Self::Resource);
}

/// Pool sizing and timing parameters
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub initial_size: usize,
    pub max_size: usize,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 5,
            max_size: 20,
            acquire_timeout: Duration::from_secs(2),
        }
    }
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub leased: usize,
    pub max_size: usize,
}

struct PoolState<R> {
    idle: VecDeque<R>,
    leased: usize,
    shutdown: bool,
}

/// Bounded, thread-safe pool of exclusive resources.
///
/// Callers own the resource between `acquire` and `release` and must release
/// it unconditionally, on error paths included.
pub struct ResourcePool<M: ManageResource> {
    manager: M,
    config: PoolConfig,
    capacity: Semaphore,
    state: Mutex<PoolState<M::Resource>>,
}

impl<M: ManageResource> ResourcePool<M> {
    /// Create a pool and eagerly establish `initial_size` resources.
    pub async fn new(manager: M, config: PoolConfig) -> PoolResult<Self> {
        // Contract is max_size >= initial_size >= 0; normalize rather than fail.
        let mut config = config;
        config.max_size = config.max_size.max(config.initial_size).max(1);

        let mut idle = VecDeque::with_capacity(config.max_size);
        for _ in 0..config.initial_size {
            idle.push_back(manager.create().await?);
        }

        tracing::info!(
            initial_size = config.initial_size,
            max_size = config.max_size,
            "resource pool initialized"
        );

        Ok(Self {
            manager,
            capacity: Semaphore::new(config.max_size),
            state: Mutex::new(PoolState {
                idle,
                leased: 0,
                shutdown: false,
            }),
            config,
        })
    }

    /// Take exclusive ownership of a resource.
    ///
    /// Reuses an idle resource when one is available, creates a new one when
    /// under capacity, and otherwise waits up to the configured timeout for a
    /// release. Never blocks indefinitely.
    pub async fn acquire(&self) -> PoolResult<M::Resource> {
        if self.lock_state().shutdown {
            return Err(PoolError::Shutdown);
        }

        let permit = match timeout(self.config.acquire_timeout, self.capacity.acquire()).await {
            Err(_) => return Err(PoolError::Exhausted),
            // Semaphore is closed by shutdown(), failing waiters fast
            Ok(Err(_)) => return Err(PoolError::Shutdown),
            Ok(Ok(permit)) => permit,
        };

        let candidate = {
            let mut state = self.lock_state();
            if state.shutdown {
                return Err(PoolError::Shutdown);
            }
            state.idle.pop_front()
        };

        let resource = match candidate {
            Some(mut resource) => {
                if self.manager.is_alive(&mut resource).await {
                    resource
                } else {
                    // Stale checkout: discard and replace within the same permit
                    tracing::warn!("discarding invalid pooled resource, creating replacement");
                    self.manager.close(resource).await;
                    self.manager.create().await?
                }
            }
            None => self.manager.create().await?,
        };

        // The permit stays checked out for the lifetime of the lease and is
        // handed back by release().
        permit.forget();
        self.lock_state().leased += 1;
        Ok(resource)
    }

    /// Return a resource to the pool.
    ///
    /// The resource is reset first, so it never re-enters the idle queue with
    /// uncommitted caller state. Invalid resources, and any resource returned
    /// after shutdown, are closed instead of re-queued.
    pub async fn release(&self, mut resource: M::Resource) {
        self.manager.reset(&mut resource).await;
        let alive = self.manager.is_alive(&mut resource).await;

        let discard = {
            let mut state = self.lock_state();
            state.leased = state.leased.saturating_sub(1);
            if alive && !state.shutdown {
                state.idle.push_back(resource);
                None
            } else {
                Some(resource)
            }
        };

        if let Some(resource) = discard {
            self.manager.close(resource).await;
        }
        self.capacity.add_permits(1);
    }

    /// Shut the pool down.
    ///
    /// Idempotent. Closes every idle resource and fails all pending and
    /// future `acquire` calls with `PoolError::Shutdown`. Leased resources
    /// are closed as their holders release them.
    pub async fn shutdown(&self) {
        let drained: Vec<M::Resource> = {
            let mut state = self.lock_state();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.idle.drain(..).collect()
        };

        self.capacity.close();
        for resource in drained {
            self.manager.close(resource).await;
        }
        tracing::info!("resource pool shutdown complete");
    }

    /// Current pool counters
    pub fn status(&self) -> PoolStatus {
        let state = self.lock_state();
        PoolStatus {
            idle: state.idle.len(),
            leased: state.leased,
            max_size: self.config.max_size,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState<M::Resource>> {
        // The lock is never held across an await point, so poisoning only
        // happens if a panic already tore down an invariant.
        self.state.lock().expect("pool state lock poisoned")
    }
}
