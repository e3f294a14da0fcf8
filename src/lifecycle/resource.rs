//! The shared resource handle.
//!
//! # Responsibilities
//! - Share one resource instance with every in-flight request
//! - Release it exactly once
//! - Refuse use after release
//!
//! # Design Decisions
//! - Each use holds a read lease; release takes the write side, so it waits
//!   for outstanding leases instead of invalidating them mid-use
//! - Tokio's `RwLock` is fair: once release is waiting, new acquirers queue
//!   behind it and then observe the released state
//! - Leases are plain guards, dropped on every exit path including
//!   cancellation

use std::ops::Deref;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    #[error("{name} has been released")]
    Released { name: &'static str },

    #[error("{name} was already released")]
    AlreadyReleased { name: &'static str },

    #[error("failed to release {name}: {reason}")]
    ReleaseFailed { name: &'static str, reason: String },
}

/// Something with a one-shot asynchronous teardown.
pub trait Resource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn release(&self) -> BoxFuture<'_, Result<(), ResourceError>>;
}

/// Cloneable handle to the single shared resource.
#[derive(Debug)]
pub struct ResourceHandle<R> {
    resource: Arc<R>,
    released: Arc<RwLock<bool>>,
}

impl<R> Clone for ResourceHandle<R> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
            released: Arc::clone(&self.released),
        }
    }
}

impl<R: Resource> ResourceHandle<R> {
    pub fn new(resource: R) -> Self {
        Self {
            resource: Arc::new(resource),
            released: Arc::new(RwLock::new(false)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.resource.name()
    }

    /// Lease the resource for the lifetime of the returned guard.
    pub async fn acquire(&self) -> Result<ResourceGuard<R>, ResourceError> {
        let lease = Arc::clone(&self.released).read_owned().await;
        if *lease {
            return Err(ResourceError::Released { name: self.name() });
        }
        Ok(ResourceGuard {
            resource: Arc::clone(&self.resource),
            _lease: lease,
        })
    }

    /// Wait for outstanding leases, then release the resource.
    ///
    /// Only the first call reaches the resource; later calls fail with
    /// [`ResourceError::AlreadyReleased`]. A failed release still leaves the
    /// handle released.
    pub async fn release(&self) -> Result<(), ResourceError> {
        let mut released = self.released.write().await;
        if *released {
            return Err(ResourceError::AlreadyReleased { name: self.name() });
        }
        *released = true;
        tracing::info!(resource = self.name(), "Releasing shared resource");
        self.resource.release().await
    }

    /// `true` once release has started. Returns `false` while leases or the
    /// release itself hold the lock.
    pub fn is_released(&self) -> bool {
        self.released.try_read().map(|r| *r).unwrap_or(false)
    }
}

/// A live lease on the resource.
pub struct ResourceGuard<R> {
    resource: Arc<R>,
    _lease: OwnedRwLockReadGuard<bool>,
}

impl<R> Deref for ResourceGuard<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}
