//! Lock broker shared by every storage backend.
//!
//! Backends take [`Broker::lock`] around create/delete and [`Broker::rlock`]
//! around reads. The returned guard releases the lock when dropped, so every
//! exit path, error paths included, unlocks.

use futures::future::BoxFuture;
use tokio::sync::RwLock;

/// Held lock. Dropping it releases the lock.
pub struct BrokerGuard<'a> {
    _held: Box<dyn Send + Sync + 'a>,
}

impl<'a> BrokerGuard<'a> {
    pub fn new(held: impl Send + Sync + 'a) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

pub trait Broker: Send + Sync {
    /// Acquire the exclusive lock.
    fn lock(&self) -> BoxFuture<'_, BrokerGuard<'_>>;

    /// Acquire a shared lock.
    fn rlock(&self) -> BoxFuture<'_, BrokerGuard<'_>>;

    fn kind(&self) -> &'static str;
}

pub const IN_MEMORY_BROKER_KIND: &str = "inmemory";

/// Process-local broker backed by one read-write lock.
///
/// It coordinates tasks inside a single process only. Two processes sharing
/// a durable backend through this broker are NOT serialized against each
/// other.
#[derive(Default)]
pub struct InMemoryBroker {
    lock: RwLock<()>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Broker for InMemoryBroker {
    fn lock(&self) -> BoxFuture<'_, BrokerGuard<'_>> {
        Box::pin(async move { BrokerGuard::new(self.lock.write().await) })
    }

    fn rlock(&self) -> BoxFuture<'_, BrokerGuard<'_>> {
        Box::pin(async move { BrokerGuard::new(self.lock.read().await) })
    }

    fn kind(&self) -> &'static str {
        IN_MEMORY_BROKER_KIND
    }
}
