//! Backend-agnostic storage contract.

use crate::errors::StoreResult;
use futures::future::BoxFuture;

/// One storage medium for serialized archives, keyed by object id.
///
/// Implementations bracket every call with their broker: the exclusive lock
/// for `create`/`delete`, a shared lock for reads. Exactly one backend is
/// active per process.
pub trait Storage: Send + Sync {
    /// Write `data` under `id`. Overwrites are not rejected here; callers
    /// must not issue colliding ids.
    fn create<'a>(&'a self, id: &'a str, data: Vec<u8>) -> BoxFuture<'a, StoreResult<()>>;

    /// Raw stored bytes, or [`StoreError::NotFound`](crate::errors::StoreError::NotFound).
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<Vec<u8>>>;

    /// Whether `id` is currently stored.
    fn contains<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<bool>>;

    /// Remove `id`. Removing an absent id succeeds.
    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    /// Every stored id, in no particular order.
    fn ids(&self) -> BoxFuture<'_, StoreResult<Vec<String>>>;

    fn kind(&self) -> &'static str;
}
