//! ObjectStore — the facade every consumer talks to.
//!
//! One instance is built at startup and shared by `Arc`. It is bound to
//! exactly one backend for its whole life and owns id generation.

use crate::{
    errors::{StoreError, StoreResult},
    services::{crypto, storage::Storage},
};
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Random bytes per object id; 18 bytes encode to 24 base64 characters.
pub const ID_BYTE_LENGTH: usize = 18;

/// How many fresh ids `create` draws before giving up on collisions.
const MAX_ID_ATTEMPTS: usize = 4;

#[derive(Default)]
pub struct ObjectStore {
    backend: OnceLock<Arc<dyn Storage>>,
}

impl ObjectStore {
    /// An unbound store; every operation fails with `Uninitialized` until
    /// [`ObjectStore::bind`] succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Arc<dyn Storage>) -> Self {
        let store = Self::new();
        let _ = store.backend.set(backend);
        store
    }

    /// Bind the backend. A second bind is rejected.
    pub fn bind(&self, backend: Arc<dyn Storage>) -> StoreResult<()> {
        self.backend
            .set(backend)
            .map_err(|_| StoreError::AlreadyInitialized)
    }

    pub fn is_bound(&self) -> bool {
        self.backend.get().is_some()
    }

    fn backend(&self) -> StoreResult<&Arc<dyn Storage>> {
        self.backend.get().ok_or(StoreError::Uninitialized)
    }

    /// Store `data` under a freshly generated id and return the id.
    ///
    /// The id is checked against existing keys first. Check and write take
    /// the lock separately, so two creates drawing the same 144-bit id at
    /// the same instant could still race; that residual risk is accepted.
    pub async fn create(&self, data: Vec<u8>) -> StoreResult<String> {
        let backend = self.backend()?;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = crypto::random_token(ID_BYTE_LENGTH);
            if backend.contains(&id).await? {
                warn!(id = %id, "generated object id already in use, drawing another");
                continue;
            }
            backend.create(&id, data).await?;
            return Ok(id);
        }
        Err(StoreError::Io(std::io::Error::other(
            "unable to generate an unused object id",
        )))
    }

    pub async fn get(&self, id: &str) -> StoreResult<Vec<u8>> {
        self.backend()?.get(id).await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        self.backend()?.delete(id).await
    }

    pub async fn ids(&self) -> StoreResult<Vec<String>> {
        self.backend()?.ids().await
    }

    /// Kind of the bound backend, for logs and readiness probes.
    pub fn kind(&self) -> Option<&'static str> {
        self.backend.get().map(|backend| backend.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{broker::InMemoryBroker, memory_storage::InMemoryStorage};

    fn memory_backend() -> Arc<dyn Storage> {
        Arc::new(InMemoryStorage::new(Arc::new(InMemoryBroker::new())))
    }

    #[tokio::test]
    async fn operations_before_bind_are_uninitialized() {
        let store = ObjectStore::new();
        assert!(!store.is_bound());
        assert_eq!(store.kind(), None);
        assert!(matches!(
            store.create(vec![1]).await,
            Err(StoreError::Uninitialized)
        ));
        assert!(matches!(store.get("x").await, Err(StoreError::Uninitialized)));
        assert!(matches!(
            store.delete("x").await,
            Err(StoreError::Uninitialized)
        ));
    }

    #[tokio::test]
    async fn second_bind_is_rejected() {
        let store = ObjectStore::new();
        store.bind(memory_backend()).unwrap();
        assert!(matches!(
            store.bind(memory_backend()),
            Err(StoreError::AlreadyInitialized)
        ));
        assert_eq!(store.kind(), Some("inmemory"));
    }

    #[tokio::test]
    async fn create_issues_url_safe_ids() {
        let store = ObjectStore::with_backend(memory_backend());
        let id = store.create(b"payload".to_vec()).await.unwrap();

        assert_eq!(id.len(), 24);
        assert!(
            id.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        );
        assert_eq!(store.get(&id).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn get_after_delete_is_not_found() {
        let store = ObjectStore::with_backend(memory_backend());
        let id = store.create(b"v".to_vec()).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), b"v");

        store.delete(&id).await.unwrap();
        assert!(matches!(store.get(&id).await, Err(StoreError::NotFound(_))));
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn many_creates_yield_distinct_ids() {
        let store = ObjectStore::with_backend(memory_backend());
        let mut ids = std::collections::HashSet::new();
        for i in 0..200u8 {
            assert!(ids.insert(store.create(vec![i]).await.unwrap()));
        }
        assert_eq!(store.ids().await.unwrap().len(), 200);
    }
}
