//! ArchiveService — the create/get contract the HTTP layer relies on.
//!
//! Creates validate the envelope, store it and register its expiry. Reads
//! enforce expiry passively: an expired archive reads as missing and is
//! deleted in the background without waiting for the reaper.

use crate::{
    errors::{StoreError, StoreResult},
    models::archive::Archive,
    services::{expiry::ExpiryEngine, object_store::ObjectStore},
};
use std::{io, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct ArchiveService {
    pub store: Arc<ObjectStore>,
    pub expiry: Arc<ExpiryEngine>,
}

impl ArchiveService {
    pub fn new(store: Arc<ObjectStore>, expiry: Arc<ExpiryEngine>) -> Self {
        Self { store, expiry }
    }

    /// Store a serialized archive and return its new id.
    ///
    /// Bodies that do not decode as an archive are rejected with
    /// [`StoreError::Decode`] before anything is written.
    pub async fn create_archive(&self, body: Vec<u8>) -> StoreResult<String> {
        let archive = Archive::from_bytes(&body)?;
        let id = self.store.create(body).await?;
        self.expiry.track(id.clone(), archive.expiry());
        info!(id = %id, action = "create", expiry = %archive.expiry(), "created archive");
        Ok(id)
    }

    /// Fetch the serialized archive stored under `id`.
    pub async fn fetch_archive(&self, id: &str) -> StoreResult<Vec<u8>> {
        debug!(id, action = "get", "processing archive");
        let bin = self.store.get(id).await?;

        let archive = Archive::from_bytes(&bin).map_err(|err| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stored archive `{id}` is corrupt: {err}"),
            ))
        })?;

        if archive.has_expired() {
            info!(id, "expired archive was requested, deleting");
            self.evict(id);
            return Err(StoreError::NotFound(id.to_string()));
        }

        info!(id, action = "get", "found archive");
        Ok(bin)
    }

    /// Delete `id` in the background and drop its expiry tag.
    pub fn evict(&self, id: &str) -> JoinHandle<()> {
        self.expiry.forget(id);
        let store = self.store.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(err) = store.delete(&id).await {
                warn!(id = %id, error = %err, "unsuccessful deletion");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        broker::InMemoryBroker, memory_storage::InMemoryStorage, storage::Storage,
    };
    use chrono::Duration;

    fn service() -> ArchiveService {
        let backend: Arc<dyn Storage> =
            Arc::new(InMemoryStorage::new(Arc::new(InMemoryBroker::new())));
        ArchiveService::new(
            Arc::new(ObjectStore::with_backend(backend)),
            Arc::new(ExpiryEngine::new()),
        )
    }

    #[tokio::test]
    async fn create_registers_expiry_and_returns_bytes_verbatim() {
        let service = service();
        let body = Archive::with_lifetime("a.txt", vec![1, 2, 3], Duration::hours(1))
            .unwrap()
            .to_bytes()
            .unwrap();

        let id = service.create_archive(body.clone()).await.unwrap();
        assert_eq!(service.expiry.peek().map(|t| t.id), Some(id.clone()));
        assert_eq!(service.fetch_archive(&id).await.unwrap(), body);
    }

    #[tokio::test]
    async fn malformed_envelope_is_rejected_before_storing() {
        let service = service();
        let err = service.create_archive(b"junk".to_vec()).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        assert!(service.store.ids().await.unwrap().is_empty());
        assert!(service.expiry.is_empty());
    }

    #[tokio::test]
    async fn expired_archive_reads_as_missing_and_is_evicted() {
        let service = service();
        let body = Archive::with_lifetime("old.txt", vec![0], Duration::seconds(-5))
            .unwrap()
            .to_bytes()
            .unwrap();
        let id = service.create_archive(body).await.unwrap();

        assert!(matches!(
            service.fetch_archive(&id).await,
            Err(StoreError::NotFound(_))
        ));
        // Passive eviction also drops the heap tag.
        assert!(service.expiry.is_empty());

        service.evict(&id).await.unwrap();
        assert!(matches!(
            service.store.get(&id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            service.fetch_archive(&id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_stored_bytes_surface_as_io() {
        let service = service();
        let id = service.store.create(b"garbage".to_vec()).await.unwrap();
        assert!(matches!(
            service.fetch_archive(&id).await,
            Err(StoreError::Io(_))
        ));
    }
}
