//! In-process storage backend. Nothing survives a restart.

use crate::{
    errors::{StoreError, StoreResult},
    services::{broker::Broker, storage::Storage},
};
use futures::future::BoxFuture;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

pub const IN_MEMORY_STORAGE_KIND: &str = "inmemory";

pub struct InMemoryStorage {
    broker: Arc<dyn Broker>,
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Storage for InMemoryStorage {
    fn create<'a>(&'a self, id: &'a str, data: Vec<u8>) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let _guard = self.broker.lock().await;
            self.data
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id.to_string(), data);
            Ok(())
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<Vec<u8>>> {
        Box::pin(async move {
            let _guard = self.broker.rlock().await;
            self.data
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    fn contains<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            let _guard = self.broker.rlock().await;
            Ok(self
                .data
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(id))
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let _guard = self.broker.lock().await;
            self.data
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(id);
            Ok(())
        })
    }

    fn ids(&self) -> BoxFuture<'_, StoreResult<Vec<String>>> {
        Box::pin(async move {
            let _guard = self.broker.rlock().await;
            Ok(self
                .data
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned()
                .collect())
        })
    }

    fn kind(&self) -> &'static str {
        IN_MEMORY_STORAGE_KIND
    }
}
