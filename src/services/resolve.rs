//! Turn configured broker/storage paths into live instances.
//!
//! Every failure here is a startup failure: an unknown or unimplemented
//! selection aborts the process instead of quietly running with a backend
//! that is not safe for the deployment.

use crate::services::{
    broker::{Broker, InMemoryBroker},
    localfs_storage::LocalFsStorage,
    memory_storage::InMemoryStorage,
    storage::Storage,
};
use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::warn;

pub const IN_MEMORY_PATH: &str = "inmemory";

/// Resolve the lock broker.
///
/// An empty path deliberately falls back to the in-memory broker and says
/// so on stderr regardless of the log filter.
pub fn broker_from_path(broker_path: &str) -> Result<Arc<dyn Broker>> {
    match broker_path {
        "" => {
            let broker = InMemoryBroker::new();
            warn!(
                broker = broker.kind(),
                "no broker path configured, using in-memory broker (NOT replica-safe)"
            );
            eprintln!(
                "WARNING: broker `{}` only coordinates this process; this server is NOT replica-safe",
                broker.kind()
            );
            Ok(Arc::new(broker))
        }
        IN_MEMORY_PATH => {
            let broker = InMemoryBroker::new();
            warn!(broker = broker.kind(), "in-memory broker is NOT replica-safe");
            Ok(Arc::new(broker))
        }
        path if path.starts_with("redis://") => bail!("redis broker is not implemented"),
        path => bail!("unrecognized broker path `{path}`"),
    }
}

/// Resolve the storage backend; any other path is a local directory.
pub fn storage_from_path(storage_path: &str, broker: Arc<dyn Broker>) -> Result<Arc<dyn Storage>> {
    match storage_path {
        "" => bail!("storage path cannot be empty"),
        IN_MEMORY_PATH => {
            let storage = InMemoryStorage::new(broker);
            warn!(storage = storage.kind(), "do NOT use in production");
            Ok(Arc::new(storage))
        }
        path if path.starts_with("s3://") => bail!("s3 storage is not implemented"),
        path if path.starts_with("gcs://") => bail!("gcs storage is not implemented"),
        path if path.contains("://") => bail!("unrecognized storage path `{path}`"),
        path => Ok(Arc::new(LocalFsStorage::new(broker, path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_brokers_resolve() {
        assert_eq!(broker_from_path("").unwrap().kind(), "inmemory");
        assert_eq!(broker_from_path("inmemory").unwrap().kind(), "inmemory");
    }

    #[test]
    fn unknown_or_unimplemented_brokers_fail() {
        let err = broker_from_path("redis://localhost:6379").err().unwrap();
        assert!(err.to_string().contains("not implemented"));
        assert!(broker_from_path("zookeeper").is_err());
    }

    #[test]
    fn storage_paths_select_backends() {
        let broker = broker_from_path("inmemory").unwrap();
        assert_eq!(
            storage_from_path("inmemory", broker.clone()).unwrap().kind(),
            "inmemory"
        );
        assert_eq!(
            storage_from_path("/tmp/soubise", broker.clone()).unwrap().kind(),
            "localfs"
        );
        for path in ["", "s3://bucket", "gcs://bucket", "ftp://host"] {
            assert!(storage_from_path(path, broker.clone()).is_err(), "{path}");
        }
    }
}
