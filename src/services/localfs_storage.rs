//! LocalFsStorage — archives stored as files on local disk.
//!
//! Files are sharded beneath `base_path/soubisedata/{id[0..2]}/{id[2..4]}/{id[4..]}`
//! so no single directory collects every object. Writes land in a temp file
//! that is fsynced and renamed into place.

use crate::{
    errors::{StoreError, StoreResult},
    services::{broker::Broker, storage::Storage},
};
use futures::future::BoxFuture;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

pub const LOCAL_FS_STORAGE_KIND: &str = "localfs";

const DATA_DIR: &str = "soubisedata";
const SHARD_WIDTH: usize = 2;
const MIN_ID_LEN: usize = SHARD_WIDTH * 2 + 1;
const MAX_ID_LEN: usize = 128;

pub struct LocalFsStorage {
    broker: Arc<dyn Broker>,

    /// Root of the sharded tree (`<base>/soubisedata`).
    root: PathBuf,
}

impl LocalFsStorage {
    pub fn new(broker: Arc<dyn Broker>, base_path: impl AsRef<Path>) -> Self {
        Self {
            broker,
            root: base_path.as_ref().join(DATA_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject ids that could escape the data root or do not fill the shards.
    ///
    /// Ids come straight from request paths, so only the URL-safe base64
    /// alphabet is accepted.
    fn ensure_id_safe(id: &str) -> StoreResult<()> {
        let well_formed = (MIN_ID_LEN..=MAX_ID_LEN).contains(&id.len())
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='));
        if well_formed {
            Ok(())
        } else {
            Err(StoreError::InvalidId(id.to_string()))
        }
    }

    /// Construct the payload path for an already validated id.
    fn object_path(&self, id: &str) -> PathBuf {
        let (top, rest) = id.split_at(SHARD_WIDTH);
        let (sub, file) = rest.split_at(SHARD_WIDTH);
        let mut path = self.root.clone();
        path.push(top);
        path.push(sub);
        path.push(file);
        path
    }

    async fn write_atomically(&self, file_path: &Path, data: &[u8]) -> StoreResult<()> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        if let Err(err) = write_and_sync(&mut file, data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(file_path).await?;
                fs::rename(&tmp_path, file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        Ok(())
    }

    /// Remove empty shard directories from `start` up to, not including, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }

    /// Names of the visible entries of `dir`; a missing directory is empty.
    async fn list_dir(dir: &Path) -> io::Result<Vec<(String, bool)>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push((name, entry.file_type().await?.is_dir()));
        }
        Ok(names)
    }
}

async fn write_and_sync(file: &mut File, data: &[u8]) -> io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}

impl Storage for LocalFsStorage {
    fn create<'a>(&'a self, id: &'a str, data: Vec<u8>) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            Self::ensure_id_safe(id)?;
            let file_path = self.object_path(id);
            let _guard = self.broker.lock().await;
            self.write_atomically(&file_path, &data).await?;
            debug!(id, path = %file_path.display(), "wrote archive");
            Ok(())
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<Vec<u8>>> {
        Box::pin(async move {
            Self::ensure_id_safe(id)?;
            let file_path = self.object_path(id);
            let _guard = self.broker.rlock().await;
            fs::read(&file_path).await.map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StoreError::NotFound(id.to_string())
                } else {
                    StoreError::Io(err)
                }
            })
        })
    }

    fn contains<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            Self::ensure_id_safe(id)?;
            let file_path = self.object_path(id);
            let _guard = self.broker.rlock().await;
            Ok(fs::try_exists(&file_path).await?)
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            Self::ensure_id_safe(id)?;
            let file_path = self.object_path(id);
            let _guard = self.broker.lock().await;
            match fs::remove_file(&file_path).await {
                Ok(_) => debug!("removed physical file {}", file_path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("file {} already missing", file_path.display());
                }
                Err(err) => return Err(StoreError::Io(err)),
            }

            if let Some(parent) = file_path.parent() {
                self.prune_empty_dirs(parent, &self.root).await;
            }
            Ok(())
        })
    }

    fn ids(&self) -> BoxFuture<'_, StoreResult<Vec<String>>> {
        Box::pin(async move {
            let _guard = self.broker.rlock().await;
            let mut ids = Vec::new();
            for (top, top_is_dir) in Self::list_dir(&self.root).await? {
                if !top_is_dir {
                    continue;
                }
                let top_path = self.root.join(&top);
                for (sub, sub_is_dir) in Self::list_dir(&top_path).await? {
                    if !sub_is_dir {
                        continue;
                    }
                    for (file, file_is_dir) in Self::list_dir(&top_path.join(&sub)).await? {
                        let id = format!("{top}{sub}{file}");
                        if !file_is_dir && Self::ensure_id_safe(&id).is_ok() {
                            ids.push(id);
                        }
                    }
                }
            }
            Ok(ids)
        })
    }

    fn kind(&self) -> &'static str {
        LOCAL_FS_STORAGE_KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::broker::InMemoryBroker;
    use tempfile::TempDir;

    fn storage() -> (TempDir, LocalFsStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsStorage::new(Arc::new(InMemoryBroker::new()), dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn create_get_delete_cycle() {
        let (_dir, s) = storage();
        let k = "thequickbrownfox";
        let v = b"jumpsoverthelazydog".to_vec();

        s.create(k, v.clone()).await.unwrap();
        assert_eq!(s.get(k).await.unwrap(), v);

        s.delete(k).await.unwrap();
        assert!(matches!(s.get(k).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn objects_are_sharded_by_id_prefix() {
        let (dir, s) = storage();
        s.create("abcdefgh", vec![1, 2, 3]).await.unwrap();

        let expected = dir.path().join("soubisedata").join("ab").join("cd").join("efgh");
        assert_eq!(std::fs::read(expected).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let (_dir, s) = storage();
        s.create("abcdefgh", vec![1]).await.unwrap();
        s.create("abcdefgh", vec![2]).await.unwrap();
        assert_eq!(s.get("abcdefgh").await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn delete_prunes_empty_shards_and_is_idempotent() {
        let (_dir, s) = storage();
        s.create("abcdefgh", vec![1]).await.unwrap();
        s.create("abzzzzzz", vec![2]).await.unwrap();

        s.delete("abcdefgh").await.unwrap();
        assert!(!s.root().join("ab").join("cd").exists());
        assert!(s.root().join("ab").join("zz").exists());

        s.delete("abcdefgh").await.unwrap();
        assert!(s.root().exists());
    }

    #[tokio::test]
    async fn unsafe_ids_never_touch_the_filesystem() {
        let (_dir, s) = storage();
        for id in ["", "abc", "../../etc/passwd", "ab/cd/ef", "ab\\cdefg", "abcd.efg"] {
            assert!(
                matches!(s.get(id).await, Err(StoreError::InvalidId(_))),
                "{id:?}"
            );
            assert!(matches!(
                s.create(id, vec![0]).await,
                Err(StoreError::InvalidId(_))
            ));
        }
    }

    #[tokio::test]
    async fn ids_reassembles_sharded_names() {
        let (_dir, s) = storage();
        assert!(s.ids().await.unwrap().is_empty());

        for id in ["abcdefgh", "q0vPx1bKD-2_aZ9yLr3mNw4T"] {
            s.create(id, vec![9]).await.unwrap();
        }
        let mut ids = s.ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, ["abcdefgh", "q0vPx1bKD-2_aZ9yLr3mNw4T"]);
        assert!(s.contains("abcdefgh").await.unwrap());
        assert_eq!(s.kind(), "localfs");
    }
}
