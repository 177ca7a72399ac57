use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::{Store, StoreError, StoreResult};

/// A [`Store`] keeping one file per key in a directory.
#[derive(Debug)]
pub struct LocalFsStore {
    path: PathBuf,
}

impl LocalFsStore {
    /// Opens the store at `path`, creating the directory if needed.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        tokio::fs::create_dir_all(path).await?;
        Ok(Self { path: path.into() })
    }

    fn file_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
            return Err(StoreError::generic(format!("invalid key `{key}`")));
        }
        Ok(self.path.join(key))
    }
}

#[async_trait::async_trait]
impl Store for LocalFsStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn upsert(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let path = self.file_path(key)?;
        // Concurrent upserts of one key each write their own file and swap it in atomically.
        let temp = self.path.join(format!(".{key}.{}", uuid::Uuid::new_v4()));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .await?;
        file.write_all(&value).await?;
        file.flush().await?;
        drop(file);

        if let Err(err) = tokio::fs::rename(&temp, &path).await {
            tokio::fs::remove_file(&temp).await.ok();
            return Err(err.into());
        }

        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all, fields(%key))]
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let path = self.file_path(key)?;
        match tokio::fs::read(path).await {
            Ok(contents) => Ok(Some(contents.into())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::trace!("Key not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_and_overwrite() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::open(tempdir.path()).await.unwrap();

        assert_eq!(store.get("memtier-1").await.unwrap(), None);

        store
            .upsert("memtier-1", Bytes::from_static(b"first"))
            .await
            .unwrap();
        store
            .upsert("memtier-1", Bytes::from_static(b"second"))
            .await
            .unwrap();

        let value = store.get("memtier-1").await.unwrap().unwrap();
        assert_eq!(&value[..], b"second");
    }

    #[tokio::test]
    async fn creates_directory() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("nested/data");
        LocalFsStore::open(&path).await.unwrap();
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = LocalFsStore::open(tempdir.path()).await.unwrap();

        for key in ["", "../escape", "a/b", ".hidden"] {
            let result = store.get(key).await;
            assert!(matches!(result, Err(StoreError::Generic { .. })), "{key}");
        }
    }

    #[tokio::test]
    async fn concurrent_upserts_leave_one_complete_value() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(LocalFsStore::open(tempdir.path()).await.unwrap());

        let tasks: Vec<_> = (0..16u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let value = Bytes::from(vec![b'a' + i; 4096]);
                    store.upsert("memtier-7", value).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let value = store.get("memtier-7").await.unwrap().unwrap();
        assert_eq!(value.len(), 4096);
        assert!(value.iter().all(|b| *b == value[0]));
    }
}
