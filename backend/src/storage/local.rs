use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use super::{ObjectStore, StorageError};

/// Filesystem-backed store rooted at one directory.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    #[tracing::instrument(name = "LocalStore::new", err)]
    pub async fn new(root: &Path) -> Result<Self, StorageError> {
        tracing::debug!("setting up local store");

        tokio::fs::create_dir_all(root).await?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Map a key under the root, refusing anything that could escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or(err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound
    } else {
        StorageError::Io(err)
    }
}

impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    #[tracing::instrument(skip(self), name = "LocalStore::get", err)]
    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(path).await.map_err(not_found_or)?;
        Ok(data.into())
    }

    #[tracing::instrument(
        skip(self, data),
        name = "LocalStore::put",
        err,
        fields(size = data.len())
    )]
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        tracing::debug!("writing file");

        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), name = "LocalStore::delete", err)]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tracing::debug!("deleting file");

        let path = self.resolve(key)?;
        tokio::fs::remove_file(path).await.map_err(not_found_or)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(&dir.path().join("objects")).await.unwrap();

        store
            .put("projects/u1/a.png", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(&store.get("projects/u1/a.png").await.unwrap()[..], b"data");

        store.delete("projects/u1/a.png").await.unwrap();
        assert!(matches!(store.get("projects/u1/a.png").await, Err(StorageError::NotFound)));
        assert!(matches!(store.delete("projects/u1/a.png").await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();

        for key in ["../escape.png", "/etc/passwd", "a/../../b", "", "a\\..\\b"] {
            assert!(
                matches!(store.get(key).await, Err(StorageError::InvalidPath(_))),
                "accepted {key:?}"
            );
        }
    }
}
