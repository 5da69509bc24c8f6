//! Blob storage for user avatars.
//!
//! Lite mode keeps blobs on the local filesystem under `storage.data_dir`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

/// Avatar blob key for a user.
pub fn avatar_key(user_id: uuid::Uuid) -> String {
    format!("avatars/{user_id}")
}

/// Blobs stored as files under a root directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            anyhow::bail!("invalid blob key: {key}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blobs, for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }
}
