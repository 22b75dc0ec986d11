use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::error::StoreError;
use super::traits::TokenStore;

/// Process-local store. Credentials are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Durable store backed by a JSON object file readable only by the owner.
///
/// Writes go to a sibling temp file that is renamed over the original, so
/// a crash mid-write never leaves a truncated credentials file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Default credentials location.
    ///
    /// `REDBIT_CREDENTIALS_PATH` wins when set; otherwise
    /// `<data_local_dir>/redbit/credentials.json`. Returns `None` when the
    /// platform exposes no data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REDBIT_CREDENTIALS_PATH") {
            return Some(PathBuf::from(path));
        }
        dirs::data_local_dir().map(|dir| dir.join("redbit").join("credentials.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads entries for a read-modify-write. An unparseable file is
    /// treated as empty so the next write replaces it; the flag reports that.
    async fn load_for_write(&self) -> Result<(BTreeMap<String, String>, bool), StoreError> {
        match self.load().await {
            Ok(entries) => Ok((entries, false)),
            Err(StoreError::Serde(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Credentials file is corrupt, replacing it"
                );
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;
        let mut file = open_private(&tmp).await?;
        // `mode` only applies on creation; a leftover temp file keeps its own.
        restrict_permissions(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn open_private(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
}

#[cfg(not(unix))]
async fn open_private(path: &Path) -> std::io::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let (mut entries, _) = self.load_for_write().await?;
        entries.insert(key.to_owned(), value.to_owned());
        self.save(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let (mut entries, reset) = self.load_for_write().await?;
        if entries.remove(key).is_none() && !reset {
            return Ok(());
        }
        self.save(&entries).await
    }
}

/// Store chosen once at startup by platform capability.
#[derive(Debug)]
pub enum PlatformStore {
    File(FileTokenStore),
    Memory(MemoryTokenStore),
}

impl PlatformStore {
    /// Uses the durable file store when a data directory is available,
    /// otherwise falls back to process memory.
    #[must_use]
    pub fn detect() -> Self {
        match FileTokenStore::default_path() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Using file credential store");
                Self::File(FileTokenStore::new(path))
            }
            None => {
                tracing::warn!("No data directory available, credentials will not persist");
                Self::Memory(MemoryTokenStore::new())
            }
        }
    }
}

impl TokenStore for PlatformStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Self::File(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Self::File(store) => store.set(key, value).await,
            Self::Memory(store) => store.set(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::File(store) => store.delete(key).await,
            Self::Memory(store) => store.delete(key).await,
        }
    }
}
