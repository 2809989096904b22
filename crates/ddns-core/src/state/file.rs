// # File Mapping Store
//
// JSON-file implementation of MappingStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of the previous state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "mappings": [
//     {
//       "ownerId": "acme",
//       "location": "home",
//       "ip": "203.0.113.42",
//       "subdomain": "a1b2c3d4",
//       "updatedAt": "2025-01-09T12:00:00Z",
//       "lastIPChangeAt": "2025-01-09T12:00:00Z",
//       "hourlyChangeCount": 1
//     }
//   ]
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::mapping::Mapping;
use crate::traits::mapping_store::{MappingStore, MappingStoreFactory};

/// Mapping file format version
const STORE_FILE_VERSION: &str = "1.0";

type Key = (String, String);

/// File-based mapping store with crash recovery
///
/// Every mutation is written through to disk before the call returns. The
/// in-memory map only takes a change once the file holding it is in place,
/// so a failed write leaves both the file and later reads on the old state.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::state::FileMappingStore;
/// use ddns_core::traits::MappingStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileMappingStore::new("/var/lib/ddns/mappings.json").await?;
///     for mapping in store.list().await? {
///         println!("{}/{} -> {}", mapping.owner_id, mapping.location, mapping.ip);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileMappingStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    mappings: HashMap<Key, Mapping>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    mappings: Vec<Mapping>,
}

/// Load failures, split so that only unreadable content triggers recovery
enum LoadError {
    Io(Error),
    Corrupt(Error),
}

impl FileMappingStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Try to load the existing file
    /// 2. If it is corrupt, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mappings = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState { mappings })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<Key, Mapping>, Error> {
        let err = match Self::load(path).await {
            Ok(mappings) => {
                tracing::debug!("Loaded {} mappings from {}", mappings.len(), path.display());
                return Ok(mappings);
            }
            Err(LoadError::Io(e)) => return Err(e),
            Err(LoadError::Corrupt(e)) => e,
        };

        tracing::warn!(
            "Mapping file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(HashMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(mappings) => {
                tracing::info!("Recovered {} mappings from backup", mappings.len());
                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!(
                        "Failed to restore {} from backup: {}",
                        path.display(),
                        restore_err
                    );
                }
                Ok(mappings)
            }
            Err(LoadError::Io(e)) | Err(LoadError::Corrupt(e)) => {
                tracing::error!("Backup unusable: {}. Starting with empty state.", e);
                Ok(HashMap::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<HashMap<Key, Mapping>, LoadError> {
        if !path.exists() {
            tracing::debug!("Mapping file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Io(Error::state_store(format!(
                "Failed to read mapping file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content).map_err(|e| {
            LoadError::Corrupt(Error::state_store(format!(
                "Failed to parse mapping file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Mapping file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file
            .mappings
            .into_iter()
            .map(|mapping| (mapping.key(), mapping))
            .collect())
    }

    /// Write `mappings` to file atomically
    ///
    /// Callers hold the state write lock so that writes reach disk in order.
    async fn write_mappings(&self, mappings: &HashMap<Key, Mapping>) -> Result<(), Error> {
        let mut mappings: Vec<Mapping> = mappings.values().cloned().collect();
        mappings.sort_by(|a, b| a.key().cmp(&b.key()));

        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            mappings,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::state_store(format!("Failed to serialize mappings: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Mappings written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl MappingStore for FileMappingStore {
    async fn get(&self, owner_id: &str, location: &str) -> Result<Option<Mapping>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard
            .mappings
            .get(&(owner_id.to_string(), location.to_string()))
            .cloned())
    }

    async fn put(&self, mapping: &Mapping) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let mut next = state_guard.mappings.clone();
        next.insert(mapping.key(), mapping.clone());
        self.write_mappings(&next).await?;

        state_guard.mappings = next;
        Ok(())
    }

    async fn update_subdomain(
        &self,
        owner_id: &str,
        location: &str,
        subdomain: &str,
    ) -> Result<(), Error> {
        let mut state_guard = self.state.write().await;

        let mut next = state_guard.mappings.clone();
        let key = (owner_id.to_string(), location.to_string());
        let Some(mapping) = next.get_mut(&key) else {
            return Err(Error::not_found(format!("{}/{}", owner_id, location)));
        };
        mapping.subdomain = subdomain.to_string();
        self.write_mappings(&next).await?;

        state_guard.mappings = next;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Mapping>, Error> {
        let state_guard = self.state.read().await;
        Ok(state_guard.mappings.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Mutations are on disk before they are visible
        Ok(())
    }
}

/// Factory for [`FileMappingStore`]
pub struct FileMappingStoreFactory;

#[async_trait]
impl MappingStoreFactory for FileMappingStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn MappingStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileMappingStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build '{}' store",
                other.type_name()
            ))),
        }
    }
}
