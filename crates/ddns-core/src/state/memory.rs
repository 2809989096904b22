// # Memory Mapping Store
//
// In-memory implementation of MappingStore.
//
// ## Crash Behavior
//
// - All mappings are lost on restart/crash
// - The first update after a restart is treated as a new mapping (DNS is
//   written again and the rate-limit window starts over)
//
// ## When to Use
//
// - Testing environments
// - Single-process daemons where a fresh DNS write on restart is harmless

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::mapping::Mapping;
use crate::traits::mapping_store::{MappingStore, MappingStoreFactory};

type Key = (String, String);

/// In-memory mapping store
///
/// This implementation stores all mappings in a HashMap protected by a RwLock.
/// Clones share the same underlying map.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::state::MemoryMappingStore;
/// use ddns_core::traits::MappingStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryMappingStore::new();
///     assert!(store.get("acme", "home").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryMappingStore {
    inner: Arc<RwLock<HashMap<Key, Mapping>>>,
}

impl MemoryMappingStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of mappings in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for MemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key(owner_id: &str, location: &str) -> Key {
    (owner_id.to_string(), location.to_string())
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn get(&self, owner_id: &str, location: &str) -> Result<Option<Mapping>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&key(owner_id, location)).cloned())
    }

    async fn put(&self, mapping: &Mapping) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(mapping.key(), mapping.clone());
        Ok(())
    }

    async fn update_subdomain(
        &self,
        owner_id: &str,
        location: &str,
        subdomain: &str,
    ) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&key(owner_id, location)) {
            Some(mapping) => {
                mapping.subdomain = subdomain.to_string();
                Ok(())
            }
            None => Err(Error::not_found(format!("{}/{}", owner_id, location))),
        }
    }

    async fn list(&self) -> Result<Vec<Mapping>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist
        Ok(())
    }
}

/// Factory for [`MemoryMappingStore`]
pub struct MemoryMappingStoreFactory;

#[async_trait]
impl MappingStoreFactory for MemoryMappingStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn MappingStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemoryMappingStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build '{}' store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mapping(owner: &str, location: &str, ip: &str) -> Mapping {
        Mapping::new(owner, location, ip.parse().unwrap(), "a1b2c3d4", Utc::now())
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryMappingStore::new();
        assert!(store.is_empty().await);

        store.put(&mapping("acme", "home", "203.0.113.1")).await.unwrap();
        assert_eq!(store.len().await, 1);

        let found = store.get("acme", "home").await.unwrap().unwrap();
        assert_eq!(found.ip, "203.0.113.1");
        assert!(store.get("acme", "office").await.unwrap().is_none());

        // Put overwrites
        store.put(&mapping("acme", "home", "203.0.113.2")).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("acme", "home").await.unwrap().unwrap().ip, "203.0.113.2");
    }

    #[tokio::test]
    async fn test_update_subdomain_only_touches_subdomain() {
        let store = MemoryMappingStore::new();
        let original = mapping("acme", "home", "203.0.113.1");
        store.put(&original).await.unwrap();

        store.update_subdomain("acme", "home", "homelab").await.unwrap();

        let updated = store.get("acme", "home").await.unwrap().unwrap();
        assert_eq!(updated.subdomain, "homelab");
        assert_eq!(updated.ip, original.ip);
        assert_eq!(updated.updated_at, original.updated_at);

        let err = store.update_subdomain("acme", "missing", "x").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_store_list() {
        let store = MemoryMappingStore::new();
        store.put(&mapping("acme", "home", "203.0.113.1")).await.unwrap();
        store.put(&mapping("acme", "office", "203.0.113.2")).await.unwrap();

        let mut locations: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.location)
            .collect();
        locations.sort();
        assert_eq!(locations, vec!["home", "office"]);
    }
}
