//! Plugin-based provider registry
//!
//! The registry maps configuration type names to factories, so the daemon can
//! build DNS providers and mapping stores from configuration without
//! hard-coded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let mut registry = ProviderRegistry::with_builtin_stores();
//! ddns_provider_cloudflare::register(&mut registry);
//!
//! let provider = registry.create_provider(&config.provider, &config.root_domain)?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! Registration happens once at startup, before the registry is shared, so
//! it takes `&mut self` and needs no locking.

use std::collections::HashMap;

use crate::config::{ProviderConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::state::{FileMappingStoreFactory, MemoryMappingStoreFactory};
use crate::traits::{DnsProvider, DnsProviderFactory, MappingStore, MappingStoreFactory};

/// Registry of DNS provider and mapping store factories
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: HashMap<String, Box<dyn DnsProviderFactory>>,

    /// Registered mapping store factories
    stores: HashMap<String, Box<dyn MappingStoreFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` stores registered
    pub fn with_builtin_stores() -> Self {
        let mut registry = Self::new();
        registry.register_store("memory", Box::new(MemoryMappingStoreFactory));
        registry.register_store("file", Box::new(FileMappingStoreFactory));
        registry
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&mut self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        self.providers.insert(name.into(), factory);
    }

    /// Register a mapping store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&mut self, name: impl Into<String>, factory: Box<dyn MappingStoreFactory>) {
        self.stores.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(
        &self,
        config: &ProviderConfig,
        root_domain: &str,
    ) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let factory = self
            .providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config, root_domain)
    }

    /// Create a mapping store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn MappingStore>)`: Created store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn MappingStore>> {
        let store_type = config.type_name();
        let factory = self
            .stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProviderFactory;

    impl DnsProviderFactory for MockProviderFactory {
        fn create(&self, _config: &ProviderConfig, _root_domain: &str) -> Result<Box<dyn DnsProvider>> {
            Err(Error::not_found("Mock provider not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = ProviderRegistry::new();
        assert!(!registry.has_provider("mock"));

        registry.register_provider("mock", Box::new(MockProviderFactory));

        assert!(registry.has_provider("mock"));
        assert!(registry.list_providers().contains(&"mock".to_string()));
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::Custom {
            factory: "route53".to_string(),
            config: serde_json::json!({}),
        };
        let err = registry.create_provider(&config, "ddns.example.com").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_builtin_memory_store() {
        let registry = ProviderRegistry::with_builtin_stores();
        assert!(registry.has_store("memory"));
        assert!(registry.has_store("file"));

        let store = registry.create_store(&StoreConfig::Memory).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
