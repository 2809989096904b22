// # Mapping Store Trait
//
// Defines the interface for durable storage of mappings.
//
// ## Implementations
//
// - In-memory: `state::MemoryMappingStore`
// - JSON file: `state::FileMappingStore`
//
// Writes are unconditional upserts; concurrent read-modify-write cycles on the
// same (owner, location) are last-write-wins.

use async_trait::async_trait;

use crate::mapping::Mapping;

/// Trait for mapping store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// Stores hold data. They do not compare IPs, apply rate limits or touch DNS;
/// that belongs to the orchestrator.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Get the mapping for (owner, location)
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Mapping))`: The stored mapping
    /// - `Ok(None)`: No mapping for this pair
    /// - `Err(Error)`: Storage error
    async fn get(&self, owner_id: &str, location: &str) -> Result<Option<Mapping>, crate::Error>;

    /// Create or replace a mapping
    async fn put(&self, mapping: &Mapping) -> Result<(), crate::Error>;

    /// Replace only the subdomain of an existing mapping
    ///
    /// IP, timestamps and counters are left untouched.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Updated
    /// - `Err(Error::NotFound)`: No mapping for this pair
    async fn update_subdomain(
        &self,
        owner_id: &str,
        location: &str,
        subdomain: &str,
    ) -> Result<(), crate::Error>;

    /// List every stored mapping
    async fn list(&self) -> Result<Vec<Mapping>, crate::Error>;

    /// Persist pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing mapping stores from configuration
#[async_trait]
pub trait MappingStoreFactory: Send + Sync {
    /// Create a MappingStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn MappingStore>, crate::Error>;
}
