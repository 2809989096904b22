//! Component wiring shared by both binaries

use ddns_core::config::ServiceConfig;
use ddns_core::traits::{DnsProvider, MappingStore};
use ddns_core::{ProviderRegistry, Result, SubdomainMigrator, UpdateOrchestrator};
use std::sync::Arc;
use tracing::info;

/// Store, orchestrator and migrator built from one configuration
pub struct Services {
    pub store: Arc<dyn MappingStore>,
    pub orchestrator: UpdateOrchestrator,
    pub migrator: SubdomainMigrator,
}

impl Services {
    /// Register built-in backends and construct every component
    pub async fn build(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = ProviderRegistry::with_builtin_stores();
        ddns_provider_cloudflare::register(&mut registry);
        info!(
            providers = ?registry.list_providers(),
            stores = ?registry.list_stores(),
            "Registry initialized"
        );

        let provider: Arc<dyn DnsProvider> =
            Arc::from(registry.create_provider(&config.provider, &config.root_domain)?);
        let store: Arc<dyn MappingStore> = Arc::from(registry.create_store(&config.store).await?);

        info!(
            provider = provider.provider_name(),
            store = config.store.type_name(),
            root_domain = %config.root_domain,
            "Components created"
        );

        let orchestrator = UpdateOrchestrator::from_config(config, Arc::clone(&store), provider);
        let migrator = SubdomainMigrator::new(Arc::clone(&store), orchestrator.dns().clone())
            .with_store_timeout(config.timeouts.store_timeout());

        Ok(Self {
            store,
            orchestrator,
            migrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::config::{ProviderConfig, StoreConfig};

    fn config(store: StoreConfig) -> ServiceConfig {
        let mut config = ServiceConfig::new(
            "ddns.example.com",
            ProviderConfig::Cloudflare {
                api_token: "cf_0123456789abcdefghijklmnopqrstuv".to_string(),
                zone_id: Some("zone-1".to_string()),
                dry_run: true,
            },
        );
        config.store = store;
        config
    }

    #[tokio::test]
    async fn test_build_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let services = Services::build(&config(StoreConfig::File {
            path: path.to_string_lossy().into_owned(),
        }))
        .await
        .unwrap();

        assert!(services.store.list().await.unwrap().is_empty());
        assert_eq!(services.orchestrator.dns().root_domain(), "ddns.example.com");
    }

    #[tokio::test]
    async fn test_unknown_provider_is_a_config_error() {
        let mut config = config(StoreConfig::Memory);
        config.provider = ProviderConfig::Custom {
            factory: "route53".to_string(),
            config: serde_json::json!({}),
        };

        let err = Services::build(&config).await.err().unwrap();
        assert!(matches!(err, ddns_core::Error::Config(_)));
    }
}
