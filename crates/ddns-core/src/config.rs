//! Configuration types for the DDNS service
//!
//! This module defines all configuration structures used throughout the crate.
//! Everything here is plain data: the daemon fills it from the environment and
//! hands it to constructors, nothing reads it from global state.

use serde::{Deserialize, Serialize};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root domain every subdomain is created under (e.g. "ddns.example.com")
    pub root_domain: String,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Mapping store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limiting
    #[serde(default)]
    pub limits: RateLimitConfig,

    /// Outbound call budgets
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl ServiceConfig {
    /// Create a new configuration with default limits and an in-memory store
    pub fn new(root_domain: impl Into<String>, provider: ProviderConfig) -> Self {
        Self {
            root_domain: root_domain.into(),
            provider,
            store: StoreConfig::default(),
            limits: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.root_domain.trim().is_empty() {
            return Err(crate::Error::config("Root domain cannot be empty"));
        }
        if self.root_domain.starts_with('.') || self.root_domain.ends_with('.') {
            return Err(crate::Error::config(
                "Root domain must not start or end with '.'",
            ));
        }

        self.provider.validate()?;
        self.store.validate()?;
        self.limits.validate()?;
        self.timeouts.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID (optional, discovered from the root domain when absent)
        #[serde(default)]
        zone_id: Option<String>,
        /// Log change batches instead of submitting them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Mapping store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the mappings file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Per-mapping IP change limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Accepted IP changes per wall-clock hour
    #[serde(default = "default_max_changes_per_hour")]
    pub max_changes_per_hour: u32,
}

impl RateLimitConfig {
    /// Validate the limits
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_changes_per_hour == 0 {
            return Err(crate::Error::config("max_changes_per_hour must be > 0"));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_changes_per_hour: default_max_changes_per_hour(),
        }
    }
}

/// Time budgets for calls the orchestrator makes on behalf of a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// DNS provider call budget (milliseconds)
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,

    /// Mapping store call budget (milliseconds)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl TimeoutConfig {
    /// Validate the budgets
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.dns_timeout_ms == 0 || self.store_timeout_ms == 0 {
            return Err(crate::Error::config("Timeouts must be > 0"));
        }
        Ok(())
    }

    /// DNS budget as a `Duration`
    pub fn dns_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.dns_timeout_ms)
    }

    /// Store budget as a `Duration`
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dns_timeout_ms: default_dns_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

/// Consensus resolver configuration
///
/// The authority lists are passed explicitly to the resolver. There is no
/// process-wide registry of authority URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// "What is my IP" endpoints answering over IPv4
    #[serde(default = "default_v4_authorities")]
    pub v4_authorities: Vec<String>,

    /// "What is my IP" endpoints answering over IPv6
    #[serde(default = "default_v6_authorities")]
    pub v6_authorities: Vec<String>,

    /// Matching answers required before an address is trusted
    #[serde(default = "default_quorum")]
    pub quorum: usize,

    /// Budget for a single authority request (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Budget for the whole resolution (milliseconds)
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.quorum == 0 {
            return Err(crate::Error::config("Quorum must be > 0"));
        }
        if self.request_timeout_ms == 0 || self.deadline_ms == 0 {
            return Err(crate::Error::config("Resolver timeouts must be > 0"));
        }
        for url in self.v4_authorities.iter().chain(&self.v6_authorities) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(crate::Error::config(format!(
                    "Authority URL must be http(s): {}",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Authorities configured for the given family
    pub fn authorities(&self, family: crate::IpFamily) -> &[String] {
        match family {
            crate::IpFamily::V4 => &self.v4_authorities,
            crate::IpFamily::V6 => &self.v6_authorities,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            v4_authorities: default_v4_authorities(),
            v6_authorities: default_v6_authorities(),
            quorum: default_quorum(),
            request_timeout_ms: default_request_timeout_ms(),
            deadline_ms: default_deadline_ms(),
        }
    }
}

fn default_max_changes_per_hour() -> u32 {
    2
}

fn default_dns_timeout_ms() -> u64 {
    10_000
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_quorum() -> usize {
    2
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

fn default_deadline_ms() -> u64 {
    10_000
}

fn default_v4_authorities() -> Vec<String> {
    vec![
        "https://ipv4.icanhazip.com/".to_string(),
        "https://checkip.amazonaws.com/".to_string(),
        "https://api.ipify.org".to_string(),
    ]
}

fn default_v6_authorities() -> Vec<String> {
    vec![
        "https://ipv6.icanhazip.com/".to_string(),
        "https://api6.ipify.org".to_string(),
        "https://v6.ident.me".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.quorum, 2);
        assert_eq!(config.request_timeout_ms, 3_000);
        assert_eq!(config.deadline_ms, 10_000);
        assert!(config.v4_authorities.len() >= config.quorum);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_service_config_from_json_uses_defaults() {
        let json = r#"{
            "root_domain": "ddns.example.com",
            "provider": { "type": "cloudflare", "api_token": "secret" }
        }"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.limits.max_changes_per_hour, 2);
        assert_eq!(config.timeouts.dns_timeout_ms, 10_000);
        assert_eq!(config.timeouts.store_timeout_ms, 5_000);
        assert!(matches!(config.store, StoreConfig::Memory));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let provider = ProviderConfig::Cloudflare {
            api_token: String::new(),
            zone_id: None,
            dry_run: false,
        };
        let config = ServiceConfig::new("ddns.example.com", provider);
        assert!(config.validate().is_err(), "empty token must be rejected");

        let mut resolver = ResolverConfig::default();
        resolver.quorum = 0;
        assert!(resolver.validate().is_err());

        let mut resolver = ResolverConfig::default();
        resolver.v4_authorities.push("ftp://example.com".to_string());
        assert!(resolver.validate().is_err());
    }
}
