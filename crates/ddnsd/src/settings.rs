//! Environment-driven settings for `ddnsd` and `ddns-admin`
//!
//! Configuration is read from `DDNS_*` environment variables only. Parsing goes
//! through a lookup function so the rules can be tested without touching the
//! process environment.
//!
//! ## Variables
//!
//! ### Identity (daemon only)
//! - `DDNS_OWNER`: Owner id of the mapping this host keeps current
//! - `DDNS_LOCATION`: Location name of the mapping (e.g. "home")
//!
//! ### DNS
//! - `DDNS_ROOT_DOMAIN`: Domain every subdomain is created under
//! - `DDNS_PROVIDER_TYPE`: Provider type (cloudflare)
//! - `DDNS_PROVIDER_API_TOKEN`: API token
//! - `DDNS_PROVIDER_ZONE_ID`: Zone ID (optional, discovered when absent)
//! - `DDNS_MODE`: `live` (default) or `dry-run`
//!
//! ### Mapping Store
//! - `DDNS_STORE_TYPE`: `memory` (default) or `file`
//! - `DDNS_STORE_PATH`: Path to the mappings file (for file store)
//!
//! ### Resolution
//! - `DDNS_IP_FAMILY`: `v4` (default) or `v6`
//! - `DDNS_QUORUM`: Matching authority answers required (default 2)
//! - `DDNS_AUTHORITIES`: Comma-separated authority URLs for the configured family
//!
//! ### Loop
//! - `DDNS_CHECK_INTERVAL_SECS`: Seconds between checks (default 900)
//! - `DDNS_RUN_ONCE`: `true` to check once and exit
//! - `DDNS_MAX_CHANGES_PER_HOUR`: Accepted IP changes per hour (default 2)
//! - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)

use anyhow::{Context, Result};
use ddns_core::config::{
    ProviderConfig, RateLimitConfig, ResolverConfig, ServiceConfig, StoreConfig, TimeoutConfig,
};
use ddns_core::IpFamily;
use std::time::Duration;
use tracing::Level;

/// Default seconds between checks
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 900;

/// Settings shared by the daemon and the admin tool
#[derive(Clone)]
pub struct Settings {
    pub owner: Option<String>,
    pub location: Option<String>,
    pub root_domain: String,
    pub provider_type: String,
    pub provider_api_token: String,
    pub provider_zone_id: Option<String>,
    pub dry_run: bool,
    pub store_type: String,
    pub store_path: Option<String>,
    pub ip_family: IpFamily,
    pub quorum: Option<usize>,
    pub authorities: Vec<String>,
    pub check_interval_secs: u64,
    pub run_once: bool,
    pub max_changes_per_hour: u32,
    pub log_level: String,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("owner", &self.owner)
            .field("location", &self.location)
            .field("root_domain", &self.root_domain)
            .field("provider_type", &self.provider_type)
            .field("provider_api_token", &"<REDACTED>")
            .field("provider_zone_id", &self.provider_zone_id)
            .field("dry_run", &self.dry_run)
            .field("store_type", &self.store_type)
            .field("store_path", &self.store_path)
            .field("ip_family", &self.ip_family)
            .field("check_interval_secs", &self.check_interval_secs)
            .field("run_once", &self.run_once)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let ip_family = match var("DDNS_IP_FAMILY") {
            Some(value) => value
                .parse::<IpFamily>()
                .map_err(|e| anyhow::anyhow!("DDNS_IP_FAMILY: {}", e))?,
            None => IpFamily::V4,
        };

        let dry_run = match var("DDNS_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!(
                "DDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        Ok(Self {
            owner: var("DDNS_OWNER"),
            location: var("DDNS_LOCATION"),
            root_domain: var("DDNS_ROOT_DOMAIN").unwrap_or_default(),
            provider_type: var("DDNS_PROVIDER_TYPE").unwrap_or_else(|| "cloudflare".to_string()),
            provider_api_token: var("DDNS_PROVIDER_API_TOKEN").unwrap_or_default(),
            provider_zone_id: var("DDNS_PROVIDER_ZONE_ID"),
            dry_run,
            store_type: var("DDNS_STORE_TYPE").unwrap_or_else(|| "memory".to_string()),
            store_path: var("DDNS_STORE_PATH"),
            ip_family,
            quorum: parse_opt(&var, "DDNS_QUORUM")?,
            authorities: var("DDNS_AUTHORITIES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            check_interval_secs: parse_opt(&var, "DDNS_CHECK_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            run_once: parse_bool(&var, "DDNS_RUN_ONCE")?,
            max_changes_per_hour: parse_opt(&var, "DDNS_MAX_CHANGES_PER_HOUR")?
                .unwrap_or(RateLimitConfig::default().max_changes_per_hour),
            log_level: var("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the settings
    ///
    /// Covers required values, domain-label rules, numeric ranges,
    /// enumerations and placeholder tokens.
    pub fn validate(&self) -> Result<()> {
        if self.root_domain.is_empty() {
            anyhow::bail!(
                "DDNS_ROOT_DOMAIN is required. \
                Set it via: export DDNS_ROOT_DOMAIN=ddns.example.com"
            );
        }
        validate_domain_name(&self.root_domain).context("DDNS_ROOT_DOMAIN")?;

        if self.provider_api_token.is_empty() {
            anyhow::bail!(
                "DDNS_PROVIDER_API_TOKEN is required. \
                Set it via: export DDNS_PROVIDER_API_TOKEN=your_token"
            );
        }

        // Cloudflare API tokens are typically 40 characters
        if self.provider_api_token.len() < 20 {
            anyhow::bail!(
                "DDNS_PROVIDER_API_TOKEN appears too short ({} chars). \
                Cloudflare tokens are typically 40 characters. \
                Verify your token is correct.",
                self.provider_api_token.len()
            );
        }

        let token_lower = self.provider_api_token.to_lowercase();
        if token_lower.contains("your_token")
            || token_lower.contains("replace_me")
            || token_lower.contains("example")
            || token_lower == "token"
        {
            anyhow::bail!(
                "DDNS_PROVIDER_API_TOKEN appears to be a placeholder. \
                Use an actual API token from your DNS provider."
            );
        }

        match self.provider_type.as_str() {
            "cloudflare" => {}
            _ => anyhow::bail!(
                "DDNS_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        match self.store_type.as_str() {
            "memory" => {}
            "file" => match self.store_path.as_deref() {
                None => anyhow::bail!(
                    "DDNS_STORE_PATH is required when DDNS_STORE_TYPE=file. \
                    Set it via: export DDNS_STORE_PATH=/var/lib/ddns/mappings.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "DDNS_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            },
            _ => anyhow::bail!(
                "DDNS_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if !(10..=86_400).contains(&self.check_interval_secs) {
            anyhow::bail!(
                "DDNS_CHECK_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                self.check_interval_secs
            );
        }

        if !(1..=60).contains(&self.max_changes_per_hour) {
            anyhow::bail!(
                "DDNS_MAX_CHANGES_PER_HOUR must be between 1 and 60. Got: {}",
                self.max_changes_per_hour
            );
        }

        if let Some(quorum) = self.quorum
            && quorum == 0
        {
            anyhow::bail!("DDNS_QUORUM must be at least 1");
        }

        for url in &self.authorities {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("DDNS_AUTHORITIES must use HTTP or HTTPS URLs. Got: {}", url);
            }
        }

        let resolver = self.resolver_config();
        if resolver.authorities(self.ip_family).len() < resolver.quorum {
            anyhow::bail!(
                "DDNS_AUTHORITIES lists {} authorities but DDNS_QUORUM is {}",
                resolver.authorities(self.ip_family).len(),
                resolver.quorum
            );
        }

        self.log_level()?;

        Ok(())
    }

    /// Owner and location of the mapping the daemon keeps current
    pub fn identity(&self) -> Result<(String, String)> {
        let owner = self.owner.clone().ok_or_else(|| {
            anyhow::anyhow!("DDNS_OWNER is required. Set it via: export DDNS_OWNER=your_owner_id")
        })?;
        let location = self.location.clone().ok_or_else(|| {
            anyhow::anyhow!("DDNS_LOCATION is required. Set it via: export DDNS_LOCATION=home")
        })?;
        Ok((owner, location))
    }

    /// Max log level from `DDNS_LOG_LEVEL`
    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Core service configuration
    pub fn service_config(&self) -> ServiceConfig {
        let provider = match self.provider_type.as_str() {
            "cloudflare" => ProviderConfig::Cloudflare {
                api_token: self.provider_api_token.clone(),
                zone_id: self.provider_zone_id.clone(),
                dry_run: self.dry_run,
            },
            other => ProviderConfig::Custom {
                factory: other.to_string(),
                config: serde_json::json!({ "api_token": self.provider_api_token }),
            },
        };

        let store = match (self.store_type.as_str(), &self.store_path) {
            ("file", Some(path)) => StoreConfig::File { path: path.clone() },
            _ => StoreConfig::Memory,
        };

        ServiceConfig {
            root_domain: self.root_domain.clone(),
            provider,
            store,
            limits: RateLimitConfig {
                max_changes_per_hour: self.max_changes_per_hour,
            },
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Consensus resolver configuration
    ///
    /// `DDNS_AUTHORITIES` replaces the default list of the configured family.
    pub fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        if let Some(quorum) = self.quorum {
            config.quorum = quorum;
        }
        if !self.authorities.is_empty() {
            match self.ip_family {
                IpFamily::V4 => config.v4_authorities = self.authorities.clone(),
                IpFamily::V6 => config.v6_authorities = self.authorities.clone(),
            }
        }
        config
    }
}

fn parse_opt<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", key, value, e))
        })
        .transpose()
}

fn parse_bool<F>(var: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.to_lowercase()).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => anyhow::bail!("{} '{}' is not a boolean", key, other),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, characters, hyphens.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOKEN: &str = "cf_0123456789abcdefghijklmnopqrstuv";

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let mut env: HashMap<String, String> = HashMap::from([
            ("DDNS_OWNER".to_string(), "acme".to_string()),
            ("DDNS_LOCATION".to_string(), "home".to_string()),
            ("DDNS_ROOT_DOMAIN".to_string(), "ddns.example.com".to_string()),
            ("DDNS_PROVIDER_API_TOKEN".to_string(), TOKEN.to_string()),
        ]);
        for (key, value) in vars {
            env.insert(key.to_string(), value.to_string());
        }
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.ip_family, IpFamily::V4);
        assert_eq!(settings.check_interval(), Duration::from_secs(900));
        assert!(!settings.run_once);
        assert!(!settings.dry_run);
        assert_eq!(settings.max_changes_per_hour, 2);
        assert_eq!(settings.log_level().unwrap(), Level::INFO);
        assert_eq!(
            settings.identity().unwrap(),
            ("acme".to_string(), "home".to_string())
        );

        let config = settings.service_config();
        config.validate().unwrap();
        assert!(matches!(config.store, StoreConfig::Memory));
        assert!(matches!(
            config.provider,
            ProviderConfig::Cloudflare { dry_run: false, zone_id: None, .. }
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("DDNS_IP_FAMILY", "ipv6"),
            ("DDNS_MODE", "dry-run"),
            ("DDNS_RUN_ONCE", "true"),
            ("DDNS_QUORUM", "3"),
            (
                "DDNS_AUTHORITIES",
                "https://a.example.net, https://b.example.net,https://c.example.net",
            ),
            ("DDNS_CHECK_INTERVAL_SECS", "60"),
            ("DDNS_MAX_CHANGES_PER_HOUR", "5"),
            ("DDNS_PROVIDER_ZONE_ID", "zone-1"),
        ])
        .unwrap();
        settings.validate().unwrap();

        assert_eq!(settings.ip_family, IpFamily::V6);
        assert!(settings.run_once);

        let resolver = settings.resolver_config();
        assert_eq!(resolver.quorum, 3);
        assert_eq!(resolver.v6_authorities.len(), 3);
        assert_eq!(resolver.v4_authorities, ResolverConfig::default().v4_authorities);

        let config = settings.service_config();
        assert_eq!(config.limits.max_changes_per_hour, 5);
        assert!(matches!(
            config.provider,
            ProviderConfig::Cloudflare { dry_run: true, zone_id: Some(_), .. }
        ));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let settings = settings(&[("DDNS_OWNER", "  "), ("DDNS_QUORUM", "")]).unwrap();
        assert!(settings.identity().is_err());
        assert_eq!(settings.quorum, None);
    }

    #[test]
    fn test_unparseable_values_fail_to_load() {
        assert!(settings(&[("DDNS_QUORUM", "two")]).is_err());
        assert!(settings(&[("DDNS_IP_FAMILY", "v5")]).is_err());
        assert!(settings(&[("DDNS_MODE", "yolo")]).is_err());
        assert!(settings(&[("DDNS_RUN_ONCE", "maybe")]).is_err());
    }

    #[test]
    fn test_validation_failures() {
        for vars in [
            vec![("DDNS_ROOT_DOMAIN", "")],
            vec![("DDNS_ROOT_DOMAIN", "-bad.example.com")],
            vec![("DDNS_ROOT_DOMAIN", "bad..example.com")],
            vec![("DDNS_PROVIDER_API_TOKEN", "short")],
            vec![("DDNS_PROVIDER_API_TOKEN", "your_token_goes_here_please")],
            vec![("DDNS_PROVIDER_TYPE", "route53")],
            vec![("DDNS_STORE_TYPE", "sqlite")],
            vec![("DDNS_STORE_TYPE", "file")],
            vec![("DDNS_CHECK_INTERVAL_SECS", "5")],
            vec![("DDNS_MAX_CHANGES_PER_HOUR", "0")],
            vec![("DDNS_QUORUM", "0")],
            vec![("DDNS_QUORUM", "4")],
            vec![("DDNS_AUTHORITIES", "ftp://a.example.net,https://b.example.net")],
            vec![("DDNS_LOG_LEVEL", "verbose")],
        ] {
            let settings = settings(&vars).unwrap();
            assert!(settings.validate().is_err(), "expected rejection for {:?}", vars);
        }
    }

    #[test]
    fn test_file_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let settings = settings(&[
            ("DDNS_STORE_TYPE", "file"),
            ("DDNS_STORE_PATH", path.to_str().unwrap()),
        ])
        .unwrap();
        settings.validate().unwrap();
        assert!(matches!(settings.service_config().store, StoreConfig::File { .. }));

        let missing = dir.path().join("nope").join("mappings.json");
        let settings = settings_with_path(missing.to_str().unwrap());
        assert!(settings.validate().is_err());
    }

    fn settings_with_path(path: &str) -> Settings {
        settings(&[("DDNS_STORE_TYPE", "file"), ("DDNS_STORE_PATH", path)]).unwrap()
    }

    #[test]
    fn test_validate_domain_name() {
        assert!(validate_domain_name("ddns.example.com").is_ok());
        assert!(validate_domain_name("a-b.example.com").is_ok());
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("under_score.example.com").is_err());
        assert!(validate_domain_name("exämple.com").is_err());
        assert!(validate_domain_name(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let settings = settings(&[]).unwrap();
        let debug_str = format!("{:?}", settings);
        assert!(!debug_str.contains(TOKEN));
    }
}
