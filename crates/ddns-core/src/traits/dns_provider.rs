// # DNS Provider Trait
//
// Defines the interface for submitting record changes to an authoritative
// DNS provider.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// Callers normally go through [`crate::dns::DnsRecordService`], which builds
// batches with the right names and TTL. Submitting directly:
//
// ```rust,ignore
// use ddns_core::traits::dns_provider::{ChangeBatch, RecordSet};
//
// let batch = ChangeBatch::new()
//     .delete(RecordSet::for_ip("old.ddns.example.com", ip, 300))
//     .create(RecordSet::for_ip("new.ddns.example.com", ip, 300));
// provider.submit(&batch).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Text record
    Txt,
}

impl RecordType {
    /// Address record type for `ip`
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Wire name ("A", "AAAA", "TXT")
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Txt => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record: fully-qualified name, type, value and TTL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
    pub ttl: u32,
}

impl RecordSet {
    /// A or AAAA record for `ip`
    pub fn for_ip(name: impl Into<String>, ip: IpAddr, ttl: u32) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::for_ip(&ip),
            value: ip.to_string(),
            ttl,
        }
    }

    /// TXT record
    pub fn txt(name: impl Into<String>, value: impl Into<String>, ttl: u32) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::Txt,
            value: value.into(),
            ttl,
        }
    }
}

/// What to do with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// Create or overwrite
    Upsert,
    /// Create; fails if the record already exists
    Create,
    /// Remove; fails if the record does not exist
    Delete,
}

/// One entry of a [`ChangeBatch`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChange {
    pub action: ChangeAction,
    pub record: RecordSet,
}

/// Changes submitted together
///
/// Providers that support it commit a batch as one unit; either every change
/// applies or none does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub changes: Vec<RecordChange>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(self, record: RecordSet) -> Self {
        self.push(ChangeAction::Upsert, record)
    }

    pub fn create(self, record: RecordSet) -> Self {
        self.push(ChangeAction::Create, record)
    }

    pub fn delete(self, record: RecordSet) -> Self {
        self.push(ChangeAction::Delete, record)
    }

    fn push(mut self, action: ChangeAction, record: RecordSet) -> Self {
        self.changes.push(RecordChange { action, record });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Trait for DNS provider implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// Providers are single-shot: one `submit` maps to the provider calls needed
/// for that batch and nothing more. They do not retry, back off, cache state
/// between calls or spawn tasks. A failure is returned to the caller, which
/// owns retry policy.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Apply a batch of record changes
    ///
    /// # Idempotency
    ///
    /// `Upsert` changes must be idempotent: submitting the same upsert twice
    /// leaves the same end state. `Create` and `Delete` are not.
    ///
    /// # Parameters
    ///
    /// - `batch`: Changes to apply, with fully-qualified names
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The provider acknowledged the whole batch
    /// - `Err(Error)`: Nothing is guaranteed to have been applied
    async fn submit(&self, batch: &ChangeBatch) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    /// - `root_domain`: Domain every managed record lives under
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        root_domain: &str,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
