// # ddns-core
//
// Core library for the DDNS service.
//
// ## Architecture Overview
//
// This library keeps a DNS name in sync with the changing public IP of an
// (owner, location) pair:
// - **IpSource**: Trait for determining the current public IP
// - **DnsProvider**: Trait for submitting record changes to a provider API
// - **MappingStore**: Trait for durable mapping storage
// - **DnsRecordService**: Names, TTLs and timeouts on top of a DnsProvider
// - **RateLimiter**: Hourly cap on accepted IP changes per mapping
// - **UpdateOrchestrator**: Compare, rate-limit, write DNS, persist
// - **SubdomainMigrator**: Two-phase rename of a mapping's DNS label
// - **ProviderRegistry**: Plugin-based registry for providers and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Explicit Construction**: Dependencies are passed in, never global
// 3. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Side-Effect-Free No-Ops**: Polling with an unchanged IP writes nothing

pub mod config;
pub mod dns;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod orchestrator;
pub mod ratelimit;
pub mod registry;
pub mod state;
pub mod subdomain;
pub mod traits;

// Re-export core types for convenience
pub use config::{ProviderConfig, RateLimitConfig, ResolverConfig, ServiceConfig, StoreConfig, TimeoutConfig};
pub use dns::{DnsRecordService, RECORD_TTL};
pub use error::{Error, Result};
pub use mapping::{ErrorBody, Mapping, RequestMeta, UpdateRequest, UpdateResponse, VerifiedOwner};
pub use migration::{MigrationOutcome, SubdomainMigrator};
pub use orchestrator::UpdateOrchestrator;
pub use ratelimit::{RateLimitDecision, RateLimiter};
pub use registry::ProviderRegistry;
pub use state::{FileMappingStore, MemoryMappingStore};
pub use traits::{DnsProvider, IpFamily, IpSource, MappingStore};
