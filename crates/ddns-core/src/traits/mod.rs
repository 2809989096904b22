//! Core traits for the DDNS service
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Determine the current public IP
//! - [`DnsProvider`]: Submit record changes to a DNS provider
//! - [`MappingStore`]: Durable storage for mappings

pub mod dns_provider;
pub mod ip_source;
pub mod mapping_store;

pub use dns_provider::{
    ChangeAction, ChangeBatch, DnsProvider, DnsProviderFactory, RecordChange, RecordSet,
    RecordType,
};
pub use ip_source::{IpFamily, IpSource};
pub use mapping_store::{MappingStore, MappingStoreFactory};
