//! Update orchestrator
//!
//! The UpdateOrchestrator reconciles one (owner, location) mapping per call:
//! - Resolves the candidate IP (explicit value, else transport metadata)
//! - Compares it with the stored mapping
//! - Applies the hourly rate limit
//! - Writes the DNS record, then persists the mapping
//!
//! ## Request States
//!
//! ```text
//! Authenticated ─▶ IpResolved ─▶ Compared ─┬─▶ Unchanged    (no side effects)
//!                                          ├─▶ RateLimited  (no side effects)
//!                                          └─▶ Updated      (DNS, then store)
//! ```
//!
//! ## Failure Windows
//!
//! Everything before the DNS write is side-effect free. If the DNS write
//! fails, nothing is persisted. If the DNS write succeeds and the store write
//! fails, the DNS record already carries the new IP while the store still
//! holds the old one; the next accepted update reconciles them.
//!
//! The DNS and store writes run on a detached task: dropping the future
//! returned by [`UpdateOrchestrator::update`] does not abort a write that has
//! already started.
//!
//! Concurrent updates for the same pair are not serialized. The
//! read-modify-write of a mapping is last-write-wins, so two racing changes
//! can lose a rate-limit increment.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::dns::DnsRecordService;
use crate::error::{Error, Result};
use crate::mapping::{Mapping, RequestMeta, UpdateRequest, UpdateResponse, VerifiedOwner};
use crate::ratelimit::RateLimiter;
use crate::subdomain;
use crate::traits::{DnsProvider, MappingStore};

pub(crate) const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a store call with a time budget
pub(crate) async fn bounded<T>(
    budget: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "mapping store did not answer within {:?}",
            budget
        ))),
    }
}

/// Stored label, or the derived one when none has been assigned
pub(crate) fn effective_subdomain(mapping: Option<&Mapping>, owner_id: &str, location: &str) -> String {
    match mapping {
        Some(mapping) if !mapping.subdomain.is_empty() => mapping.subdomain.clone(),
        _ => subdomain::derive_label(owner_id, location),
    }
}

/// Reconciles mappings, DNS records and rate limits
///
/// Each call is an independent unit of work. The orchestrator holds no
/// per-mapping state and is cheap to clone.
#[derive(Clone)]
pub struct UpdateOrchestrator {
    store: Arc<dyn MappingStore>,
    dns: DnsRecordService,
    limiter: RateLimiter,
    store_timeout: Duration,
}

impl UpdateOrchestrator {
    /// Create an orchestrator
    ///
    /// # Parameters
    ///
    /// - `store`: Mapping store
    /// - `dns`: DNS record service (already bound to the root domain)
    /// - `limiter`: Hourly change limiter
    pub fn new(store: Arc<dyn MappingStore>, dns: DnsRecordService, limiter: RateLimiter) -> Self {
        Self {
            store,
            dns,
            limiter,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Create an orchestrator from service configuration
    pub fn from_config(
        config: &ServiceConfig,
        store: Arc<dyn MappingStore>,
        provider: Arc<dyn DnsProvider>,
    ) -> Self {
        let dns = DnsRecordService::new(provider, config.root_domain.clone())
            .with_timeout(config.timeouts.dns_timeout());
        Self::new(store, dns, RateLimiter::from_config(&config.limits))
            .with_store_timeout(config.timeouts.store_timeout())
    }

    /// Override the per-call store timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// DNS service used for writes
    pub fn dns(&self) -> &DnsRecordService {
        &self.dns
    }

    /// Reconcile a mapping with the caller's current IP
    ///
    /// # Parameters
    ///
    /// - `caller`: Identity established by authentication
    /// - `request`: Owner, location and optional explicit IP
    /// - `meta`: Transport metadata used when `request.ip` is absent
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResponse)` with `changed = false` when the IP matched
    /// - `Ok(UpdateResponse)` with `changed = true` after DNS and store writes
    /// - `Err(Error::RateLimited)` when the hourly budget is spent
    /// - `Err(Error)` for validation, authorization or upstream failures
    pub async fn update(
        &self,
        caller: &VerifiedOwner,
        request: &UpdateRequest,
        meta: &RequestMeta,
    ) -> Result<UpdateResponse> {
        self.update_at(caller, request, meta, Utc::now()).await
    }

    /// [`update`](Self::update) evaluated at a fixed time
    pub async fn update_at(
        &self,
        caller: &VerifiedOwner,
        request: &UpdateRequest,
        meta: &RequestMeta,
        now: DateTime<Utc>,
    ) -> Result<UpdateResponse> {
        request.validate()?;
        caller.authorize(&request.owner_id)?;

        let owner_id = request.owner_id.as_str();
        let location = request.location.as_str();
        let ip = candidate_ip(request, meta)?;
        debug!(owner = %owner_id, location = %location, ip = %ip, "Candidate IP resolved");

        let existing = bounded(self.store_timeout, self.store.get(owner_id, location))
            .await
            .map_err(|e| {
                error!(owner = %owner_id, location = %location, "Failed to get mapping: {}", e);
                Error::upstream("failed to get mapping", e)
            })?;

        let label = effective_subdomain(existing.as_ref(), owner_id, location);

        if let Some(current) = existing.as_ref().filter(|m| m.has_ip(&ip)) {
            info!(
                owner = %owner_id,
                location = %location,
                ip = %ip,
                "IP unchanged, no update needed"
            );
            return Ok(UpdateResponse::from_mapping(
                current,
                &label,
                self.dns.fqdn(&label),
                false,
            ));
        }

        if let Err(e) = self.limiter.enforce(existing.as_ref(), now) {
            warn!(
                owner = %owner_id,
                location = %location,
                retry_after_secs = e.retry_after_secs().unwrap_or_default(),
                "Rate limit exceeded"
            );
            return Err(e);
        }

        let is_new = existing.is_none();
        let mut mapping = existing
            .unwrap_or_else(|| Mapping::new(owner_id, location, ip, label.clone(), now));
        mapping.ip = ip.to_string();
        mapping.updated_at = now;
        if mapping.subdomain.is_empty() {
            mapping.subdomain = label.clone();
        }
        RateLimiter::update_counters(&mut mapping, now);

        let mapping = self.spawn_write(mapping, ip).await?;

        info!(
            owner = %mapping.owner_id,
            location = %mapping.location,
            ip = %mapping.ip,
            subdomain = %mapping.subdomain,
            is_new,
            "IP updated successfully"
        );

        Ok(UpdateResponse::from_mapping(
            &mapping,
            &mapping.subdomain,
            self.dns.fqdn(&mapping.subdomain),
            true,
        ))
    }

    /// Return the stored mapping for (owner, location)
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResponse)` with `changed = false`
    /// - `Err(Error::NotFound)` if no mapping exists
    pub async fn lookup(
        &self,
        caller: &VerifiedOwner,
        owner_id: &str,
        location: &str,
    ) -> Result<UpdateResponse> {
        UpdateRequest::new(owner_id, location).validate()?;
        caller.authorize(owner_id)?;

        let mapping = bounded(self.store_timeout, self.store.get(owner_id, location))
            .await
            .map_err(|e| Error::upstream("failed to lookup mapping", e))?
            .ok_or_else(|| Error::not_found(format!("{}/{}", owner_id, location)))?;

        let label = effective_subdomain(Some(&mapping), owner_id, location);
        Ok(UpdateResponse::from_mapping(
            &mapping,
            &label,
            self.dns.fqdn(&label),
            false,
        ))
    }

    /// DNS write followed by store write, on a task the caller cannot cancel
    async fn spawn_write(&self, mapping: Mapping, ip: IpAddr) -> Result<Mapping> {
        let dns = self.dns.clone();
        let store = Arc::clone(&self.store);
        let store_timeout = self.store_timeout;

        let task = tokio::spawn(async move {
            if let Err(e) = dns.upsert_a(&mapping.subdomain, ip).await {
                error!(
                    owner = %mapping.owner_id,
                    location = %mapping.location,
                    "Failed to update DNS record: {}",
                    e
                );
                return Err(Error::upstream("failed to update DNS record", e));
            }

            if let Err(e) = bounded(store_timeout, store.put(&mapping)).await {
                error!(
                    owner = %mapping.owner_id,
                    location = %mapping.location,
                    ip = %mapping.ip,
                    "DNS record updated but mapping not saved: {}",
                    e
                );
                return Err(Error::upstream("failed to save mapping", e));
            }

            Ok(mapping)
        });

        task.await
            .map_err(|e| Error::Other(format!("update task failed: {}", e)))?
    }
}

/// Explicit IP if present (must parse), else derived from metadata
fn candidate_ip(request: &UpdateRequest, meta: &RequestMeta) -> Result<IpAddr> {
    match request.ip.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::validation("invalid IP address")),
        None => meta
            .client_ip()
            .ok_or_else(|| Error::validation("could not determine client IP")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ip_precedence() {
        let meta = RequestMeta::new().with_forwarded_for("198.51.100.7");

        let explicit = UpdateRequest::new("acme", "home").with_ip(" 203.0.113.42 ");
        assert_eq!(
            candidate_ip(&explicit, &meta).unwrap(),
            "203.0.113.42".parse::<IpAddr>().unwrap()
        );

        let implicit = UpdateRequest::new("acme", "home");
        assert_eq!(
            candidate_ip(&implicit, &meta).unwrap(),
            "198.51.100.7".parse::<IpAddr>().unwrap()
        );

        let bad = UpdateRequest::new("acme", "home").with_ip("not-an-ip");
        assert_eq!(
            candidate_ip(&bad, &meta).unwrap_err().description(),
            "invalid IP address"
        );

        let err = candidate_ip(&implicit, &RequestMeta::new()).unwrap_err();
        assert_eq!(err.description(), "could not determine client IP");
    }

    #[test]
    fn test_default_store_timeout_matches_config_default() {
        assert_eq!(
            crate::config::TimeoutConfig::default().store_timeout(),
            DEFAULT_STORE_TIMEOUT
        );
    }

    #[test]
    fn test_effective_subdomain_prefers_stored() {
        let now = Utc::now();
        let stored = Mapping::new("acme", "home", "203.0.113.1".parse().unwrap(), "homelab", now);
        assert_eq!(effective_subdomain(Some(&stored), "acme", "home"), "homelab");

        let blank = Mapping::new("acme", "home", "203.0.113.1".parse().unwrap(), "", now);
        assert_eq!(
            effective_subdomain(Some(&blank), "acme", "home"),
            subdomain::derive_label("acme", "home")
        );
        assert_eq!(
            effective_subdomain(None, "acme", "home"),
            subdomain::derive_label("acme", "home")
        );
    }
}
