// # Subdomain Migration
//
// Administrative rename of a mapping's DNS label.
//
// Two phases across two independently failing backends:
//
// 1. DNS: one batch deleting the old address record and creating the new one
// 2. Store: replace the mapping's subdomain (IP and timestamps untouched)
//
// If phase 2 fails after phase 1 succeeded, the DNS batch is reversed. A
// failed reversal is reported as `Error::Compensation` and is not retried;
// the operator has to reconcile by hand.

use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::dns::DnsRecordService;
use crate::error::{Error, Result};
use crate::orchestrator::{DEFAULT_STORE_TIMEOUT, bounded, effective_subdomain};
use crate::subdomain;
use crate::traits::MappingStore;

/// Old and new names of a (planned or completed) rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub owner_id: String,
    pub location: String,
    pub old_subdomain: String,
    pub new_subdomain: String,
    pub old_fqdn: String,
    pub new_fqdn: String,
    pub ip: IpAddr,
}

/// Renames mapping subdomains
pub struct SubdomainMigrator {
    store: Arc<dyn MappingStore>,
    dns: DnsRecordService,
    store_timeout: Duration,
}

impl SubdomainMigrator {
    pub fn new(store: Arc<dyn MappingStore>, dns: DnsRecordService) -> Self {
        Self {
            store,
            dns,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the per-call store timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Validate a rename without writing anything
    ///
    /// Performs the same reads and checks as [`migrate`](Self::migrate).
    pub async fn plan(
        &self,
        owner_id: &str,
        location: &str,
        new_subdomain: &str,
    ) -> Result<MigrationOutcome> {
        subdomain::validate_label(new_subdomain)?;

        let mapping = bounded(self.store_timeout, self.store.get(owner_id, location))
            .await
            .map_err(|e| Error::upstream("failed to get mapping", e))?
            .ok_or_else(|| Error::not_found(format!("{}/{}", owner_id, location)))?;

        if mapping.ip.trim().is_empty() {
            return Err(Error::validation("mapping has no IP address"));
        }
        let ip = mapping
            .ip_addr()
            .ok_or_else(|| Error::validation("mapping has an invalid IP address"))?;

        let old_subdomain = effective_subdomain(Some(&mapping), owner_id, location);
        if old_subdomain == new_subdomain {
            return Err(Error::validation("new subdomain matches current subdomain"));
        }

        Ok(MigrationOutcome {
            owner_id: owner_id.to_string(),
            location: location.to_string(),
            old_fqdn: self.dns.fqdn(&old_subdomain),
            new_fqdn: self.dns.fqdn(new_subdomain),
            old_subdomain,
            new_subdomain: new_subdomain.to_string(),
            ip,
        })
    }

    /// Rename the mapping's subdomain in DNS and in the store
    ///
    /// # Returns
    ///
    /// - `Ok(MigrationOutcome)`: Both phases succeeded
    /// - `Err(Error::Upstream)`: A phase failed; DNS was restored if needed
    /// - `Err(Error::Compensation)`: The store failed and restoring DNS failed too
    pub async fn migrate(
        &self,
        owner_id: &str,
        location: &str,
        new_subdomain: &str,
    ) -> Result<MigrationOutcome> {
        let plan = self.plan(owner_id, location, new_subdomain).await?;

        info!(
            owner = %owner_id,
            location = %location,
            old = %plan.old_subdomain,
            new = %plan.new_subdomain,
            ip = %plan.ip,
            "Changing subdomain"
        );

        self.dns
            .rename_a(&plan.old_subdomain, &plan.new_subdomain, plan.ip)
            .await
            .map_err(|e| {
                error!("DNS rename failed: {}", e);
                Error::upstream("failed to update DNS record", e)
            })?;

        let stored = bounded(
            self.store_timeout,
            self.store
                .update_subdomain(owner_id, location, &plan.new_subdomain),
        )
        .await;

        if let Err(e) = stored {
            warn!("Mapping update failed, reverting DNS rename: {}", e);
            let original = Error::upstream("failed to save mapping", e);

            return match self
                .dns
                .rename_a(&plan.new_subdomain, &plan.old_subdomain, plan.ip)
                .await
            {
                Ok(()) => Err(original),
                Err(compensation) => {
                    error!(
                        old_fqdn = %plan.old_fqdn,
                        new_fqdn = %plan.new_fqdn,
                        "DNS revert failed, manual intervention required: {}",
                        compensation
                    );
                    Err(Error::Compensation {
                        original: Box::new(original),
                        compensation: Box::new(compensation),
                    })
                }
            };
        }

        info!(old_fqdn = %plan.old_fqdn, new_fqdn = %plan.new_fqdn, "Subdomain changed");
        Ok(plan)
    }
}
