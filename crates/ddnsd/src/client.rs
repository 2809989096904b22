//! Self-hosted client loop
//!
//! Resolves this host's public IP and reconciles the configured mapping
//! through the orchestrator in-process. The last reconciled IP is kept in
//! memory so an unchanged address costs one resolution and nothing else.

use ddns_core::{
    Error, IpFamily, IpSource, RequestMeta, Result, UpdateOrchestrator, UpdateRequest,
    UpdateResponse, VerifiedOwner,
};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Resolved IP equals the last reconciled one; the orchestrator was not called
    Skipped { ip: IpAddr },
    /// The orchestrator accepted the request
    Reconciled(UpdateResponse),
    /// The hourly change budget is spent
    RateLimited { retry_after_secs: u64 },
}

/// Keeps one mapping pointed at this host's public IP
pub struct Reconciler {
    source: Arc<dyn IpSource>,
    orchestrator: UpdateOrchestrator,
    caller: VerifiedOwner,
    location: String,
    family: IpFamily,
    last_ip: Option<IpAddr>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn IpSource>,
        orchestrator: UpdateOrchestrator,
        owner_id: impl Into<String>,
        location: impl Into<String>,
        family: IpFamily,
    ) -> Self {
        Self {
            source,
            orchestrator,
            caller: VerifiedOwner::new(owner_id),
            location: location.into(),
            family,
            last_ip: None,
        }
    }

    /// Last IP the orchestrator accepted, if any
    pub fn last_ip(&self) -> Option<IpAddr> {
        self.last_ip
    }

    /// Resolve the public IP once and reconcile it
    ///
    /// # Returns
    ///
    /// - `Ok(CheckOutcome)`: Skipped, reconciled or rate limited
    /// - `Err(Error)`: Resolution or reconciliation failed
    pub async fn check(&mut self) -> Result<CheckOutcome> {
        let ip = self.source.current(self.family).await?;

        if self.last_ip == Some(ip) {
            debug!(ip = %ip, source = self.source.source_name(), "Public IP unchanged, skipping update");
            return Ok(CheckOutcome::Skipped { ip });
        }

        let request = UpdateRequest::new(self.caller.owner_id(), self.location.as_str())
            .with_ip(ip.to_string());

        match self
            .orchestrator
            .update(&self.caller, &request, &RequestMeta::new())
            .await
        {
            Ok(response) => {
                self.last_ip = Some(ip);
                if response.changed {
                    info!(fqdn = %response.fqdn, ip = %response.ip, "DNS record updated");
                } else {
                    info!(fqdn = %response.fqdn, ip = %response.ip, "Mapping already current");
                }
                Ok(CheckOutcome::Reconciled(response))
            }
            Err(e @ Error::RateLimited { .. }) => {
                let retry_after_secs = e.retry_after_secs().unwrap_or(1);
                warn!(ip = %ip, retry_after_secs, "{}", e.description());
                Ok(CheckOutcome::RateLimited { retry_after_secs })
            }
            Err(e) => Err(e),
        }
    }

    /// Check every `interval` until `shutdown` resolves
    ///
    /// The first check runs immediately. Retryable failures are logged and
    /// the loop continues; anything else stops the loop with an error.
    pub async fn run<F>(mut self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping update loop");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.check().await {
                        Ok(_) => {}
                        Err(e) if e.is_retryable() => {
                            warn!("Check failed, retrying next interval: {}", e);
                        }
                        Err(e) => {
                            error!("Check failed permanently: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}
