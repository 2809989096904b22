// # DNS Record Service
//
// Turns labels into fully-qualified records under the root domain and submits
// them through a `DnsProvider`. Every record is written with `RECORD_TTL`.
//
// Provider failures are not retried here. Each call is bounded by the
// configured timeout and surfaces a single error.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::subdomain;
use crate::traits::dns_provider::{ChangeBatch, DnsProvider, RecordSet};
use crate::{Error, Result};

/// TTL applied to every record this service writes (seconds)
pub const RECORD_TTL: u32 = 300;

const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(10);

/// Record operations against the root domain
#[derive(Clone)]
pub struct DnsRecordService {
    provider: Arc<dyn DnsProvider>,
    root_domain: String,
    timeout: Duration,
}

impl fmt::Debug for DnsRecordService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsRecordService")
            .field("provider", &self.provider.provider_name())
            .field("root_domain", &self.root_domain)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DnsRecordService {
    /// Create a service writing under `root_domain`
    pub fn new(provider: Arc<dyn DnsProvider>, root_domain: impl Into<String>) -> Self {
        Self {
            provider,
            root_domain: root_domain.into(),
            timeout: DEFAULT_DNS_TIMEOUT,
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// `{label}.{root_domain}`
    pub fn fqdn(&self, label: &str) -> String {
        subdomain::fqdn(label, &self.root_domain)
    }

    /// `_acme-challenge.{label}.{root_domain}`
    pub fn acme_challenge_name(&self, label: &str) -> String {
        subdomain::acme_challenge_name(label, &self.root_domain)
    }

    /// Create or overwrite the address record for `subdomain`
    ///
    /// IPv4 addresses produce an A record, IPv6 addresses an AAAA record.
    pub async fn upsert_a(&self, subdomain: &str, ip: IpAddr) -> Result<()> {
        let batch = ChangeBatch::new().upsert(RecordSet::for_ip(self.fqdn(subdomain), ip, RECORD_TTL));
        tracing::debug!(subdomain = %subdomain, ip = %ip, "Upserting address record");
        self.submit(&batch).await
    }

    /// Create or overwrite a TXT record at `{name}.{root_domain}`
    pub async fn upsert_txt(&self, name: &str, value: &str) -> Result<()> {
        let batch = ChangeBatch::new().upsert(RecordSet::txt(self.fqdn(name), value, RECORD_TTL));
        tracing::debug!(name = %name, "Upserting TXT record");
        self.submit(&batch).await
    }

    /// Delete the TXT record at `{name}.{root_domain}` holding `value`
    pub async fn delete_txt(&self, name: &str, value: &str) -> Result<()> {
        let batch = ChangeBatch::new().delete(RecordSet::txt(self.fqdn(name), value, RECORD_TTL));
        tracing::debug!(name = %name, "Deleting TXT record");
        self.submit(&batch).await
    }

    /// Move the address record for `ip` from `old` to `new`
    ///
    /// Submitted as one batch (delete old, create new) so providers that
    /// support atomic batches apply both or neither.
    pub async fn rename_a(&self, old: &str, new: &str, ip: IpAddr) -> Result<()> {
        let batch = ChangeBatch::new()
            .delete(RecordSet::for_ip(self.fqdn(old), ip, RECORD_TTL))
            .create(RecordSet::for_ip(self.fqdn(new), ip, RECORD_TTL));
        tracing::debug!(old = %old, new = %new, ip = %ip, "Renaming address record");
        self.submit(&batch).await
    }

    async fn submit(&self, batch: &ChangeBatch) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.provider.submit(batch)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "{} did not answer within {:?}",
                self.provider.provider_name(),
                self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::dns_provider::{ChangeAction, RecordType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingProvider {
        batches: Mutex<Vec<ChangeBatch>>,
    }

    #[async_trait]
    impl DnsProvider for CapturingProvider {
        async fn submit(&self, batch: &ChangeBatch) -> Result<()> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "capturing"
        }
    }

    struct StalledProvider;

    #[async_trait]
    impl DnsProvider for StalledProvider {
        async fn submit(&self, _batch: &ChangeBatch) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_upsert_a_builds_fqdn_and_type() {
        let provider = Arc::new(CapturingProvider::default());
        let dns = DnsRecordService::new(provider.clone(), "ddns.example.com");

        dns.upsert_a("a1b2c3d4", "203.0.113.42".parse().unwrap()).await.unwrap();
        dns.upsert_a("a1b2c3d4", "2001:db8::1".parse().unwrap()).await.unwrap();

        let batches = provider.batches.lock().unwrap();
        let v4 = &batches[0].changes[0];
        assert_eq!(v4.action, ChangeAction::Upsert);
        assert_eq!(v4.record.name, "a1b2c3d4.ddns.example.com");
        assert_eq!(v4.record.record_type, RecordType::A);
        assert_eq!(v4.record.ttl, RECORD_TTL);

        assert_eq!(batches[1].changes[0].record.record_type, RecordType::Aaaa);
    }

    #[tokio::test]
    async fn test_rename_is_one_batch() {
        let provider = Arc::new(CapturingProvider::default());
        let dns = DnsRecordService::new(provider.clone(), "ddns.example.com");

        dns.rename_a("old", "new", "203.0.113.42".parse().unwrap()).await.unwrap();

        let batches = provider.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let changes = &batches[0].changes;
        assert_eq!(changes[0].action, ChangeAction::Delete);
        assert_eq!(changes[0].record.name, "old.ddns.example.com");
        assert_eq!(changes[1].action, ChangeAction::Create);
        assert_eq!(changes[1].record.name, "new.ddns.example.com");
        assert_eq!(changes[1].record.value, "203.0.113.42");
    }

    #[tokio::test]
    async fn test_txt_records() {
        let provider = Arc::new(CapturingProvider::default());
        let dns = DnsRecordService::new(provider.clone(), "ddns.example.com");

        dns.upsert_txt("_acme-challenge.a1b2c3d4", "token").await.unwrap();
        dns.delete_txt("_acme-challenge.a1b2c3d4", "token").await.unwrap();

        let batches = provider.batches.lock().unwrap();
        assert_eq!(
            batches[0].changes[0].record.name,
            dns.acme_challenge_name("a1b2c3d4")
        );
        assert_eq!(batches[0].changes[0].record.record_type, RecordType::Txt);
        assert_eq!(batches[1].changes[0].action, ChangeAction::Delete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_provider_times_out() {
        let dns = DnsRecordService::new(Arc::new(StalledProvider), "ddns.example.com")
            .with_timeout(Duration::from_secs(2));

        let err = dns
            .upsert_a("a1b2c3d4", "203.0.113.42".parse().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
