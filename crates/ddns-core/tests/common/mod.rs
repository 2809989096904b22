//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record what the core asks
//! of its collaborators and can be told to fail.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use ddns_core::error::{Error, Result};
use ddns_core::mapping::Mapping;
use ddns_core::traits::{ChangeBatch, DnsProvider, MappingStore};
use ddns_core::{DnsRecordService, MemoryMappingStore, RateLimiter, UpdateOrchestrator};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ROOT_DOMAIN: &str = "ddns.example.com";

/// A DnsProvider that records every batch
pub struct RecordingDnsProvider {
    /// Call counter for submit()
    submit_call_count: Arc<AtomicUsize>,
    /// Batches received, in order
    batches: Arc<Mutex<Vec<ChangeBatch>>>,
    /// Calls with an index >= this value fail
    fail_from: Arc<AtomicUsize>,
    /// Artificial latency per call
    delay: Duration,
}

impl RecordingDnsProvider {
    pub fn new() -> Self {
        Self {
            submit_call_count: Arc::new(AtomicUsize::new(0)),
            batches: Arc::new(Mutex::new(Vec::new())),
            fail_from: Arc::new(AtomicUsize::new(usize::MAX)),
            delay: Duration::ZERO,
        }
    }

    /// Delay every submit by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call from now on
    pub fn fail_all(&self) {
        self.fail_from.store(0, Ordering::SeqCst);
    }

    /// Let the first `n` calls succeed and fail the rest
    pub fn fail_after(&self, n: usize) {
        self.fail_from.store(n, Ordering::SeqCst);
    }

    /// Get the number of times submit() was called
    pub fn submit_call_count(&self) -> usize {
        self.submit_call_count.load(Ordering::SeqCst)
    }

    /// Get the batches that were accepted or rejected, in call order
    pub fn batches(&self) -> Vec<ChangeBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Create a new RecordingDnsProvider that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            submit_call_count: Arc::clone(&other.submit_call_count),
            batches: Arc::clone(&other.batches),
            fail_from: Arc::clone(&other.fail_from),
            delay: other.delay,
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingDnsProvider {
    async fn submit(&self, batch: &ChangeBatch) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let index = self.submit_call_count.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch.clone());

        if index >= self.fail_from.load(Ordering::SeqCst) {
            return Err(Error::provider("recording", "simulated provider outage"));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// A MappingStore wrapping the memory store with switchable failures
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryMappingStore,
    fail_get: Arc<AtomicBool>,
    fail_put: Arc<AtomicBool>,
    fail_update_subdomain: Arc<AtomicBool>,
    put_call_count: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryMappingStore::new(),
            fail_get: Arc::new(AtomicBool::new(false)),
            fail_put: Arc::new(AtomicBool::new(false)),
            fail_update_subdomain: Arc::new(AtomicBool::new(false)),
            put_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update_subdomain(&self, fail: bool) {
        self.fail_update_subdomain.store(fail, Ordering::SeqCst);
    }

    /// Get the number of put() calls, failed ones included
    pub fn put_call_count(&self) -> usize {
        self.put_call_count.load(Ordering::SeqCst)
    }

    /// Seed a mapping without counting it as a put
    pub async fn seed(&self, mapping: Mapping) {
        self.inner.put(&mapping).await.unwrap();
    }

    /// Read a mapping, bypassing failure switches
    pub async fn peek(&self, owner_id: &str, location: &str) -> Option<Mapping> {
        self.inner.get(owner_id, location).await.unwrap()
    }
}

#[async_trait::async_trait]
impl MappingStore for FlakyStore {
    async fn get(&self, owner_id: &str, location: &str) -> Result<Option<Mapping>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Error::state_store("simulated read failure"));
        }
        self.inner.get(owner_id, location).await
    }

    async fn put(&self, mapping: &Mapping) -> Result<()> {
        self.put_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Error::state_store("simulated write failure"));
        }
        self.inner.put(mapping).await
    }

    async fn update_subdomain(&self, owner_id: &str, location: &str, subdomain: &str) -> Result<()> {
        if self.fail_update_subdomain.load(Ordering::SeqCst) {
            return Err(Error::state_store("simulated write failure"));
        }
        self.inner.update_subdomain(owner_id, location, subdomain).await
    }

    async fn list(&self) -> Result<Vec<Mapping>> {
        self.inner.list().await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Fixed instant on 2025-03-14
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, h, m, s).unwrap()
}

/// Provider and store wired into an orchestrator with the default limit
pub fn orchestrator(store: &FlakyStore, provider: &RecordingDnsProvider) -> UpdateOrchestrator {
    orchestrator_with_limit(store, provider, 2)
}

pub fn orchestrator_with_limit(
    store: &FlakyStore,
    provider: &RecordingDnsProvider,
    max_changes_per_hour: u32,
) -> UpdateOrchestrator {
    UpdateOrchestrator::new(
        Arc::new(store.clone()),
        dns_service(provider),
        RateLimiter::new(max_changes_per_hour),
    )
}

pub fn dns_service(provider: &RecordingDnsProvider) -> DnsRecordService {
    DnsRecordService::new(
        Arc::new(RecordingDnsProvider::sharing_counters_with(provider)),
        ROOT_DOMAIN,
    )
}

/// Make every later write to the file store at `path` fail
///
/// The store writes to a sibling `.tmp` file and renames it into place; a
/// directory sitting on that name stops the write before the rename.
pub fn block_file_store_writes(path: &Path) -> PathBuf {
    let mut temp = path.to_path_buf();
    temp.set_extension("tmp");
    std::fs::create_dir(&temp).unwrap();
    temp
}
