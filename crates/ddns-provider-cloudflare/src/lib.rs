// # Cloudflare DNS Provider
//
// This crate submits DDNS record-change batches to Cloudflare API v4.
//
// ## Behavior
//
// - One `submit` resolves the zone, looks up the ids of the records the batch
//   touches, and sends a single `POST /zones/:zone_id/dns_records/batch`
// - Cloudflare applies the deletes, puts and posts of one batch as a unit,
//   so a rename (delete old + create new) never half-applies
// - `Create` fails if the record already exists, `Delete` fails if it does
//   not, `Upsert` becomes a put (existing record) or a post (new record)
// - Dry-run mode performs the lookups and logs the batch instead of sending it
// - No retries, no backoff, no caching between calls: failures go back to
//   the caller
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::traits::{
    ChangeAction, ChangeBatch, DnsProvider, DnsProviderFactory, RecordSet, RecordType,
};
use ddns_core::{Error, ProviderRegistry, Result};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the batch payload it would have sent
/// - **NOT** modify DNS records
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone ID (discovered from `root_domain` when absent)
    zone_id: Option<String>,

    /// Domain all managed records live under
    root_domain: String,

    /// API base URL
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip the batch POST
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("root_domain", &self.root_domain)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Body of `POST /zones/:zone_id/dns_records/batch`
#[derive(Debug, Default, Serialize)]
struct BatchPayload {
    deletes: Vec<RecordRef>,
    puts: Vec<RecordBody>,
    posts: Vec<RecordBody>,
}

impl BatchPayload {
    fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.puts.is_empty() && self.posts.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct RecordRef {
    id: String,
}

#[derive(Debug, Serialize)]
struct RecordBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    content: String,
    ttl: u32,
}

impl RecordBody {
    fn new(id: Option<String>, record: &RecordSet) -> Self {
        Self {
            id,
            name: record.name.clone(),
            record_type: record.record_type.as_str(),
            content: record.value.clone(),
            ttl: record.ttl,
        }
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone ID (discovered from `root_domain` when absent)
    /// - `root_domain`: Domain all managed records live under
    /// - `dry_run`: If true, perform lookups but skip the batch submission
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the token is empty or the HTTP client cannot
    /// be built.
    pub fn new(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        root_domain: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            root_domain: root_domain.into(),
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at a different API base URL
    pub fn with_base_url(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether batches are logged instead of submitted
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Get the zone ID for the root domain
    ///
    /// Uses the configured zone ID if there is one. Otherwise asks Cloudflare
    /// for the root domain, then for each parent domain in turn, and returns
    /// the first zone found.
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn zone_id(&self) -> Result<String> {
        if let Some(ref zone_id) = self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.clone());
        }

        for zone_name in zone_candidates(&self.root_domain) {
            tracing::debug!("Looking up zone ID for domain: {}", zone_name);

            let url = format!("{}/zones", self.api_base);
            let json = self
                .send(
                    self.client.get(&url).query(&[("name", zone_name)]),
                    "Zone lookup",
                )
                .await?;

            let zones = json["result"].as_array().ok_or_else(|| {
                Error::provider(PROVIDER, "Invalid response format: result is not an array")
            })?;

            if let Some(zone) = zones.first() {
                let zone_id = zone["id"].as_str().ok_or_else(|| {
                    Error::provider(PROVIDER, "Invalid response format: zone.id is not a string")
                })?;
                tracing::debug!("Found zone ID: {}", zone_id);
                return Ok(zone_id.to_string());
            }
        }

        Err(Error::not_found(format!(
            "Zone not found for domain: {}",
            self.root_domain
        )))
    }

    /// Find the id of an existing record
    ///
    /// Address records match on name and type. TXT records also match on
    /// content, since one name can carry several TXT values.
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn find_record_id(&self, zone_id: &str, record: &RecordSet) -> Result<Option<String>> {
        tracing::debug!(
            "Looking up record ID: {} (type: {})",
            record.name,
            record.record_type
        );

        let url = format!("{}/zones/{}/dns_records", self.api_base, zone_id);
        let json = self
            .send(
                self.client.get(&url).query(&[
                    ("name", record.name.as_str()),
                    ("type", record.record_type.as_str()),
                ]),
                "Record lookup",
            )
            .await?;

        let records = json["result"].as_array().ok_or_else(|| {
            Error::provider(PROVIDER, "Invalid response format: result is not an array")
        })?;

        let found = records.iter().find(|candidate| match record.record_type {
            RecordType::Txt => candidate["content"]
                .as_str()
                .is_some_and(|content| content.trim_matches('"') == record.value),
            RecordType::A | RecordType::Aaaa => true,
        });

        match found {
            Some(candidate) => {
                let id = candidate["id"].as_str().ok_or_else(|| {
                    Error::provider(PROVIDER, "Invalid response format: record.id is not a string")
                })?;
                tracing::debug!("Found record ID: {}", id);
                Ok(Some(id.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Translate a change batch into a Cloudflare batch payload
    async fn build_payload(&self, zone_id: &str, batch: &ChangeBatch) -> Result<BatchPayload> {
        let mut payload = BatchPayload::default();

        for change in &batch.changes {
            let record = &change.record;
            let existing = self.find_record_id(zone_id, record).await?;

            match (change.action, existing) {
                (ChangeAction::Delete, Some(id)) => payload.deletes.push(RecordRef { id }),
                (ChangeAction::Delete, None) => {
                    return Err(Error::provider(
                        PROVIDER,
                        format!(
                            "Cannot delete {} record {}: it does not exist",
                            record.record_type, record.name
                        ),
                    ));
                }
                (ChangeAction::Create, Some(_)) => {
                    return Err(Error::provider(
                        PROVIDER,
                        format!(
                            "Cannot create {} record {}: it already exists",
                            record.record_type, record.name
                        ),
                    ));
                }
                (ChangeAction::Create, None) | (ChangeAction::Upsert, None) => {
                    payload.posts.push(RecordBody::new(None, record))
                }
                (ChangeAction::Upsert, Some(id)) => {
                    payload.puts.push(RecordBody::new(Some(id), record))
                }
            }
        }

        Ok(payload)
    }

    /// Send an authenticated request and return the parsed envelope
    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<Value> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, action));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if json["success"].as_bool() == Some(false) {
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", action, api_errors(&json)),
            ));
        }

        Ok(json)
    }
}

/// Root domain first, then each parent that still has two labels
fn zone_candidates(root_domain: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = root_domain.trim_end_matches('.');
    while rest.contains('.') {
        candidates.push(rest);
        match rest.split_once('.') {
            Some((_, parent)) => rest = parent,
            None => break,
        }
    }
    candidates
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, error_text: &str, action: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{} failed: resource not found", action)),
        409 => Error::provider(
            PROVIDER,
            format!(
                "Conflict: Record is being updated by another process. Status: {}",
                status
            ),
        ),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!(
                "Cloudflare server error (transient): {} - {}",
                status, error_text
            ),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", action, status, error_text),
        ),
    }
}

/// Join the `errors[].message` entries of an API envelope
fn api_errors(json: &Value) -> String {
    let messages: Vec<&str> = json["errors"]
        .as_array()
        .map(|errors| errors.iter().filter_map(|e| e["message"].as_str()).collect())
        .unwrap_or_default();

    if messages.is_empty() {
        "no error details".to_string()
    } else {
        messages.join("; ")
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Apply a batch through the Cloudflare batch endpoint
    ///
    /// # API Calls
    ///
    /// ```http
    /// # Resolve record ids (one per change)
    /// GET /zones/:zone_id/dns_records?name=...&type=...
    ///
    /// # Apply (skipped in dry-run mode)
    /// POST /zones/:zone_id/dns_records/batch
    /// {
    ///   "deletes": [{ "id": "..." }],
    ///   "puts": [{ "id": "...", "name": "...", "type": "A", "content": "1.2.3.4", "ttl": 300 }],
    ///   "posts": [{ "name": "...", "type": "AAAA", "content": "2001:db8::1", "ttl": 300 }]
    /// }
    /// ```
    async fn submit(&self, batch: &ChangeBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        tracing::info!(
            changes = batch.len(),
            "Submitting Cloudflare DNS batch [mode: {}]",
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let zone_id = self.zone_id().await?;
        let payload = self.build_payload(&zone_id, batch).await?;

        if payload.is_empty() {
            return Ok(());
        }

        let url = format!("{}/zones/{}/dns_records/batch", self.api_base, zone_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        self.send(self.client.post(&url).json(&payload), "Batch update")
            .await?;

        for change in &batch.changes {
            tracing::info!(
                action = ?change.action,
                name = %change.record.name,
                record_type = %change.record.record_type,
                content = %change.record.value,
                "DNS record change applied"
            );
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig, root_domain: &str) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zone_id.clone(),
                    root_domain,
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::with_builtin_stores();
/// ddns_provider_cloudflare::register(&mut registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}
