// # Mapping Model
//
// The persisted (owner, location) -> IP/subdomain record, plus the request and
// response shapes the orchestrator exchanges with whatever sits in front of it.
//
// All wire types serialize as camelCase JSON. Timestamps are RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::{Error, Result};

/// Persisted mapping for one (owner, location) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    /// Owning tenant
    pub owner_id: String,

    /// Named endpoint under the owner
    pub location: String,

    /// Current address in canonical string form; empty when never set
    #[serde(default)]
    pub ip: String,

    /// DNS label; empty when never assigned
    #[serde(default)]
    pub subdomain: String,

    /// Last write of any kind
    pub updated_at: DateTime<Utc>,

    /// Last write that changed `ip`
    #[serde(default, rename = "lastIPChangeAt")]
    pub last_ip_change_at: Option<DateTime<Utc>>,

    /// IP changes counted in the hour of `last_ip_change_at`
    #[serde(default)]
    pub hourly_change_count: u32,
}

impl Mapping {
    /// Create a mapping with no change history
    pub fn new(
        owner_id: impl Into<String>,
        location: impl Into<String>,
        ip: IpAddr,
        subdomain: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            location: location.into(),
            ip: ip.to_string(),
            subdomain: subdomain.into(),
            updated_at: now,
            last_ip_change_at: None,
            hourly_change_count: 0,
        }
    }

    /// Parsed form of the stored address, if any
    pub fn ip_addr(&self) -> Option<IpAddr> {
        self.ip.trim().parse().ok()
    }

    /// Whether the stored address equals `ip`
    ///
    /// Compared as parsed addresses so that differently-written forms of the
    /// same IPv6 address are equal.
    pub fn has_ip(&self, ip: &IpAddr) -> bool {
        self.ip_addr().as_ref() == Some(ip)
    }

    /// Key used by stores
    pub fn key(&self) -> (String, String) {
        (self.owner_id.clone(), self.location.clone())
    }
}

/// Update request as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub owner_id: String,
    pub location: String,
    /// Explicit address; resolved from transport metadata when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl UpdateRequest {
    pub fn new(owner_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            location: location.into(),
            ip: None,
        }
    }

    /// Set an explicit address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Reject requests with missing identity fields
    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(Error::validation("ownerId is required"));
        }
        if self.location.trim().is_empty() {
            return Err(Error::validation("location is required"));
        }
        Ok(())
    }
}

/// Successful update or lookup result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub owner_id: String,
    pub location: String,
    pub ip: String,
    pub subdomain: String,
    /// `{subdomain}.{rootDomain}`
    pub fqdn: String,
    /// False when the submitted address matched the stored one
    pub changed: bool,
    pub updated_at: DateTime<Utc>,
}

impl UpdateResponse {
    pub(crate) fn from_mapping(mapping: &Mapping, subdomain: &str, fqdn: String, changed: bool) -> Self {
        Self {
            owner_id: mapping.owner_id.clone(),
            location: mapping.location.clone(),
            ip: mapping.ip.clone(),
            subdomain: subdomain.to_string(),
            fqdn,
            changed,
            updated_at: mapping.updated_at,
        }
    }
}

/// Error body returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub description: String,
    /// Seconds until a rate-limited caller may retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            description: err.description(),
            retry_after: err.retry_after_secs(),
        }
    }
}

/// Transport metadata used when a request carries no explicit IP
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Raw `X-Forwarded-For` value
    pub forwarded_for: Option<String>,
    /// Direct peer address, with or without a port
    pub remote_addr: Option<String>,
}

impl RequestMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    pub fn with_remote_addr(mut self, value: impl Into<String>) -> Self {
        self.remote_addr = Some(value.into());
        self
    }

    /// Client address derived from the metadata
    ///
    /// The first comma-separated entry of the forwarded header wins; the
    /// direct peer address is used only when no forwarded entry parses.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|value| value.split(',').next())
            .and_then(parse_addr);

        forwarded.or_else(|| self.remote_addr.as_deref().and_then(parse_addr))
    }
}

fn parse_addr(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

/// Owner identity established by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedOwner(String);

impl VerifiedOwner {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self(owner_id.into())
    }

    pub fn owner_id(&self) -> &str {
        &self.0
    }

    /// Fail with `Forbidden` unless this identity owns `owner_id`
    pub fn authorize(&self, owner_id: &str) -> Result<()> {
        if self.0 == owner_id {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "caller {} may not modify owner {}",
                self.0, owner_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let meta = RequestMeta::new()
            .with_forwarded_for(" 198.51.100.7 , 10.0.0.1")
            .with_remote_addr("192.0.2.1:4431");
        assert_eq!(meta.client_ip(), Some("198.51.100.7".parse().unwrap()));
    }

    #[test]
    fn test_remote_addr_fallback_strips_port() {
        let meta = RequestMeta::new().with_remote_addr("[2001:db8::1]:8080");
        assert_eq!(meta.client_ip(), Some("2001:db8::1".parse().unwrap()));

        let meta = RequestMeta::new()
            .with_forwarded_for("unknown")
            .with_remote_addr("192.0.2.1");
        assert_eq!(meta.client_ip(), Some("192.0.2.1".parse().unwrap()));

        assert_eq!(RequestMeta::new().client_ip(), None);
    }

    #[test]
    fn test_request_validation_messages() {
        let err = UpdateRequest::new(" ", "home").validate().unwrap_err();
        assert_eq!(err.description(), "ownerId is required");

        let err = UpdateRequest::new("acme", "").validate().unwrap_err();
        assert_eq!(err.description(), "location is required");

        assert!(UpdateRequest::new("acme", "home").validate().is_ok());
    }

    #[test]
    fn test_mapping_json_shape() {
        let now = Utc::now();
        let mut mapping = Mapping::new("acme", "home", "2001:db8::1".parse().unwrap(), "a1b2c3d4", now);
        mapping.last_ip_change_at = Some(now);
        mapping.hourly_change_count = 1;

        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["ownerId"], "acme");
        assert_eq!(json["hourlyChangeCount"], 1);
        assert!(json.get("lastIPChangeAt").is_some());

        let back: Mapping = serde_json::from_value(json).unwrap();
        assert_eq!(back, mapping);
        assert!(back.has_ip(&"2001:0db8:0:0::1".parse().unwrap()));
    }

    #[test]
    fn test_verified_owner_authorize() {
        let owner = VerifiedOwner::new("acme");
        assert!(owner.authorize("acme").is_ok());
        assert_eq!(owner.authorize("other").unwrap_err().status_code(), 403);
    }
}
