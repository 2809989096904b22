//! Subdomain labels
//!
//! A mapping's label is either derived from its identity or assigned by an
//! administrator. Derived labels are the first 8 hex characters of the MD5
//! digest of `"{owner_id}-{location}"`. Existing DNS names depend on that exact
//! derivation, so the hash and the truncation length must never change.

use md5::{Digest, Md5};

use crate::{Error, Result};

/// Number of hex characters in a derived label
pub const LABEL_LENGTH: usize = 8;

/// Longest label DNS allows (RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Derive the stable label for an (owner, location) pair
///
/// Collisions between distinct pairs on the truncated digest are possible
/// and are not detected.
pub fn derive_label(owner_id: &str, location: &str) -> String {
    let digest = Md5::digest(format!("{}-{}", owner_id, location).as_bytes());
    let mut label = hex::encode(digest);
    label.truncate(LABEL_LENGTH);
    label
}

/// Check that `label` can be used as a single DNS label
///
/// # Rules
///
/// - 1 to 63 characters
/// - ASCII letters, digits and hyphen only
/// - no leading or trailing hyphen
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::validation("subdomain cannot be empty"));
    }

    if label.len() > MAX_LABEL_LENGTH {
        return Err(Error::validation(format!(
            "subdomain too long: {} chars (max {})",
            label.len(),
            MAX_LABEL_LENGTH
        )));
    }

    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::validation(format!(
            "subdomain contains invalid characters: '{}' (alphanumeric and hyphen only)",
            label
        )));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(Error::validation(format!(
            "subdomain cannot start or end with hyphen: '{}'",
            label
        )));
    }

    Ok(())
}

/// `{label}.{root_domain}`
pub fn fqdn(label: &str, root_domain: &str) -> String {
    format!("{}.{}", label, root_domain)
}

/// `_acme-challenge.{label}.{root_domain}`
pub fn acme_challenge_name(label: &str, root_domain: &str) -> String {
    format!("_acme-challenge.{}", fqdn(label, root_domain))
}
