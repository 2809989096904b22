//! Error types for the DDNS service
//!
//! Every failure the core can produce maps to one variant here. Callers that
//! sit in front of the core (HTTP glue, the daemon, the admin tool) only need
//! [`Error::description`], [`Error::status_code`] and
//! [`Error::retry_after_secs`] to build a user-visible response.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS service
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The verified caller does not own the requested resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Too many IP changes in the current wall-clock hour
    #[error("rate limit exceeded: maximum {limit} IP changes per hour (retry after {}s)", retry_after.as_secs())]
    RateLimited {
        /// Time until the next hour boundary
        retry_after: Duration,
        /// Configured hourly limit
        limit: u32,
    },

    /// A backing system failed while performing `operation`
    #[error("{operation}: {source}")]
    Upstream {
        /// Fixed description of the step that failed
        operation: &'static str,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// DNS provider-related errors
    #[error("DNS provider error: {0}")]
    DnsProvider(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Mapping store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// An outbound call exceeded its time budget
    #[error("timed out: {0}")]
    Timeout(String),

    /// Public IP authorities did not agree
    #[error("no consensus: {0}")]
    NoConsensus(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A two-phase change failed and its compensating action failed too
    #[error("{original} (compensation failed: {compensation})")]
    Compensation {
        /// The failure that triggered compensation
        original: Box<Error>,
        /// Why the compensating action failed
        compensation: Box<Error>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(retry_after: Duration, limit: u32) -> Self {
        Self::RateLimited { retry_after, limit }
    }

    /// Wrap a backing-system failure with the step that produced it
    pub fn upstream(operation: &'static str, source: Error) -> Self {
        Self::Upstream {
            operation,
            source: Box::new(source),
        }
    }

    /// Create a DNS provider error
    pub fn dns_provider(msg: impl Into<String>) -> Self {
        Self::DnsProvider(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a "no consensus" error
    pub fn no_consensus(msg: impl Into<String>) -> Self {
        Self::NoConsensus(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Fixed, machine-readable description suitable for an error body.
    ///
    /// Upstream details (provider messages, file paths) are not included;
    /// they belong in logs.
    pub fn description(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Authentication(_) => "unauthorized".to_string(),
            Error::Forbidden(_) => "forbidden".to_string(),
            Error::RateLimited { limit, .. } => {
                format!("rate limit exceeded: maximum {limit} IP changes per hour")
            }
            Error::Upstream { operation, .. } => (*operation).to_string(),
            Error::NotFound(_) => "mapping not found".to_string(),
            Error::NoConsensus(_) => "could not determine public IP".to_string(),
            Error::Compensation { original, .. } => original.description(),
            Error::Timeout(_) => "upstream timeout".to_string(),
            Error::Config(_) => "service misconfigured".to_string(),
            _ => "internal server error".to_string(),
        }
    }

    /// HTTP-equivalent status class for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Authentication(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::RateLimited { .. } => 429,
            Error::NoConsensus(_) => 503,
            Error::Compensation { original, .. } => original.status_code(),
            _ => 500,
        }
    }

    /// Retry delay in whole seconds for rate-limit errors.
    ///
    /// Rounded up so a caller never sees `0` while the window is still closed.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        }
    }

    /// Whether the caller may retry the whole request as-is
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Upstream { .. }
            | Error::DnsProvider(_)
            | Error::Provider { .. }
            | Error::StateStore(_)
            | Error::Timeout(_)
            | Error::NoConsensus(_)
            | Error::Io(_) => true,
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
