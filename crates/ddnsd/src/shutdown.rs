//! Shutdown signal handling

use anyhow::Result;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for std::process::ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl DdnsExitCode {
    /// Exit code for an error that ended a run
    ///
    /// Configuration errors surfacing from the core are reported as
    /// configuration failures; everything else is a runtime failure.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<ddns_core::Error>() {
            Some(ddns_core::Error::Config(_)) => DdnsExitCode::ConfigError,
            _ => DdnsExitCode::RuntimeError,
        }
    }
}

/// SIGTERM and SIGINT listeners
///
/// Handlers are installed on construction so a failure to install them is a
/// startup error rather than a surprise during shutdown.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: Signal,
    #[cfg(unix)]
    sigint: Signal,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn new() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    #[cfg(not(unix))]
    pub fn new() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first shutdown signal and return its name
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }

    /// Wait for CTRL-C
    ///
    /// Fallback implementation for non-Unix platforms.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_error() {
        let config: anyhow::Error = ddns_core::Error::config("bad").into();
        assert_eq!(DdnsExitCode::for_error(&config), DdnsExitCode::ConfigError);

        let upstream: anyhow::Error = ddns_core::Error::no_consensus("split").into();
        assert_eq!(DdnsExitCode::for_error(&upstream), DdnsExitCode::RuntimeError);

        let other = anyhow::anyhow!("boom");
        assert_eq!(DdnsExitCode::for_error(&other), DdnsExitCode::RuntimeError);
    }
}
