// # ddnsd - DDNS Daemon
//
// Keeps one (owner, location) mapping pointed at this host's public IP.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables (see `settings`)
// 2. Initializing logging and the runtime
// 3. Registering the provider and building the core components
// 4. Resolving the public IP by consensus and reconciling it on an interval,
//    or once with `DDNS_RUN_ONCE=true`
//
// ## Example
//
// ```bash
// export DDNS_OWNER=acme
// export DDNS_LOCATION=home
// export DDNS_ROOT_DOMAIN=ddns.example.com
// export DDNS_PROVIDER_API_TOKEN=your_token
// export DDNS_STORE_TYPE=file
// export DDNS_STORE_PATH=/var/lib/ddns/mappings.json
//
// ddnsd
// ```

use anyhow::Result;
use ddns_ip_consensus::ConsensusResolver;
use ddnsd::{CheckOutcome, DdnsExitCode, Reconciler, Services, Settings, ShutdownSignal};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate().and_then(|_| settings.identity().map(|_| ())) {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let log_level = match settings.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = ddnsd::init_tracing(log_level) {
        eprintln!("{}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(settings).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DdnsExitCode::for_error(&e)
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(settings: Settings) -> Result<()> {
    let (owner, location) = settings.identity()?;
    let services = Services::build(&settings.service_config()).await?;
    let resolver = ConsensusResolver::new(settings.resolver_config())?;

    info!(
        owner = %owner,
        location = %location,
        family = %settings.ip_family,
        dry_run = settings.dry_run,
        "Managing mapping"
    );

    let mut reconciler = Reconciler::new(
        Arc::new(resolver),
        services.orchestrator.clone(),
        owner,
        location,
        settings.ip_family,
    );

    if settings.run_once {
        match reconciler.check().await? {
            CheckOutcome::Reconciled(response) => {
                info!(fqdn = %response.fqdn, ip = %response.ip, changed = response.changed, "Check complete");
            }
            CheckOutcome::RateLimited { retry_after_secs } => {
                warn!(retry_after_secs, "Check complete, update deferred by rate limit");
            }
            CheckOutcome::Skipped { ip } => {
                info!(ip = %ip, "Check complete, nothing to do");
            }
        }
    } else {
        let mut shutdown = ShutdownSignal::new()?;
        info!(
            interval_secs = settings.check_interval_secs,
            "Ready to monitor IP changes"
        );

        reconciler
            .run(settings.check_interval(), async move {
                let signal = shutdown.recv().await;
                info!("Received shutdown signal: {}", signal);
            })
            .await?;
    }

    services.store.flush().await?;
    info!("Shutting down daemon");
    Ok(())
}
