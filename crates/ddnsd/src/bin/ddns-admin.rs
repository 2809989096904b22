//! Administrative commands for the DDNS service
//!
//! Reads the same `DDNS_*` environment as `ddnsd` for the root domain,
//! provider and store. Owner and location come from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use ddns_core::IpFamily;
use ddns_ip_consensus::ConsensusResolver;
use ddnsd::{DdnsExitCode, Services, Settings};
use std::process::ExitCode;
use tracing::{error, warn};

/// DDNS administration
#[derive(Parser, Debug)]
#[command(name = "ddns-admin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rename a mapping's DNS label (DNS first, then the store)
    ChangeSubdomain {
        /// Owner id of the mapping
        #[arg(long)]
        owner: String,

        /// Location of the mapping
        #[arg(long)]
        location: String,

        /// New DNS label
        #[arg(long)]
        subdomain: String,

        /// Validate and print the rename without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print this host's public IP as agreed by the authorities
    PublicIp {
        /// Resolve an IPv6 address instead of IPv4
        #[arg(short = '6', long = "ipv6")]
        ipv6: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

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

    let rt = match tokio::runtime::Builder::new_current_thread()
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
        match run(cli.command, settings).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                DdnsExitCode::for_error(&e)
            }
        }
    });

    result.into()
}

async fn run(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::ChangeSubdomain {
            owner,
            location,
            subdomain,
            dry_run,
        } => {
            settings.validate()?;
            if settings.store_type == "memory" {
                warn!("DDNS_STORE_TYPE=memory holds no mappings across runs; set DDNS_STORE_TYPE=file");
            }

            let services = Services::build(&settings.service_config()).await?;
            let outcome = if dry_run {
                services.migrator.plan(&owner, &location, &subdomain).await?
            } else {
                services.migrator.migrate(&owner, &location, &subdomain).await?
            };
            services.store.flush().await?;

            let verb = if dry_run { "Would rename" } else { "Renamed" };
            println!("{} {} -> {}", verb, outcome.old_fqdn, outcome.new_fqdn);
            println!("IP: {}", outcome.ip);
        }
        Commands::PublicIp { ipv6 } => {
            let family = if ipv6 { IpFamily::V6 } else { IpFamily::V4 };
            let resolver = ConsensusResolver::new(settings.resolver_config())?;
            let ip = resolver.resolve(family).await?;
            println!("{}", ip);
        }
    }
    Ok(())
}
