// # ddnsd
//
// Thin integration layer shared by the `ddnsd` daemon and the `ddns-admin`
// tool. All DDNS logic lives in `ddns-core`; this crate only reads settings,
// wires components together and drives the client loop.

pub mod client;
pub mod services;
pub mod settings;
pub mod shutdown;

pub use client::{CheckOutcome, Reconciler};
pub use services::Services;
pub use settings::Settings;
pub use shutdown::{DdnsExitCode, ShutdownSignal};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global `FmtSubscriber`
pub fn init_tracing(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}
