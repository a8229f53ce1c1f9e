//! VPN client core: server catalog and connection orchestration
//!
//! Builds the tier-aware, secure-core-split country catalog from the VPN
//! service's server list and sequences connection attempts against the
//! service, publishing every state change on replay-latest broadcasters.
//! Background work runs on a Tokio runtime; UI callbacks are marshaled
//! through a bounded task queue (`dispatch`).

pub mod broadcast;
pub mod catalog;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod refresh;
pub mod runtime;
pub mod service;
pub mod settings;

#[cfg(test)]
mod testing;

pub use broadcast::{StateBroadcaster, Subscription};
pub use catalog::{CatalogStore, CountryAggregate, ServerCatalog, ServerRecord, Tier};
pub use client::ClientCore;
pub use connection::{AttemptOutcome, ConnectionOrchestrator, ConnectionState};
pub use dispatch::{ui_channel, UiHandle, UiLoop};
pub use error::{CoreError, CoreResult, ServiceError};
pub use refresh::{RefreshCoordinator, RefreshKind, RefreshOutcome};
pub use service::{ConnectionTarget, VpnService};
pub use settings::CoreConfig;

/// Initialise env_logger with the config's filter unless RUST_LOG is set.
/// Safe to call more than once.
pub fn init_logging(config: &CoreConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
    // Ignore errors if a logger is already installed
    let _ = env_logger::Builder::from_env(env).try_init();

    log::info!("vpn-catalog-core v{} initialising", env!("CARGO_PKG_VERSION"));
}
