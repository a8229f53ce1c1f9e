//! Call surface of the external VPN service.
//!
//! Certificate issuance, tunnel setup and kill-switch enforcement live behind
//! this trait. The core only sequences the calls and shapes their results.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::catalog::{Feature, RawServer, Tier};
use crate::error::ServiceError;

/// Where `fetch_servers` should read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSource {
    /// Locally cached list; fails with `CacheMissing` when there is none
    Cache,
    /// Fresh list from the API
    Live,
}

/// What the user asked to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionTarget {
    /// Quick connect: the service picks the fastest eligible server
    Fastest,
    Random,
    /// Fastest server in a country (exit country code)
    Country(String),
    /// A specific server by name
    Server(String),
    /// Fastest server offering a feature (P2P, Tor, ...)
    Feature(Feature),
    /// Fastest free-tier server
    Free,
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Fastest => write!(f, "fastest server"),
            ConnectionTarget::Random => write!(f, "random server"),
            ConnectionTarget::Country(code) => write!(f, "country {}", code),
            ConnectionTarget::Server(name) => write!(f, "server {}", name),
            ConnectionTarget::Feature(feature) => write!(f, "fastest {} server", feature),
            ConnectionTarget::Free => write!(f, "fastest free server"),
        }
    }
}

/// Server the service settled on during `setup_connection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub server_name: String,
    pub entry_country: String,
    pub exit_country: String,
    pub city: Option<String>,
    pub protocol: String,
    pub secure_core: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Activated,
    Failed,
}

/// Result of `connect`. A `Failed` activation carries the service's reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub state: ActivationState,
    pub reason: Option<String>,
}

impl ConnectOutcome {
    pub fn activated() -> Self {
        Self {
            state: ActivationState::Activated,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: ActivationState::Failed,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub entry_country: String,
    pub exit_country: String,
    pub load: u8,
}

/// Live connection details. Fields the service could not provide are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub protocol: Option<String>,
    pub server: Option<ServerInfo>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetShield {
    Off,
    /// Block malware domains
    Malware,
    /// Block ads, trackers and malware
    AdsAndMalware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillSwitch {
    Off,
    On,
    /// Blocks traffic even while disconnected
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub tier: Tier,
    pub secure_core: bool,
    pub netshield: NetShield,
    pub killswitch: KillSwitch,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            tier: Tier::Free,
            secure_core: false,
            netshield: NetShield::Off,
            killswitch: KillSwitch::Off,
        }
    }
}

/// External VPN service. Every method may block on I/O and is only called
/// from background tasks.
pub trait VpnService: Send + Sync + 'static {
    fn fetch_servers(
        &self,
        source: ServerSource,
    ) -> impl Future<Output = Result<Vec<RawServer>, ServiceError>> + Send;

    /// Refresh load figures in the local server cache.
    fn update_server_loads(&self) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn setup_connection(
        &self,
        target: ConnectionTarget,
    ) -> impl Future<Output = Result<ResolvedTarget, ServiceError>> + Send;

    fn connect(&self) -> impl Future<Output = Result<ConnectOutcome, ServiceError>> + Send;

    /// Fails with `ConnectionNotFound` when nothing is connected.
    fn disconnect(&self) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn connection_status(&self)
        -> impl Future<Output = Result<ConnectionStatus, ServiceError>> + Send;

    fn has_active_connection(&self) -> impl Future<Output = bool> + Send;

    fn settings(&self) -> impl Future<Output = Result<ServiceSettings, ServiceError>> + Send;

    fn set_secure_core(&self, enabled: bool)
        -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn set_netshield(&self, level: NetShield)
        -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn set_killswitch(&self, mode: KillSwitch)
        -> impl Future<Output = Result<(), ServiceError>> + Send;
}
