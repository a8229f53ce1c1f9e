//! Test fixtures: a server record builder and a scripted `VpnService`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::catalog::{Feature, FeatureSet, RawServer, ServerRecord, ServerStatus, Tier};
use crate::error::ServiceError;
use crate::service::{
    ActivationState, ConnectOutcome, ConnectionStatus, ConnectionTarget, KillSwitch, NetShield, ResolvedTarget,
    ServerInfo, ServerSource, ServiceSettings, VpnService,
};

// ── Records ─────────────────────────────────────────────────────────────────

/// Builds a normalized record; defaults to an active, physically hosted,
/// free, regular server.
pub struct ServerBuilder {
    name: String,
    city: Option<String>,
    load: u8,
    tier: Tier,
    features: Vec<Feature>,
    secure_core: bool,
    status: ServerStatus,
    entry: String,
    exit: String,
    host: Option<String>,
}

impl ServerBuilder {
    pub fn new(name: &str, exit_country: &str) -> Self {
        Self {
            name: name.to_string(),
            city: None,
            load: 30,
            tier: Tier::Free,
            features: Vec::new(),
            secure_core: false,
            status: ServerStatus::Active,
            entry: exit_country.to_string(),
            exit: exit_country.to_string(),
            host: None,
        }
    }

    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    pub fn load(mut self, load: u8) -> Self {
        self.load = load;
        self
    }

    pub fn features(mut self, features: &[Feature]) -> Self {
        self.features = features.to_vec();
        self
    }

    /// Route through `entry_country` as a secure-core server.
    pub fn secure_core(mut self, entry_country: &str) -> Self {
        self.secure_core = true;
        self.entry = entry_country.to_string();
        self
    }

    pub fn host(mut self, host_country: &str) -> Self {
        self.host = Some(host_country.to_string());
        self
    }

    pub fn maintenance(mut self) -> Self {
        self.status = ServerStatus::UnderMaintenance;
        self
    }

    fn feature_set(&self) -> FeatureSet {
        let mut set: FeatureSet = self
            .features
            .iter()
            .copied()
            .filter(|f| *f != Feature::Normal)
            .collect();
        if self.secure_core {
            set.insert(Feature::SecureCore);
        }
        if set.is_empty() {
            set.insert(Feature::Normal);
        }
        set
    }

    pub fn build(self) -> Arc<ServerRecord> {
        let features = self.feature_set();
        Arc::new(ServerRecord {
            host_country: self.host.unwrap_or_else(|| self.exit.clone()),
            name: self.name,
            city: self.city,
            load: self.load,
            tier: self.tier,
            features,
            status: self.status,
            entry_country: self.entry,
            exit_country: self.exit,
        })
    }

    /// The same server in the service's wire shape.
    pub fn raw(self) -> RawServer {
        let bits = self.feature_set().iter().fold(0u32, |bits, f| {
            bits | match f {
                Feature::SecureCore => 1,
                Feature::Tor => 2,
                Feature::P2P => 4,
                Feature::Streaming => 8,
                Feature::Normal => 0,
            }
        });
        RawServer {
            name: Some(self.name),
            city: self.city,
            load: Some(i64::from(self.load)),
            tier: self.tier.code(),
            features: bits,
            status: if self.status == ServerStatus::Active { 1 } else { 0 },
            entry_country: Some(self.entry),
            exit_country: Some(self.exit),
            host_country: self.host,
        }
    }
}

// ── Service ─────────────────────────────────────────────────────────────────

/// Scripted `VpnService`. Queued results are consumed in order; with an
/// empty queue every call succeeds with data derived from the target.
pub struct FakeService {
    live_servers: Mutex<Result<Vec<RawServer>, ServiceError>>,
    cached_servers: Mutex<Result<Vec<RawServer>, ServiceError>>,
    load_update: Mutex<Result<(), ServiceError>>,
    setup_results: Mutex<VecDeque<Result<ResolvedTarget, ServiceError>>>,
    connect_results: Mutex<VecDeque<Result<ConnectOutcome, ServiceError>>>,
    status: Mutex<Option<Result<ConnectionStatus, ServiceError>>>,
    disconnect_result: Mutex<Result<(), ServiceError>>,
    settings: Mutex<ServiceSettings>,
    last_resolved: Mutex<Option<ResolvedTarget>>,
    setup_calls: Mutex<Vec<ConnectionTarget>>,
    fetch_sources: Mutex<Vec<ServerSource>>,
    connects: AtomicUsize,
    load_updates: AtomicUsize,
    active: AtomicBool,
    setup_gate: Mutex<Option<Arc<Notify>>>,
    setup_started: Notify,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    fetch_started: Notify,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            live_servers: Mutex::new(Ok(Vec::new())),
            cached_servers: Mutex::new(Err(ServiceError::CacheMissing)),
            load_update: Mutex::new(Ok(())),
            setup_results: Mutex::new(VecDeque::new()),
            connect_results: Mutex::new(VecDeque::new()),
            status: Mutex::new(None),
            disconnect_result: Mutex::new(Ok(())),
            settings: Mutex::new(ServiceSettings::default()),
            last_resolved: Mutex::new(None),
            setup_calls: Mutex::new(Vec::new()),
            fetch_sources: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            load_updates: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            setup_gate: Mutex::new(None),
            setup_started: Notify::new(),
            fetch_gate: Mutex::new(None),
            fetch_started: Notify::new(),
        }
    }

    pub fn set_servers(&self, source: ServerSource, result: Result<Vec<RawServer>, ServiceError>) {
        match source {
            ServerSource::Cache => *self.cached_servers.lock() = result,
            ServerSource::Live => *self.live_servers.lock() = result,
        }
    }

    pub fn set_load_update(&self, result: Result<(), ServiceError>) {
        *self.load_update.lock() = result;
    }

    pub fn push_setup(&self, result: Result<ResolvedTarget, ServiceError>) {
        self.setup_results.lock().push_back(result);
    }

    pub fn push_connect(&self, result: Result<ConnectOutcome, ServiceError>) {
        self.connect_results.lock().push_back(result);
    }

    /// Fixed status response instead of one derived from the last setup.
    pub fn set_status(&self, result: Result<ConnectionStatus, ServiceError>) {
        *self.status.lock() = Some(result);
    }

    pub fn set_disconnect(&self, result: Result<(), ServiceError>) {
        *self.disconnect_result.lock() = result;
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut ServiceSettings)) {
        f(&mut self.settings.lock());
    }

    pub fn current_settings(&self) -> ServiceSettings {
        self.settings.lock().clone()
    }

    pub fn setup_calls(&self) -> Vec<ConnectionTarget> {
        self.setup_calls.lock().clone()
    }

    pub fn fetch_sources(&self) -> Vec<ServerSource> {
        self.fetch_sources.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn load_update_count(&self) -> usize {
        self.load_updates.load(Ordering::SeqCst)
    }

    /// The next `setup_connection` waits until the returned gate is notified.
    pub fn hold_next_setup(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.setup_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub async fn wait_for_setup(&self) {
        self.setup_started.notified().await;
    }

    /// The next `fetch_servers` or `update_server_loads` waits until the
    /// returned gate is notified.
    pub fn hold_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub async fn wait_for_fetch(&self) {
        self.fetch_started.notified().await;
    }

    async fn pass_fetch_gate(&self) {
        self.fetch_started.notify_one();
        let gate = self.fetch_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn default_resolution(target: &ConnectionTarget) -> ResolvedTarget {
        let (server_name, country) = match target {
            ConnectionTarget::Country(code) => (format!("{}#1", code), code.clone()),
            ConnectionTarget::Server(name) => {
                let country: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
                (name.clone(), country)
            }
            _ => ("CH#1".to_string(), "CH".to_string()),
        };
        ResolvedTarget {
            server_name,
            entry_country: country.clone(),
            exit_country: country,
            city: None,
            protocol: "WireGuard".to_string(),
            secure_core: false,
        }
    }
}

impl VpnService for FakeService {
    async fn fetch_servers(&self, source: ServerSource) -> Result<Vec<RawServer>, ServiceError> {
        self.fetch_sources.lock().push(source);
        self.pass_fetch_gate().await;
        match source {
            ServerSource::Cache => self.cached_servers.lock().clone(),
            ServerSource::Live => self.live_servers.lock().clone(),
        }
    }

    async fn update_server_loads(&self) -> Result<(), ServiceError> {
        self.load_updates.fetch_add(1, Ordering::SeqCst);
        self.pass_fetch_gate().await;
        self.load_update.lock().clone()
    }

    async fn setup_connection(&self, target: ConnectionTarget) -> Result<ResolvedTarget, ServiceError> {
        self.setup_calls.lock().push(target.clone());
        self.setup_started.notify_one();
        let gate = self.setup_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self.setup_results.lock().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(Self::default_resolution(&target)));
        if let Ok(resolved) = &result {
            *self.last_resolved.lock() = Some(resolved.clone());
        }
        result
    }

    async fn connect(&self) -> Result<ConnectOutcome, ServiceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let scripted = self.connect_results.lock().pop_front();
        let result = scripted.unwrap_or_else(|| Ok(ConnectOutcome::activated()));
        if matches!(&result, Ok(outcome) if outcome.state == ActivationState::Activated) {
            self.active.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn disconnect(&self) -> Result<(), ServiceError> {
        self.active.store(false, Ordering::SeqCst);
        self.disconnect_result.lock().clone()
    }

    async fn connection_status(&self) -> Result<ConnectionStatus, ServiceError> {
        if let Some(fixed) = self.status.lock().clone() {
            return fixed;
        }
        let resolved = self
            .last_resolved
            .lock()
            .clone()
            .ok_or(ServiceError::ConnectionNotFound)?;
        Ok(ConnectionStatus {
            protocol: Some(resolved.protocol),
            server: Some(ServerInfo {
                name: resolved.server_name,
                entry_country: resolved.entry_country,
                exit_country: resolved.exit_country,
                load: 30,
            }),
            ip: Some("10.2.0.2".to_string()),
        })
    }

    async fn has_active_connection(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn settings(&self) -> Result<ServiceSettings, ServiceError> {
        Ok(self.settings.lock().clone())
    }

    async fn set_secure_core(&self, enabled: bool) -> Result<(), ServiceError> {
        self.settings.lock().secure_core = enabled;
        Ok(())
    }

    async fn set_netshield(&self, level: NetShield) -> Result<(), ServiceError> {
        self.settings.lock().netshield = level;
        Ok(())
    }

    async fn set_killswitch(&self, mode: KillSwitch) -> Result<(), ServiceError> {
        self.settings.lock().killswitch = mode;
        Ok(())
    }
}
