//! Connection orchestrator
//!
//! Drives one connection attempt at a time through
//! Preparing → InProgress → Connected | Error, publishing every step on the
//! connection-state broadcaster.
//!
//! Attempts are numbered. Starting a new attempt or disconnecting makes
//! every earlier attempt stale. A stale attempt publishes nothing and stops
//! at its next step: it never activates the tunnel or reads its status.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::messages::{self, UserMessage};
use super::quick_settings::QuickSettingsState;
use super::state::{ConnectedInfo, ConnectionState, TargetDescription};
use crate::broadcast::{StateBroadcaster, Subscription};
use crate::catalog::{country_name, CatalogProvider};
use crate::error::{AccountCondition, ServiceError};
use crate::service::{
    ActivationState, ConnectionStatus, ConnectionTarget, KillSwitch, NetShield, ResolvedTarget,
    ServiceSettings, VpnService,
};

pub type AttemptId = u64;

/// How an attempt ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Connected,
    Failed,
    /// A newer attempt or a disconnect took over before this one finished
    Superseded,
}

/// Informational message shown after an automatic account fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub condition: AccountCondition,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    SecureCore(bool),
    NetShield(NetShield),
    KillSwitch(KillSwitch),
}

struct Attempts {
    current: AttemptId,
    last_target: Option<ConnectionTarget>,
    /// Conditions whose fallback already ran since the last successful connection
    fallbacks_used: HashSet<AccountCondition>,
}

enum Step {
    Finished(AttemptOutcome),
    Fallback(AccountCondition),
}

pub struct ConnectionOrchestrator<S: VpnService> {
    service: Arc<S>,
    catalog: Arc<dyn CatalogProvider>,
    state: StateBroadcaster<ConnectionState>,
    settings: StateBroadcaster<ServiceSettings>,
    quick_settings: StateBroadcaster<QuickSettingsState>,
    notices: StateBroadcaster<Notice>,
    attempts: Mutex<Attempts>,
}

impl<S: VpnService> ConnectionOrchestrator<S> {
    pub fn new(service: Arc<S>, catalog: Arc<dyn CatalogProvider>) -> Self {
        Self {
            service,
            catalog,
            state: StateBroadcaster::with_initial("connection-state", ConnectionState::Idle),
            settings: StateBroadcaster::new("service-settings"),
            quick_settings: StateBroadcaster::new("quick-settings"),
            notices: StateBroadcaster::new("notices"),
            attempts: Mutex::new(Attempts {
                current: 0,
                last_target: None,
                fallbacks_used: HashSet::new(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.latest().unwrap_or_default()
    }

    pub fn subscribe_state(&self) -> Subscription<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribe_settings(&self) -> Subscription<ServiceSettings> {
        self.settings.subscribe()
    }

    pub fn subscribe_quick_settings(&self) -> Subscription<QuickSettingsState> {
        self.quick_settings.subscribe()
    }

    pub fn subscribe_notices(&self) -> Subscription<Notice> {
        self.notices.subscribe()
    }

    pub fn quick_settings(&self) -> Option<QuickSettingsState> {
        self.quick_settings.latest()
    }

    pub fn last_target(&self) -> Option<ConnectionTarget> {
        self.attempts.lock().last_target.clone()
    }

    pub fn current_attempt(&self) -> AttemptId {
        self.attempts.lock().current
    }

    // ── Entry points ────────────────────────────────────────────────────────

    pub async fn quick_connect(&self) -> AttemptOutcome {
        self.connect(ConnectionTarget::Fastest).await
    }

    pub async fn connect(&self, target: ConnectionTarget) -> AttemptOutcome {
        let attempt = self.begin_attempt(&target);
        self.run_attempt(attempt, target).await
    }

    /// Connect to the last target again, or to the fastest server if there
    /// never was one.
    pub async fn reconnect(&self) -> AttemptOutcome {
        let target = self.last_target().unwrap_or(ConnectionTarget::Fastest);
        self.connect(target).await
    }

    /// Start an attempt on `runtime`. Preparing is published before this
    /// returns, so attempts started back to back keep their order.
    pub fn spawn_connect(
        self: &Arc<Self>,
        target: ConnectionTarget,
        runtime: &Handle,
    ) -> JoinHandle<AttemptOutcome> {
        let attempt = self.begin_attempt(&target);
        let this = Arc::clone(self);
        runtime.spawn(async move { this.run_attempt(attempt, target).await })
    }

    /// Publish Idle right away, then tear the connection down. An attempt
    /// still in flight becomes stale.
    pub async fn disconnect(&self) -> Result<(), ServiceError> {
        {
            let mut attempts = self.attempts.lock();
            attempts.current += 1;
            attempts.fallbacks_used.clear();
            log::info!("Disconnect requested (attempt {} superseded)", attempts.current - 1);
            self.state.publish(ConnectionState::Idle);
        }

        match self.service.disconnect().await {
            Ok(()) => {
                log::info!("VPN disconnected");
                Ok(())
            }
            Err(ServiceError::ConnectionNotFound) => {
                log::info!("Disconnect: no active connection");
                Ok(())
            }
            Err(e) => {
                log::error!("Disconnect failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn spawn_disconnect(self: &Arc<Self>, runtime: &Handle) -> JoinHandle<Result<(), ServiceError>> {
        let this = Arc::clone(self);
        runtime.spawn(async move { this.disconnect().await })
    }

    // ── Settings ────────────────────────────────────────────────────────────

    /// Read the service settings and republish everything derived from them.
    pub async fn refresh_settings(&self) -> Result<ServiceSettings, ServiceError> {
        let settings = self.service.settings().await?;
        self.catalog.sync_context(settings.tier, settings.secure_core);
        self.quick_settings
            .publish(QuickSettingsState::from_settings(&settings));
        self.settings.publish(settings.clone());
        Ok(settings)
    }

    pub async fn set_secure_core(&self, enabled: bool) -> Result<Option<AttemptOutcome>, ServiceError> {
        self.apply_setting(SettingChange::SecureCore(enabled)).await
    }

    pub async fn set_netshield(&self, level: NetShield) -> Result<Option<AttemptOutcome>, ServiceError> {
        self.apply_setting(SettingChange::NetShield(level)).await
    }

    pub async fn set_killswitch(&self, mode: KillSwitch) -> Result<Option<AttemptOutcome>, ServiceError> {
        self.apply_setting(SettingChange::KillSwitch(mode)).await
    }

    /// Write a setting through to the service. When a connection is up it is
    /// re-established so the change takes effect; the outcome of that
    /// reconnect is returned.
    pub async fn apply_setting(&self, change: SettingChange) -> Result<Option<AttemptOutcome>, ServiceError> {
        log::info!("Applying setting {:?}", change);
        match change {
            SettingChange::SecureCore(enabled) => self.service.set_secure_core(enabled).await?,
            SettingChange::NetShield(level) => self.service.set_netshield(level).await?,
            SettingChange::KillSwitch(mode) => self.service.set_killswitch(mode).await?,
        }
        self.refresh_settings().await?;

        if !self.service.has_active_connection().await {
            return Ok(None);
        }
        log::info!("Reconnecting to apply {:?}", change);
        Ok(Some(self.reconnect().await))
    }

    // ── Attempt machinery ───────────────────────────────────────────────────

    fn begin_attempt(&self, target: &ConnectionTarget) -> AttemptId {
        let mut attempts = self.attempts.lock();
        attempts.current += 1;
        attempts.last_target = Some(target.clone());
        log::info!("Connection attempt {}: {}", attempts.current, target);
        self.state.publish(ConnectionState::Preparing);
        attempts.current
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.attempts.lock().current == attempt
    }

    /// Publish `state` if `attempt` is still the newest one.
    fn publish(&self, attempt: AttemptId, state: ConnectionState) -> bool {
        let attempts = self.attempts.lock();
        if attempts.current != attempt {
            log::debug!("Dropping {:?} from superseded attempt {}", state, attempt);
            return false;
        }
        log::info!("Connection state: {:?}", state);
        self.state.publish(state);
        true
    }

    async fn run_attempt(&self, mut attempt: AttemptId, mut target: ConnectionTarget) -> AttemptOutcome {
        loop {
            match self.drive(attempt, &target).await {
                Step::Finished(outcome) => return outcome,
                Step::Fallback(condition) => {
                    target = self.prepare_fallback(condition).await;
                    match self.begin_fallback(attempt, &target) {
                        Some(next) => attempt = next,
                        None => return AttemptOutcome::Superseded,
                    }
                }
            }
        }
    }

    async fn drive(&self, attempt: AttemptId, target: &ConnectionTarget) -> Step {
        if let Err(message) = self.validate(target) {
            log::warn!("Refusing to connect to {}: {}", target, message.message);
            return self.fail(attempt, message);
        }

        let resolved = match self.service.setup_connection(target.clone()).await {
            Ok(resolved) => resolved,
            Err(e) => return self.service_failed(attempt, "Connection setup", e),
        };

        let description = describe(&resolved);
        log::info!("Connecting to {}", description);
        if !self.publish(attempt, ConnectionState::InProgress(description)) {
            log::debug!("Attempt {} superseded before activation, not connecting", attempt);
            return Step::Finished(AttemptOutcome::Superseded);
        }

        match self.service.connect().await {
            Ok(outcome) if outcome.state == ActivationState::Activated => {}
            Ok(outcome) => {
                log::error!(
                    "Connection did not activate: {}",
                    outcome.reason.as_deref().unwrap_or("no reason given")
                );
                return self.fail(attempt, messages::activation_failure(outcome.reason.as_deref()));
            }
            Err(e) => return self.service_failed(attempt, "Connect", e),
        }

        if !self.is_current(attempt) {
            log::debug!("Attempt {} superseded after activation, skipping status read", attempt);
            return Step::Finished(AttemptOutcome::Superseded);
        }
        let info = match self.service.connection_status().await {
            Ok(status) => connected_info(&resolved, status),
            Err(e) => {
                log::error!("Connection status unavailable: {}", e);
                None
            }
        };
        let Some(info) = info else {
            log::error!("Connection status incomplete for {}", resolved.server_name);
            return self.fail(attempt, messages::status_unreadable());
        };

        let mut attempts = self.attempts.lock();
        if attempts.current != attempt {
            log::debug!("Dropping Connected from superseded attempt {}", attempt);
            return Step::Finished(AttemptOutcome::Superseded);
        }
        attempts.fallbacks_used.clear();
        log::info!("Connected to {} ({})", info.server_name, info.ip);
        self.state.publish(ConnectionState::Connected(info));
        Step::Finished(AttemptOutcome::Connected)
    }

    /// Catalog-side checks for targets the catalog knows about. Unknown
    /// targets are left to the service.
    fn validate(&self, target: &ConnectionTarget) -> Result<(), UserMessage> {
        let catalog = self.catalog.snapshot();
        let context = self.catalog.user_context();

        match target {
            ConnectionTarget::Country(code) => {
                if let Some(country) = catalog.find_country(code, context.secure_core) {
                    if !country.can_connect {
                        return Err(messages::upgrade_required(&country.name));
                    }
                    if !country.is_active() {
                        return Err(messages::under_maintenance(&country.name));
                    }
                }
            }
            ConnectionTarget::Server(name) => {
                if let Some((_, server)) = catalog.find_server(name) {
                    let label = format!("Server {}", server.name);
                    if server.tier > context.tier {
                        return Err(messages::upgrade_required(&label));
                    }
                    if !server.is_active() {
                        return Err(messages::under_maintenance(&label));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn fail(&self, attempt: AttemptId, message: UserMessage) -> Step {
        let state = ConnectionState::Error {
            message: message.message,
            troubleshoot: message.troubleshoot,
        };
        if self.publish(attempt, state) {
            Step::Finished(AttemptOutcome::Failed)
        } else {
            Step::Finished(AttemptOutcome::Superseded)
        }
    }

    fn service_failed(&self, attempt: AttemptId, stage: &str, error: ServiceError) -> Step {
        if let Some(condition) = error.account_condition() {
            if self.claim_fallback(attempt, condition) {
                log::warn!("{} reported {}, falling back", stage, error);
                return Step::Fallback(condition);
            }
        }
        log::error!("{} failed: {}", stage, error);
        self.fail(attempt, messages::service_failure(&error))
    }

    /// True the first time `condition` shows up for a current attempt.
    fn claim_fallback(&self, attempt: AttemptId, condition: AccountCondition) -> bool {
        let mut attempts = self.attempts.lock();
        attempts.current == attempt && attempts.fallbacks_used.insert(condition)
    }

    async fn prepare_fallback(&self, condition: AccountCondition) -> ConnectionTarget {
        let (target, message) = match condition {
            AccountCondition::Downgraded => {
                if let Err(e) = self.service.set_secure_core(false).await {
                    log::warn!("Could not turn off Secure Core: {}", e);
                }
                if let Err(e) = self.service.set_netshield(NetShield::Off).await {
                    log::warn!("Could not turn off NetShield: {}", e);
                }
                (
                    ConnectionTarget::Fastest,
                    "Your plan no longer includes Secure Core and NetShield. They were turned off and you are being connected to the fastest available server.",
                )
            }
            AccountCondition::Delinquent => (
                ConnectionTarget::Free,
                "Your account has an unpaid invoice. You are being connected to a free server.",
            ),
        };

        if let Err(e) = self.refresh_settings().await {
            log::warn!("Could not refresh settings after fallback: {}", e);
        }
        self.notices.publish(Notice {
            condition,
            message: message.to_string(),
        });
        target
    }

    /// Replace `previous` with a fallback attempt, unless something newer
    /// took over in the meantime.
    fn begin_fallback(&self, previous: AttemptId, target: &ConnectionTarget) -> Option<AttemptId> {
        let mut attempts = self.attempts.lock();
        if attempts.current != previous {
            return None;
        }
        attempts.current += 1;
        attempts.last_target = Some(target.clone());
        log::info!("Fallback attempt {}: {}", attempts.current, target);
        self.state.publish(ConnectionState::Preparing);
        Some(attempts.current)
    }
}

fn describe(resolved: &ResolvedTarget) -> TargetDescription {
    TargetDescription {
        server_name: resolved.server_name.clone(),
        city: resolved.city.clone(),
        entry_country: country_name(&resolved.entry_country),
        exit_country: country_name(&resolved.exit_country),
        protocol: resolved.protocol.clone(),
        secure_core: resolved.secure_core,
    }
}

/// `None` when the status is missing the server or the IP.
fn connected_info(resolved: &ResolvedTarget, status: ConnectionStatus) -> Option<ConnectedInfo> {
    let server = status.server?;
    let ip = status.ip.filter(|ip| !ip.trim().is_empty())?;

    let mut countries = vec![server.exit_country.clone()];
    if resolved.secure_core {
        countries.push(server.entry_country.clone());
    }

    Some(ConnectedInfo {
        server_name: server.name,
        countries,
        ip,
        load: server.load,
        protocol: status.protocol.unwrap_or_else(|| resolved.protocol.clone()),
    })
}
