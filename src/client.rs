//! Client core: wires the catalog, refresh coordinator and connection
//! orchestrator around one VPN service.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::catalog::{CatalogMask, CatalogProvider, CatalogStore, ServerCatalog, Tier, UserContext};
use crate::connection::{AttemptOutcome, ConnectionOrchestrator};
use crate::dispatch::{ui_channel, UiHandle, UiLoop};
use crate::error::{CoreResult, ServiceError};
use crate::refresh::{RefreshCoordinator, RefreshKind, RefreshOutcome};
use crate::service::{ConnectionTarget, VpnService};
use crate::settings::CoreConfig;

pub struct ClientCore<S: VpnService> {
    config: CoreConfig,
    runtime: Handle,
    catalog: Arc<CatalogStore>,
    orchestrator: Arc<ConnectionOrchestrator<S>>,
    refresh: Arc<RefreshCoordinator<S>>,
    periodic: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: VpnService> ClientCore<S> {
    pub fn new(service: Arc<S>, config: CoreConfig, runtime: Handle) -> Self {
        let catalog = Arc::new(CatalogStore::new(UserContext::new(Tier::Free)));
        let orchestrator = Arc::new(ConnectionOrchestrator::new(
            Arc::clone(&service),
            Arc::clone(&catalog) as Arc<dyn CatalogProvider>,
        ));
        let refresh = Arc::new(RefreshCoordinator::new(service, Arc::clone(&catalog)));

        Self {
            config,
            runtime,
            catalog,
            orchestrator,
            refresh,
            periodic: Mutex::new(Vec::new()),
        }
    }

    /// Run background work on the crate's global runtime.
    pub fn with_default_runtime(service: Arc<S>, config: CoreConfig) -> Self {
        Self::new(service, config, crate::runtime::handle())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn orchestrator(&self) -> &Arc<ConnectionOrchestrator<S>> {
        &self.orchestrator
    }

    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator<S>> {
        &self.refresh
    }

    /// UI task queue sized from the config.
    pub fn ui_channel(&self) -> (UiHandle, UiLoop) {
        ui_channel(self.config.ui_queue_capacity)
    }

    /// Read the account settings, then load the catalog from the service
    /// cache (or the API when there is no cache).
    pub async fn initial_load(&self) -> CoreResult<Arc<ServerCatalog>> {
        if let Err(e) = self.orchestrator.refresh_settings().await {
            log::warn!("Could not read service settings, assuming defaults: {}", e);
        }
        let catalog = self.refresh.initial_load().await?;
        Ok(catalog)
    }

    /// Start the timer-driven server-list and load refreshes. Calling this
    /// again while they run does nothing.
    pub fn start_periodic_refresh(&self) {
        let mut periodic = self.periodic.lock();
        if !periodic.is_empty() {
            log::debug!("Periodic refresh already running");
            return;
        }
        periodic.push(self.refresh.spawn_periodic(
            RefreshKind::Servers,
            self.config.server_refresh_interval(),
            &self.runtime,
        ));
        periodic.push(self.refresh.spawn_periodic(
            RefreshKind::ServerLoads,
            self.config.load_refresh_interval(),
            &self.runtime,
        ));
    }

    pub fn stop_periodic_refresh(&self) {
        let handles: Vec<_> = self.periodic.lock().drain(..).collect();
        if !handles.is_empty() {
            log::info!("Stopping periodic refresh");
        }
        for handle in handles {
            handle.abort();
        }
    }

    pub fn is_refreshing_periodically(&self) -> bool {
        !self.periodic.lock().is_empty()
    }

    pub fn request_refresh(&self, kind: RefreshKind) -> JoinHandle<RefreshOutcome> {
        self.refresh.spawn_refresh(kind, &self.runtime)
    }

    pub fn connect(&self, target: ConnectionTarget) -> JoinHandle<AttemptOutcome> {
        self.orchestrator.spawn_connect(target, &self.runtime)
    }

    pub fn quick_connect(&self) -> JoinHandle<AttemptOutcome> {
        self.connect(ConnectionTarget::Fastest)
    }

    pub fn disconnect(&self) -> JoinHandle<Result<(), ServiceError>> {
        self.orchestrator.spawn_disconnect(&self.runtime)
    }

    pub fn set_search(&self, query: &str) -> CatalogMask {
        self.catalog.set_search(query)
    }
}

impl<S: VpnService> Drop for ClientCore<S> {
    fn drop(&mut self) {
        self.stop_periodic_refresh();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connection::ConnectionState;
    use crate::service::ServerSource;
    use crate::testing::{FakeService, ServerBuilder};

    fn client(service: &Arc<FakeService>) -> ClientCore<FakeService> {
        ClientCore::new(Arc::clone(service), CoreConfig::default(), Handle::current())
    }

    #[tokio::test]
    async fn initial_load_builds_catalog_for_account_tier() {
        let service = Arc::new(FakeService::new());
        service.update_settings(|s| s.tier = Tier::Plus);
        service.set_servers(
            ServerSource::Live,
            Ok(vec![
                ServerBuilder::new("CH#1", "CH").raw(),
                ServerBuilder::new("SE#1", "SE").tier(Tier::Plus).raw(),
            ]),
        );
        let core = client(&service);

        let catalog = core.initial_load().await.unwrap();
        assert_eq!(catalog.user_tier, Tier::Plus);
        assert!(catalog.find_country("SE", false).unwrap().can_connect);
        assert!(core.orchestrator().quick_settings().is_some());
    }

    #[tokio::test]
    async fn initial_load_error_is_a_core_error() {
        let service = Arc::new(FakeService::new());
        service.set_servers(ServerSource::Live, Err(ServiceError::Unreachable));
        let core = client(&service);

        let err = core.initial_load().await.unwrap_err();
        assert_eq!(err.to_string(), "VPN service error: API unreachable");
    }

    #[tokio::test]
    async fn periodic_refresh_starts_once_and_stops() {
        let service = Arc::new(FakeService::new());
        let core = client(&service);

        core.start_periodic_refresh();
        core.start_periodic_refresh();
        assert_eq!(core.periodic.lock().len(), 2);
        assert!(core.is_refreshing_periodically());

        core.stop_periodic_refresh();
        assert!(!core.is_refreshing_periodically());
    }

    #[tokio::test]
    async fn connection_states_reach_the_ui_loop() {
        let service = Arc::new(FakeService::new());
        let core = client(&service);
        let (ui, mut ui_loop) = core.ui_channel();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let forward = core.orchestrator().subscribe_state().forward_to_ui(
            ui,
            core.runtime(),
            move |state: ConnectionState| sink.lock().push(state.status_text()),
        );

        assert_eq!(core.quick_connect().await.unwrap(), AttemptOutcome::Connected);
        // Let the forwarder catch up.
        tokio::time::sleep(Duration::from_millis(10)).await;
        ui_loop.run_pending();

        assert_eq!(
            *seen.lock(),
            vec!["Not connected", "Preparing connection...", "Connecting...", "Connected"]
        );
        forward.abort();
    }

    #[tokio::test]
    async fn search_goes_through_the_store() {
        let service = Arc::new(FakeService::new());
        service.update_settings(|s| s.tier = Tier::Plus);
        service.set_servers(
            ServerSource::Live,
            Ok(vec![
                ServerBuilder::new("CH#1", "CH").raw(),
                ServerBuilder::new("SE#1", "SE").raw(),
            ]),
        );
        let core = client(&service);
        core.initial_load().await.unwrap();

        let mask = core.set_search("swed");
        assert_eq!(mask.standard.as_slice(), &[true, false]);
    }
}
