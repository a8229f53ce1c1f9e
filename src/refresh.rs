//! Background catalog refreshes.
//!
//! One in-flight flag per refresh kind. A request that finds its flag set is
//! dropped before it starts; the flag clears when the running refresh ends,
//! whether it succeeded or not. Timer-driven refreshes go through the same
//! check as user-triggered ones.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::catalog::{CatalogProvider, CatalogStore, ServerCatalog};
use crate::error::ServiceError;
use crate::service::{ServerSource, VpnService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Full server list from the API
    Servers,
    /// Load figures only; the list is re-read from the service cache
    ServerLoads,
}

impl fmt::Display for RefreshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshKind::Servers => write!(f, "server list"),
            RefreshKind::ServerLoads => write!(f, "server load"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed,
    /// Another refresh of the same kind was already running
    Suppressed,
    /// The previous catalog was kept
    Failed(ServiceError),
}

/// Clears the in-flight flag when dropped and wakes anyone waiting on it.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    finished: &'a Notify,
    kind: RefreshKind,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.finished.notify_waiters();
        log::debug!("{} refresh finished", self.kind);
    }
}

pub struct RefreshCoordinator<S: VpnService> {
    service: Arc<S>,
    store: Arc<CatalogStore>,
    servers_in_flight: AtomicBool,
    loads_in_flight: AtomicBool,
    servers_finished: Notify,
    loads_finished: Notify,
}

impl<S: VpnService> RefreshCoordinator<S> {
    pub fn new(service: Arc<S>, store: Arc<CatalogStore>) -> Self {
        Self {
            service,
            store,
            servers_in_flight: AtomicBool::new(false),
            loads_in_flight: AtomicBool::new(false),
            servers_finished: Notify::new(),
            loads_finished: Notify::new(),
        }
    }

    fn flag(&self, kind: RefreshKind) -> &AtomicBool {
        match kind {
            RefreshKind::Servers => &self.servers_in_flight,
            RefreshKind::ServerLoads => &self.loads_in_flight,
        }
    }

    fn finished(&self, kind: RefreshKind) -> &Notify {
        match kind {
            RefreshKind::Servers => &self.servers_finished,
            RefreshKind::ServerLoads => &self.loads_finished,
        }
    }

    fn try_begin(&self, kind: RefreshKind) -> Option<InFlight<'_>> {
        let flag = self.flag(kind);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                flag,
                finished: self.finished(kind),
                kind,
            })
    }

    pub fn is_in_flight(&self, kind: RefreshKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    pub async fn refresh(&self, kind: RefreshKind) -> RefreshOutcome {
        let Some(_in_flight) = self.try_begin(kind) else {
            log::debug!("{} refresh already in flight, skipping", kind);
            return RefreshOutcome::Suppressed;
        };

        log::info!("Refreshing {}", kind);
        let result = match kind {
            RefreshKind::Servers => self.reload(ServerSource::Live).await,
            RefreshKind::ServerLoads => self.reload_loads().await,
        };

        match result {
            Ok(catalog) => {
                log::info!("{} refresh complete: {} servers", kind, catalog.server_count());
                RefreshOutcome::Completed
            }
            Err(e) => {
                log::warn!("{} refresh failed, keeping previous catalog: {}", kind, e);
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// First load at startup: the service cache if there is one, the API
    /// otherwise. Holds the server-list flag while it runs. If a server-list
    /// refresh is already running, waits for it and returns its catalog
    /// instead of loading a second time.
    pub async fn initial_load(&self) -> Result<Arc<ServerCatalog>, ServiceError> {
        // Registered before the flag check so the wakeup cannot be missed.
        let finished = self.finished(RefreshKind::Servers).notified();
        let Some(_in_flight) = self.try_begin(RefreshKind::Servers) else {
            log::debug!("Server list refresh in flight, waiting for it instead of loading");
            finished.await;
            return Ok(self.store.snapshot());
        };
        drop(finished);

        match self.reload(ServerSource::Cache).await {
            Ok(catalog) => {
                log::info!("Loaded server list from cache");
                Ok(catalog)
            }
            Err(ServiceError::CacheMissing) => {
                log::info!("No cached server list, fetching from API");
                self.reload(ServerSource::Live).await
            }
            Err(e) => Err(e),
        }
    }

    async fn reload(&self, source: ServerSource) -> Result<Arc<ServerCatalog>, ServiceError> {
        let raw = self.service.fetch_servers(source).await?;
        Ok(self.store.replace_raw(&raw))
    }

    async fn reload_loads(&self) -> Result<Arc<ServerCatalog>, ServiceError> {
        self.service.update_server_loads().await?;
        self.reload(ServerSource::Cache).await
    }

    pub fn spawn_refresh(self: &Arc<Self>, kind: RefreshKind, runtime: &Handle) -> JoinHandle<RefreshOutcome> {
        let this = Arc::clone(self);
        runtime.spawn(async move { this.refresh(kind).await })
    }

    /// Refresh `kind` every `period`, starting one period from now.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        kind: RefreshKind,
        period: Duration,
        runtime: &Handle,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            interval.tick().await;
            log::info!("Periodic {} refresh every {:?}", kind, period);
            loop {
                interval.tick().await;
                this.refresh(kind).await;
            }
        })
    }
}
