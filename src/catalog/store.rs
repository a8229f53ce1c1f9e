//! Catalog store: owns the current snapshot and rebuilds it on change.
//!
//! The catalog is rebuilt as a whole whenever the record set, the user's
//! tier or the secure-core toggle changes. Published snapshots are
//! `Arc<ServerCatalog>` and never modified afterwards; search only swaps
//! the mask.

use std::sync::Arc;

use parking_lot::Mutex;

use super::search::{search, CatalogMask};
use super::server::{normalize_all, RawServer, ServerRecord, Tier};
use super::split::ServerCatalog;
use super::{build_catalog, CountryAggregate};
use crate::broadcast::{StateBroadcaster, Subscription};

/// What the catalog is being built and displayed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub tier: Tier,
    pub secure_core: bool,
    pub search: String,
}

impl UserContext {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            secure_core: false,
            search: String::new(),
        }
    }
}

/// Catalog access the connection orchestrator needs.
pub trait CatalogProvider: Send + Sync {
    fn snapshot(&self) -> Arc<ServerCatalog>;
    fn user_context(&self) -> UserContext;
    /// Follow the account's tier and secure-core toggle, rebuilding if
    /// either changed.
    fn sync_context(&self, tier: Tier, secure_core: bool);
}

struct StoreState {
    context: UserContext,
    records: Arc<Vec<Arc<ServerRecord>>>,
    catalog: Arc<ServerCatalog>,
    mask: CatalogMask,
}

pub struct CatalogStore {
    state: Mutex<StoreState>,
    ready: StateBroadcaster<Arc<ServerCatalog>>,
}

impl CatalogStore {
    pub fn new(context: UserContext) -> Self {
        let catalog = Arc::new(ServerCatalog::empty(context.tier));
        Self {
            state: Mutex::new(StoreState {
                mask: CatalogMask::all_visible(&catalog),
                context,
                records: Arc::new(Vec::new()),
                catalog,
            }),
            ready: StateBroadcaster::new("catalog-ready"),
        }
    }

    /// Normalize a fresh fetch and rebuild from it.
    pub fn replace_raw(&self, raw: &[RawServer]) -> Arc<ServerCatalog> {
        self.replace_records(normalize_all(raw))
    }

    pub fn replace_records(&self, records: Vec<Arc<ServerRecord>>) -> Arc<ServerCatalog> {
        let mut state = self.state.lock();
        state.records = Arc::new(records);
        self.rebuild_locked(&mut state)
    }

    /// Returns `None` when the tier did not change.
    pub fn set_tier(&self, tier: Tier) -> Option<Arc<ServerCatalog>> {
        let mut state = self.state.lock();
        if state.context.tier == tier {
            return None;
        }
        log::info!("User tier changed {} -> {}", state.context.tier, tier);
        state.context.tier = tier;
        Some(self.rebuild_locked(&mut state))
    }

    /// Returns `None` when the toggle did not change.
    pub fn set_secure_core(&self, enabled: bool) -> Option<Arc<ServerCatalog>> {
        let mut state = self.state.lock();
        if state.context.secure_core == enabled {
            return None;
        }
        state.context.secure_core = enabled;
        Some(self.rebuild_locked(&mut state))
    }

    /// Update the search text. Only the mask is recomputed.
    pub fn set_search(&self, query: &str) -> CatalogMask {
        let mut state = self.state.lock();
        state.context.search = query.to_string();
        state.mask = search(&state.catalog, query);
        state.mask.clone()
    }

    pub fn mask(&self) -> CatalogMask {
        self.state.lock().mask.clone()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Countries of the active view paired with their visibility.
    pub fn visible_countries(&self) -> Vec<CountryAggregate> {
        let state = self.state.lock();
        let secure_core = state.context.secure_core;
        state
            .catalog
            .view(secure_core)
            .iter()
            .enumerate()
            .filter(|(idx, _)| state.mask.view(secure_core).is_visible(*idx))
            .map(|(_, country)| country.clone())
            .collect()
    }

    pub fn subscribe(&self) -> Subscription<Arc<ServerCatalog>> {
        self.ready.subscribe()
    }

    pub fn ready(&self) -> &StateBroadcaster<Arc<ServerCatalog>> {
        &self.ready
    }

    fn rebuild_locked(&self, state: &mut StoreState) -> Arc<ServerCatalog> {
        let catalog = Arc::new(build_catalog(&state.records, state.context.tier));
        state.mask = search(&catalog, &state.context.search);
        state.catalog = Arc::clone(&catalog);

        log::info!(
            "Catalog rebuilt for {} tier: {} standard / {} secure-core countries from {} servers",
            state.context.tier,
            catalog.standard.len(),
            catalog.secure_core.len(),
            state.records.len()
        );

        self.ready.publish(Arc::clone(&catalog));
        catalog
    }
}

impl CatalogProvider for CatalogStore {
    fn snapshot(&self) -> Arc<ServerCatalog> {
        Arc::clone(&self.state.lock().catalog)
    }

    fn user_context(&self) -> UserContext {
        self.state.lock().context.clone()
    }

    fn sync_context(&self, tier: Tier, secure_core: bool) {
        let mut state = self.state.lock();
        if state.context.tier == tier && state.context.secure_core == secure_core {
            return;
        }
        state.context.tier = tier;
        state.context.secure_core = secure_core;
        self.rebuild_locked(&mut state);
    }
}
