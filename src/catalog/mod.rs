//! Server catalog
//!
//! Turns the service's raw server list into the two sorted country lists
//! the client shows.
//!
//! ## Architecture
//!
//! - server.rs: raw record decoding and normalization
//! - countries.rs: country display names
//! - country.rs: per-country aggregation and tier/feature classification
//! - split.rs: secure-core / standard partitioning
//! - sort.rs: tier-aware country and server ordering
//! - search.rs: visibility masks for free-text search
//! - store.rs: current snapshot, rebuild triggers, catalog-ready broadcast

pub mod countries;
pub mod country;
pub mod search;
pub mod server;
pub mod sort;
pub mod split;
pub mod store;

use std::sync::Arc;

pub use countries::{canonical_code, country_name};
pub use country::{aggregate_countries, CountryAggregate};
pub use search::{search, CatalogMask, VisibilityMask};
pub use server::{normalize, normalize_all, Feature, FeatureSet, RawServer, ServerRecord, ServerStatus, Tier};
pub use sort::{natural_name_cmp, sort_catalog};
pub use split::{split_catalog, ServerCatalog};
pub use store::{CatalogProvider, CatalogStore, UserContext};

/// Aggregate, split and sort `servers` for a user on `user_tier`.
pub fn build_catalog(servers: &[Arc<ServerRecord>], user_tier: Tier) -> ServerCatalog {
    let countries = aggregate_countries(servers, user_tier);
    sort_catalog(split_catalog(&countries, user_tier))
}
