//! Secure-core / standard partitioning.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::countries::canonical_code;
use super::country::CountryAggregate;
use super::server::{Feature, ServerRecord, Tier};

/// Two parallel country lists built from one record set.
#[derive(Debug, Clone)]
pub struct ServerCatalog {
    /// Countries with at least one secure-core server, secure-core members only
    pub secure_core: Vec<CountryAggregate>,
    /// Countries with at least one regular server, regular members only
    pub standard: Vec<CountryAggregate>,
    pub user_tier: Tier,
    pub built_at: DateTime<Utc>,
}

impl ServerCatalog {
    pub fn empty(user_tier: Tier) -> Self {
        Self {
            secure_core: Vec::new(),
            standard: Vec::new(),
            user_tier,
            built_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.secure_core.is_empty() && self.standard.is_empty()
    }

    /// The list the UI shows for the current secure-core toggle.
    pub fn view(&self, secure_core: bool) -> &[CountryAggregate] {
        if secure_core {
            &self.secure_core
        } else {
            &self.standard
        }
    }

    pub fn find_country(&self, code: &str, secure_core: bool) -> Option<&CountryAggregate> {
        self.view(secure_core)
            .iter()
            .find(|c| c.code == canonical_code(code))
    }

    /// Look a server up in either partition.
    pub fn find_server(&self, name: &str) -> Option<(&CountryAggregate, &Arc<ServerRecord>)> {
        self.standard
            .iter()
            .chain(self.secure_core.iter())
            .find_map(|country| country.find_server(name).map(|s| (country, s)))
    }

    pub fn server_count(&self) -> usize {
        self.secure_core
            .iter()
            .chain(self.standard.iter())
            .map(|c| c.servers.len())
            .sum()
    }
}

/// Partition every country by the SecureCore feature. Source aggregates are
/// left untouched; each side is a freshly classified aggregate, dropped when
/// it would have no members.
pub fn split_catalog(countries: &[CountryAggregate], user_tier: Tier) -> ServerCatalog {
    let mut catalog = ServerCatalog::empty(user_tier);

    for country in countries {
        let (secure, standard): (Vec<_>, Vec<_>) = country
            .servers
            .iter()
            .cloned()
            .partition(|s| s.is_secure_core());

        if let Some(aggregate) = CountryAggregate::build(&country.code, secure, user_tier) {
            catalog.secure_core.push(aggregate);
        }
        if let Some(mut aggregate) = CountryAggregate::build(&country.code, standard, user_tier) {
            aggregate.features.remove(Feature::SecureCore);
            catalog.standard.push(aggregate);
        }
    }

    log::debug!(
        "Split {} countries into {} secure-core and {} standard",
        countries.len(),
        catalog.secure_core.len(),
        catalog.standard.len()
    );
    catalog
}
