//! Per-country aggregation and tier/feature classification.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::countries::country_name;
use super::server::{FeatureSet, ServerRecord, ServerStatus, Tier};

/// Derived rollup of one country's servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryAggregate {
    /// Exit country code the servers are grouped under
    pub code: String,
    pub name: String,
    pub servers: Vec<Arc<ServerRecord>>,
    pub tiers: BTreeSet<Tier>,
    pub features: FeatureSet,
    pub status: ServerStatus,
    pub minimum_tier: Tier,
    pub can_connect: bool,
    pub is_virtual: bool,
}

impl CountryAggregate {
    /// Classify `servers` as one country for a user on `user_tier`.
    /// Returns `None` for an empty member list.
    pub fn build(code: &str, servers: Vec<Arc<ServerRecord>>, user_tier: Tier) -> Option<Self> {
        let tiers: BTreeSet<Tier> = servers.iter().map(|s| s.tier).collect();
        let minimum_tier = *tiers.iter().next()?;

        let features = servers
            .iter()
            .fold(FeatureSet::empty(), |acc, s| acc.union(s.features));

        let status = if servers.iter().any(|s| s.is_active()) {
            ServerStatus::Active
        } else {
            ServerStatus::UnderMaintenance
        };

        Some(Self {
            code: code.to_string(),
            name: country_name(code),
            can_connect: can_connect(user_tier, &tiers),
            is_virtual: servers.iter().all(|s| s.is_virtual()),
            servers,
            tiers,
            features,
            status,
            minimum_tier,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ServerStatus::Active
    }

    pub fn find_server(&self, name: &str) -> Option<&Arc<ServerRecord>> {
        self.servers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Free users need a free server in the country; every paid tier can at
/// least open the country.
pub fn can_connect(user_tier: Tier, tiers: &BTreeSet<Tier>) -> bool {
    (user_tier == Tier::Free && tiers.contains(&Tier::Free)) || user_tier > Tier::Free
}

/// Group servers by exit country and classify each group. Output is in
/// country-code order; member order follows the input.
pub fn aggregate_countries(servers: &[Arc<ServerRecord>], user_tier: Tier) -> Vec<CountryAggregate> {
    let mut groups: BTreeMap<&str, Vec<Arc<ServerRecord>>> = BTreeMap::new();
    for server in servers {
        groups
            .entry(server.exit_country.as_str())
            .or_default()
            .push(Arc::clone(server));
    }

    groups
        .into_iter()
        .filter_map(|(code, members)| CountryAggregate::build(code, members, user_tier))
        .collect()
}
