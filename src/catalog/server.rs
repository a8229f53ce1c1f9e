//! Server records: raw service shape and the normalized, immutable form.
//!
//! The service hands out loosely-typed records (numeric tiers, a feature
//! bitmask, optional country codes). `normalize` turns each one into a
//! `ServerRecord` or a `ClassificationError`; `normalize_all` skips and logs
//! the bad ones.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::countries::canonical_code;
use crate::error::ClassificationError;

// ── Tier ────────────────────────────────────────────────────────────────────

/// Access level of a server or a user. Declaration order is privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Basic,
    /// Plus and Visionary plans share server access.
    Plus,
    /// Staff-only servers.
    Internal,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Basic, Tier::Plus, Tier::Internal];

    pub fn from_code(code: i64) -> Option<Tier> {
        match code {
            0 => Some(Tier::Free),
            1 => Some(Tier::Basic),
            2 => Some(Tier::Plus),
            3 => Some(Tier::Internal),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Tier::Free => 0,
            Tier::Basic => 1,
            Tier::Plus => 2,
            Tier::Internal => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Free => write!(f, "Free"),
            Tier::Basic => write!(f, "Basic"),
            Tier::Plus => write!(f, "Plus"),
            Tier::Internal => write!(f, "Internal"),
        }
    }
}

// ── Features ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    SecureCore,
    Tor,
    P2P,
    Streaming,
    /// Set when a server advertises none of the others.
    Normal,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::SecureCore,
        Feature::Tor,
        Feature::P2P,
        Feature::Streaming,
        Feature::Normal,
    ];

    fn bit(self) -> u8 {
        match self {
            Feature::SecureCore => 1,
            Feature::Tor => 1 << 1,
            Feature::P2P => 1 << 2,
            Feature::Streaming => 1 << 3,
            Feature::Normal => 1 << 4,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::SecureCore => write!(f, "Secure Core"),
            Feature::Tor => write!(f, "Tor"),
            Feature::P2P => write!(f, "P2P"),
            Feature::Streaming => write!(f, "Streaming"),
            Feature::Normal => write!(f, "Normal"),
        }
    }
}

/// Bit mask of the service's feature field.
const WIRE_SECURE_CORE: u32 = 1;
const WIRE_TOR: u32 = 2;
const WIRE_P2P: u32 = 4;
const WIRE_STREAMING: u32 = 8;

/// Small copyable set of `Feature`s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureSet(u8);

impl FeatureSet {
    pub const fn empty() -> Self {
        FeatureSet(0)
    }

    /// Decode the service bitmask. Unknown bits are ignored; no known bit
    /// means `Normal`.
    pub fn from_wire(bits: u32) -> Self {
        let mut set = FeatureSet::empty();
        if bits & WIRE_SECURE_CORE != 0 {
            set.insert(Feature::SecureCore);
        }
        if bits & WIRE_TOR != 0 {
            set.insert(Feature::Tor);
        }
        if bits & WIRE_P2P != 0 {
            set.insert(Feature::P2P);
        }
        if bits & WIRE_STREAMING != 0 {
            set.insert(Feature::Streaming);
        }
        if set.is_empty() {
            set.insert(Feature::Normal);
        }
        set
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    pub fn insert(&mut self, feature: Feature) {
        self.0 |= feature.bit();
    }

    pub fn remove(&mut self, feature: Feature) {
        self.0 &= !feature.bit();
    }

    pub fn union(self, other: FeatureSet) -> FeatureSet {
        FeatureSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut set = FeatureSet::empty();
        for feature in iter {
            set.insert(feature);
        }
        set
    }
}

// ── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerStatus {
    Active,
    UnderMaintenance,
}

impl ServerStatus {
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            ServerStatus::Active
        } else {
            ServerStatus::UnderMaintenance
        }
    }
}

// ── Raw record ──────────────────────────────────────────────────────────────

/// Server record as returned by the VPN service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawServer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub load: Option<i64>,
    #[serde(default)]
    pub tier: i64,
    #[serde(default)]
    pub features: u32,
    #[serde(default = "default_status")]
    pub status: i64,
    #[serde(default)]
    pub entry_country: Option<String>,
    #[serde(default)]
    pub exit_country: Option<String>,
    #[serde(default)]
    pub host_country: Option<String>,
}

fn default_status() -> i64 {
    1
}

/// Matches what serde fills in for an empty object, so a record built in
/// code and one decoded with missing fields agree.
impl Default for RawServer {
    fn default() -> Self {
        Self {
            name: None,
            city: None,
            load: None,
            tier: 0,
            features: 0,
            status: default_status(),
            entry_country: None,
            exit_country: None,
            host_country: None,
        }
    }
}

// ── Normalized record ───────────────────────────────────────────────────────

/// Immutable, validated server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub name: String,
    pub city: Option<String>,
    pub load: u8,
    pub tier: Tier,
    pub features: FeatureSet,
    pub status: ServerStatus,
    pub entry_country: String,
    pub exit_country: String,
    pub host_country: String,
}

impl ServerRecord {
    pub fn is_secure_core(&self) -> bool {
        self.features.contains(Feature::SecureCore)
    }

    pub fn is_active(&self) -> bool {
        self.status == ServerStatus::Active
    }

    /// Routed through a country other than the one it is hosted in.
    pub fn is_virtual(&self) -> bool {
        self.host_country != self.exit_country
    }
}

fn country_code(value: Option<&str>) -> Option<String> {
    let code = value?.trim();
    if code.is_empty() {
        None
    } else {
        Some(canonical_code(code))
    }
}

pub fn normalize(raw: &RawServer) -> Result<ServerRecord, ClassificationError> {
    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ClassificationError::MissingName)?
        .to_string();

    let exit_country = country_code(raw.exit_country.as_deref())
        .ok_or_else(|| ClassificationError::MissingExitCountry {
            server: name.clone(),
        })?;
    let entry_country = country_code(raw.entry_country.as_deref())
        .ok_or_else(|| ClassificationError::MissingEntryCountry {
            server: name.clone(),
        })?;
    let host_country =
        country_code(raw.host_country.as_deref()).unwrap_or_else(|| exit_country.clone());

    let tier = Tier::from_code(raw.tier).ok_or_else(|| ClassificationError::UnknownTier {
        server: name.clone(),
        tier: raw.tier,
    })?;

    let load = match raw.load.unwrap_or(0) {
        l @ 0..=100 => l as u8,
        other => {
            return Err(ClassificationError::LoadOutOfRange {
                server: name,
                load: other,
            })
        }
    };

    Ok(ServerRecord {
        city: raw
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        load,
        tier,
        features: FeatureSet::from_wire(raw.features),
        status: ServerStatus::from_code(raw.status),
        entry_country,
        exit_country,
        host_country,
        name,
    })
}

/// Normalize a whole fetch. Malformed records are logged and dropped.
pub fn normalize_all(raw: &[RawServer]) -> Vec<Arc<ServerRecord>> {
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;

    for record in raw {
        match normalize(record) {
            Ok(server) => records.push(Arc::new(server)),
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping server record: {}", e);
            }
        }
    }

    if skipped > 0 {
        log::info!(
            "Normalized {} servers, skipped {} malformed records",
            records.len(),
            skipped
        );
    }
    records
}
