//! Country and server ordering.
//!
//! Countries are grouped by what the user's tier can use, then sorted by
//! display name. Inside a standard country the user's own tier comes first,
//! then the remaining tiers from highest to lowest so upgrades surface
//! before servers the user already has.

use std::cmp::Ordering;
use std::sync::Arc;

use super::country::CountryAggregate;
use super::server::{ServerRecord, Tier};
use super::split::ServerCatalog;

/// Split `PREFIX#N...` into a comparable key. Names without a numeric
/// suffix compare as plain lower-case text.
fn name_key(name: &str) -> (String, Option<u64>, String) {
    if let Some((prefix, rest)) = name.rsplit_once('#') {
        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if let Ok(number) = rest[..digits_len].parse::<u64>() {
            return (
                prefix.to_lowercase(),
                Some(number),
                rest[digits_len..].to_lowercase(),
            );
        }
    }
    (name.to_lowercase(), None, String::new())
}

/// Case-insensitive name order with numeric server suffixes (`CH#2` < `CH#10`).
pub fn natural_name_cmp(a: &str, b: &str) -> Ordering {
    name_key(a).cmp(&name_key(b)).then_with(|| a.cmp(b))
}

fn display_cmp(a: &CountryAggregate, b: &CountryAggregate) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.code.cmp(&b.code))
}

/// 0 = shown first, 1 = shown after.
fn country_group(country: &CountryAggregate, user_tier: Tier) -> u8 {
    let first = match user_tier {
        Tier::Free => country.tiers.contains(&Tier::Free),
        Tier::Basic => country.minimum_tier <= Tier::Basic,
        Tier::Plus => true,
        Tier::Internal => country.minimum_tier == Tier::Internal,
    };
    if first {
        0
    } else {
        1
    }
}

pub fn sort_countries(countries: &mut [CountryAggregate], user_tier: Tier, secure_core: bool) {
    if secure_core {
        countries.sort_by(display_cmp);
        return;
    }
    countries.sort_by(|a, b| {
        country_group(a, user_tier)
            .cmp(&country_group(b, user_tier))
            .then_with(|| display_cmp(a, b))
    });
}

pub fn sort_servers(servers: &mut [Arc<ServerRecord>], user_tier: Tier, secure_core: bool) {
    if secure_core {
        servers.sort_by(|a, b| natural_name_cmp(&a.name, &b.name));
        return;
    }
    servers.sort_by(|a, b| {
        let a_own = a.tier == user_tier;
        let b_own = b.tier == user_tier;
        b_own
            .cmp(&a_own)
            .then_with(|| b.tier.cmp(&a.tier))
            .then_with(|| natural_name_cmp(&a.name, &b.name))
    });
}

/// Order both partitions of a freshly built catalog.
pub fn sort_catalog(mut catalog: ServerCatalog) -> ServerCatalog {
    let tier = catalog.user_tier;
    for country in catalog.secure_core.iter_mut() {
        sort_servers(&mut country.servers, tier, true);
    }
    for country in catalog.standard.iter_mut() {
        sort_servers(&mut country.servers, tier, false);
    }
    sort_countries(&mut catalog.secure_core, tier, true);
    sort_countries(&mut catalog.standard, tier, false);
    catalog
}
