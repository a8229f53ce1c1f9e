//! Free-text country filter.
//!
//! Produces a visibility mask aligned with an already-sorted country list;
//! the catalog itself is never rebuilt or reordered.

use super::country::CountryAggregate;
use super::split::ServerCatalog;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityMask(Vec<bool>);

impl VisibilityMask {
    pub fn all_visible(len: usize) -> Self {
        VisibilityMask(vec![true; len])
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.0.iter().filter(|v| **v).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

/// Masks for both partitions of a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogMask {
    pub secure_core: VisibilityMask,
    pub standard: VisibilityMask,
}

impl CatalogMask {
    pub fn all_visible(catalog: &ServerCatalog) -> Self {
        Self {
            secure_core: VisibilityMask::all_visible(catalog.secure_core.len()),
            standard: VisibilityMask::all_visible(catalog.standard.len()),
        }
    }

    pub fn view(&self, secure_core: bool) -> &VisibilityMask {
        if secure_core {
            &self.secure_core
        } else {
            &self.standard
        }
    }
}

/// A country matches when `query` is a case-insensitive substring of its
/// display name. An empty (or blank) query shows everything.
pub fn filter_countries(countries: &[CountryAggregate], query: &str) -> VisibilityMask {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return VisibilityMask::all_visible(countries.len());
    }
    VisibilityMask(
        countries
            .iter()
            .map(|c| c.name.to_lowercase().contains(&needle))
            .collect(),
    )
}

pub fn search(catalog: &ServerCatalog, query: &str) -> CatalogMask {
    CatalogMask {
        secure_core: filter_countries(&catalog.secure_core, query),
        standard: filter_countries(&catalog.standard, query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use crate::catalog::server::Tier;
    use crate::testing::ServerBuilder;

    fn catalog() -> ServerCatalog {
        let servers = vec![
            ServerBuilder::new("CH#1", "CH").build(),
            ServerBuilder::new("SE#1", "SE").build(),
            ServerBuilder::new("US#1", "US").build(),
            ServerBuilder::new("IS-SE#1", "SE").secure_core("IS").build(),
        ];
        build_catalog(&servers, Tier::Plus)
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let catalog = catalog();
        // Sweden, Switzerland, United States
        let mask = search(&catalog, "sw");
        assert_eq!(mask.standard.as_slice(), &[true, true, false]);
        assert_eq!(mask.secure_core.as_slice(), &[true]);

        let mask = search(&catalog, "STATES");
        assert_eq!(mask.standard.visible_count(), 1);
        assert!(mask.standard.is_visible(2));
    }

    #[test]
    fn empty_query_shows_everything() {
        let catalog = catalog();
        assert_eq!(search(&catalog, ""), CatalogMask::all_visible(&catalog));
        assert_eq!(search(&catalog, "   "), CatalogMask::all_visible(&catalog));
    }

    #[test]
    fn search_is_idempotent_and_leaves_order_alone() {
        let catalog = catalog();
        let order_before: Vec<_> = catalog.standard.iter().map(|c| c.code.clone()).collect();

        let once = search(&catalog, "land");
        let twice = search(&catalog, "land");
        assert_eq!(once, twice);

        let order_after: Vec<_> = catalog.standard.iter().map(|c| c.code.clone()).collect();
        assert_eq!(order_before, order_after);
    }

    #[test]
    fn out_of_range_index_is_hidden() {
        let mask = VisibilityMask::all_visible(2);
        assert!(mask.is_visible(1));
        assert!(!mask.is_visible(2));
    }
}
