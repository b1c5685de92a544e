//! Content-hash deduplication of place hierarchies.

use crate::error::{GeoError, Result};
use ahash::AHashSet;
use std::collections::BTreeMap;

/// Placetype (`country_id`, `region_id`, ...) -> ancestor id.
pub type Hierarchy = BTreeMap<String, i64>;

/// Hash of the canonical JSON encoding. `BTreeMap` keys serialize sorted so equal
/// hierarchies always hash the same regardless of how they were built.
pub fn hierarchy_hash(h: &Hierarchy) -> Result<u64> {
    let encoded = serde_json::to_vec(h).map_err(GeoError::Encode)?;
    Ok(seahash::hash(&encoded))
}

/// Unique hierarchies in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct HierarchySet {
    seen: AHashSet<u64>,
    ordered: Vec<Hierarchy>,
}

impl HierarchySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, h: Hierarchy) -> Result<bool> {
        if !self.seen.insert(hierarchy_hash(&h)?) {
            return Ok(false);
        }

        self.ordered.push(h);
        Ok(true)
    }

    pub fn extend<I: IntoIterator<Item = Hierarchy>>(&mut self, hierarchies: I) -> Result<()> {
        for h in hierarchies {
            self.insert(h)?;
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn as_slice(&self) -> &[Hierarchy] {
        &self.ordered
    }

    pub fn into_vec(self) -> Vec<Hierarchy> {
        self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(pairs: &[(&str, i64)]) -> Hierarchy {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_dedup_is_order_independent() {
        let mut set = HierarchySet::new();

        assert!(set.insert(h(&[("country_id", 1), ("region_id", 2)])).unwrap());
        assert!(!set.insert(h(&[("region_id", 2), ("country_id", 1)])).unwrap());
        assert!(set.insert(h(&[("country_id", 1)])).unwrap());

        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[1], h(&[("country_id", 1)]));
    }
}
