//! Secondary indices kept in lock-step with the projection
//!
//! [`NameIndex`] maps lower-cased names to equipment ids and remembers the
//! current key per id so a rename is one remove plus one insert.
//! [`RelatedCablesIndex`] maps conduit segments to the cables threaded
//! through them.

use fibernet_model::{SpanEquipmentId, SpanSegmentId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

/// Case-insensitive name to equipment index
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    by_name: BTreeMap<String, BTreeSet<Uuid>>,
    by_id: HashMap<Uuid, String>,
}

impl NameIndex {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the name of `id`; the previous key is removed
    pub fn set(&mut self, id: Uuid, name: Option<&str>) {
        if let Some(old) = self.by_id.remove(&id) {
            if let Some(ids) = self.by_name.get_mut(&old) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_name.remove(&old);
                }
            }
        }

        let Some(key) = name.map(normalize).filter(|k| !k.is_empty()) else {
            return;
        };
        self.by_name.entry(key.clone()).or_default().insert(id);
        self.by_id.insert(id, key);
    }

    /// Ids whose name equals `name`, ignoring case
    #[must_use]
    pub fn lookup(&self, name: &str) -> BTreeSet<Uuid> {
        self.by_name.get(&normalize(name)).cloned().unwrap_or_default()
    }

    /// Ids whose name starts with `prefix`, ignoring case, in name order
    #[must_use]
    pub fn search_prefix(&self, prefix: &str) -> Vec<Uuid> {
        let prefix = normalize(prefix);
        self.by_name
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Current index key of `id`
    #[must_use]
    pub fn key_of(&self, id: Uuid) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Every id appears under exactly the key recorded for it
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let entries: usize = self.by_name.values().map(BTreeSet::len).sum();
        entries == self.by_id.len()
            && self
                .by_id
                .iter()
                .all(|(id, key)| self.by_name.get(key).is_some_and(|ids| ids.contains(id)))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Conduit segment to affixed cables
#[derive(Debug, Clone, Default)]
pub struct RelatedCablesIndex {
    inner: HashMap<SpanSegmentId, BTreeSet<SpanEquipmentId>>,
}

impl RelatedCablesIndex {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the cable was already recorded
    pub fn add(&mut self, segment: SpanSegmentId, cable: SpanEquipmentId) -> bool {
        self.inner.entry(segment).or_default().insert(cable)
    }

    /// Returns false if the cable was not recorded
    pub fn remove(&mut self, segment: SpanSegmentId, cable: SpanEquipmentId) -> bool {
        let Some(cables) = self.inner.get_mut(&segment) else {
            return false;
        };
        let removed = cables.remove(&cable);
        if cables.is_empty() {
            self.inner.remove(&segment);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, segment: SpanSegmentId, cable: SpanEquipmentId) -> bool {
        self.inner.get(&segment).is_some_and(|c| c.contains(&cable))
    }

    /// Cables through `segment`, in id order
    #[must_use]
    pub fn get(&self, segment: SpanSegmentId) -> BTreeSet<SpanEquipmentId> {
        self.inner.get(&segment).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rename_moves_key() {
        let mut index = NameIndex::new();
        let id = Uuid::new_v4();
        index.set(id, Some("K100"));
        assert!(index.lookup("k100").contains(&id));

        index.set(id, Some("K200"));
        assert!(index.lookup("K100").is_empty());
        assert!(index.lookup("k200").contains(&id));
        assert_eq!(index.key_of(id), Some("k200"));

        index.set(id, None);
        assert!(index.lookup("k200").is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn shared_names_keep_both_ids() {
        let mut index = NameIndex::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        index.set(a, Some("Splitter"));
        index.set(b, Some("SPLITTER"));
        assert_eq!(index.lookup("splitter").len(), 2);

        index.set(a, Some("Other"));
        assert_eq!(index.lookup("splitter").into_iter().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn prefix_search_is_case_insensitive() {
        let mut index = NameIndex::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        index.set(a, Some("CO-1 ODF"));
        index.set(b, Some("co-1 splitter"));
        index.set(c, Some("CO-2"));

        let found = index.search_prefix("Co-1");
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn related_cables_add_remove() {
        let mut index = RelatedCablesIndex::new();
        let segment = SpanSegmentId::new();
        let cable = SpanEquipmentId::new();

        assert!(index.add(segment, cable));
        assert!(!index.add(segment, cable));
        assert!(index.contains(segment, cable));
        assert!(index.remove(segment, cable));
        assert!(index.get(segment).is_empty());
        assert!(!index.remove(segment, cable));
    }

    proptest! {
        #[test]
        fn prop_renames_keep_one_key_per_id(ops in prop::collection::vec((0usize..4, prop::option::of("[a-cA-C]{1,3}")), 1..60)) {
            let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
            let mut index = NameIndex::new();
            let mut expected: HashMap<Uuid, String> = HashMap::new();

            for (slot, name) in ops {
                let id = ids[slot];
                index.set(id, name.as_deref());
                match name {
                    Some(n) => { expected.insert(id, n.to_lowercase()); }
                    None => { expected.remove(&id); }
                }
                prop_assert!(index.is_consistent());
            }

            for (id, name) in &expected {
                prop_assert!(index.lookup(&name.to_uppercase()).contains(id));
            }
            prop_assert_eq!(index.len(), expected.len());
        }
    }
}
