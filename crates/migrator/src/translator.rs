use std::collections::{BTreeMap, HashMap};

use cms_source::Collection;
use uuid::Uuid;

/// Run-scoped map from source `_id` strings to destination ids, one table
/// per collection. Nothing is persisted between runs.
#[derive(Debug, Default)]
pub struct IdentifierTranslator {
    maps: HashMap<Collection, HashMap<String, Uuid>>,
}

impl IdentifierTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the destination id for `source_id`, allocating a fresh one on
    /// first sight.
    pub fn translate(&mut self, source_id: &str, collection: Collection) -> Uuid {
        *self
            .maps
            .entry(collection)
            .or_default()
            .entry(source_id.to_string())
            .or_insert_with(Uuid::new_v4)
    }

    /// Lookup only: `None` when no record with this id has been migrated.
    pub fn resolve(&self, source_id: &str, collection: Collection) -> Option<Uuid> {
        self.maps.get(&collection)?.get(source_id).copied()
    }

    /// Points `source_id` at an existing destination row, replacing any
    /// mapping it had. Used when a duplicate is folded into its survivor.
    pub fn alias(&mut self, source_id: &str, collection: Collection, dest: Uuid) {
        self.maps
            .entry(collection)
            .or_default()
            .insert(source_id.to_string(), dest);
    }

    pub fn forget(&mut self, source_id: &str, collection: Collection) -> Option<Uuid> {
        self.maps.get_mut(&collection)?.remove(source_id)
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.maps.get(&collection).map_or(0, HashMap::len)
    }

    /// Mapping sizes per collection, for the report.
    pub fn sizes(&self) -> BTreeMap<Collection, usize> {
        self.maps
            .iter()
            .filter(|(_, m)| !m.is_empty())
            .map(|(c, m)| (*c, m.len()))
            .collect()
    }
}
