use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cms_source::{bson::Document, fields, Collection};
use uuid::Uuid;

use crate::outcome::SkipReason;
use crate::translator::IdentifierTranslator;

/// State shared by every migrator in one run.
#[derive(Debug)]
pub struct MigrationContext {
    pub translator: IdentifierTranslator,
    claims: HashMap<(Collection, String), Uuid>,
    claimed_by: HashMap<Uuid, Vec<(Collection, String)>>,
    run_started: DateTime<Utc>,
}

impl Default for MigrationContext {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl MigrationContext {
    pub fn new(run_started: DateTime<Utc>) -> Self {
        Self {
            translator: IdentifierTranslator::new(),
            claims: HashMap::new(),
            claimed_by: HashMap::new(),
            run_started,
        }
    }

    /// Used as `created_at` for records that carry no timestamp.
    pub fn run_started(&self) -> DateTime<Utc> {
        self.run_started
    }

    /// Claims `key` for `dest`. Returns the earlier owner if the key was
    /// already taken.
    pub fn claim_unique(&mut self, collection: Collection, key: &str, dest: Uuid) -> Option<Uuid> {
        let slot = (collection, key.to_string());
        if let Some(owner) = self.claims.get(&slot) {
            return Some(*owner);
        }
        self.claims.insert(slot.clone(), dest);
        self.claimed_by.entry(dest).or_default().push(slot);
        None
    }

    /// First record wins. A later record with the same key is skipped and its
    /// source id is pointed at the survivor so dependents still resolve.
    pub fn ensure_unique(
        &mut self,
        collection: Collection,
        source_id: &str,
        key: String,
        dest: Uuid,
    ) -> Result<(), SkipReason> {
        match self.claim_unique(collection, &key, dest) {
            None => Ok(()),
            Some(owner) => {
                self.translator.alias(source_id, collection, owner);
                Err(SkipReason::Duplicate { key })
            }
        }
    }

    /// Drops every claim held by `dest`; called when its row never landed.
    pub fn release_claims(&mut self, dest: Uuid) {
        for slot in self.claimed_by.remove(&dest).unwrap_or_default() {
            self.claims.remove(&slot);
        }
    }

    pub fn resolve(&self, doc: &Document, field: &str, collection: Collection) -> Option<Uuid> {
        let source = fields::reference(doc, field)?;
        self.translator.resolve(&source, collection)
    }

    /// A reference the row cannot exist without.
    pub fn required_ref(
        &self,
        doc: &Document,
        field: &'static str,
        collection: Collection,
    ) -> Result<Uuid, SkipReason> {
        self.required_ref_any(doc, &[field], collection)
    }

    /// Like [`required_ref`](Self::required_ref) but accepts the first of
    /// several field names that is present.
    pub fn required_ref_any(
        &self,
        doc: &Document,
        keys: &[&'static str],
        collection: Collection,
    ) -> Result<Uuid, SkipReason> {
        let Some((field, source)) = keys
            .iter()
            .find_map(|f| fields::reference(doc, f).map(|s| (*f, s)))
        else {
            return Err(SkipReason::MissingField(keys.first().copied().unwrap_or("_id")));
        };
        self.translator
            .resolve(&source, collection)
            .ok_or(SkipReason::UnresolvedReference { field, collection })
    }

    /// A reference that is dropped to NULL when it cannot be resolved.
    pub fn optional_ref(&self, doc: &Document, keys: &[&str], collection: Collection) -> Option<Uuid> {
        let (field, source) = keys
            .iter()
            .find_map(|f| fields::reference(doc, f).map(|s| (*f, s)))?;
        let resolved = self.translator.resolve(&source, collection);
        if resolved.is_none() {
            tracing::debug!("Dropping unresolved {} reference {}={}", collection, field, source);
        }
        resolved
    }
}
