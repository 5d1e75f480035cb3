use std::collections::{BTreeMap, HashMap};

use mongodb::bson::Document;

use crate::classifier::{Classification, Classifier};
use crate::collection::Collection;
use crate::fields;
use crate::scanner::{ArchiveEntry, ArchiveWalker, ScanStats};

#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub source_id: Option<String>,
    pub document: Document,
}

impl SourceRecord {
    pub fn new(document: Document) -> Self {
        Self { source_id: fields::source_id(&document), document }
    }
}

#[derive(Debug, Clone, Default)]
struct Signature {
    count: usize,
    sample_id: Option<String>,
}

/// Diagnostic tally of documents no rule claimed, keyed by their sorted
/// field names. The documents themselves are not retained.
#[derive(Debug, Clone, Default)]
pub struct UnidentifiedLog {
    signatures: HashMap<String, Signature>,
    total: usize,
}

impl UnidentifiedLog {
    pub fn record(&mut self, doc: &Document) {
        let mut keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let entry = self.signatures.entry(keys.join(",")).or_default();
        entry.count += 1;
        if entry.sample_id.is_none() {
            entry.sample_id = fields::source_id(doc);
        }
        self.total += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// The `n` most frequent signatures as `(signature, count, sample id)`.
    /// Ties are broken by signature so the output is stable.
    pub fn top(&self, n: usize) -> Vec<(&str, usize, Option<&str>)> {
        let mut entries: Vec<_> = self
            .signatures
            .iter()
            .map(|(sig, s)| (sig.as_str(), s.count, s.sample_id.as_deref()))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }

    pub fn log_summary(&self, n: usize) {
        if self.total == 0 {
            return;
        }
        tracing::warn!(
            "⚠️  {} documents matched no collection ({} distinct field patterns)",
            self.total,
            self.signatures.len()
        );
        for (signature, count, sample) in self.top(n) {
            tracing::warn!(
                "   {:>6} × [{}] e.g. _id={}",
                count,
                signature,
                sample.unwrap_or("-")
            );
        }
    }
}

/// Classified source documents, bucketed per collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionStore {
    buckets: BTreeMap<Collection, Vec<SourceRecord>>,
    unidentified: UnidentifiedLog,
    scan: Option<ScanStats>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, classification: Classification, document: Document) {
        match classification {
            Classification::Collection(collection) => self
                .buckets
                .entry(collection)
                .or_default()
                .push(SourceRecord::new(document)),
            Classification::Unidentified => self.unidentified.record(&document),
        }
    }

    pub fn bucket(&self, collection: Collection) -> &[SourceRecord] {
        self.buckets.get(&collection).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of classified records across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> BTreeMap<Collection, usize> {
        self.buckets.iter().map(|(c, records)| (*c, records.len())).collect()
    }

    pub fn unidentified(&self) -> &UnidentifiedLog {
        &self.unidentified
    }

    pub fn scan_stats(&self) -> Option<ScanStats> {
        self.scan
    }

    /// Scans a decompressed dump and classifies every document in it.
    pub fn from_archive(buf: &[u8], classifier: &Classifier) -> Self {
        let mut store = Self::new();
        let mut walker = ArchiveWalker::new(buf);
        let mut namespaces = 0usize;

        for entry in walker.by_ref() {
            match entry {
                ArchiveEntry::Header(header) => {
                    tracing::debug!("Archive header: {}", header);
                }
                ArchiveEntry::Metadata { db, collection } => {
                    tracing::debug!("Archive lists {}.{}", db, collection);
                }
                ArchiveEntry::Namespace { eof: false, .. } => namespaces += 1,
                ArchiveEntry::Namespace { .. } => {}
                ArchiveEntry::Data { namespace, scanned } => {
                    let classification =
                        classifier.classify_with_hint(&scanned.document, namespace.as_deref());
                    store.insert(classification, scanned.document);
                }
            }
        }

        let stats = walker.stats();
        tracing::info!(
            "📦 Scanned {} bytes: {} documents, {} classified, {} unidentified",
            stats.bytes,
            stats.documents,
            store.len(),
            store.unidentified.total()
        );
        if walker.is_framed() {
            tracing::debug!("Archive had {} namespace blocks", namespaces);
        }
        if stats.skipped_bytes > 0 {
            tracing::warn!(
                "⚠️  Skipped {} unreadable bytes across {} resyncs ({} candidates failed to decode)",
                stats.skipped_bytes,
                stats.resyncs,
                stats.decode_failures
            );
        }
        store.scan = Some(stats);
        store
    }
}
