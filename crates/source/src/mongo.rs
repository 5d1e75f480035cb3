use futures::StreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::FindOptions;
use mongodb::{Client, Database};

use crate::classifier::Classifier;
use crate::collection::Collection;
use crate::error::SourceError;
use crate::store::CollectionStore;

/// Reads the CMS straight from a running MongoDB instead of a dump.
pub struct MongoSource {
    db: Database,
}

impl MongoSource {
    /// Connects and pings. `database` overrides the one named in the URL.
    pub async fn connect(uri: &str, database: Option<&str>) -> Result<Self, SourceError> {
        let client = Client::with_uri_str(uri).await?;
        let db = match database {
            Some(name) => client.database(name),
            None => client.default_database().ok_or(SourceError::NoDatabase)?,
        };
        db.run_command(doc! { "ping": 1 }, None).await?;
        tracing::info!("✅ Connected to MongoDB database '{}'", db.name());
        Ok(Self { db })
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    /// Loads every non-system collection. Collections whose name maps to a
    /// known tag are bucketed by name; the rest go through the classifier
    /// document by document.
    pub async fn load(&self, classifier: &Classifier, batch_size: u32) -> Result<CollectionStore, SourceError> {
        let mut names = self.db.list_collection_names(None).await?;
        names.sort();

        let mut store = CollectionStore::new();
        for name in names.iter().filter(|n| !n.starts_with("system.")) {
            let known = Collection::from_namespace(name);
            if known.is_none() {
                tracing::warn!("Collection '{}' has no known mapping, classifying per document", name);
            }

            let col = self.db.collection::<Document>(name);
            let options = FindOptions::builder().batch_size(batch_size).build();
            let mut docs = col.find(None, Some(options)).await?;

            let mut count = 0usize;
            while let Some(doc) = docs.next().await {
                let doc = doc?;
                let classification = classifier.classify_with_hint(&doc, Some(name));
                store.insert(classification, doc);
                count += 1;
            }
            tracing::info!("📥 Read {} documents from '{}'", count, name);
        }
        Ok(store)
    }
}
