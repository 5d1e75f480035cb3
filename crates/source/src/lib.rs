mod archive;
mod classifier;
mod collection;
mod error;
mod mongo;
mod scanner;
mod store;

pub mod fields;

pub use archive::{read_archive, ArchiveError};
pub use classifier::{Classification, Classifier, Rule};
pub use collection::Collection;
pub use error::SourceError;
pub use mongo::MongoSource;
pub use scanner::{
    ArchiveEntry, ArchiveWalker, DocumentScanner, ScanStats, ScannedDocument, ARCHIVE_MAGIC,
    MAX_DOCUMENT_SIZE,
};
pub use store::{CollectionStore, SourceRecord, UnidentifiedLog};

pub use mongodb::bson;
