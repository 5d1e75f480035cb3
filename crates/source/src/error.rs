use thiserror::Error;

use crate::archive::ArchiveError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("no database named in the MongoDB URL; pass one explicitly")]
    NoDatabase,
}
