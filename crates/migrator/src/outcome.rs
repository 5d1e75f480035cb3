use cms_source::Collection;
use serde::Serialize;
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;
use uuid::Uuid;

/// Why a record was deliberately left out.
#[derive(Debug, Clone, PartialEq, Eq, Error, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    #[error("record has no _id")]
    MissingSourceId,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has unusable value '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("'{field}' points at a {collection} record that was not migrated")]
    UnresolvedReference { field: &'static str, collection: Collection },

    #[error("duplicate of an earlier record on {key}")]
    Duplicate { key: String },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

impl SkipReason {
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum FailureKind {
    /// The destination rejected the row for a reason nobody anticipated.
    Store,
    /// A NOT NULL column was left empty.
    NotNull,
    /// The migrator produced an unusable row.
    Transform,
}

/// Result of migrating one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Migrated(Uuid),
    Skipped(SkipReason),
    Failed(FailureKind, String),
}

impl RecordOutcome {
    pub fn is_migrated(&self) -> bool {
        matches!(self, RecordOutcome::Migrated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_messages() {
        let reason = SkipReason::UnresolvedReference { field: "userId", collection: Collection::Users };
        assert_eq!(reason.to_string(), "'userId' points at a users record that was not migrated");
        assert_eq!(reason.kind(), "unresolved_reference");
        assert_eq!(SkipReason::MissingField("email").kind(), "missing_field");
    }
}
