use thiserror::Error;

/// Errors surfaced by a destination store, classified so that callers can
/// tell anticipated constraint violations from real failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("unique constraint violated ({constraint}): {detail}")]
    UniqueViolation { constraint: String, detail: String },

    #[error("foreign key constraint violated ({constraint}): {detail}")]
    ForeignKeyViolation { constraint: String, detail: String },

    #[error("not-null constraint violated: {0}")]
    NotNullViolation(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, StoreError::ForeignKeyViolation { .. })
    }

    /// Short label for grouping errors in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::UniqueViolation { .. } => "unique_violation",
            StoreError::ForeignKeyViolation { .. } => "foreign_key_violation",
            StoreError::NotNullViolation(_) => "not_null_violation",
            StoreError::Database(_) => "database",
            StoreError::Connection(_) => "connection",
            StoreError::InvalidQuery(_) => "invalid_query",
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                let detail = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => StoreError::UniqueViolation { constraint, detail },
                    Some("23503") => StoreError::ForeignKeyViolation { constraint, detail },
                    Some("23502") => StoreError::NotNullViolation(detail),
                    _ => StoreError::Database(detail),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => StoreError::Connection(err.to_string()),
            _ => StoreError::Database(err.to_string()),
        }
    }
}
