use chrono::{DateTime, Utc};
use cms_database::{Row, StoreError};
use cms_source::{bson::Document, fields, Collection, SourceRecord};
use uuid::Uuid;

use crate::context::MigrationContext;
use crate::outcome::SkipReason;

/// Moves one source collection into one destination table.
pub trait EntityMigrator: Send + Sync {
    fn collection(&self) -> Collection;

    fn table(&self) -> &'static str;

    /// Collections whose ids this migrator resolves.
    fn depends_on(&self) -> &'static [Collection] {
        &[]
    }

    /// Builds the destination row for `record`, whose id is `dest_id`.
    fn transform(
        &self,
        record: &SourceRecord,
        dest_id: Uuid,
        ctx: &mut MigrationContext,
    ) -> Result<Row, SkipReason>;

    /// Store errors this migrator expects from dirty data and counts as
    /// skips rather than failures.
    fn tolerates(&self, err: &StoreError) -> bool {
        err.is_unique_violation() || err.is_foreign_key_violation()
    }
}

pub(crate) fn source_id(record: &SourceRecord) -> Result<&str, SkipReason> {
    record.source_id.as_deref().ok_or(SkipReason::MissingSourceId)
}

pub(crate) fn required_text(doc: &Document, keys: &[&'static str]) -> Result<String, SkipReason> {
    fields::first_text(doc, keys).ok_or(SkipReason::MissingField(keys[0]))
}

pub(crate) fn required_date(doc: &Document, keys: &[&'static str]) -> Result<DateTime<Utc>, SkipReason> {
    if let Some(date) = fields::first_date(doc, keys) {
        return Ok(date);
    }
    match keys.iter().find_map(|k| fields::text(doc, k).map(|v| (*k, v))) {
        Some((field, value)) => Err(SkipReason::InvalidField { field, value }),
        None => Err(SkipReason::MissingField(keys[0])),
    }
}

/// `created_at` falls back to the run start and `updated_at` to `created_at`.
pub(crate) fn with_timestamps(row: Row, doc: &Document, ctx: &MigrationContext) -> Row {
    let created_at = fields::first_date(doc, &["createdAt", "created_at", "createdOn"])
        .unwrap_or_else(|| ctx.run_started());
    let updated_at = fields::first_date(doc, &["updatedAt", "updated_at"]).unwrap_or(created_at);
    row.with("created_at", created_at).with("updated_at", updated_at)
}

/// Integer columns are INT4; values outside that range are unusable.
pub(crate) fn int4(doc: &Document, field: &'static str, value: Option<i64>) -> Result<Option<i32>, SkipReason> {
    match value {
        None => Ok(None),
        Some(v) => i32::try_from(v).map(Some).map_err(|_| SkipReason::InvalidField {
            field,
            value: fields::text(doc, field).unwrap_or_else(|| v.to_string()),
        }),
    }
}
