use std::collections::HashMap;

use anyhow::{Context, Result};
use cms_database::{schema, schema::Reference, DestinationStore, OrderDirection, QueryCriteria, Row};
use tracing::{info, warn};
use uuid::Uuid;

use super::repoint;

/// Rows of `table` that agree on `key_columns` are duplicates; the first by
/// `order_column` is kept.
#[derive(Debug, Clone)]
pub struct DedupeRule {
    pub table: &'static str,
    pub key_columns: &'static [&'static str],
    pub order_column: &'static str,
    /// Move references from removed rows onto the kept row.
    pub repoint: bool,
}

/// Users go first so that student and industry profiles repointed onto a
/// surviving user are caught by the later rules.
pub fn default_dedupe_rules() -> Vec<DedupeRule> {
    vec![
        DedupeRule {
            table: schema::USERS,
            key_columns: &["email"],
            order_column: "created_at",
            repoint: true,
        },
        DedupeRule {
            table: schema::STUDENTS,
            key_columns: &["user_id"],
            order_column: "created_at",
            repoint: true,
        },
        DedupeRule {
            table: schema::INDUSTRIES,
            key_columns: &["user_id"],
            order_column: "created_at",
            repoint: true,
        },
        DedupeRule {
            table: schema::MONTHLY_REPORTS,
            key_columns: &["application_id", "report_month", "report_year"],
            order_column: "submitted_at",
            repoint: false,
        },
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeSummary {
    pub duplicates: usize,
    pub repointed: u64,
    /// Duplicate rows plus the profile rows merged away with them.
    pub deleted: u64,
    pub per_table: Vec<(&'static str, usize)>,
}

/// Case-insensitive composite key; rows missing any key column are unique.
fn key_of(row: &Row, columns: &[&str]) -> Option<String> {
    let parts: Option<Vec<String>> = columns
        .iter()
        .map(|c| row.get(c).and_then(|v| v.canonical()).map(|s| s.to_lowercase()))
        .collect();
    parts.map(|p| p.join("\u{1f}"))
}

/// Reference columns that hold at most one row per parent.
const ONE_PER_PARENT: &[(&str, &str)] = &[(schema::STUDENTS, "user_id"), (schema::INDUSTRIES, "user_id")];

fn one_per_parent(reference: &Reference) -> bool {
    ONE_PER_PARENT
        .iter()
        .any(|(table, column)| *table == reference.table && *column == reference.column)
}

async fn children(store: &dyn DestinationStore, reference: &Reference, parent: Uuid) -> Result<Vec<Uuid>> {
    let rows = store
        .find(reference.table, QueryCriteria::new().add_valued_filter(reference.column, "=", parent))
        .await
        .with_context(|| format!("Failed to read {}.{}", reference.table, reference.column))?;
    Ok(rows.iter().filter_map(|r| r.uuid("id")).collect())
}

/// Moves `dup`'s rows behind `reference` onto `survivor`. When the column
/// allows one row per parent and the survivor already has one, the
/// duplicate's row is merged into the survivor's and deleted instead.
async fn fold_children(
    store: &dyn DestinationStore,
    reference: &Reference,
    dup: Uuid,
    survivor: Uuid,
    summary: &mut DedupeSummary,
) -> Result<()> {
    if one_per_parent(reference) {
        if let Some(&kept) = children(store, reference, survivor).await?.first() {
            let merged = children(store, reference, dup).await?;
            if merged.is_empty() {
                return Ok(());
            }
            for child in &merged {
                warn!("🔀 Merging {} {} into {}", reference.table, child, kept);
                for grandchild in schema::references_to(reference.table) {
                    summary.repointed += repoint(store, grandchild, *child, kept).await?;
                }
            }
            summary.deleted += store
                .delete(reference.table, QueryCriteria::new().id_in("id", merged))
                .await
                .with_context(|| format!("Failed to delete merged rows from {}", reference.table))?;
            return Ok(());
        }
    }
    summary.repointed += repoint(store, reference, dup, survivor).await?;
    Ok(())
}

pub async fn dedupe(store: &dyn DestinationStore, rules: &[DedupeRule], dry_run: bool) -> Result<DedupeSummary> {
    let mut summary = DedupeSummary::default();

    for rule in rules {
        let rows = store
            .find(
                rule.table,
                QueryCriteria::new()
                    .order_by(rule.order_column, OrderDirection::Asc)
                    .order_by("id", OrderDirection::Asc),
            )
            .await
            .with_context(|| format!("Failed to read {}", rule.table))?;

        let mut kept: HashMap<String, Uuid> = HashMap::new();
        let mut duplicates: Vec<(Uuid, Uuid)> = Vec::new();
        for row in &rows {
            let (Some(id), Some(key)) = (row.uuid("id"), key_of(row, rule.key_columns)) else {
                continue;
            };
            match kept.get(&key) {
                Some(&survivor) => duplicates.push((id, survivor)),
                None => {
                    kept.insert(key, id);
                }
            }
        }

        summary.duplicates += duplicates.len();
        summary.per_table.push((rule.table, duplicates.len()));
        if duplicates.is_empty() {
            info!("✅ {}: no duplicates on ({})", rule.table, rule.key_columns.join(", "));
            continue;
        }
        warn!(
            "⚠️  {}: {} duplicates on ({})",
            rule.table,
            duplicates.len(),
            rule.key_columns.join(", ")
        );
        if dry_run {
            for (dup, survivor) in &duplicates {
                info!("   would fold {} into {}", dup, survivor);
            }
            continue;
        }

        if rule.repoint {
            for (dup, survivor) in &duplicates {
                for reference in schema::references_to(rule.table) {
                    fold_children(store, reference, *dup, *survivor, &mut summary).await?;
                }
            }
        }
        let doomed: Vec<Uuid> = duplicates.iter().map(|(dup, _)| *dup).collect();
        let deleted = store
            .delete(rule.table, QueryCriteria::new().id_in("id", doomed))
            .await
            .with_context(|| format!("Failed to delete duplicates from {}", rule.table))?;
        info!("🧹 {}: deleted {} duplicates", rule.table, deleted);
        summary.deleted += deleted;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cms_database::MemoryStore;

    fn user(email: &str, day: u32) -> (Uuid, Row) {
        let id = Uuid::new_v4();
        let row = Row::new()
            .with("id", id)
            .with("email", email)
            .with("created_at", Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap());
        (id, row)
    }

    #[tokio::test]
    async fn test_dedupe_keeps_earliest_and_repoints() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let (late, late_row) = user("A@b.com", 5);
        let (early, early_row) = user("a@b.com", 1);
        let (other, other_row) = user("c@d.com", 2);
        store.seed(schema::USERS, vec![late_row, early_row, other_row]);
        let student = Uuid::new_v4();
        store.seed(schema::STUDENTS, vec![Row::new().with("id", student).with("user_id", late)]);

        let summary = dedupe(&store, &default_dedupe_rules()[..1], false).await?;
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.repointed, 1);

        let ids: Vec<Uuid> = store.rows(schema::USERS).iter().filter_map(|r| r.uuid("id")).collect();
        assert!(ids.contains(&early) && ids.contains(&other) && !ids.contains(&late));
        assert_eq!(store.rows(schema::STUDENTS)[0].uuid("user_id"), Some(early));
        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_only_reads() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let (_, a) = user("x@y.com", 1);
        let (_, b) = user("x@y.com", 2);
        store.seed(schema::USERS, vec![a, b]);

        let summary = dedupe(&store, &default_dedupe_rules(), true).await?;
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.deleted, 0);
        assert_eq!(store.write_calls(), 0);
        assert_eq!(store.rows(schema::USERS).len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_profiles_of_duplicate_users_are_merged() -> anyhow::Result<()> {
        let store = MemoryStore::new().with_unique(schema::STUDENTS, &["user_id"]);
        let (late, late_row) = user("dup@x.com", 5);
        let (early, early_row) = user("dup@x.com", 1);
        store.seed(schema::USERS, vec![early_row, late_row]);

        let (kept, merged) = (Uuid::new_v4(), Uuid::new_v4());
        store.seed(
            schema::STUDENTS,
            vec![
                Row::new().with("id", kept).with("user_id", early),
                Row::new().with("id", merged).with("user_id", late),
            ],
        );
        store.seed(schema::PLACEMENTS, vec![Row::new().with("id", Uuid::new_v4()).with("student_id", merged)]);
        store.seed(schema::NOTIFICATIONS, vec![Row::new().with("id", Uuid::new_v4()).with("user_id", late)]);

        let summary = dedupe(&store, &default_dedupe_rules()[..2], false).await?;
        assert_eq!(summary.duplicates, 1);
        // the duplicate user and its student profile
        assert_eq!(summary.deleted, 2);

        let students = store.rows(schema::STUDENTS);
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].uuid("id"), Some(kept));
        assert_eq!(store.rows(schema::PLACEMENTS)[0].uuid("student_id"), Some(kept));
        assert_eq!(store.rows(schema::NOTIFICATIONS)[0].uuid("user_id"), Some(early));
        assert_eq!(store.rows(schema::USERS).len(), 1);
        Ok(())
    }
}
