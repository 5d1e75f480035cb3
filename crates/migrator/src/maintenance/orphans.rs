use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use cms_database::{schema, DestinationStore, QueryCriteria, Row, SqlValue};
use tracing::{info, warn};
use uuid::Uuid;

use super::ids;

/// A reference column checked against its parent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanRule {
    pub table: &'static str,
    pub column: &'static str,
    pub parent_table: &'static str,
    /// Nullable columns are cleared; rows with a dangling required
    /// reference are deleted.
    pub nullable: bool,
}

impl From<&schema::Reference> for OrphanRule {
    fn from(r: &schema::Reference) -> Self {
        Self {
            table: r.table,
            column: r.column,
            parent_table: r.parent_table,
            nullable: r.nullable,
        }
    }
}

/// One rule per foreign key, parents first so that deletions cascade
/// through later rules in the same pass.
pub fn default_orphan_rules() -> Vec<OrphanRule> {
    schema::REFERENCES.iter().map(OrphanRule::from).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanSummary {
    pub checked: usize,
    pub nulled: u64,
    pub deleted: u64,
    pub per_rule: Vec<(String, usize)>,
}

pub async fn remove_orphans(store: &dyn DestinationStore, rules: &[OrphanRule], dry_run: bool) -> Result<OrphanSummary> {
    let mut summary = OrphanSummary::default();
    let mut parents: HashMap<&'static str, HashSet<Uuid>> = HashMap::new();
    // rows already removed in this pass, so a dry run still cascades
    let mut removed: HashMap<&'static str, HashSet<Uuid>> = HashMap::new();

    for rule in rules {
        if !parents.contains_key(rule.parent_table) {
            let set: HashSet<Uuid> = ids(store, rule.parent_table).await?.into_iter().collect();
            parents.insert(rule.parent_table, set);
        }
        let gone = removed.get(rule.parent_table);
        let live = |id: &Uuid| {
            parents.get(rule.parent_table).is_some_and(|p| p.contains(id)) && !gone.is_some_and(|g| g.contains(id))
        };

        let children = store
            .find(rule.table, QueryCriteria::new().is_not_null(rule.column))
            .await
            .with_context(|| format!("Failed to read {}", rule.table))?;
        summary.checked += children.len();

        let orphans: Vec<Uuid> = children
            .iter()
            .filter(|row| !row.uuid(rule.column).is_some_and(|p| live(&p)))
            .filter_map(|row| row.uuid("id"))
            .filter(|id| !removed.get(rule.table).is_some_and(|g| g.contains(id)))
            .collect();

        let label = format!("{}.{}", rule.table, rule.column);
        summary.per_rule.push((label.clone(), orphans.len()));
        if orphans.is_empty() {
            continue;
        }
        warn!(
            "⚠️  {}: {} rows point at missing {} rows",
            label,
            orphans.len(),
            rule.parent_table
        );

        if rule.nullable {
            if !dry_run {
                let clear = Row::new().with(rule.column, SqlValue::Null);
                for id in &orphans {
                    summary.nulled += store
                        .update(rule.table, *id, &clear)
                        .await
                        .with_context(|| format!("Failed to clear {} on {}", label, id))?;
                }
            } else {
                summary.nulled += orphans.len() as u64;
            }
        } else {
            if !dry_run {
                summary.deleted += store
                    .delete(rule.table, QueryCriteria::new().id_in("id", orphans.clone()))
                    .await
                    .with_context(|| format!("Failed to delete orphans from {}", rule.table))?;
            } else {
                summary.deleted += orphans.len() as u64;
            }
            removed.entry(rule.table).or_default().extend(orphans);
        }
    }

    info!(
        "{}Checked {} references: {} cleared, {} rows deleted",
        if dry_run { "[dry run] " } else { "" },
        summary.checked,
        summary.nulled,
        summary.deleted
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_database::MemoryStore;

    #[tokio::test]
    async fn test_orphans_are_cleared_or_deleted() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let kept_student = Uuid::new_v4();
        let orphan_student = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        store.seed(schema::USERS, vec![Row::new().with("id", user)]);
        store.seed(
            schema::STUDENTS,
            vec![
                Row::new().with("id", kept_student).with("user_id", user).with("branch_id", ghost),
                Row::new().with("id", orphan_student).with("user_id", ghost),
            ],
        );
        let assignment = Uuid::new_v4();
        store.seed(
            schema::MENTOR_ASSIGNMENTS,
            vec![Row::new()
                .with("id", assignment)
                .with("student_id", orphan_student)
                .with("mentor_id", user)],
        );

        let summary = remove_orphans(&store, &default_orphan_rules(), false).await?;
        // orphan student, then its mentor assignment
        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.nulled, 1);

        let students = store.rows(schema::STUDENTS);
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].get("branch_id"), Some(&SqlValue::Null));
        assert!(store.rows(schema::MENTOR_ASSIGNMENTS).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_cascades_without_writing() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let student = Uuid::new_v4();
        store.seed(schema::STUDENTS, vec![Row::new().with("id", student).with("user_id", Uuid::new_v4())]);
        store.seed(
            schema::PLACEMENTS,
            vec![Row::new().with("id", Uuid::new_v4()).with("student_id", student)],
        );

        let summary = remove_orphans(&store, &default_orphan_rules(), true).await?;
        assert_eq!(summary.deleted, 2);
        assert_eq!(store.write_calls(), 0);
        Ok(())
    }
}
