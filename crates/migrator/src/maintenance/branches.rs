use std::collections::HashMap;

use anyhow::{Context, Result};
use cms_database::{schema, DestinationStore, OrderDirection, QueryCriteria, Row};
use tracing::{info, warn};
use uuid::Uuid;

use super::repoint;

/// Canonical branch names and the spellings found for them in old data.
pub const BRANCH_ALIASES: &[(&str, &[&str])] = &[
    (
        "Computer Science and Engineering",
        &["CSE", "CS", "Comp. Sci.", "Computer Science", "Computer Science & Engineering", "Computer Engg"],
    ),
    (
        "Information Technology",
        &["IT", "Info Tech", "Information Tech"],
    ),
    (
        "Electronics and Communication Engineering",
        &["ECE", "EC", "Electronics & Communication", "Electronics and Communication"],
    ),
    (
        "Electrical and Electronics Engineering",
        &["EEE", "Electrical & Electronics", "Electrical and Electronics"],
    ),
    (
        "Electrical Engineering",
        &["EE", "Electrical", "Electrical Engg"],
    ),
    (
        "Mechanical Engineering",
        &["ME", "MECH", "Mechanical", "Mechanical Engg"],
    ),
    (
        "Civil Engineering",
        &["CE", "CIVIL", "Civil", "Civil Engg"],
    ),
    (
        "Chemical Engineering",
        &["CHE", "Chemical", "Chemical Engg"],
    ),
    (
        "Artificial Intelligence and Machine Learning",
        &["AIML", "AI&ML", "AI & ML", "AI/ML"],
    ),
    (
        "Artificial Intelligence and Data Science",
        &["AIDS", "AI&DS", "AI & DS", "AI/DS"],
    ),
];

fn key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// The canonical spelling of `name`, if it is a known branch.
pub fn canonical_branch(name: &str) -> Option<&'static str> {
    let k = key(name);
    if k.is_empty() {
        return None;
    }
    BRANCH_ALIASES
        .iter()
        .find(|(canonical, aliases)| key(canonical) == k || aliases.iter().any(|a| key(a) == k))
        .map(|(canonical, _)| *canonical)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchSummary {
    pub examined: usize,
    pub renamed: usize,
    pub merged: usize,
    pub repointed: u64,
}

/// Renames branches to their canonical spelling and merges branches of one
/// department that end up with the same name. The oldest branch survives.
pub async fn normalize_branches(store: &dyn DestinationStore, dry_run: bool) -> Result<BranchSummary> {
    let rows = store
        .find(
            schema::BRANCHES,
            QueryCriteria::new()
                .order_by("created_at", OrderDirection::Asc)
                .order_by("id", OrderDirection::Asc),
        )
        .await
        .context("Failed to read branches")?;

    let mut summary = BranchSummary { examined: rows.len(), ..Default::default() };
    let mut survivors: HashMap<(String, String), Uuid> = HashMap::new();

    for row in &rows {
        let (Some(id), Some(name)) = (row.uuid("id"), row.text("name")) else {
            continue;
        };
        let target = canonical_branch(name).unwrap_or(name).trim().to_string();
        let department = row
            .get("department_id")
            .and_then(|v| v.canonical())
            .unwrap_or_default()
            .to_lowercase();
        let slot = (department, key(&target));

        if let Some(&survivor) = survivors.get(&slot) {
            warn!("🔀 Merging branch '{}' ({}) into {}", name, id, survivor);
            summary.merged += 1;
            if dry_run {
                continue;
            }
            for reference in schema::references_to(schema::BRANCHES) {
                summary.repointed += repoint(store, reference, id, survivor).await?;
            }
            store
                .delete(schema::BRANCHES, QueryCriteria::new().id_in("id", vec![id]))
                .await
                .with_context(|| format!("Failed to delete merged branch {}", id))?;
            continue;
        }

        survivors.insert(slot, id);
        if target != name {
            info!("✏️  Renaming branch '{}' to '{}'", name, target);
            summary.renamed += 1;
            if !dry_run {
                store
                    .update(schema::BRANCHES, id, &Row::new().with("name", target.as_str()))
                    .await
                    .with_context(|| format!("Failed to rename branch {}", id))?;
            }
        }
    }

    info!(
        "{}Branches: {} examined, {} renamed, {} merged",
        if dry_run { "[dry run] " } else { "" },
        summary.examined,
        summary.renamed,
        summary.merged
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cms_database::MemoryStore;

    fn branch(id: Uuid, department: Uuid, name: &str, day: u32) -> Row {
        Row::new()
            .with("id", id)
            .with("department_id", department)
            .with("name", name)
            .with("created_at", Utc.with_ymd_and_hms(2023, 7, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_branch("cse"), Some("Computer Science and Engineering"));
        assert_eq!(canonical_branch("Comp. Sci."), Some("Computer Science and Engineering"));
        assert_eq!(canonical_branch("computer science"), Some("Computer Science and Engineering"));
        assert_eq!(canonical_branch("AI & ML"), Some("Artificial Intelligence and Machine Learning"));
        assert_eq!(canonical_branch("Marine Biology"), None);
        assert_eq!(canonical_branch(" - "), None);
    }

    #[tokio::test]
    async fn test_merge_within_department() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let dept = Uuid::new_v4();
        let other_dept = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.seed(
            schema::BRANCHES,
            vec![
                branch(a, dept, "CSE", 1),
                branch(b, dept, "computer science", 2),
                branch(c, other_dept, "Comp. Sci.", 3),
            ],
        );
        let student = Uuid::new_v4();
        store.seed(schema::STUDENTS, vec![Row::new().with("id", student).with("branch_id", b)]);

        let summary = normalize_branches(&store, false).await?;
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.renamed, 2);
        assert_eq!(summary.repointed, 1);

        let branches = store.rows(schema::BRANCHES);
        assert_eq!(branches.len(), 2);
        assert!(branches
            .iter()
            .all(|r| r.text("name") == Some("Computer Science and Engineering")));
        assert_eq!(store.rows(schema::STUDENTS)[0].uuid("branch_id"), Some(a));
        Ok(())
    }
}
