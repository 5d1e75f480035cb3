//! Clean-up passes run against an already migrated destination.
//!
//! Each pass reads through [`DestinationStore`], works out what it would
//! change, and only writes when `dry_run` is false. The returned summary
//! counts the same things in both modes.

mod branches;
mod dedupe;
mod orphans;
mod seed;

pub use branches::{canonical_branch, normalize_branches, BranchSummary, BRANCH_ALIASES};
pub use dedupe::{dedupe, default_dedupe_rules, DedupeRule, DedupeSummary};
pub use orphans::{default_orphan_rules, remove_orphans, OrphanRule, OrphanSummary};
pub use seed::{seed, SeedConfig, SeedDepartment, SeedSummary};

use anyhow::{Context, Result};
use cms_database::{schema::Reference, DestinationStore, QueryCriteria, Row};
use uuid::Uuid;

/// Points every `reference` column holding `from` at `to`.
pub(crate) async fn repoint(
    store: &dyn DestinationStore,
    reference: &Reference,
    from: Uuid,
    to: Uuid,
) -> Result<u64> {
    let rows = store
        .find(reference.table, QueryCriteria::new().add_valued_filter(reference.column, "=", from))
        .await
        .with_context(|| format!("Failed to read {}.{}", reference.table, reference.column))?;

    let changes = Row::new().with(reference.column, to);
    let mut updated = 0;
    for id in rows.iter().filter_map(|r| r.uuid("id")) {
        updated += store
            .update(reference.table, id, &changes)
            .await
            .with_context(|| format!("Failed to repoint {}.{} on {}", reference.table, reference.column, id))?;
    }
    Ok(updated)
}

/// Ids of every row in `table`.
pub(crate) async fn ids(store: &dyn DestinationStore, table: &str) -> Result<Vec<Uuid>> {
    let rows = store
        .find(table, QueryCriteria::new())
        .await
        .with_context(|| format!("Failed to read {}", table))?;
    Ok(rows.iter().filter_map(|r| r.uuid("id")).collect())
}
