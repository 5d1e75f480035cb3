use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use cms_database::{DestinationStore, StoreError};
use cms_source::{CollectionStore, SourceRecord};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::context::MigrationContext;
use crate::migrator::EntityMigrator;
use crate::outcome::{FailureKind, RecordOutcome, SkipReason};
use crate::plan::MigrationPlan;
use crate::report::{EntityStats, MigrationReport, RecordError};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorOptions {
    /// Count what would be migrated without touching the destination.
    pub dry_run: bool,
    /// Keep existing rows instead of truncating the plan's tables first.
    pub skip_clear: bool,
    pub progress: bool,
    /// Log every skipped record at warn level.
    pub verbose: bool,
}

/// Runs a plan's migrators one after another against a destination store.
pub struct Executor<'a> {
    store: &'a dyn DestinationStore,
    options: ExecutorOptions,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a dyn DestinationStore, options: ExecutorOptions) -> Self {
        Self { store, options }
    }

    pub async fn run(
        &self,
        plan: &MigrationPlan,
        source: &CollectionStore,
        ctx: &mut MigrationContext,
    ) -> Result<MigrationReport> {
        let started = Instant::now();
        let mut report = MigrationReport {
            dry_run: self.options.dry_run,
            unidentified: source.unidentified().total(),
            scan: source.scan_stats(),
            ..Default::default()
        };

        if self.options.dry_run {
            info!("🔍 DRY RUN: nothing will be written to the destination");
        } else if self.options.skip_clear {
            info!("Keeping existing destination rows");
        } else {
            let outside = plan.external_dependents();
            if outside.is_empty() {
                self.clear(plan).await?;
            } else {
                warn!(
                    "⚠️  Keeping existing destination rows: clearing would cascade into {} outside this run",
                    outside.join(", ")
                );
            }
        }

        for migrator in plan.migrators() {
            let records = source.bucket(migrator.collection());
            let (stats, errors) = self.run_migrator(migrator.as_ref(), records, ctx).await?;
            report.entities.push(stats);
            report.errors.extend(errors);
        }

        report.id_map_sizes = ctx.translator.sizes();
        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Truncates children before parents. Only called when no table outside
    /// the plan references the plan's tables.
    async fn clear(&self, plan: &MigrationPlan) -> Result<()> {
        let mut tables = plan.tables();
        tables.reverse();
        info!("🧹 Clearing {} destination tables", tables.len());
        self.store
            .truncate(&tables)
            .await
            .context("Failed to clear destination tables")?;
        Ok(())
    }

    pub async fn run_migrator(
        &self,
        migrator: &dyn EntityMigrator,
        records: &[SourceRecord],
        ctx: &mut MigrationContext,
    ) -> Result<(EntityStats, Vec<RecordError>)> {
        let collection = migrator.collection();
        let started = Instant::now();
        let mut stats = EntityStats::new(collection, migrator.table(), records.len());
        let mut errors = Vec::new();

        if self.options.dry_run {
            stats.planned = records.len();
            info!("Would migrate {} {} records into {}", records.len(), collection, migrator.table());
            stats.elapsed = started.elapsed();
            return Ok((stats, errors));
        }

        info!("📦 Migrating {} {} records into {}", records.len(), collection, migrator.table());
        let pb = self.progress_bar(records.len(), collection.as_str());
        for record in records {
            let outcome = self.migrate_record(migrator, record, ctx).await?;
            let sid = record.source_id.as_deref().unwrap_or("<no _id>");
            match &outcome {
                RecordOutcome::Migrated(_) => {}
                RecordOutcome::Skipped(reason) if self.options.verbose => {
                    warn!("⏭️  {} {}: {}", collection, sid, reason);
                }
                RecordOutcome::Skipped(reason) => debug!("Skipped {} {}: {}", collection, sid, reason),
                RecordOutcome::Failed(kind, detail) => {
                    error!("❌ {} {} failed ({}): {}", collection, sid, kind, detail);
                    errors.push(RecordError {
                        collection: collection.to_string(),
                        source_id: record.source_id.clone(),
                        kind: *kind,
                        detail: detail.clone(),
                    });
                }
            }
            stats.record(&outcome);
            pb.inc(1);
        }
        pb.finish_and_clear();

        stats.elapsed = started.elapsed();
        info!(
            "✅ {}: {} migrated, {} skipped, {} errors in {:.2}s",
            collection,
            stats.migrated,
            stats.skipped,
            stats.errors,
            stats.elapsed.as_secs_f64()
        );
        Ok((stats, errors))
    }

    /// Only a lost connection aborts the run; everything else is an outcome.
    async fn migrate_record(
        &self,
        migrator: &dyn EntityMigrator,
        record: &SourceRecord,
        ctx: &mut MigrationContext,
    ) -> Result<RecordOutcome> {
        let collection = migrator.collection();
        let Some(source_id) = record.source_id.as_deref() else {
            return Ok(RecordOutcome::Skipped(SkipReason::MissingSourceId));
        };
        // a repeated _id, or one already folded into an earlier record
        if ctx.translator.resolve(source_id, collection).is_some() {
            return Ok(RecordOutcome::Skipped(SkipReason::Duplicate { key: format!("_id:{}", source_id) }));
        }

        let dest_id = ctx.translator.translate(source_id, collection);
        let outcome = match migrator.transform(record, dest_id, ctx) {
            Err(reason) => RecordOutcome::Skipped(reason),
            Ok(row) if row.is_empty() || row.uuid("id") != Some(dest_id) => RecordOutcome::Failed(
                FailureKind::Transform,
                format!("row for {} does not carry its destination id", migrator.table()),
            ),
            Ok(row) => match self.store.insert(migrator.table(), &row).await {
                Ok(()) => RecordOutcome::Migrated(dest_id),
                Err(StoreError::Connection(msg)) => {
                    return Err(anyhow!("Lost connection to destination while writing {}: {}", collection, msg));
                }
                Err(err) if migrator.tolerates(&err) => RecordOutcome::Skipped(SkipReason::ConstraintViolation(err.to_string())),
                Err(err @ StoreError::NotNullViolation(_)) => RecordOutcome::Failed(FailureKind::NotNull, err.to_string()),
                Err(err) => RecordOutcome::Failed(FailureKind::Store, err.to_string()),
            },
        };

        if !outcome.is_migrated() {
            // aliases to a surviving duplicate stay resolvable
            if ctx.translator.resolve(source_id, collection) == Some(dest_id) {
                ctx.translator.forget(source_id, collection);
            }
            ctx.release_claims(dest_id);
        }
        Ok(outcome)
    }

    fn progress_bar(&self, len: usize, label: &str) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg:<24} [{bar:40.cyan/blue}] {pos}/{len} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(label.to_string());
        pb
    }
}
