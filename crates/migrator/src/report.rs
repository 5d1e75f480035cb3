use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use cms_source::{Collection, ScanStats};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::outcome::{FailureKind, RecordOutcome};

/// Per-migrator counters.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStats {
    pub collection: Collection,
    pub table: &'static str,
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Records a dry run would have attempted.
    pub planned: usize,
    pub elapsed: Duration,
    pub skip_reasons: BTreeMap<&'static str, usize>,
}

impl EntityStats {
    pub fn new(collection: Collection, table: &'static str, total: usize) -> Self {
        Self {
            collection,
            table,
            total,
            migrated: 0,
            skipped: 0,
            errors: 0,
            planned: 0,
            elapsed: Duration::ZERO,
            skip_reasons: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Migrated(_) => self.migrated += 1,
            RecordOutcome::Skipped(reason) => {
                self.skipped += 1;
                *self.skip_reasons.entry(reason.kind()).or_default() += 1;
            }
            RecordOutcome::Failed(..) => self.errors += 1,
        }
    }

    /// Every input record is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.migrated + self.skipped + self.errors + self.planned == self.total
    }
}

/// A record that could not be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordError {
    pub collection: String,
    pub source_id: Option<String>,
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub planned: usize,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub entities: Vec<EntityStats>,
    pub errors: Vec<RecordError>,
    pub id_map_sizes: BTreeMap<Collection, usize>,
    pub unidentified: usize,
    pub scan: Option<ScanStats>,
    pub elapsed: Duration,
}

impl MigrationReport {
    pub fn entity(&self, collection: Collection) -> Option<&EntityStats> {
        self.entities.iter().find(|e| e.collection == collection)
    }

    pub fn totals(&self) -> Totals {
        self.entities.iter().fold(Totals::default(), |acc, e| Totals {
            total: acc.total + e.total,
            migrated: acc.migrated + e.migrated,
            skipped: acc.skipped + e.skipped,
            errors: acc.errors + e.errors,
            planned: acc.planned + e.planned,
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.entities.iter().all(EntityStats::is_balanced)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Human readable summary. At most `max_errors` failures are listed.
    pub fn render(&self, max_errors: usize, colour: bool) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let title = if self.dry_run { "MIGRATION DRY RUN" } else { "MIGRATION REPORT" };

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "{}", paint(title, Tone::Title, colour));
        let _ = writeln!(out, "{}", rule);
        if let Some(scan) = &self.scan {
            let _ = writeln!(
                out,
                "Scanned {} documents from {} bytes ({} bytes skipped, {} resyncs)",
                scan.documents, scan.bytes, scan.skipped_bytes, scan.resyncs
            );
        }
        if self.unidentified > 0 {
            let _ = writeln!(
                out,
                "{}",
                paint(&format!("Unidentified documents: {}", self.unidentified), Tone::Warn, colour)
            );
        }
        let _ = writeln!(out);

        let last = if self.dry_run { "Planned" } else { "Errors" };
        let _ = writeln!(
            out,
            "{:<26} {:>8} {:>9} {:>8} {:>8} {:>9}",
            "Collection", "Total", "Migrated", "Skipped", last, "Time"
        );
        let _ = writeln!(out, "{}", "-".repeat(73));
        for e in &self.entities {
            let last = if self.dry_run { e.planned } else { e.errors };
            let line = format!(
                "{:<26} {:>8} {:>9} {:>8} {:>8} {:>8.2}s",
                e.collection.as_str(),
                e.total,
                e.migrated,
                e.skipped,
                last,
                e.elapsed.as_secs_f64()
            );
            let tone = if e.errors > 0 {
                Tone::Bad
            } else if e.skipped > 0 {
                Tone::Warn
            } else {
                Tone::Good
            };
            let _ = writeln!(out, "{}", paint(&line, tone, colour));
            if !e.skip_reasons.is_empty() {
                let reasons: Vec<String> = e.skip_reasons.iter().map(|(k, n)| format!("{}={}", k, n)).collect();
                let _ = writeln!(out, "    skipped: {}", reasons.join(", "));
            }
        }

        let t = self.totals();
        let _ = writeln!(out, "{}", "-".repeat(73));
        let _ = writeln!(
            out,
            "{:<26} {:>8} {:>9} {:>8} {:>8} {:>8.2}s",
            "TOTAL",
            t.total,
            t.migrated,
            t.skipped,
            if self.dry_run { t.planned } else { t.errors },
            self.elapsed.as_secs_f64()
        );

        if !self.id_map_sizes.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Identifier maps:");
            for (collection, size) in &self.id_map_sizes {
                let _ = writeln!(out, "  {:<26} {}", collection.as_str(), size);
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", paint(&format!("Errors ({}):", self.errors.len()), Tone::Bad, colour));
            for err in self.errors.iter().take(max_errors) {
                let _ = writeln!(
                    out,
                    "  [{}] {} {}: {}",
                    err.kind,
                    err.collection,
                    err.source_id.as_deref().unwrap_or("<no _id>"),
                    err.detail
                );
            }
            if self.errors.len() > max_errors {
                let _ = writeln!(out, "  ... and {} more", self.errors.len() - max_errors);
            }
        }
        let _ = writeln!(out, "{}", rule);
        out
    }

    /// Writes the failure list as JSON so failed records can be retried.
    pub fn write_failures(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.errors).context("Failed to serialize failures")?;
        std::fs::write(path, &content).with_context(|| format!("Failed to write to file: {}", path.display()))?;
        info!("Wrote {} failures to {}", self.errors.len(), path.display());
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Title,
    Good,
    Warn,
    Bad,
}

fn paint(text: &str, tone: Tone, colour: bool) -> String {
    if !colour {
        return text.to_string();
    }
    match tone {
        Tone::Title => text.bold().to_string(),
        Tone::Good => text.green().to_string(),
        Tone::Warn => text.yellow().to_string(),
        Tone::Bad => text.red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::SkipReason;
    use uuid::Uuid;

    fn sample() -> MigrationReport {
        let mut users = EntityStats::new(Collection::Users, "users", 3);
        users.record(&RecordOutcome::Migrated(Uuid::new_v4()));
        users.record(&RecordOutcome::Skipped(SkipReason::MissingField("email")));
        users.record(&RecordOutcome::Failed(FailureKind::Store, "boom".into()));
        MigrationReport {
            entities: vec![users],
            errors: (0..5)
                .map(|i| RecordError {
                    collection: "users".into(),
                    source_id: Some(format!("u{}", i)),
                    kind: FailureKind::Store,
                    detail: "boom".into(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_balance() {
        let report = sample();
        let users = report.entity(Collection::Users).unwrap();
        assert!(users.is_balanced());
        assert_eq!(users.skip_reasons.get("missing_field"), Some(&1));
        assert_eq!(report.totals().errors, 1);
    }

    #[test]
    fn test_render_truncates_errors() {
        let text = sample().render(2, false);
        assert!(text.contains("MIGRATION REPORT"));
        assert!(text.contains("u1"));
        assert!(!text.contains("u2:"));
        assert!(text.contains("... and 3 more"));
        assert!(text.contains("missing_field=1"));
    }

    #[test]
    fn test_write_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data").join("failures.json");
        sample().write_failures(&path)?;
        let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(parsed.as_array().map(Vec::len), Some(5));
        assert_eq!(parsed[0]["kind"], "Store");
        Ok(())
    }
}
