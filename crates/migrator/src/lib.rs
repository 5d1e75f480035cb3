mod context;
mod executor;
mod migrator;
mod outcome;
mod plan;
mod report;
mod translator;

pub mod entities;
pub mod enums;
pub mod maintenance;

pub use context::MigrationContext;
pub use executor::{Executor, ExecutorOptions};
pub use migrator::EntityMigrator;
pub use outcome::{FailureKind, RecordOutcome, SkipReason};
pub use plan::{MigrationPlan, PlanError};
pub use report::{EntityStats, MigrationReport, RecordError, Totals};
pub use translator::IdentifierTranslator;
