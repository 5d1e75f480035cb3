mod academic;
mod industry;
mod people;
mod reporting;
mod support;

pub use academic::{
    BatchMigrator, BranchMigrator, CalendarMigrator, DepartmentMigrator, InstitutionMigrator, SemesterMigrator,
};
pub use industry::{ApplicationMigrator, IndustryMigrator, InternshipMigrator, PlacementMigrator};
pub use people::{MentorAssignmentMigrator, StudentMigrator, UserMigrator};
pub use reporting::{FacultyVisitMigrator, FeedbackMigrator, MonthlyReportMigrator};
pub use support::{
    AuditLogMigrator, DocumentMigrator, FeeMigrator, GrievanceMigrator, NotificationMigrator, TechnicalQueryMigrator,
};

use crate::migrator::EntityMigrator;

/// One migrator per destination table, in registration order.
pub fn all() -> Vec<Box<dyn EntityMigrator>> {
    vec![
        Box::new(InstitutionMigrator),
        Box::new(UserMigrator),
        Box::new(DepartmentMigrator),
        Box::new(BranchMigrator),
        Box::new(BatchMigrator),
        Box::new(SemesterMigrator),
        Box::new(StudentMigrator),
        Box::new(MentorAssignmentMigrator),
        Box::new(IndustryMigrator),
        Box::new(InternshipMigrator),
        Box::new(ApplicationMigrator),
        Box::new(MonthlyReportMigrator),
        Box::new(FacultyVisitMigrator),
        Box::new(FeedbackMigrator),
        Box::new(PlacementMigrator),
        Box::new(FeeMigrator),
        Box::new(DocumentMigrator),
        Box::new(GrievanceMigrator),
        Box::new(TechnicalQueryMigrator),
        Box::new(NotificationMigrator),
        Box::new(AuditLogMigrator),
        Box::new(CalendarMigrator),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_database::schema;
    use cms_source::Collection;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_collection_has_one_migrator() {
        let migrators = all();
        for collection in Collection::iter() {
            let n = migrators.iter().filter(|m| m.collection() == collection).count();
            assert_eq!(n, 1, "{}", collection);
        }
        let tables: Vec<&str> = migrators.iter().map(|m| m.table()).collect();
        assert_eq!(tables, schema::ALL_TABLES);
    }

    #[test]
    fn test_dependencies_match_schema_references() {
        let migrators = all();
        let table_of = |c: Collection| migrators.iter().find(|m| m.collection() == c).map(|m| m.table());
        for m in &migrators {
            for r in schema::REFERENCES.iter().filter(|r| r.table == m.table()) {
                assert!(
                    m.depends_on().iter().any(|d| table_of(*d) == Some(r.parent_table)),
                    "{}.{} -> {}",
                    r.table,
                    r.column,
                    r.parent_table
                );
            }
        }
    }
}
