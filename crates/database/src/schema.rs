//! Names of the destination tables.
//!
//! The schema is created and migrated by the application that owns it; this
//! catalogue only fixes names and a parent-before-child order so that
//! truncation and orphan checks can walk it.

pub const INSTITUTIONS: &str = "institutions";
pub const USERS: &str = "users";
pub const DEPARTMENTS: &str = "departments";
pub const BRANCHES: &str = "branches";
pub const BATCHES: &str = "batches";
pub const SEMESTERS: &str = "semesters";
pub const STUDENTS: &str = "students";
pub const MENTOR_ASSIGNMENTS: &str = "mentor_assignments";
pub const INDUSTRIES: &str = "industries";
pub const INTERNSHIPS: &str = "internships";
pub const INTERNSHIP_APPLICATIONS: &str = "internship_applications";
pub const MONTHLY_REPORTS: &str = "monthly_reports";
pub const FACULTY_VISITS: &str = "faculty_visits";
pub const FEEDBACK: &str = "feedback";
pub const PLACEMENTS: &str = "placements";
pub const FEES: &str = "fees";
pub const DOCUMENTS: &str = "documents";
pub const GRIEVANCES: &str = "grievances";
pub const TECHNICAL_QUERIES: &str = "technical_queries";
pub const NOTIFICATIONS: &str = "notifications";
pub const AUDIT_LOGS: &str = "audit_logs";
pub const CALENDARS: &str = "calendars";

/// Every table, parents before children.
pub const ALL_TABLES: &[&str] = &[
    INSTITUTIONS,
    USERS,
    DEPARTMENTS,
    BRANCHES,
    BATCHES,
    SEMESTERS,
    STUDENTS,
    MENTOR_ASSIGNMENTS,
    INDUSTRIES,
    INTERNSHIPS,
    INTERNSHIP_APPLICATIONS,
    MONTHLY_REPORTS,
    FACULTY_VISITS,
    FEEDBACK,
    PLACEMENTS,
    FEES,
    DOCUMENTS,
    GRIEVANCES,
    TECHNICAL_QUERIES,
    NOTIFICATIONS,
    AUDIT_LOGS,
    CALENDARS,
];

/// A reference column and the table its values point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub table: &'static str,
    pub column: &'static str,
    pub parent_table: &'static str,
    pub nullable: bool,
}

const fn reference(table: &'static str, column: &'static str, parent_table: &'static str, nullable: bool) -> Reference {
    Reference { table, column, parent_table, nullable }
}

/// Foreign keys of the destination schema, children listed after parents.
pub const REFERENCES: &[Reference] = &[
    reference(USERS, "institution_id", INSTITUTIONS, true),
    reference(DEPARTMENTS, "institution_id", INSTITUTIONS, false),
    reference(BRANCHES, "department_id", DEPARTMENTS, false),
    reference(BATCHES, "institution_id", INSTITUTIONS, false),
    reference(SEMESTERS, "batch_id", BATCHES, false),
    reference(STUDENTS, "user_id", USERS, false),
    reference(STUDENTS, "institution_id", INSTITUTIONS, true),
    reference(STUDENTS, "branch_id", BRANCHES, true),
    reference(STUDENTS, "batch_id", BATCHES, true),
    reference(STUDENTS, "semester_id", SEMESTERS, true),
    reference(MENTOR_ASSIGNMENTS, "student_id", STUDENTS, false),
    reference(MENTOR_ASSIGNMENTS, "mentor_id", USERS, false),
    reference(MENTOR_ASSIGNMENTS, "assigned_by", USERS, true),
    reference(INDUSTRIES, "user_id", USERS, true),
    reference(INTERNSHIPS, "industry_id", INDUSTRIES, false),
    reference(INTERNSHIP_APPLICATIONS, "student_id", STUDENTS, false),
    reference(INTERNSHIP_APPLICATIONS, "internship_id", INTERNSHIPS, true),
    reference(MONTHLY_REPORTS, "application_id", INTERNSHIP_APPLICATIONS, false),
    reference(MONTHLY_REPORTS, "student_id", STUDENTS, true),
    reference(MONTHLY_REPORTS, "reviewed_by", USERS, true),
    reference(FACULTY_VISITS, "application_id", INTERNSHIP_APPLICATIONS, false),
    reference(FACULTY_VISITS, "faculty_id", USERS, false),
    reference(FEEDBACK, "application_id", INTERNSHIP_APPLICATIONS, true),
    reference(FEEDBACK, "student_id", STUDENTS, true),
    reference(FEEDBACK, "industry_id", INDUSTRIES, true),
    reference(PLACEMENTS, "student_id", STUDENTS, false),
    reference(FEES, "student_id", STUDENTS, false),
    reference(FEES, "semester_id", SEMESTERS, true),
    reference(DOCUMENTS, "student_id", STUDENTS, true),
    reference(DOCUMENTS, "user_id", USERS, true),
    reference(GRIEVANCES, "student_id", STUDENTS, false),
    reference(GRIEVANCES, "assigned_to", USERS, true),
    reference(TECHNICAL_QUERIES, "user_id", USERS, false),
    reference(NOTIFICATIONS, "user_id", USERS, false),
    reference(AUDIT_LOGS, "user_id", USERS, true),
    reference(CALENDARS, "institution_id", INSTITUTIONS, true),
];

/// Columns in other tables that point at `parent_table`.
pub fn references_to(parent_table: &str) -> impl Iterator<Item = &'static Reference> + '_ {
    REFERENCES.iter().filter(move |r| r.parent_table == parent_table)
}
