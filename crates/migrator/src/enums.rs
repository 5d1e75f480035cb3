use std::str::FromStr;

use cms_database::PgEnum;
use cms_source::{bson::Document, fields};
use strum_macros::{Display, EnumString};

/// Destination enums read leniently from source text.
///
/// Input is normalised to SCREAMING_SNAKE_CASE (`inProgress`, `in progress`
/// and `in-progress` all become `IN_PROGRESS`) and matched against the
/// variant names, then against `ALIASES`.
pub trait SourceEnum: FromStr + Copy + 'static {
    const ALIASES: &'static [(&'static str, Self)] = &[];

    fn parse_source(raw: &str) -> Option<Self> {
        let key = screaming_snake(raw);
        if key.is_empty() {
            return None;
        }
        Self::from_str(&key).ok().or_else(|| {
            Self::ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, value)| *value)
        })
    }

    fn from_field(doc: &Document, key: &str) -> Option<Self> {
        fields::text(doc, key).and_then(|raw| Self::parse_source(&raw))
    }

    fn from_field_or_default(doc: &Document, key: &str) -> Self
    where
        Self: Default,
    {
        Self::from_field(doc, key).unwrap_or_default()
    }
}

fn screaming_snake(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_uppercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SystemAdmin,
    Principal,
    Faculty,
    #[default]
    Student,
    Industry,
}

impl PgEnum for UserRole {
    const TYPE_NAME: &'static str = "UserRole";
}

impl SourceEnum for UserRole {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("ADMIN", UserRole::SystemAdmin),
        ("SUPER_ADMIN", UserRole::SystemAdmin),
        ("SUPERADMIN", UserRole::SystemAdmin),
        ("DIRECTOR", UserRole::Principal),
        ("HOD", UserRole::Faculty),
        ("TEACHER", UserRole::Faculty),
        ("MENTOR", UserRole::Faculty),
        ("FACULTY_MEMBER", UserRole::Faculty),
        ("COMPANY", UserRole::Industry),
        ("INDUSTRY_PARTNER", UserRole::Industry),
        ("RECRUITER", UserRole::Industry),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl PgEnum for Gender {
    const TYPE_NAME: &'static str = "Gender";
}

impl SourceEnum for Gender {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("M", Gender::Male),
        ("F", Gender::Female),
        ("O", Gender::Other),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    #[default]
    Applied,
    UnderReview,
    Shortlisted,
    Selected,
    Rejected,
    Approved,
    Joined,
    Completed,
    Withdrawn,
}

impl PgEnum for ApplicationStatus {
    const TYPE_NAME: &'static str = "ApplicationStatus";
}

impl SourceEnum for ApplicationStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("PENDING", ApplicationStatus::Applied),
        ("SUBMITTED", ApplicationStatus::Applied),
        ("IN_REVIEW", ApplicationStatus::UnderReview),
        ("REVIEWING", ApplicationStatus::UnderReview),
        ("ACCEPTED", ApplicationStatus::Selected),
        ("ONGOING", ApplicationStatus::Joined),
        ("IN_PROGRESS", ApplicationStatus::Joined),
        ("ACTIVE", ApplicationStatus::Joined),
        ("DONE", ApplicationStatus::Completed),
        ("FINISHED", ApplicationStatus::Completed),
        ("CANCELLED", ApplicationStatus::Withdrawn),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InternshipStatus {
    Draft,
    #[default]
    Active,
    Closed,
    Completed,
    Cancelled,
}

impl PgEnum for InternshipStatus {
    const TYPE_NAME: &'static str = "InternshipStatus";
}

impl SourceEnum for InternshipStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("OPEN", InternshipStatus::Active),
        ("PUBLISHED", InternshipStatus::Active),
        ("INACTIVE", InternshipStatus::Closed),
        ("EXPIRED", InternshipStatus::Closed),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Draft,
    #[default]
    Submitted,
    Approved,
    Rejected,
    RevisionRequired,
}

impl PgEnum for ReportStatus {
    const TYPE_NAME: &'static str = "ReportStatus";
}

impl SourceEnum for ReportStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("PENDING", ReportStatus::Submitted),
        ("REVIEWED", ReportStatus::Approved),
        ("ACCEPTED", ReportStatus::Approved),
        ("NEEDS_REVISION", ReportStatus::RevisionRequired),
        ("REVISION", ReportStatus::RevisionRequired),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    #[default]
    Physical,
    Virtual,
    Telephonic,
}

impl PgEnum for VisitType {
    const TYPE_NAME: &'static str = "VisitType";
}

impl SourceEnum for VisitType {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("IN_PERSON", VisitType::Physical),
        ("ONSITE", VisitType::Physical),
        ("OFFLINE", VisitType::Physical),
        ("ONLINE", VisitType::Virtual),
        ("VIDEO", VisitType::Virtual),
        ("PHONE", VisitType::Telephonic),
        ("CALL", VisitType::Telephonic),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Scheduled,
    #[default]
    Completed,
    Cancelled,
}

impl PgEnum for VisitStatus {
    const TYPE_NAME: &'static str = "VisitStatus";
}

impl SourceEnum for VisitStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("PLANNED", VisitStatus::Scheduled),
        ("PENDING", VisitStatus::Scheduled),
        ("DONE", VisitStatus::Completed),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementStatus {
    #[default]
    Offered,
    Accepted,
    Joined,
    Declined,
}

impl PgEnum for PlacementStatus {
    const TYPE_NAME: &'static str = "PlacementStatus";
}

impl SourceEnum for PlacementStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("PLACED", PlacementStatus::Accepted),
        ("SELECTED", PlacementStatus::Accepted),
        ("REJECTED", PlacementStatus::Declined),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeStatus {
    #[default]
    Pending,
    Paid,
    Partial,
    Overdue,
    Waived,
}

impl PgEnum for FeeStatus {
    const TYPE_NAME: &'static str = "FeeStatus";
}

impl SourceEnum for FeeStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("UNPAID", FeeStatus::Pending),
        ("DUE", FeeStatus::Pending),
        ("COMPLETED", FeeStatus::Paid),
        ("SUCCESS", FeeStatus::Paid),
        ("PARTIALLY_PAID", FeeStatus::Partial),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GrievanceStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
    Rejected,
}

impl PgEnum for GrievanceStatus {
    const TYPE_NAME: &'static str = "GrievanceStatus";
}

impl SourceEnum for GrievanceStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("PENDING", GrievanceStatus::Open),
        ("SUBMITTED", GrievanceStatus::Open),
        ("IN_REVIEW", GrievanceStatus::InProgress),
        ("UNDER_REVIEW", GrievanceStatus::InProgress),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl PgEnum for QueryPriority {
    const TYPE_NAME: &'static str = "QueryPriority";
}

impl SourceEnum for QueryPriority {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("NORMAL", QueryPriority::Medium),
        ("CRITICAL", QueryPriority::Urgent),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl PgEnum for QueryStatus {
    const TYPE_NAME: &'static str = "QueryStatus";
}

impl SourceEnum for QueryStatus {
    const ALIASES: &'static [(&'static str, Self)] = &[("PENDING", QueryStatus::Open)];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Resume,
    OfferLetter,
    JoiningLetter,
    CompletionCertificate,
    Noc,
    IdProof,
    Marksheet,
    Report,
    #[default]
    Other,
}

impl PgEnum for DocumentType {
    const TYPE_NAME: &'static str = "DocumentType";
}

impl SourceEnum for DocumentType {
    const ALIASES: &'static [(&'static str, Self)] = &[
        ("CV", DocumentType::Resume),
        ("OFFER", DocumentType::OfferLetter),
        ("JOINING", DocumentType::JoiningLetter),
        ("CERTIFICATE", DocumentType::CompletionCertificate),
        ("NOC_LETTER", DocumentType::Noc),
        ("ID_CARD", DocumentType::IdProof),
        ("AADHAR", DocumentType::IdProof),
        ("AADHAAR", DocumentType::IdProof),
        ("MARK_SHEET", DocumentType::Marksheet),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_database::SqlValue;
    use cms_source::bson::doc;

    #[test]
    fn test_normalisation() {
        assert_eq!(screaming_snake("inProgress"), "IN_PROGRESS");
        assert_eq!(screaming_snake(" in progress "), "IN_PROGRESS");
        assert_eq!(screaming_snake("in-progress"), "IN_PROGRESS");
        assert_eq!(screaming_snake("SYSTEM_ADMIN"), "SYSTEM_ADMIN");
        assert_eq!(screaming_snake("--"), "");
    }

    #[test]
    fn test_parse_with_aliases() {
        assert_eq!(UserRole::parse_source("hod"), Some(UserRole::Faculty));
        assert_eq!(UserRole::parse_source("systemAdmin"), Some(UserRole::SystemAdmin));
        assert_eq!(GrievanceStatus::parse_source("in progress"), Some(GrievanceStatus::InProgress));
        assert_eq!(DocumentType::parse_source("offerLetter"), Some(DocumentType::OfferLetter));
        assert_eq!(Gender::parse_source("f"), Some(Gender::Female));
        assert_eq!(FeeStatus::parse_source("banana"), None);
    }

    #[test]
    fn test_field_defaults() {
        let doc = doc! { "role": "wizard", "status": "Reviewed" };
        assert_eq!(UserRole::from_field_or_default(&doc, "role"), UserRole::Student);
        assert_eq!(ReportStatus::from_field_or_default(&doc, "status"), ReportStatus::Approved);
        assert_eq!(ApplicationStatus::from_field_or_default(&doc, "missing"), ApplicationStatus::Applied);
    }

    #[test]
    fn test_sql_value() {
        assert_eq!(
            UserRole::SystemAdmin.to_sql_value(),
            SqlValue::Enum { type_name: "UserRole", value: "SYSTEM_ADMIN".to_string() }
        );
    }
}
