use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// The source collections of the CMS, tagged by their camelCase names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum Collection {
    Institutions,
    Users,
    Departments,
    Branches,
    Batches,
    Semesters,
    Students,
    MentorAssignments,
    Industries,
    Internships,
    InternshipApplications,
    MonthlyReports,
    FacultyVisits,
    Feedback,
    Placements,
    Fees,
    Documents,
    Grievances,
    TechnicalQueries,
    Notifications,
    AuditLogs,
    Calendars,
}

/// Names seen for collections in older deployments of the CMS.
const NAMESPACE_ALIASES: &[(&str, Collection)] = &[
    ("colleges", Collection::Institutions),
    ("mentors", Collection::MentorAssignments),
    ("companies", Collection::Industries),
    ("applications", Collection::InternshipApplications),
    ("reports", Collection::MonthlyReports),
    ("visits", Collection::FacultyVisits),
    ("feedbacks", Collection::Feedback),
    ("queries", Collection::TechnicalQueries),
    ("supporttickets", Collection::TechnicalQueries),
    ("logs", Collection::AuditLogs),
    ("events", Collection::Calendars),
    ("academiccalendars", Collection::Calendars),
];

fn normalise(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Maps a source namespace (`monthly_reports`, `MonthlyReport`,
    /// `cms.users`) onto a collection, ignoring case, separators and a
    /// plural `s`.
    pub fn from_namespace(namespace: &str) -> Option<Collection> {
        let name = namespace.rsplit('.').next().unwrap_or(namespace);
        let key = normalise(name);
        if key.is_empty() {
            return None;
        }

        if let Some((_, collection)) = NAMESPACE_ALIASES.iter().find(|(alias, _)| *alias == key) {
            return Some(*collection);
        }

        let plural = format!("{}s", key);
        Collection::iter().find(|c| {
            let tag = normalise(c.as_str());
            tag == key || tag == plural
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tags_are_camel_case() {
        assert_eq!(Collection::MentorAssignments.to_string(), "mentorAssignments");
        assert_eq!(Collection::Feedback.as_str(), "feedback");
        assert_eq!(Collection::from_str("internshipApplications").unwrap(), Collection::InternshipApplications);
        assert_eq!(Collection::iter().count(), 22);
    }

    #[test]
    fn test_from_namespace() {
        assert_eq!(Collection::from_namespace("users"), Some(Collection::Users));
        assert_eq!(Collection::from_namespace("cms.monthly_reports"), Some(Collection::MonthlyReports));
        assert_eq!(Collection::from_namespace("MonthlyReport"), Some(Collection::MonthlyReports));
        assert_eq!(Collection::from_namespace("companies"), Some(Collection::Industries));
        assert_eq!(Collection::from_namespace("auditlogs"), Some(Collection::AuditLogs));
        assert_eq!(Collection::from_namespace("system.indexes"), None);
        assert_eq!(Collection::from_namespace(""), None);
    }
}
