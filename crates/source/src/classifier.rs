use std::fmt;

use mongodb::bson::{Bson, Document};

use crate::collection::Collection;
use crate::fields;

/// Result of classifying one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Collection(Collection),
    Unidentified,
}

impl Classification {
    pub fn collection(self) -> Option<Collection> {
        match self {
            Classification::Collection(c) => Some(c),
            Classification::Unidentified => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Collection(c) => c.as_str(),
            Classification::Unidentified => "unidentified",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-presence predicate.
///
/// A rule matches when every `all` field is present, each `any` group has at
/// least one present field, no `forbid` field is present, and the optional
/// shape check passes. Null values count as absent.
#[derive(Clone)]
pub struct Rule {
    collection: Collection,
    all: Vec<&'static str>,
    any: Vec<Vec<&'static str>>,
    forbid: Vec<&'static str>,
    shape: Option<fn(&Document) -> bool>,
}

impl Rule {
    pub fn new(collection: Collection) -> Self {
        Self { collection, all: Vec::new(), any: Vec::new(), forbid: Vec::new(), shape: None }
    }

    pub fn all(mut self, fields: &[&'static str]) -> Self {
        self.all.extend_from_slice(fields);
        self
    }

    /// Adds one group of alternatives; call repeatedly for several groups.
    pub fn any(mut self, fields: &[&'static str]) -> Self {
        self.any.push(fields.to_vec());
        self
    }

    pub fn forbid(mut self, fields: &[&'static str]) -> Self {
        self.forbid.extend_from_slice(fields);
        self
    }

    pub fn shape(mut self, check: fn(&Document) -> bool) -> Self {
        self.shape = Some(check);
        self
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.all.iter().all(|f| fields::has(doc, f))
            && self.any.iter().all(|group| group.iter().any(|f| fields::has(doc, f)))
            && !self.forbid.iter().any(|f| fields::has(doc, f))
            && self.shape.map_or(true, |check| check(doc))
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("collection", &self.collection)
            .field("all", &self.all)
            .field("any", &self.any)
            .field("forbid", &self.forbid)
            .field("shape", &self.shape.is_some())
            .finish()
    }
}

fn looks_like_email(doc: &Document) -> bool {
    fields::email(doc, "email").is_some()
}

/// An amount that reads as money and a short single-token status word.
fn looks_like_fee(doc: &Document) -> bool {
    let status_is_code = match doc.get("status") {
        Some(Bson::String(s)) => {
            let s = s.trim();
            !s.is_empty() && s.len() <= 24 && s.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
        }
        _ => false,
    };
    status_is_code && fields::money(doc, "amount").is_some()
}

/// Ordered rule set; the first rule that matches decides the tag.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn classify(&self, doc: &Document) -> Classification {
        self.rules
            .iter()
            .find(|rule| rule.matches(doc))
            .map_or(Classification::Unidentified, |rule| {
                Classification::Collection(rule.collection)
            })
    }

    /// Uses the namespace the document was read from when it names a known
    /// collection, otherwise falls back to the rules.
    pub fn classify_with_hint(&self, doc: &Document, namespace: Option<&str>) -> Classification {
        match namespace.and_then(Collection::from_namespace) {
            Some(collection) => Classification::Collection(collection),
            None => self.classify(doc),
        }
    }
}

/// Rules for the CMS dump, most specific first.
///
/// Ordering matters: e.g. a placement carries `studentId` and `companyName`
/// like a self-identified application, so it must be tested first; and
/// departments carry `name` and `code` like institutions.
pub fn default_rules() -> Vec<Rule> {
    use Collection::*;
    vec![
        Rule::new(MentorAssignments).all(&["studentId", "mentorId"]),
        Rule::new(FacultyVisits)
            .all(&["applicationId", "facultyId"])
            .any(&["visitDate", "visitType", "visitMode"]),
        Rule::new(MonthlyReports)
            .all(&["applicationId"])
            .any(&["reportMonth", "month"])
            .any(&["reportYear", "year"]),
        Rule::new(Feedback)
            .any(&["rating", "overallRating"])
            .any(&["applicationId", "studentId", "industryId"])
            .any(&["comments", "feedback", "feedbackType", "strengths", "improvements"]),
        Rule::new(Placements)
            .all(&["studentId", "companyName"])
            .any(&["package", "ctc", "salary", "placementDate", "offerDate"]),
        Rule::new(InternshipApplications)
            .all(&["studentId"])
            .any(&["internshipId", "isSelfIdentified", "companyName"])
            .any(&["status", "appliedDate", "applicationDate", "createdAt"]),
        Rule::new(Fees)
            .all(&["studentId", "amount", "status"])
            .forbid(&["companyName"])
            .shape(looks_like_fee),
        Rule::new(Documents)
            .any(&["fileUrl", "filePath", "documentUrl"])
            .any(&["documentType", "type", "fileName", "name"]),
        Rule::new(Grievances)
            .all(&["studentId", "description"])
            .any(&["category", "grievanceType", "subject"]),
        Rule::new(TechnicalQueries)
            .all(&["userId", "description"])
            .any(&["title", "subject"])
            .any(&["priority", "category", "status"])
            .forbid(&["studentId"]),
        Rule::new(Notifications)
            .all(&["userId", "message"])
            .any(&["isRead", "read", "type", "title"]),
        Rule::new(AuditLogs)
            .all(&["action"])
            .any(&["entityType", "entity", "entityId", "resourceType"]),
        Rule::new(Users)
            .all(&["email"])
            .any(&["password", "passwordHash"])
            .shape(looks_like_email),
        Rule::new(Students).any(&["rollNumber", "enrollmentNumber", "registrationNumber"]).forbid(&["companyName"]),
        Rule::new(Students).all(&["userId"]).any(&["branchId", "batchId"]),
        Rule::new(Industries)
            .all(&["companyName"])
            .any(&["industryType", "registrationNumber", "website", "contactPerson", "companySize"])
            .forbid(&["studentId"]),
        Rule::new(Internships).all(&["title", "industryId"]),
        Rule::new(Internships)
            .all(&["title"])
            .any(&["stipend", "numberOfPositions", "requiredSkills", "applicationDeadline"]),
        Rule::new(Semesters).all(&["batchId"]).any(&["number", "semesterNumber"]),
        Rule::new(Batches).all(&["startYear", "endYear"]),
        Rule::new(Branches).all(&["departmentId", "name"]),
        Rule::new(Departments).all(&["institutionId", "name", "code"]),
        Rule::new(Institutions)
            .all(&["name", "code"])
            .any(&["address", "city", "state", "type", "email", "phone"])
            .forbid(&["institutionId"]),
        Rule::new(Calendars)
            .all(&["title", "startDate", "endDate"])
            .forbid(&["industryId", "stipend"]),
    ]
}
