use cms_database::{schema, PgEnum, Row};
use cms_source::{fields, Collection, SourceRecord};
use uuid::Uuid;

use crate::context::MigrationContext;
use crate::enums::{ReportStatus, SourceEnum, VisitStatus, VisitType};
use crate::migrator::{required_date, source_id, with_timestamps, EntityMigrator};
use crate::outcome::SkipReason;

pub struct MonthlyReportMigrator;

impl EntityMigrator for MonthlyReportMigrator {
    fn collection(&self) -> Collection {
        Collection::MonthlyReports
    }

    fn table(&self) -> &'static str {
        schema::MONTHLY_REPORTS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::InternshipApplications, Collection::Students, Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let application_id = ctx.required_ref(doc, "applicationId", Collection::InternshipApplications)?;

        let month_field = if fields::has(doc, "reportMonth") { "reportMonth" } else { "month" };
        let month = match fields::month(doc, month_field) {
            Some(m) => m,
            None => {
                return Err(match fields::text(doc, month_field) {
                    Some(value) => SkipReason::InvalidField { field: "reportMonth", value },
                    None => SkipReason::MissingField("reportMonth"),
                })
            }
        };
        let year = fields::first_int(doc, &["reportYear", "year"])
            .ok_or(SkipReason::MissingField("reportYear"))?;
        if !(2000..=2100).contains(&year) {
            return Err(SkipReason::InvalidField { field: "reportYear", value: year.to_string() });
        }
        ctx.ensure_unique(
            Collection::MonthlyReports,
            source_id(record)?,
            format!("{}:{}-{:02}", application_id, year, month),
            dest_id,
        )?;

        let submitted_at = fields::first_date(doc, &["submittedAt", "submissionDate", "createdAt"])
            .unwrap_or_else(|| ctx.run_started());

        let row = Row::new()
            .with("id", dest_id)
            .with("application_id", application_id)
            .with("student_id", ctx.optional_ref(doc, &["studentId"], Collection::Students))
            .with("report_month", month as i32)
            .with("report_year", year as i32)
            .with(
                "content",
                fields::first_text(doc, &["reportContent", "content", "description", "tasksCompleted", "workDone"]),
            )
            .with("learnings", fields::first_text(doc, &["learnings", "learningOutcomes"]))
            .with("attachment_url", fields::first_text(doc, &["reportFileUrl", "fileUrl"]))
            .with("status", ReportStatus::from_field_or_default(doc, "status").to_sql_value())
            .with("reviewed_by", ctx.optional_ref(doc, &["reviewedBy"], Collection::Users))
            .with(
                "reviewer_comments",
                fields::first_text(doc, &["reviewerComments", "facultyComments", "comments"]),
            )
            .with("submitted_at", submitted_at)
            .with("reviewed_at", fields::first_date(doc, &["reviewedAt", "reviewDate"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct FacultyVisitMigrator;

impl EntityMigrator for FacultyVisitMigrator {
    fn collection(&self) -> Collection {
        Collection::FacultyVisits
    }

    fn table(&self) -> &'static str {
        schema::FACULTY_VISITS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::InternshipApplications, Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let application_id = ctx.required_ref(doc, "applicationId", Collection::InternshipApplications)?;
        let faculty_id = ctx.required_ref(doc, "facultyId", Collection::Users)?;
        let visit_date = required_date(doc, &["visitDate", "scheduledDate"])?;

        let visit_type = VisitType::from_field(doc, "visitType")
            .or_else(|| VisitType::from_field(doc, "visitMode"))
            .unwrap_or_default();
        let status = VisitStatus::from_field(doc, "status").unwrap_or(if visit_date > ctx.run_started() {
            VisitStatus::Scheduled
        } else {
            VisitStatus::Completed
        });

        let row = Row::new()
            .with("id", dest_id)
            .with("application_id", application_id)
            .with("faculty_id", faculty_id)
            .with("visit_date", visit_date)
            .with("visit_type", visit_type.to_sql_value())
            .with("status", status.to_sql_value())
            .with("observations", fields::first_text(doc, &["observations", "remarks"]))
            .with("recommendations", fields::text(doc, "recommendations"))
            .with("report_url", fields::first_text(doc, &["reportUrl", "visitReport"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct FeedbackMigrator;

const FEEDBACK_TARGETS: [(&str, Collection); 3] = [
    ("applicationId", Collection::InternshipApplications),
    ("studentId", Collection::Students),
    ("industryId", Collection::Industries),
];

impl EntityMigrator for FeedbackMigrator {
    fn collection(&self) -> Collection {
        Collection::Feedback
    }

    fn table(&self) -> &'static str {
        schema::FEEDBACK
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::InternshipApplications, Collection::Students, Collection::Industries]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let [application_id, student_id, industry_id] =
            FEEDBACK_TARGETS.map(|(field, collection)| ctx.resolve(doc, field, collection));
        if application_id.is_none() && student_id.is_none() && industry_id.is_none() {
            return Err(match FEEDBACK_TARGETS.iter().find(|(f, _)| fields::has(doc, f)) {
                Some(&(field, collection)) => SkipReason::UnresolvedReference { field, collection },
                None => SkipReason::MissingField("applicationId"),
            });
        }

        let rating = fields::first_int(doc, &["rating", "overallRating"])
            .ok_or(SkipReason::MissingField("rating"))?;
        if !(1..=5).contains(&rating) {
            return Err(SkipReason::InvalidField { field: "rating", value: rating.to_string() });
        }
        let feedback_type = fields::first_text(doc, &["feedbackType", "type"])
            .map(|t| t.to_uppercase())
            .unwrap_or_else(|| "GENERAL".to_string());

        let row = Row::new()
            .with("id", dest_id)
            .with("application_id", application_id)
            .with("student_id", student_id)
            .with("industry_id", industry_id)
            .with("rating", rating as i32)
            .with("feedback_type", feedback_type)
            .with("comments", fields::first_text(doc, &["comments", "feedback", "feedbackText"]))
            .with("strengths", fields::text(doc, "strengths"))
            .with("improvements", fields::first_text(doc, &["improvements", "areasOfImprovement"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}
