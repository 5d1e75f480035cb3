use cms_database::{schema, PgEnum, Row};
use cms_source::{fields, Collection, SourceRecord};
use uuid::Uuid;

use crate::context::MigrationContext;
use crate::enums::{ApplicationStatus, InternshipStatus, PlacementStatus, SourceEnum};
use crate::migrator::{int4, required_text, source_id, with_timestamps, EntityMigrator};
use crate::outcome::SkipReason;

pub struct IndustryMigrator;

impl EntityMigrator for IndustryMigrator {
    fn collection(&self) -> Collection {
        Collection::Industries
    }

    fn table(&self) -> &'static str {
        schema::INDUSTRIES
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let company_name = required_text(doc, &["companyName", "name"])?;
        let user_id = ctx.optional_ref(doc, &["userId"], Collection::Users);
        if let Some(user_id) = user_id {
            ctx.ensure_unique(Collection::Industries, source_id(record)?, format!("user:{}", user_id), dest_id)?;
        }

        let row = Row::new()
            .with("id", dest_id)
            .with("user_id", user_id)
            .with("company_name", company_name)
            .with("industry_type", fields::first_text(doc, &["industryType", "sector"]))
            .with("registration_number", fields::text(doc, "registrationNumber"))
            .with("website", fields::text(doc, "website"))
            .with("contact_person", fields::text(doc, "contactPerson"))
            .with(
                "contact_email",
                fields::email(doc, "contactEmail").or_else(|| fields::email(doc, "email")),
            )
            .with("contact_phone", fields::first_text(doc, &["contactPhone", "phone"]))
            .with("address", fields::text(doc, "address"))
            .with("city", fields::text(doc, "city"))
            .with("state", fields::text(doc, "state"))
            .with(
                "is_approved",
                fields::boolean(doc, "isApproved")
                    .or_else(|| fields::boolean(doc, "isVerified"))
                    .unwrap_or(false),
            );
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct InternshipMigrator;

impl EntityMigrator for InternshipMigrator {
    fn collection(&self) -> Collection {
        Collection::Internships
    }

    fn table(&self) -> &'static str {
        schema::INTERNSHIPS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Industries]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let industry_id = ctx.required_ref_any(doc, &["industryId", "companyId"], Collection::Industries)?;
        let title = required_text(doc, &["title"])?;
        let duration = int4(doc, "duration", fields::first_int(doc, &["durationMonths", "duration"]))?;
        let positions = int4(
            doc,
            "numberOfPositions",
            fields::first_int(doc, &["numberOfPositions", "positions", "openings"]),
        )?
        .filter(|n| *n > 0)
        .unwrap_or(1);
        let mut skills = fields::string_list(doc, "requiredSkills");
        if skills.is_empty() {
            skills = fields::string_list(doc, "skills");
        }

        let row = Row::new()
            .with("id", dest_id)
            .with("industry_id", industry_id)
            .with("title", title)
            .with("description", fields::text(doc, "description"))
            .with("location", fields::text(doc, "location"))
            .with("stipend", fields::money(doc, "stipend"))
            .with("duration_months", duration)
            .with("number_of_positions", positions)
            .with("required_skills", skills)
            .with("start_date", fields::date(doc, "startDate"))
            .with("end_date", fields::date(doc, "endDate"))
            .with("application_deadline", fields::first_date(doc, &["applicationDeadline", "deadline"]))
            .with("status", InternshipStatus::from_field_or_default(doc, "status").to_sql_value());
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct ApplicationMigrator;

impl EntityMigrator for ApplicationMigrator {
    fn collection(&self) -> Collection {
        Collection::InternshipApplications
    }

    fn table(&self) -> &'static str {
        schema::INTERNSHIP_APPLICATIONS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Students, Collection::Internships]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let student_id = ctx.required_ref(doc, "studentId", Collection::Students)?;

        // applications to companies outside the portal carry no internship
        let self_identified = fields::boolean(doc, "isSelfIdentified").unwrap_or_else(|| {
            !fields::has(doc, "internshipId") && fields::has(doc, "companyName")
        });
        let (internship_id, company_name) = if self_identified {
            (
                ctx.optional_ref(doc, &["internshipId"], Collection::Internships),
                Some(required_text(doc, &["companyName"])?),
            )
        } else {
            (
                Some(ctx.required_ref(doc, "internshipId", Collection::Internships)?),
                fields::text(doc, "companyName"),
            )
        };
        let applied_at = fields::first_date(doc, &["appliedDate", "applicationDate", "createdAt"])
            .unwrap_or_else(|| ctx.run_started());

        let row = Row::new()
            .with("id", dest_id)
            .with("student_id", student_id)
            .with("internship_id", internship_id)
            .with("is_self_identified", self_identified)
            .with("company_name", company_name)
            .with("company_address", fields::text(doc, "companyAddress"))
            .with("status", ApplicationStatus::from_field_or_default(doc, "status").to_sql_value())
            .with("applied_at", applied_at)
            .with("start_date", fields::first_date(doc, &["startDate", "joiningDate"]))
            .with("end_date", fields::date(doc, "endDate"))
            .with("stipend", fields::money(doc, "stipend"))
            .with("offer_letter_url", fields::first_text(doc, &["offerLetterUrl", "offerLetter"]))
            .with("remarks", fields::first_text(doc, &["remarks", "comments"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct PlacementMigrator;

impl EntityMigrator for PlacementMigrator {
    fn collection(&self) -> Collection {
        Collection::Placements
    }

    fn table(&self) -> &'static str {
        schema::PLACEMENTS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Students]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let student_id = ctx.required_ref(doc, "studentId", Collection::Students)?;
        let company_name = required_text(doc, &["companyName"])?;

        let row = Row::new()
            .with("id", dest_id)
            .with("student_id", student_id)
            .with("company_name", company_name)
            .with("job_title", fields::first_text(doc, &["jobTitle", "designation", "role"]))
            .with("package_lpa", fields::first_money(doc, &["package", "ctc", "salary"]))
            .with("placement_date", fields::first_date(doc, &["placementDate", "offerDate"]))
            .with("location", fields::text(doc, "location"))
            .with("status", PlacementStatus::from_field_or_default(doc, "status").to_sql_value())
            .with("offer_letter_url", fields::first_text(doc, &["offerLetterUrl", "offerLetter"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}
