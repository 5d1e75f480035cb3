use cms_database::{schema, PgEnum, Row};
use cms_source::{fields, Collection, SourceRecord};
use uuid::Uuid;

use crate::context::MigrationContext;
use crate::enums::{Gender, SourceEnum, UserRole};
use crate::migrator::{required_text, source_id, with_timestamps, EntityMigrator};
use crate::outcome::SkipReason;

pub struct UserMigrator;

impl EntityMigrator for UserMigrator {
    fn collection(&self) -> Collection {
        Collection::Users
    }

    fn table(&self) -> &'static str {
        schema::USERS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Institutions]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let email = match fields::email(doc, "email") {
            Some(email) => email,
            None => {
                return Err(match fields::text(doc, "email") {
                    Some(value) => SkipReason::InvalidField { field: "email", value },
                    None => SkipReason::MissingField("email"),
                })
            }
        };
        let password = required_text(doc, &["password", "passwordHash"])?;
        ctx.ensure_unique(Collection::Users, source_id(record)?, format!("email:{}", email), dest_id)?;

        let name = fields::first_text(doc, &["name", "fullName"])
            .or_else(|| {
                let parts: Vec<String> = ["firstName", "lastName"]
                    .iter()
                    .filter_map(|k| fields::text(doc, k))
                    .collect();
                (!parts.is_empty()).then(|| parts.join(" "))
            })
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let row = Row::new()
            .with("id", dest_id)
            .with("email", email)
            .with("password", password)
            .with("name", name)
            .with("role", UserRole::from_field_or_default(doc, "role").to_sql_value())
            .with("phone", fields::first_text(doc, &["phone", "phoneNumber", "mobile"]))
            .with("institution_id", ctx.optional_ref(doc, &["institutionId"], Collection::Institutions))
            .with("is_active", fields::boolean(doc, "isActive").unwrap_or(true))
            .with("last_login_at", fields::first_date(doc, &["lastLogin", "lastLoginAt"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct StudentMigrator;

impl EntityMigrator for StudentMigrator {
    fn collection(&self) -> Collection {
        Collection::Students
    }

    fn table(&self) -> &'static str {
        schema::STUDENTS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[
            Collection::Users,
            Collection::Institutions,
            Collection::Branches,
            Collection::Batches,
            Collection::Semesters,
        ]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let sid = source_id(record)?;
        let user_id = ctx.required_ref(doc, "userId", Collection::Users)?;
        ctx.ensure_unique(Collection::Students, sid, format!("user:{}", user_id), dest_id)?;

        let roll_number = fields::first_text(doc, &["rollNumber", "enrollmentNumber", "registrationNumber"])
            .map(|r| r.to_uppercase());
        if let Some(roll) = &roll_number {
            ctx.ensure_unique(Collection::Students, sid, format!("roll:{}", roll), dest_id)?;
        }

        let cgpa = fields::first_money(doc, &["cgpa", "gpa"]).filter(|g| (0.0..=10.0).contains(g));
        let gender = Gender::from_field(doc, "gender").map(|g| g.to_sql_value());

        let row = Row::new()
            .with("id", dest_id)
            .with("user_id", user_id)
            .with("institution_id", ctx.optional_ref(doc, &["institutionId"], Collection::Institutions))
            .with("branch_id", ctx.optional_ref(doc, &["branchId"], Collection::Branches))
            .with("batch_id", ctx.optional_ref(doc, &["batchId"], Collection::Batches))
            .with(
                "semester_id",
                ctx.optional_ref(doc, &["semesterId", "currentSemesterId"], Collection::Semesters),
            )
            .with("roll_number", roll_number)
            .with("name", fields::first_text(doc, &["name", "fullName"]))
            .with("phone", fields::first_text(doc, &["phone", "phoneNumber", "mobile"]))
            .with("gender", gender)
            .with(
                "date_of_birth",
                fields::first_date(doc, &["dateOfBirth", "dob"]).map(|d| d.date_naive()),
            )
            .with("address", fields::text(doc, "address"))
            .with("cgpa", cgpa)
            .with("skills", fields::string_list(doc, "skills"))
            .with("resume_url", fields::first_text(doc, &["resumeUrl", "resume"]))
            .with("is_placed", fields::boolean(doc, "isPlaced").unwrap_or(false));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct MentorAssignmentMigrator;

impl EntityMigrator for MentorAssignmentMigrator {
    fn collection(&self) -> Collection {
        Collection::MentorAssignments
    }

    fn table(&self) -> &'static str {
        schema::MENTOR_ASSIGNMENTS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Students, Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let student_id = ctx.required_ref(doc, "studentId", Collection::Students)?;
        let mentor_id = ctx.required_ref(doc, "mentorId", Collection::Users)?;
        let assigned_at = fields::first_date(doc, &["assignedDate", "assignedAt", "createdAt"])
            .unwrap_or_else(|| ctx.run_started());

        let row = Row::new()
            .with("id", dest_id)
            .with("student_id", student_id)
            .with("mentor_id", mentor_id)
            .with("assigned_by", ctx.optional_ref(doc, &["assignedBy"], Collection::Users))
            .with("assigned_at", assigned_at)
            .with("is_active", fields::boolean(doc, "isActive").unwrap_or(true))
            .with("remarks", fields::first_text(doc, &["remarks", "notes"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_database::SqlValue;
    use cms_source::bson::doc;

    #[test]
    fn test_user_email_is_normalised_and_unique() {
        let mut ctx = MigrationContext::default();
        let a = SourceRecord::new(doc! { "_id": "u1", "email": " A@B.com", "password": "x", "role": "hod" });
        let b = SourceRecord::new(doc! { "_id": "u2", "email": "a@b.COM", "password": "y" });

        let a_id = ctx.translator.translate("u1", Collection::Users);
        let row = UserMigrator.transform(&a, a_id, &mut ctx).unwrap();
        assert_eq!(row.text("email"), Some("a@b.com"));
        assert_eq!(row.text("role"), Some("FACULTY"));
        assert_eq!(row.text("name"), Some("a"));

        let b_id = ctx.translator.translate("u2", Collection::Users);
        let err = UserMigrator.transform(&b, b_id, &mut ctx).unwrap_err();
        assert_eq!(err, SkipReason::Duplicate { key: "email:a@b.com".into() });
        assert_eq!(ctx.translator.resolve("u2", Collection::Users), Some(a_id));
    }

    #[test]
    fn test_user_without_usable_email() {
        let mut ctx = MigrationContext::default();
        let r = SourceRecord::new(doc! { "_id": "u1", "email": "nobody", "password": "x" });
        assert!(matches!(
            UserMigrator.transform(&r, Uuid::new_v4(), &mut ctx),
            Err(SkipReason::InvalidField { field: "email", .. })
        ));
    }

    #[test]
    fn test_student_requires_migrated_user() {
        let mut ctx = MigrationContext::default();
        let r = SourceRecord::new(doc! { "_id": "s1", "userId": "u-never", "rollNumber": "21cs01" });
        assert_eq!(
            StudentMigrator.transform(&r, Uuid::new_v4(), &mut ctx),
            Err(SkipReason::UnresolvedReference { field: "userId", collection: Collection::Users })
        );
    }

    #[test]
    fn test_student_optional_refs_and_fields() {
        let mut ctx = MigrationContext::default();
        let user = ctx.translator.translate("u1", Collection::Users);
        let branch = ctx.translator.translate("br1", Collection::Branches);
        let r = SourceRecord::new(doc! {
            "_id": "s1", "userId": "u1", "branchId": "br1", "batchId": "gone",
            "rollNumber": "21cs01", "gender": "F", "cgpa": "8.4", "skills": ["rust", "sql"]
        });
        let row = StudentMigrator.transform(&r, Uuid::new_v4(), &mut ctx).unwrap();
        assert_eq!(row.uuid("user_id"), Some(user));
        assert_eq!(row.uuid("branch_id"), Some(branch));
        assert_eq!(row.get("batch_id"), Some(&SqlValue::Null));
        assert_eq!(row.text("roll_number"), Some("21CS01"));
        assert_eq!(row.text("gender"), Some("FEMALE"));
        assert_eq!(row.get("cgpa"), Some(&SqlValue::Double(8.4)));
    }

    #[test]
    fn test_second_profile_for_same_user_is_duplicate() {
        let mut ctx = MigrationContext::default();
        ctx.translator.translate("u1", Collection::Users);
        let first = ctx.translator.translate("s1", Collection::Students);
        let a = SourceRecord::new(doc! { "_id": "s1", "userId": "u1" });
        let b = SourceRecord::new(doc! { "_id": "s2", "userId": "u1", "rollNumber": "X1" });
        StudentMigrator.transform(&a, first, &mut ctx).unwrap();
        let err = StudentMigrator.transform(&b, Uuid::new_v4(), &mut ctx).unwrap_err();
        assert!(matches!(err, SkipReason::Duplicate { .. }));
        assert_eq!(ctx.translator.resolve("s2", Collection::Students), Some(first));
    }
}
