use cms_database::{schema, Row};
use cms_source::{bson::Document, fields, Collection, SourceRecord};
use uuid::Uuid;

use crate::context::MigrationContext;
use crate::migrator::{int4, required_date, required_text, source_id, with_timestamps, EntityMigrator};
use crate::outcome::SkipReason;

/// Upper-case initials of a name, used when a record has no code.
fn initials(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter_map(|word| word.chars().next())
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Address parts, whether flat on the record or nested under `address`.
struct Address {
    line: Option<String>,
    city: Option<String>,
    state: Option<String>,
    pincode: Option<String>,
}

fn address(doc: &Document) -> Address {
    match fields::nested(doc, "address") {
        Some(nested) => Address {
            line: fields::first_text(nested, &["street", "line1", "address"]),
            city: fields::text(nested, "city").or_else(|| fields::text(doc, "city")),
            state: fields::text(nested, "state").or_else(|| fields::text(doc, "state")),
            pincode: fields::first_text(nested, &["pincode", "zip", "postalCode"]),
        },
        None => Address {
            line: fields::text(doc, "address"),
            city: fields::text(doc, "city"),
            state: fields::text(doc, "state"),
            pincode: fields::first_text(doc, &["pincode", "zip", "postalCode"]),
        },
    }
}

pub struct InstitutionMigrator;

impl EntityMigrator for InstitutionMigrator {
    fn collection(&self) -> Collection {
        Collection::Institutions
    }

    fn table(&self) -> &'static str {
        schema::INSTITUTIONS
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let name = required_text(doc, &["name", "institutionName"])?;
        let code = fields::first_text(doc, &["code", "institutionCode"])
            .unwrap_or_else(|| initials(&name))
            .to_uppercase();
        ctx.ensure_unique(Collection::Institutions, source_id(record)?, format!("code:{}", code), dest_id)?;

        let addr = address(doc);
        let row = Row::new()
            .with("id", dest_id)
            .with("name", name)
            .with("code", code)
            .with("address", addr.line)
            .with("city", addr.city)
            .with("state", addr.state)
            .with("pincode", addr.pincode)
            .with("phone", fields::first_text(doc, &["phone", "contactNumber"]))
            .with("email", fields::email(doc, "email"))
            .with("website", fields::text(doc, "website"))
            .with("is_active", fields::boolean(doc, "isActive").unwrap_or(true));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct DepartmentMigrator;

impl EntityMigrator for DepartmentMigrator {
    fn collection(&self) -> Collection {
        Collection::Departments
    }

    fn table(&self) -> &'static str {
        schema::DEPARTMENTS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Institutions]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let institution_id = ctx.required_ref(doc, "institutionId", Collection::Institutions)?;
        let name = required_text(doc, &["name", "departmentName"])?;
        let code = fields::first_text(doc, &["code", "departmentCode"])
            .unwrap_or_else(|| initials(&name))
            .to_uppercase();
        ctx.ensure_unique(
            Collection::Departments,
            source_id(record)?,
            format!("{}:{}", institution_id, code),
            dest_id,
        )?;

        let row = Row::new()
            .with("id", dest_id)
            .with("institution_id", institution_id)
            .with("name", name)
            .with("code", code)
            .with("description", fields::text(doc, "description"))
            .with("is_active", fields::boolean(doc, "isActive").unwrap_or(true));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct BranchMigrator;

impl EntityMigrator for BranchMigrator {
    fn collection(&self) -> Collection {
        Collection::Branches
    }

    fn table(&self) -> &'static str {
        schema::BRANCHES
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Departments]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let department_id = ctx.required_ref(doc, "departmentId", Collection::Departments)?;
        let name = required_text(doc, &["name", "branchName"])?;
        ctx.ensure_unique(
            Collection::Branches,
            source_id(record)?,
            format!("{}:{}", department_id, name.to_lowercase()),
            dest_id,
        )?;
        let duration = int4(doc, "duration", fields::first_int(doc, &["duration", "durationYears"]))?;

        let row = Row::new()
            .with("id", dest_id)
            .with("department_id", department_id)
            .with("name", name)
            .with("code", fields::first_text(doc, &["code", "shortName"]).map(|c| c.to_uppercase()))
            .with("duration_years", duration)
            .with("is_active", fields::boolean(doc, "isActive").unwrap_or(true));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct BatchMigrator;

impl EntityMigrator for BatchMigrator {
    fn collection(&self) -> Collection {
        Collection::Batches
    }

    fn table(&self) -> &'static str {
        schema::BATCHES
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Institutions]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let institution_id = ctx.required_ref(doc, "institutionId", Collection::Institutions)?;
        let start_year = int4(doc, "startYear", fields::int(doc, "startYear"))?
            .ok_or(SkipReason::MissingField("startYear"))?;
        let end_year = int4(doc, "endYear", fields::int(doc, "endYear"))?
            .ok_or(SkipReason::MissingField("endYear"))?;
        if end_year < start_year {
            return Err(SkipReason::InvalidField { field: "endYear", value: end_year.to_string() });
        }
        let name = fields::text(doc, "name").unwrap_or_else(|| format!("{}-{}", start_year, end_year));

        let row = Row::new()
            .with("id", dest_id)
            .with("institution_id", institution_id)
            .with("name", name)
            .with("start_year", start_year)
            .with("end_year", end_year)
            .with("is_active", fields::boolean(doc, "isActive").unwrap_or(true));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct SemesterMigrator;

impl EntityMigrator for SemesterMigrator {
    fn collection(&self) -> Collection {
        Collection::Semesters
    }

    fn table(&self) -> &'static str {
        schema::SEMESTERS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Batches]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let batch_id = ctx.required_ref(doc, "batchId", Collection::Batches)?;
        let number = fields::first_int(doc, &["number", "semesterNumber"])
            .ok_or(SkipReason::MissingField("number"))?;
        if !(1..=12).contains(&number) {
            return Err(SkipReason::InvalidField { field: "number", value: number.to_string() });
        }

        let row = Row::new()
            .with("id", dest_id)
            .with("batch_id", batch_id)
            .with("number", number as i32)
            .with("start_date", fields::date(doc, "startDate"))
            .with("end_date", fields::date(doc, "endDate"))
            .with("is_current", fields::boolean(doc, "isCurrent").unwrap_or(false));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct CalendarMigrator;

impl EntityMigrator for CalendarMigrator {
    fn collection(&self) -> Collection {
        Collection::Calendars
    }

    fn table(&self) -> &'static str {
        schema::CALENDARS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Institutions]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let title = required_text(doc, &["title", "name"])?;
        let start_date = required_date(doc, &["startDate", "date"])?;
        let end_date = fields::date(doc, "endDate").unwrap_or(start_date);
        if end_date < start_date {
            return Err(SkipReason::InvalidField { field: "endDate", value: end_date.to_rfc3339() });
        }
        let event_type = fields::first_text(doc, &["eventType", "type"])
            .map(|t| t.to_uppercase().replace([' ', '-'], "_"))
            .unwrap_or_else(|| "ACADEMIC".to_string());

        let row = Row::new()
            .with("id", dest_id)
            .with("institution_id", ctx.optional_ref(doc, &["institutionId"], Collection::Institutions))
            .with("title", title)
            .with("description", fields::text(doc, "description"))
            .with("start_date", start_date)
            .with("end_date", end_date)
            .with("event_type", event_type)
            .with("is_holiday", fields::boolean(doc, "isHoliday").unwrap_or(false));
        Ok(with_timestamps(row, doc, ctx))
    }
}
