use cms_database::{schema, PgEnum, Row};
use cms_source::{bson::Document, fields, Collection, SourceRecord};
use uuid::Uuid;

use crate::context::MigrationContext;
use crate::enums::{DocumentType, FeeStatus, GrievanceStatus, QueryPriority, QueryStatus, SourceEnum};
use crate::migrator::{required_text, with_timestamps, EntityMigrator};
use crate::outcome::SkipReason;

const SUBJECT_LEN: usize = 80;

/// Upper snake label for free-text category columns.
fn label(doc: &Document, keys: &[&str], default: &str) -> String {
    fields::first_text(doc, keys)
        .map(|raw| {
            raw.split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("_")
                .to_uppercase()
        })
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub struct FeeMigrator;

impl EntityMigrator for FeeMigrator {
    fn collection(&self) -> Collection {
        Collection::Fees
    }

    fn table(&self) -> &'static str {
        schema::FEES
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Students, Collection::Semesters]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let student_id = ctx.required_ref(doc, "studentId", Collection::Students)?;
        let amount = match fields::first_money(doc, &["amount", "feeAmount", "totalAmount"]) {
            Some(a) if a >= 0.0 => a,
            Some(a) => return Err(SkipReason::InvalidField { field: "amount", value: a.to_string() }),
            None => {
                return Err(match fields::text(doc, "amount") {
                    Some(value) => SkipReason::InvalidField { field: "amount", value },
                    None => SkipReason::MissingField("amount"),
                })
            }
        };
        let paid_date = fields::first_date(doc, &["paidDate", "paymentDate", "paidAt"]);
        let status = FeeStatus::from_field(doc, "status").unwrap_or(if paid_date.is_some() {
            FeeStatus::Paid
        } else {
            FeeStatus::Pending
        });

        let row = Row::new()
            .with("id", dest_id)
            .with("student_id", student_id)
            .with("semester_id", ctx.optional_ref(doc, &["semesterId"], Collection::Semesters))
            .with("fee_type", label(doc, &["feeType", "type"], "TUITION"))
            .with("amount", amount)
            .with("paid_amount", fields::first_money(doc, &["paidAmount", "amountPaid"]))
            .with("status", status.to_sql_value())
            .with("due_date", fields::date(doc, "dueDate"))
            .with("paid_date", paid_date)
            .with("transaction_id", fields::first_text(doc, &["transactionId", "receiptNumber", "paymentId"]))
            .with("remarks", fields::first_text(doc, &["remarks", "description"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct DocumentMigrator;

impl EntityMigrator for DocumentMigrator {
    fn collection(&self) -> Collection {
        Collection::Documents
    }

    fn table(&self) -> &'static str {
        schema::DOCUMENTS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Students, Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let student_id = ctx.optional_ref(doc, &["studentId"], Collection::Students);
        let user_id = ctx.optional_ref(doc, &["userId", "uploadedBy"], Collection::Users);
        if student_id.is_none() && user_id.is_none() {
            return Err(if fields::has(doc, "studentId") {
                SkipReason::UnresolvedReference { field: "studentId", collection: Collection::Students }
            } else if fields::has(doc, "userId") {
                SkipReason::UnresolvedReference { field: "userId", collection: Collection::Users }
            } else {
                SkipReason::MissingField("studentId")
            });
        }
        let file_url = required_text(doc, &["fileUrl", "filePath", "documentUrl", "url"])?;
        let file_name = fields::first_text(doc, &["fileName", "name", "originalName"]).unwrap_or_else(|| {
            file_url
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(file_url.as_str())
                .to_string()
        });
        let document_type = DocumentType::from_field(doc, "documentType")
            .or_else(|| DocumentType::from_field(doc, "type"))
            .unwrap_or_default();

        let row = Row::new()
            .with("id", dest_id)
            .with("student_id", student_id)
            .with("user_id", user_id)
            .with("document_type", document_type.to_sql_value())
            .with("file_name", file_name)
            .with("file_url", file_url)
            .with("file_size", fields::int(doc, "fileSize"))
            .with("mime_type", fields::first_text(doc, &["mimeType", "contentType"]))
            .with("is_verified", fields::boolean(doc, "isVerified").unwrap_or(false));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct GrievanceMigrator;

impl EntityMigrator for GrievanceMigrator {
    fn collection(&self) -> Collection {
        Collection::Grievances
    }

    fn table(&self) -> &'static str {
        schema::GRIEVANCES
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Students, Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let student_id = ctx.required_ref(doc, "studentId", Collection::Students)?;
        let description = required_text(doc, &["description", "details", "message"])?;
        let subject = fields::first_text(doc, &["subject", "title"])
            .unwrap_or_else(|| description.chars().take(SUBJECT_LEN).collect());

        let row = Row::new()
            .with("id", dest_id)
            .with("student_id", student_id)
            .with("category", label(doc, &["category", "grievanceType"], "GENERAL"))
            .with("subject", subject)
            .with("description", description)
            .with("status", GrievanceStatus::from_field_or_default(doc, "status").to_sql_value())
            .with("assigned_to", ctx.optional_ref(doc, &["assignedTo"], Collection::Users))
            .with("resolution", fields::first_text(doc, &["resolution", "response"]))
            .with("resolved_at", fields::first_date(doc, &["resolvedAt", "resolvedDate"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct TechnicalQueryMigrator;

impl EntityMigrator for TechnicalQueryMigrator {
    fn collection(&self) -> Collection {
        Collection::TechnicalQueries
    }

    fn table(&self) -> &'static str {
        schema::TECHNICAL_QUERIES
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let user_id = ctx.required_ref_any(doc, &["userId", "raisedBy"], Collection::Users)?;
        let title = required_text(doc, &["title", "subject"])?;
        let description = required_text(doc, &["description", "query", "details"])?;

        let row = Row::new()
            .with("id", dest_id)
            .with("user_id", user_id)
            .with("title", title)
            .with("description", description)
            .with("priority", QueryPriority::from_field_or_default(doc, "priority").to_sql_value())
            .with("status", QueryStatus::from_field_or_default(doc, "status").to_sql_value())
            .with("resolution", fields::first_text(doc, &["resolution", "response"]))
            .with("resolved_at", fields::first_date(doc, &["resolvedAt", "resolvedDate"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct NotificationMigrator;

impl EntityMigrator for NotificationMigrator {
    fn collection(&self) -> Collection {
        Collection::Notifications
    }

    fn table(&self) -> &'static str {
        schema::NOTIFICATIONS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let user_id = ctx.required_ref_any(doc, &["userId", "recipientId"], Collection::Users)?;
        let message = required_text(doc, &["message", "body", "content"])?;
        let is_read = fields::boolean(doc, "isRead")
            .or_else(|| fields::boolean(doc, "read"))
            .unwrap_or(false);

        let row = Row::new()
            .with("id", dest_id)
            .with("user_id", user_id)
            .with(
                "title",
                fields::text(doc, "title").unwrap_or_else(|| "Notification".to_string()),
            )
            .with("message", message)
            .with("notification_type", label(doc, &["type", "notificationType"], "INFO"))
            .with("is_read", is_read)
            .with("link", fields::first_text(doc, &["link", "url"]));
        Ok(with_timestamps(row, doc, ctx))
    }
}

pub struct AuditLogMigrator;

impl EntityMigrator for AuditLogMigrator {
    fn collection(&self) -> Collection {
        Collection::AuditLogs
    }

    fn table(&self) -> &'static str {
        schema::AUDIT_LOGS
    }

    fn depends_on(&self) -> &'static [Collection] {
        &[Collection::Users]
    }

    fn transform(&self, record: &SourceRecord, dest_id: Uuid, ctx: &mut MigrationContext) -> Result<Row, SkipReason> {
        let doc = &record.document;
        let action = label(doc, &["action"], "");
        if action.is_empty() {
            return Err(SkipReason::MissingField("action"));
        }
        let details = ["details", "changes", "metadata"]
            .iter()
            .find_map(|k| doc.get(*k).filter(|v| !matches!(v, cms_source::bson::Bson::Null)))
            .map(|v| v.clone().into_relaxed_extjson());
        let created_at = fields::first_date(doc, &["timestamp", "createdAt"]).unwrap_or_else(|| ctx.run_started());

        Ok(Row::new()
            .with("id", dest_id)
            .with("user_id", ctx.optional_ref(doc, &["userId", "performedBy"], Collection::Users))
            .with("action", action)
            .with("entity_type", fields::first_text(doc, &["entityType", "entity", "resource"]))
            .with("entity_id", fields::first_reference(doc, &["entityId", "resourceId"]))
            .with("details", details)
            .with("ip_address", fields::first_text(doc, &["ipAddress", "ip"]))
            .with("user_agent", fields::text(doc, "userAgent"))
            .with("created_at", created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cms_database::SqlValue;
    use cms_source::bson::doc;

    #[test]
    fn test_label_normalisation() {
        let d = doc! { "category": "fee related / hostel" };
        assert_eq!(label(&d, &["category"], "GENERAL"), "FEE_RELATED_HOSTEL");
        assert_eq!(label(&d, &["missing"], "GENERAL"), "GENERAL");
    }

    #[test]
    fn test_fee_amount_and_status() {
        let mut ctx = MigrationContext::default();
        ctx.translator.translate("s1", Collection::Students);
        let paid = SourceRecord::new(doc! { "_id": "f1", "studentId": "s1", "amount": "INR 45,000", "paidDate": "2024-01-10" });
        let row = FeeMigrator.transform(&paid, Uuid::new_v4(), &mut ctx).unwrap();
        assert_eq!(row.get("amount"), Some(&SqlValue::Double(45000.0)));
        assert_eq!(row.text("status"), Some("PAID"));
        assert_eq!(row.text("fee_type"), Some("TUITION"));

        let negative = SourceRecord::new(doc! { "_id": "f2", "studentId": "s1", "amount": -5 });
        assert!(matches!(
            FeeMigrator.transform(&negative, Uuid::new_v4(), &mut ctx),
            Err(SkipReason::InvalidField { field: "amount", .. })
        ));
        let missing = SourceRecord::new(doc! { "_id": "f3", "studentId": "s1" });
        assert_eq!(
            FeeMigrator.transform(&missing, Uuid::new_v4(), &mut ctx),
            Err(SkipReason::MissingField("amount"))
        );
    }

    #[test]
    fn test_document_owner_and_file_name() {
        let mut ctx = MigrationContext::default();
        ctx.translator.translate("u1", Collection::Users);
        let r = SourceRecord::new(doc! {
            "_id": "d1", "userId": "u1", "fileUrl": "https://cdn/x/offer.pdf", "documentType": "offer letter"
        });
        let row = DocumentMigrator.transform(&r, Uuid::new_v4(), &mut ctx).unwrap();
        assert_eq!(row.text("file_name"), Some("offer.pdf"));
        assert_eq!(row.text("document_type"), Some("OFFER_LETTER"));

        let orphan = SourceRecord::new(doc! { "_id": "d2", "fileUrl": "a.pdf" });
        assert_eq!(
            DocumentMigrator.transform(&orphan, Uuid::new_v4(), &mut ctx),
            Err(SkipReason::MissingField("studentId"))
        );
    }

    #[test]
    fn test_grievance_subject_from_description() {
        let mut ctx = MigrationContext::default();
        ctx.translator.translate("s1", Collection::Students);
        let long = "x".repeat(200);
        let r = SourceRecord::new(doc! { "_id": "g1", "studentId": "s1", "description": long.as_str() });
        let row = GrievanceMigrator.transform(&r, Uuid::new_v4(), &mut ctx).unwrap();
        assert_eq!(row.text("subject").map(str::len), Some(SUBJECT_LEN));
        assert_eq!(row.text("status"), Some("OPEN"));
    }

    #[test]
    fn test_notification_and_query_requirements() {
        let mut ctx = MigrationContext::default();
        ctx.translator.translate("u1", Collection::Users);
        let n = SourceRecord::new(doc! { "_id": "n1", "recipientId": "u1", "body": "hi", "read": "yes" });
        let row = NotificationMigrator.transform(&n, Uuid::new_v4(), &mut ctx).unwrap();
        assert_eq!(row.text("title"), Some("Notification"));
        assert_eq!(row.get("is_read"), Some(&SqlValue::Bool(true)));

        let q = SourceRecord::new(doc! { "_id": "q1", "userId": "u1", "subject": "VPN" });
        assert_eq!(
            TechnicalQueryMigrator.transform(&q, Uuid::new_v4(), &mut ctx),
            Err(SkipReason::MissingField("description"))
        );
    }

    #[test]
    fn test_audit_log_details_are_json() {
        let mut ctx = MigrationContext::default();
        let r = SourceRecord::new(doc! {
            "_id": "l1", "action": "user.login", "performedBy": "ghost", "details": { "ok": true, "tries": 2 }
        });
        let row = AuditLogMigrator.transform(&r, Uuid::new_v4(), &mut ctx).unwrap();
        assert_eq!(row.text("action"), Some("USER_LOGIN"));
        assert_eq!(row.get("user_id"), Some(&SqlValue::Null));
        assert_eq!(
            row.get("details"),
            Some(&SqlValue::Json(serde_json::json!({ "ok": true, "tries": 2 })))
        );
    }
}
