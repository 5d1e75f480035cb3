use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cms_database::{schema, DestinationStore, PgEnum, QueryCriteria, Row};
use tracing::info;
use uuid::Uuid;

use crate::enums::UserRole;

#[derive(Debug, Clone)]
pub struct SeedDepartment {
    pub name: String,
    pub code: String,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub institution_name: String,
    pub institution_code: String,
    pub admin_email: String,
    pub admin_name: String,
    /// Stored as given; the application owns the hashing scheme.
    pub admin_password_hash: String,
    pub departments: Vec<SeedDepartment>,
}

impl SeedConfig {
    pub fn new(admin_email: &str, admin_password_hash: &str) -> Self {
        let branches = [
            "Computer Science and Engineering",
            "Information Technology",
            "Electronics and Communication Engineering",
            "Mechanical Engineering",
            "Civil Engineering",
        ];
        Self {
            institution_name: "Default Institute".to_string(),
            institution_code: "DEFAULT".to_string(),
            admin_email: admin_email.trim().to_lowercase(),
            admin_name: "System Administrator".to_string(),
            admin_password_hash: admin_password_hash.to_string(),
            departments: vec![SeedDepartment {
                name: "Engineering".to_string(),
                code: "ENGG".to_string(),
                branches: branches.iter().map(|b| b.to_string()).collect(),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: Vec<String>,
    pub existing: usize,
}

struct Seeder<'a> {
    store: &'a dyn DestinationStore,
    dry_run: bool,
    summary: SeedSummary,
}

impl Seeder<'_> {
    /// Returns the id of the row matching `criteria`, inserting `row` when
    /// there is none.
    async fn ensure(&mut self, table: &str, criteria: QueryCriteria, row: Row, label: String) -> Result<Uuid> {
        let existing = self
            .store
            .find(table, criteria.limit(1))
            .await
            .with_context(|| format!("Failed to look up {}", label))?;
        if let Some(id) = existing.first().and_then(|r| r.uuid("id")) {
            self.summary.existing += 1;
            return Ok(id);
        }

        let id = row
            .uuid("id")
            .with_context(|| format!("Seed row for {} has no id", label))?;
        if !self.dry_run {
            self.store
                .insert(table, &row)
                .await
                .with_context(|| format!("Failed to create {}", label))?;
        }
        info!("🌱 {}{}", if self.dry_run { "would create " } else { "created " }, label);
        self.summary.created.push(label);
        Ok(id)
    }
}

fn base_row(now: DateTime<Utc>) -> Row {
    Row::new()
        .with("id", Uuid::new_v4())
        .with("created_at", now)
        .with("updated_at", now)
}

/// Creates the rows a fresh destination needs before anyone can log in.
/// Rows that already exist are left alone, so running twice is harmless.
pub async fn seed(
    store: &dyn DestinationStore,
    config: &SeedConfig,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<SeedSummary> {
    let mut seeder = Seeder { store, dry_run, summary: SeedSummary::default() };

    let institution_id = seeder
        .ensure(
            schema::INSTITUTIONS,
            QueryCriteria::new().add_valued_filter("code", "=", config.institution_code.as_str()),
            base_row(now)
                .with("name", config.institution_name.as_str())
                .with("code", config.institution_code.as_str())
                .with("is_active", true),
            format!("institution {}", config.institution_code),
        )
        .await?;

    seeder
        .ensure(
            schema::USERS,
            QueryCriteria::new().add_valued_filter("email", "=", config.admin_email.as_str()),
            base_row(now)
                .with("email", config.admin_email.as_str())
                .with("password", config.admin_password_hash.as_str())
                .with("name", config.admin_name.as_str())
                .with("role", UserRole::SystemAdmin.to_sql_value())
                .with("institution_id", institution_id)
                .with("is_active", true),
            format!("admin {}", config.admin_email),
        )
        .await?;

    for department in &config.departments {
        let department_id = seeder
            .ensure(
                schema::DEPARTMENTS,
                QueryCriteria::new()
                    .add_valued_filter("institution_id", "=", institution_id)
                    .add_valued_filter("code", "=", department.code.as_str()),
                base_row(now)
                    .with("institution_id", institution_id)
                    .with("name", department.name.as_str())
                    .with("code", department.code.as_str())
                    .with("is_active", true),
                format!("department {}", department.code),
            )
            .await?;

        for branch in &department.branches {
            seeder
                .ensure(
                    schema::BRANCHES,
                    QueryCriteria::new()
                        .add_valued_filter("department_id", "=", department_id)
                        .add_valued_filter("name", "=", branch.as_str()),
                    base_row(now)
                        .with("department_id", department_id)
                        .with("name", branch.as_str())
                        .with("is_active", true),
                    format!("branch {}", branch),
                )
                .await?;
        }
    }

    Ok(seeder.summary)
}
