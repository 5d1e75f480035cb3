use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row as _};
use uuid::Uuid;

use crate::criteria::{quote_ident, QueryCriteria};
use crate::error::StoreError;
use crate::store::DestinationStore;
use crate::value::{Row, SqlValue};

/// Server identity reported by [`PgStore::health_check`].
#[derive(Debug, Clone)]
pub struct DatabaseInfo {
    pub version: String,
    pub database: String,
    pub user: String,
}

/// `DestinationStore` over a Postgres pool. SQL is built per call from the
/// row's own columns, so no table needs a compile-time mapping.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database connectivity and report who we are connected as.
    pub async fn health_check(&self) -> Result<DatabaseInfo, StoreError> {
        let row = sqlx::query("SELECT version(), current_database()::text, current_user::text")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(DatabaseInfo {
            version: row.try_get(0)?,
            database: row.try_get(1)?,
            user: row.try_get(2)?,
        })
    }
}

/// Placeholder text for one value. Enums are cast from text to their type.
fn placeholder(value: &SqlValue, index: usize) -> String {
    match value {
        SqlValue::Enum { type_name, .. } => format!("${}::{}", index, quote_ident(type_name)),
        _ => format!("${}", index),
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value.clone() {
        // never rendered as a placeholder; see insert/update
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Uuid(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::BigInt(v) => query.bind(v),
        SqlValue::Double(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
        SqlValue::Date(v) => query.bind(v),
        SqlValue::Json(v) => query.bind(Json(v)),
        SqlValue::TextArray(v) => query.bind(v),
        SqlValue::UuidArray(v) => query.bind(v),
        SqlValue::Enum { value, .. } => query.bind(value),
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = bind_value(query, value);
    }
    query
}

#[async_trait]
impl DestinationStore for PgStore {
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut values = Vec::new();
        for (column, value) in row.iter().filter(|(_, v)| !v.is_null()) {
            columns.push(quote_ident(column));
            placeholders.push(placeholder(value, values.len() + 1));
            values.push(value.clone());
        }
        if columns.is_empty() {
            return Err(StoreError::InvalidQuery(format!("empty insert into '{}'", table)));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        bind_all(sqlx::query(&sql), &values)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, table: &str, criteria: QueryCriteria) -> Result<Vec<Row>, StoreError> {
        let (suffix, values) = criteria.to_sql_suffix(1)?;
        let sql = format!(
            "SELECT to_jsonb(t) AS row FROM {} t{}",
            quote_ident(table),
            suffix
        );
        let rows = bind_all(sqlx::query(&sql), &values)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let json: serde_json::Value = row.try_get("row")?;
            out.push(Row::from_json(json));
        }
        Ok(out)
    }

    async fn update(&self, table: &str, id: Uuid, changes: &Row) -> Result<u64, StoreError> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (column, value) in changes.iter() {
            if value.is_null() {
                assignments.push(format!("{} = NULL", quote_ident(column)));
            } else {
                assignments.push(format!(
                    "{} = {}",
                    quote_ident(column),
                    placeholder(value, values.len() + 1)
                ));
                values.push(value.clone());
            }
        }
        values.push(SqlValue::Uuid(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE \"id\" = ${}",
            quote_ident(table),
            assignments.join(", "),
            values.len()
        );
        let result = bind_all(sqlx::query(&sql), &values)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, table: &str, criteria: QueryCriteria) -> Result<u64, StoreError> {
        criteria.validate_delete(table)?;
        let (suffix, values) = criteria.to_sql_suffix(1)?;
        let sql = format!("DELETE FROM {}{}", quote_ident(table), suffix);
        let result = bind_all(sqlx::query(&sql), &values)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn truncate(&self, tables: &[&str]) -> Result<(), StoreError> {
        if tables.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = tables.iter().map(|t| quote_ident(t)).collect();
        let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", names.join(", "));
        sqlx::query(&sql).execute(&self.pool).await?;
        tracing::info!("Truncated {} tables", tables.len());
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}
