use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::criteria::{FilterCondition, OrderDirection, QueryCriteria};
use crate::error::StoreError;
use crate::store::DestinationStore;
use crate::value::{Row, SqlValue};

#[derive(Debug, Clone)]
struct UniqueConstraint {
    table: String,
    columns: Vec<String>,
}

#[derive(Debug, Clone)]
struct ForeignKey {
    table: String,
    column: String,
    parent_table: String,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    write_calls: usize,
    read_calls: usize,
}

/// A `DestinationStore` held entirely in memory.
///
/// Unique and foreign-key constraints are opt-in and checked on insert and
/// update, so
/// migrator behaviour around violations can be exercised without Postgres.
/// Every mutating call is counted, including failed ones.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unique: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique.push(UniqueConstraint {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn with_foreign_key(mut self, table: &str, column: &str, parent_table: &str) -> Self {
        self.foreign_keys.push(ForeignKey {
            table: table.to_string(),
            column: column.to_string(),
            parent_table: parent_table.to_string(),
        });
        self
    }

    /// Puts rows in place without counting them as writes.
    pub fn seed(&self, table: &str, rows: Vec<Row>) {
        let mut tables = self.lock();
        tables.rows.entry(table.to_string()).or_default().extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    pub fn read_calls(&self) -> usize {
        self.lock().read_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // a poisoned lock only means another test thread panicked mid-write
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `own_id` is the row being updated, which must not clash with itself.
    fn check_constraints(&self, tables: &Tables, table: &str, row: &Row, own_id: Option<Uuid>) -> Result<(), StoreError> {
        let own = own_id.map(SqlValue::Uuid);
        let existing: Vec<&Row> = tables
            .rows
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter(|r| match (&own, r.get("id")) {
                (Some(own), Some(id)) => !id.loosely_eq(own),
                _ => true,
            })
            .collect();

        for constraint in self.unique.iter().filter(|c| c.table == table) {
            let values: Vec<&SqlValue> = constraint
                .columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&SqlValue::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let clash = existing.iter().any(|other| {
                constraint
                    .columns
                    .iter()
                    .zip(&values)
                    .all(|(c, v)| other.get(c).is_some_and(|o| o.loosely_eq(v)))
            });
            if clash {
                return Err(StoreError::UniqueViolation {
                    constraint: format!("{}_{}_key", table, constraint.columns.join("_")),
                    detail: format!("duplicate key value on ({})", constraint.columns.join(", ")),
                });
            }
        }

        for fk in self.foreign_keys.iter().filter(|f| f.table == table) {
            let Some(value) = row.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let parent_rows = tables.rows.get(&fk.parent_table).map(Vec::as_slice).unwrap_or(&[]);
            let found = parent_rows
                .iter()
                .any(|p| p.get("id").is_some_and(|id| id.loosely_eq(value)));
            if !found {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: format!("{}_{}_fkey", table, fk.column),
                    detail: format!(
                        "key ({})=({}) is not present in table \"{}\"",
                        fk.column,
                        value.canonical().unwrap_or_default(),
                        fk.parent_table
                    ),
                });
            }
        }
        Ok(())
    }
}

fn condition_matches(row: &Row, condition: &FilterCondition) -> bool {
    let actual = row.get(&condition.column).unwrap_or(&SqlValue::Null);
    match (condition.operator, &condition.value) {
        ("IS NULL", _) => actual.is_null(),
        ("IS NOT NULL", _) => !actual.is_null(),
        ("= ANY", Some(SqlValue::UuidArray(ids))) => {
            ids.iter().any(|id| actual.loosely_eq(&SqlValue::Uuid(*id)))
        }
        ("= ANY", Some(SqlValue::TextArray(items))) => {
            items.iter().any(|s| actual.loosely_eq(&SqlValue::Text(s.clone())))
        }
        ("=", Some(expected)) => actual.loosely_eq(expected),
        ("!=", Some(expected)) => !actual.is_null() && !actual.loosely_eq(expected),
        ("<", Some(expected)) => !actual.is_null() && actual.loose_cmp(expected).is_lt(),
        ("<=", Some(expected)) => !actual.is_null() && actual.loose_cmp(expected).is_le(),
        (">", Some(expected)) => !actual.is_null() && actual.loose_cmp(expected).is_gt(),
        (">=", Some(expected)) => !actual.is_null() && actual.loose_cmp(expected).is_ge(),
        _ => false,
    }
}

fn select(rows: &[Row], criteria: &QueryCriteria) -> Vec<Row> {
    let mut matched: Vec<Row> = rows
        .iter()
        .filter(|row| criteria.conditions.iter().all(|c| condition_matches(row, c)))
        .cloned()
        .collect();

    if !criteria.order_by.is_empty() {
        matched.sort_by(|a, b| {
            for (column, direction) in &criteria.order_by {
                let left = a.get(column).unwrap_or(&SqlValue::Null);
                let right = b.get(column).unwrap_or(&SqlValue::Null);
                let ordering = match direction {
                    OrderDirection::Asc => left.loose_cmp(right),
                    OrderDirection::Desc => right.loose_cmp(left),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    if let Some(limit) = criteria.limit {
        matched.truncate(limit.max(0) as usize);
    }
    matched
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        let mut tables = self.lock();
        tables.write_calls += 1;
        self.check_constraints(&tables, table, row, None)?;
        tables.rows.entry(table.to_string()).or_default().push(row.clone());
        Ok(())
    }

    async fn find(&self, table: &str, criteria: QueryCriteria) -> Result<Vec<Row>, StoreError> {
        criteria.validate()?;
        let mut tables = self.lock();
        tables.read_calls += 1;
        let rows = tables.rows.get(table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(select(rows, &criteria))
    }

    async fn update(&self, table: &str, id: Uuid, changes: &Row) -> Result<u64, StoreError> {
        let mut tables = self.lock();
        tables.write_calls += 1;
        let target = SqlValue::Uuid(id);
        let is_target = |r: &Row| r.get("id").is_some_and(|v| v.loosely_eq(&target));
        let updated: Vec<Row> = tables
            .rows
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter(|r| is_target(*r))
            .map(|r| {
                let mut r = r.clone();
                for (column, value) in changes.iter() {
                    r.set(column, value.clone());
                }
                r
            })
            .collect();
        for row in &updated {
            self.check_constraints(&tables, table, row, Some(id))?;
        }

        let mut affected = 0;
        if let Some(rows) = tables.rows.get_mut(table) {
            let mut replacements = updated.into_iter();
            for row in rows.iter_mut().filter(|r| is_target(&**r)) {
                if let Some(next) = replacements.next() {
                    *row = next;
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, criteria: QueryCriteria) -> Result<u64, StoreError> {
        criteria.validate_delete(table)?;
        let mut tables = self.lock();
        tables.write_calls += 1;
        let Some(rows) = tables.rows.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !criteria.conditions.iter().all(|c| condition_matches(row, c)));
        Ok((before - rows.len()) as u64)
    }

    async fn truncate(&self, names: &[&str]) -> Result<(), StoreError> {
        let mut tables = self.lock();
        tables.write_calls += 1;
        for name in names {
            tables.rows.remove(*name);
        }
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<i64, StoreError> {
        let mut tables = self.lock();
        tables.read_calls += 1;
        Ok(tables.rows.get(table).map_or(0, |r| r.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> Row {
        Row::new().with("id", Uuid::new_v4()).with("email", email)
    }

    #[tokio::test]
    async fn test_unique_constraint() {
        let store = MemoryStore::new().with_unique("users", &["email"]);
        store.insert("users", &user("a@b.com")).await.unwrap();
        let err = store.insert("users", &user("a@b.com")).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.rows("users").len(), 1);
        assert_eq!(store.write_calls(), 2);
    }

    #[tokio::test]
    async fn test_update_respects_unique_constraint() {
        let store = MemoryStore::new().with_unique("students", &["user_id"]);
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let a = Row::new().with("id", Uuid::new_v4()).with("user_id", first);
        let b = Row::new().with("id", Uuid::new_v4()).with("user_id", second);
        let (a_id, b_id) = (a.uuid("id").unwrap(), b.uuid("id").unwrap());
        store.seed("students", vec![a, b]);

        // rewriting a row with its own value is not a clash
        assert_eq!(store.update("students", a_id, &Row::new().with("user_id", first)).await.unwrap(), 1);

        let err = store
            .update("students", b_id, &Row::new().with("user_id", first))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.rows("students")[1].uuid("user_id"), Some(second));
    }

    #[tokio::test]
    async fn test_foreign_key_constraint() {
        let store = MemoryStore::new().with_foreign_key("students", "user_id", "users");
        let u = user("a@b.com");
        let student = Row::new().with("id", Uuid::new_v4()).with("user_id", u.uuid("id"));

        let err = store.insert("students", &student).await.unwrap_err();
        assert!(err.is_foreign_key_violation());

        store.insert("users", &u).await.unwrap();
        store.insert("students", &student).await.unwrap();
        assert_eq!(store.count("students").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_update_delete() {
        let store = MemoryStore::new();
        let a = user("a@b.com").with("created_at", 2i64);
        let b = user("b@b.com").with("created_at", 1i64);
        let a_id = a.uuid("id").unwrap();
        store.seed("users", vec![a, b]);

        let ordered = store
            .find("users", QueryCriteria::new().order_by("created_at", OrderDirection::Asc))
            .await
            .unwrap();
        assert_eq!(ordered[0].text("email"), Some("b@b.com"));

        let changed = store
            .update("users", a_id, &Row::new().with("email", "c@b.com"))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let deleted = store
            .delete("users", QueryCriteria::new().add_valued_filter("email", "=", "c@b.com"))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.rows("users").len(), 1);
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let store = MemoryStore::new();
        assert!(store.delete("users", QueryCriteria::new()).await.is_err());
    }
}
