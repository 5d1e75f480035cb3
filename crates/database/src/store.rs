use async_trait::async_trait;
use uuid::Uuid;

use crate::criteria::QueryCriteria;
use crate::error::StoreError;
use crate::value::Row;

/// The relational destination. Tables and columns are pre-existing; this
/// trait only moves rows in and out of them.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Inserts one row. Null values are left to the column default.
    async fn insert(&self, table: &str, row: &Row) -> Result<(), StoreError>;

    /// Returns every row of `table` matching `criteria`.
    async fn find(&self, table: &str, criteria: QueryCriteria) -> Result<Vec<Row>, StoreError>;

    /// Applies `changes` to the row whose `id` column equals `id`.
    async fn update(&self, table: &str, id: Uuid, changes: &Row) -> Result<u64, StoreError>;

    /// Deletes rows matching `criteria`. Empty criteria are refused; use
    /// `truncate` to clear a table.
    async fn delete(&self, table: &str, criteria: QueryCriteria) -> Result<u64, StoreError>;

    /// Empties the given tables in one statement.
    async fn truncate(&self, tables: &[&str]) -> Result<(), StoreError>;

    async fn count(&self, table: &str) -> Result<i64, StoreError>;
}
