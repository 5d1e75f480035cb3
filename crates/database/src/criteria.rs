use uuid::Uuid;

use crate::error::StoreError;
use crate::value::SqlValue;

/// Specifies the direction for ordering query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Operators understood by every store implementation.
pub(crate) const SUPPORTED_OPERATORS: &[&str] = &[
    "=", "!=", "<", "<=", ">", ">=", "IS NULL", "IS NOT NULL", "= ANY",
];

/// Represents a single filter condition for a database query.
#[derive(Debug, Clone)]
pub struct FilterCondition {
    pub column: String,
    pub operator: &'static str,
    /// Holds the value for the condition's placeholder, if any.
    pub value: Option<SqlValue>,
}

/// The complete criteria for a filtered query: conditions joined with AND,
/// ordering and an optional limit.
#[derive(Debug, Clone, Default)]
pub struct QueryCriteria {
    pub conditions: Vec<FilterCondition>,
    pub limit: Option<i64>,
    pub order_by: Vec<(String, OrderDirection)>,
}

impl QueryCriteria {
    /// Creates a new, empty `QueryCriteria` builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter condition that may or may not have a value.
    pub fn add_filter(mut self, column: &str, operator: &'static str, value: Option<SqlValue>) -> Self {
        self.conditions.push(FilterCondition {
            column: column.to_string(),
            operator,
            value,
        });
        self
    }

    /// A convenience method for `add_filter` that requires a value.
    pub fn add_valued_filter(self, column: &str, operator: &'static str, value: impl Into<SqlValue>) -> Self {
        self.add_filter(column, operator, Some(value.into()))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.add_filter(column, "IS NULL", None)
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.add_filter(column, "IS NOT NULL", None)
    }

    /// `column = ANY($n)` over a list of ids.
    pub fn id_in(self, column: &str, ids: Vec<Uuid>) -> Self {
        self.add_filter(column, "= ANY", Some(SqlValue::UuidArray(ids)))
    }

    /// Sets the LIMIT for the query.
    pub fn limit(mut self, limit_val: i64) -> Self {
        self.limit = Some(limit_val);
        self
    }

    /// Adds an ORDER BY clause.
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Rejects operators the stores do not implement and value/operator
    /// mismatches before any SQL is rendered.
    pub fn validate(&self) -> Result<(), StoreError> {
        for condition in &self.conditions {
            if !SUPPORTED_OPERATORS.contains(&condition.operator) {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported operator '{}' on column '{}'",
                    condition.operator, condition.column
                )));
            }
            let needs_value = !condition.operator.starts_with("IS ");
            if needs_value != condition.value.is_some() {
                return Err(StoreError::InvalidQuery(format!(
                    "operator '{}' on column '{}' {} a value",
                    condition.operator,
                    condition.column,
                    if needs_value { "requires" } else { "does not take" }
                )));
            }
        }
        Ok(())
    }

    /// A delete needs at least one filter and takes neither ordering nor a
    /// limit, which Postgres `DELETE` does not accept.
    pub fn validate_delete(&self, table: &str) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::InvalidQuery(format!(
                "refusing unfiltered delete from '{}'",
                table
            )));
        }
        if !self.order_by.is_empty() || self.limit.is_some() {
            return Err(StoreError::InvalidQuery(format!(
                "delete from '{}' cannot be ordered or limited",
                table
            )));
        }
        self.validate()
    }

    /// Renders `WHERE ... ORDER BY ... LIMIT ...` with placeholders starting
    /// at `$first_placeholder`, returning the values to bind in order.
    pub fn to_sql_suffix(&self, first_placeholder: usize) -> Result<(String, Vec<SqlValue>), StoreError> {
        self.validate()?;
        let mut sql = String::new();
        let mut values = Vec::new();
        let mut placeholder = first_placeholder;

        for (i, condition) in self.conditions.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            let column = quote_ident(&condition.column);
            match (&condition.value, condition.operator) {
                (None, op) => sql.push_str(&format!("{} {}", column, op)),
                (Some(value), "= ANY") => {
                    sql.push_str(&format!("{} = ANY(${})", column, placeholder));
                    values.push(value.clone());
                    placeholder += 1;
                }
                (Some(value), op) => {
                    sql.push_str(&format!("{} {} ${}", column, op, placeholder));
                    values.push(value.clone());
                    placeholder += 1;
                }
            }
        }

        if !self.order_by.is_empty() {
            let parts: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", quote_ident(column), direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok((sql, values))
    }
}

/// Double-quotes an identifier, escaping embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
