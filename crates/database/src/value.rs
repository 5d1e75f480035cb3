use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A single column value headed for (or read back from) the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Uuid(Uuid),
    Text(String),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
    TextArray(Vec<String>),
    UuidArray(Vec<Uuid>),
    /// A Postgres enum. Bound as text and cast to `type_name` in the SQL.
    Enum {
        type_name: &'static str,
        value: String,
    },
}

/// Rust enums that map onto a Postgres enum type.
pub trait PgEnum: std::fmt::Display {
    const TYPE_NAME: &'static str;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Enum {
            type_name: Self::TYPE_NAME,
            value: self.to_string(),
        }
    }
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Canonical text form used for loose comparisons. `Null` has none.
    pub fn canonical(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Uuid(u) => Some(u.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::BigInt(i) => Some(i.to_string()),
            SqlValue::Double(f) => Some(f.to_string()),
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Timestamp(t) => Some(t.to_rfc3339()),
            SqlValue::Date(d) => Some(d.to_string()),
            SqlValue::Json(v) => Some(v.to_string()),
            SqlValue::TextArray(v) => Some(v.join(",")),
            SqlValue::UuidArray(v) => Some(
                v.iter().map(Uuid::to_string).collect::<Vec<_>>().join(","),
            ),
            SqlValue::Enum { value, .. } => Some(value.clone()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::BigInt(i) => Some(*i as f64),
            SqlValue::Double(f) => Some(*f),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SqlValue::Timestamp(t) => Some(*t),
            SqlValue::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Equality across representations: a uuid equals its text form, an
    /// `Int` equals the same `BigInt`, an enum equals its label. `Null`
    /// equals nothing, as in SQL.
    pub fn loosely_eq(&self, other: &SqlValue) -> bool {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_timestamp(), other.as_timestamp()) {
            return a == b;
        }
        match (self.canonical(), other.canonical()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b) && (a == b || is_uuid_like(&a)),
            _ => false,
        }
    }

    /// Ordering used by in-memory ORDER BY. Nulls sort last.
    pub fn loose_cmp(&self, other: &SqlValue) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
        }
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        if let (Some(a), Some(b)) = (self.as_timestamp(), other.as_timestamp()) {
            return a.cmp(&b);
        }
        self.canonical().cmp(&other.canonical())
    }

    fn from_json(value: serde_json::Value) -> SqlValue {
        match value {
            serde_json::Value::Null => SqlValue::Null,
            serde_json::Value::Bool(b) => SqlValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::BigInt(i),
                None => SqlValue::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => SqlValue::Text(s),
            other => SqlValue::Json(other),
        }
    }
}

fn is_uuid_like(s: &str) -> bool {
    Uuid::parse_str(s).is_ok()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // to_jsonb renders `timestamp without time zone` with no offset
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        SqlValue::TextArray(v)
    }
}

impl From<Vec<Uuid>> for SqlValue {
    fn from(v: Vec<Uuid>) -> Self {
        SqlValue::UuidArray(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// An ordered set of column values. Inserting an existing column replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) {
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| c == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn uuid(&self, column: &str) -> Option<Uuid> {
        match self.get(column)? {
            SqlValue::Uuid(u) => Some(*u),
            SqlValue::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            SqlValue::Text(s) => Some(s.as_str()),
            SqlValue::Enum { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            SqlValue::Int(i) => Some(*i as i64),
            SqlValue::BigInt(i) => Some(*i),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        self.get(column)?.as_timestamp()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Builds a row from a JSON object such as the output of `to_jsonb(t)`.
    /// Non-object input yields an empty row.
    pub fn from_json(value: serde_json::Value) -> Row {
        let mut row = Row::new();
        if let serde_json::Value::Object(map) = value {
            for (column, v) in map {
                row.columns.push((column, SqlValue::from_json(v)));
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_replaces_existing_column() {
        let row = Row::new().with("name", "a").with("name", "b");
        assert_eq!(row.len(), 1);
        assert_eq!(row.text("name"), Some("b"));
    }

    #[test]
    fn test_row_from_jsonb() {
        let id = Uuid::new_v4();
        let row = Row::from_json(json!({
            "id": id.to_string(),
            "roll_number": "21CS001",
            "cgpa": 8.5,
            "semester": 4,
            "created_at": "2024-03-01T10:00:00+00:00",
            "deleted_at": null,
        }));
        assert_eq!(row.uuid("id"), Some(id));
        assert_eq!(row.text("roll_number"), Some("21CS001"));
        assert_eq!(row.int("semester"), Some(4));
        assert_eq!(row.get("cgpa"), Some(&SqlValue::Double(8.5)));
        assert!(row.timestamp("created_at").is_some());
        assert_eq!(row.get("deleted_at"), Some(&SqlValue::Null));
    }

    #[test]
    fn test_loose_equality() {
        let id = Uuid::new_v4();
        assert!(SqlValue::Uuid(id).loosely_eq(&SqlValue::Text(id.to_string())));
        assert!(SqlValue::Int(3).loosely_eq(&SqlValue::BigInt(3)));
        assert!(SqlValue::Enum { type_name: "UserRole", value: "STUDENT".into() }
            .loosely_eq(&SqlValue::Text("STUDENT".into())));
        assert!(!SqlValue::Text("a".into()).loosely_eq(&SqlValue::Text("A".into())));
        assert!(!SqlValue::Null.loosely_eq(&SqlValue::Null));
    }

    #[test]
    fn test_loose_ordering_puts_nulls_last() {
        let mut values = vec![SqlValue::Null, SqlValue::BigInt(10), SqlValue::Int(2)];
        values.sort_by(|a, b| a.loose_cmp(b));
        assert_eq!(values, vec![SqlValue::Int(2), SqlValue::BigInt(10), SqlValue::Null]);
    }
}
