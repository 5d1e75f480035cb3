//! Lenient readers for source document fields.
//!
//! Documents in the dump were written by several generations of the
//! application, so one logical field can arrive as a native BSON value, an
//! extended-JSON wrapper (`{"$oid": ..}`, `{"$date": ..}`, `{"$numberLong": ..}`)
//! or a string. Every reader returns `None` rather than failing when the
//! value cannot be interpreted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use mongodb::bson::{Bson, Document};

/// Returns the inner value of a single-key extended-JSON wrapper.
fn wrapped<'a>(value: &'a Bson, key: &str) -> Option<&'a Bson> {
    match value {
        Bson::Document(doc) if doc.len() == 1 => doc.get(key),
        _ => None,
    }
}

fn present<'a>(doc: &'a Document, key: &str) -> Option<&'a Bson> {
    match doc.get(key)? {
        Bson::Null | Bson::Undefined => None,
        value => Some(value),
    }
}

/// Whether `key` holds anything other than null.
pub fn has(doc: &Document, key: &str) -> bool {
    present(doc, key).is_some()
}

/// Reads an identifier: an ObjectId, `{"$oid": ..}`, a populated
/// sub-document carrying its own `_id`, or a non-empty string or integer.
pub fn id_value(value: &Bson) -> Option<String> {
    match value {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Bson::Int32(i) => Some(i.to_string()),
        Bson::Int64(i) => Some(i.to_string()),
        Bson::Document(doc) => {
            if let Some(inner) = doc.get("$oid") {
                return id_value(inner);
            }
            doc.get("_id").and_then(id_value)
        }
        _ => None,
    }
}

/// The document's own `_id`, as text.
pub fn source_id(doc: &Document) -> Option<String> {
    present(doc, "_id").and_then(id_value)
}

/// A reference to another document's `_id`.
pub fn reference(doc: &Document, key: &str) -> Option<String> {
    present(doc, key).and_then(id_value)
}

pub fn first_reference(doc: &Document, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| reference(doc, k))
}

pub fn text_value(value: &Bson) -> Option<String> {
    let s = match value {
        Bson::String(s) => s.trim().to_string(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::Symbol(s) => s.trim().to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// A trimmed, non-empty string. Scalars are rendered as text.
pub fn text(doc: &Document, key: &str) -> Option<String> {
    present(doc, key).and_then(text_value)
}

pub fn first_text(doc: &Document, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| text(doc, k))
}

/// A lower-cased e-mail address. Values without an `@` are rejected.
pub fn email(doc: &Document, key: &str) -> Option<String> {
    text(doc, key)
        .map(|s| s.to_lowercase())
        .filter(|s| s.contains('@') && !s.starts_with('@') && !s.ends_with('@'))
}

pub fn int_value(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        Bson::Double(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        Bson::String(s) => s.trim().parse().ok(),
        Bson::Document(_) => wrapped(value, "$numberInt")
            .or_else(|| wrapped(value, "$numberLong"))
            .and_then(int_value),
        _ => None,
    }
}

pub fn int(doc: &Document, key: &str) -> Option<i64> {
    present(doc, key).and_then(int_value)
}

pub fn first_int(doc: &Document, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| int(doc, k))
}

pub fn float_value(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(f) if f.is_finite() => Some(*f),
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Bson::Document(_) => wrapped(value, "$numberDouble")
            .or_else(|| wrapped(value, "$numberDecimal"))
            .or_else(|| wrapped(value, "$numberInt"))
            .or_else(|| wrapped(value, "$numberLong"))
            .and_then(float_value),
        _ => None,
    }
}

pub fn float(doc: &Document, key: &str) -> Option<f64> {
    present(doc, key).and_then(float_value)
}

/// Parses amounts written as text: `"₹ 15,000"`, `"12000/month"`, `"-40.5"`.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit() && *c != '-' && *c != '.')
        .take_while(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | ' '))
        .filter(|c| !matches!(c, ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// A monetary amount: any numeric form, or a currency string.
pub fn money(doc: &Document, key: &str) -> Option<f64> {
    let value = present(doc, key)?;
    float_value(value).or_else(|| match value {
        Bson::String(s) => parse_money(s),
        _ => None,
    })
}

pub fn first_money(doc: &Document, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| money(doc, k))
}

pub fn boolean(doc: &Document, key: &str) -> Option<bool> {
    match present(doc, key)? {
        Bson::Boolean(b) => Some(*b),
        Bson::Int32(i) => Some(*i != 0),
        Bson::Int64(i) => Some(*i != 0),
        Bson::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// Parses the textual date forms found in the dump.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    if raw.len() >= 10 && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse().ok().and_then(from_millis);
    }
    None
}

pub fn date_value(value: &Bson) -> Option<DateTime<Utc>> {
    match value {
        Bson::DateTime(dt) => from_millis(dt.timestamp_millis()),
        Bson::Int64(ms) => from_millis(*ms),
        Bson::Double(ms) if ms.is_finite() => from_millis(*ms as i64),
        Bson::String(s) => parse_date(s),
        Bson::Document(_) => {
            let inner = wrapped(value, "$date")?;
            match inner {
                Bson::Document(_) => int_value(inner).and_then(from_millis),
                other => date_value(other),
            }
        }
        _ => None,
    }
}

pub fn date(doc: &Document, key: &str) -> Option<DateTime<Utc>> {
    present(doc, key).and_then(date_value)
}

pub fn first_date(doc: &Document, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| date(doc, k))
}

/// An array of strings, or a comma-separated string, trimmed and
/// de-duplicated in first-seen order.
pub fn string_list(doc: &Document, key: &str) -> Vec<String> {
    let items: Vec<String> = match present(doc, key) {
        Some(Bson::Array(values)) => values.iter().filter_map(text_value).collect(),
        Some(Bson::String(s)) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// References held in an array field, in order.
pub fn reference_list(doc: &Document, key: &str) -> Vec<String> {
    match present(doc, key) {
        Some(Bson::Array(values)) => values.iter().filter_map(id_value).collect(),
        Some(single) => id_value(single).into_iter().collect(),
        None => Vec::new(),
    }
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december",
];

/// A calendar month 1-12 from a number or an English month name.
pub fn month(doc: &Document, key: &str) -> Option<u32> {
    let value = present(doc, key)?;
    if let Some(n) = int_value(value) {
        return u32::try_from(n).ok().filter(|m| (1..=12).contains(m));
    }
    let name = text_value(value)?.to_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(name.as_str()))
        .map(|i| i as u32 + 1)
}

/// Fields of a sub-document, for sources that nest contact details.
pub fn nested<'a>(doc: &'a Document, key: &str) -> Option<&'a Document> {
    match present(doc, key)? {
        Bson::Document(inner) => Some(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use mongodb::bson::{doc, oid::ObjectId};

    #[test]
    fn test_identifiers() {
        let oid = ObjectId::new();
        let d = doc! {
            "_id": oid,
            "wrapped": { "$oid": "64b7f0c2a1b2c3d4e5f60718" },
            "populated": { "_id": "abc", "name": "x" },
            "blank": "   ",
            "missing": null
        };
        assert_eq!(source_id(&d), Some(oid.to_hex()));
        assert_eq!(reference(&d, "wrapped").as_deref(), Some("64b7f0c2a1b2c3d4e5f60718"));
        assert_eq!(reference(&d, "populated").as_deref(), Some("abc"));
        assert_eq!(reference(&d, "blank"), None);
        assert_eq!(reference(&d, "missing"), None);
        assert!(!has(&d, "missing"));
    }

    #[test]
    fn test_numbers() {
        let d = doc! {
            "a": 5, "b": { "$numberLong": "42" }, "c": "17", "d": 2.0,
            "fee": "₹ 15,000/month", "neg": "-40.5", "dec": { "$numberDecimal": "12.25" }
        };
        assert_eq!(int(&d, "a"), Some(5));
        assert_eq!(int(&d, "b"), Some(42));
        assert_eq!(int(&d, "c"), Some(17));
        assert_eq!(int(&d, "d"), Some(2));
        assert_eq!(money(&d, "fee"), Some(15000.0));
        assert_eq!(money(&d, "neg"), Some(-40.5));
        assert_eq!(float(&d, "dec"), Some(12.25));
        assert_eq!(parse_money("n/a"), None);
    }

    #[test]
    fn test_dates() {
        let d = doc! {
            "iso": "2024-03-05T10:00:00Z",
            "plain": "2024-03-05",
            "indian": "05/03/2024",
            "wrapped": { "$date": "2024-03-05T00:00:00.000Z" },
            "epoch": { "$date": { "$numberLong": "1709596800000" } },
            "junk": "sometime"
        };
        for key in ["iso", "plain", "indian", "wrapped", "epoch"] {
            let parsed = date(&d, key).unwrap_or_else(|| panic!("{} did not parse", key));
            assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 3, 5), "{}", key);
        }
        assert_eq!(date(&d, "junk"), None);
    }

    #[test]
    fn test_text_helpers() {
        let d = doc! {
            "email": "  Asha.K@Example.COM ", "bad": "nobody",
            "skills": ["rust", " sql ", "rust"], "csv": "a, b,,c",
            "m1": 3, "m2": "Sept", "m3": 13
        };
        assert_eq!(email(&d, "email").as_deref(), Some("asha.k@example.com"));
        assert_eq!(email(&d, "bad"), None);
        assert_eq!(string_list(&d, "skills"), vec!["rust", "sql"]);
        assert_eq!(string_list(&d, "csv"), vec!["a", "b", "c"]);
        assert_eq!(month(&d, "m1"), Some(3));
        assert_eq!(month(&d, "m2"), Some(9));
        assert_eq!(month(&d, "m3"), None);
        assert_eq!(first_text(&d, &["nope", "bad"]).as_deref(), Some("nobody"));
    }
}
