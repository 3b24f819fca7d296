//! Ordered-fallback field lookup over untyped upstream JSON.
//!
//! Each logical field is described by a list of candidate paths. The first
//! candidate that resolves to a non-null value wins. Path segments that parse as
//! an integer index into arrays.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::ShapeError;

/// Candidate paths for one logical field, in priority order.
pub type Candidates<'a> = &'a [&'a [&'a str]];

/// Walk `path` from `root`. `None` when any segment is missing.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| match node {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(map) => map.get(*segment),
        _ => None,
    })
}

/// Strings pass through, numbers and bools are rendered, empty strings are skipped.
pub fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings ("110", " 33.1 ").
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_u32(v: &Value) -> Option<u32> {
    let n = as_f64(v)?;
    if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) {
        Some(n as u32)
    } else {
        None
    }
}

pub fn first_text(root: &Value, candidates: Candidates<'_>) -> Option<String> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(as_text)
}

pub fn first_f64(root: &Value, candidates: Candidates<'_>) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(as_f64)
}

pub fn first_u32(root: &Value, candidates: Candidates<'_>) -> Option<u32> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(as_u32)
}

pub fn first_bool(root: &Value, candidates: Candidates<'_>) -> Option<bool> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(Value::as_bool)
}

pub fn first_array<'a>(root: &'a Value, candidates: Candidates<'_>) -> Option<&'a Vec<Value>> {
    candidates
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(Value::as_array)
}

/// Like [`first_text`] but a miss is a [`ShapeError`] naming `field`.
pub fn require_text(root: &Value, candidates: Candidates<'_>, field: &str) -> Result<String, ShapeError> {
    first_text(root, candidates).ok_or_else(|| ShapeError::missing(field))
}

/// Resolve a stat from parallel `names`/`values` arrays by label.
pub fn stat_by_name<'a>(names: &[Value], values: &'a [Value], label: &str) -> Option<&'a Value> {
    let index = names.iter().position(|n| n.as_str() == Some(label))?;
    values.get(index).filter(|v| !v.is_null())
}

/// Find the element of a list of stat objects whose `name` (or `type`,
/// `abbreviation`) matches one of `labels`, trying labels in order.
pub fn find_named<'a>(items: &'a [Value], labels: &[&str]) -> Option<&'a Value> {
    labels.iter().find_map(|label| {
        items.iter().find(|item| {
            ["name", "type", "abbreviation"]
                .iter()
                .any(|k| item.get(*k).and_then(Value::as_str) == Some(*label))
        })
    })
}

/// Drop duplicates, keeping first-seen order.
pub fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// An object whose only payload is a `$ref` link still to be dereferenced.
pub fn is_ref_only(v: &Value) -> bool {
    match v.as_object() {
        Some(map) => map.contains_key("$ref") && map.keys().all(|k| k == "$ref"),
        None => false,
    }
}

pub fn ref_link(v: &Value) -> Option<&str> {
    v.get("$ref").and_then(Value::as_str)
}

/// Upstream timestamps come as RFC 3339, minute-precision ISO ("2025-01-05T00:30Z"),
/// naive ISO, or a bare date (taken as midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
