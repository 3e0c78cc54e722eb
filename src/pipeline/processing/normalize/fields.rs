//! Path resolution and lenient value coercion shared by every field mapping.
//!
//! Nothing in here fails: missing or malformed values come back empty and the
//! caller applies the documented default.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::normalizers::Paths;

static PHASE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(EARLY_)?PHASE(\d)$").expect("valid phase regex"));

/// Resolve one dot-separated path against `root`.
///
/// A `[]` suffix on a segment flattens an array; a non-array value under a
/// `[]` segment is treated as a single element. Nulls are skipped.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (key, flatten) = match segment.strip_suffix("[]") {
            Some(key) => (key, true),
            None => (segment, false),
        };
        let mut next = Vec::new();
        for node in current {
            let child = if key.is_empty() { Some(node) } else { node.get(key) };
            let Some(child) = child else { continue };
            if child.is_null() {
                continue;
            }
            match (flatten, child.as_array()) {
                (true, Some(items)) => next.extend(items.iter().filter(|v| !v.is_null())),
                _ => next.push(child),
            }
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

/// Nodes from the first path in the chain that resolves to anything
pub fn resolve_first<'a>(root: &'a Value, paths: Paths) -> Vec<&'a Value> {
    paths
        .iter()
        .map(|path| resolve(root, path))
        .find(|nodes| !nodes.is_empty())
        .unwrap_or_default()
}

fn collect_strings(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Null | Value::Object(_) => {}
    }
}

/// All string values under the first path that yields any, in source order
pub fn strings(root: &Value, paths: Paths) -> Vec<String> {
    for path in paths {
        let mut out = Vec::new();
        for node in resolve(root, path) {
            collect_strings(node, &mut out);
        }
        if !out.is_empty() {
            return out;
        }
    }
    Vec::new()
}

/// Scalar-from-list: the first string value along the fallback chain
pub fn first_string(root: &Value, paths: Paths) -> Option<String> {
    strings(root, paths).into_iter().next()
}

pub fn string_or_default(root: &Value, paths: Paths) -> String {
    first_string(root, paths).unwrap_or_default()
}

fn count_of(node: &Value) -> Option<u64> {
    match node {
        Value::Number(n) => n.as_u64().or_else(|| {
            // u64::MAX as f64 rounds up, so the bound is exclusive
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f < u64::MAX as f64 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        Value::Array(items) => items.first().and_then(count_of),
        _ => None,
    }
}

/// Non-negative integer coercion. `None` means absent or unparseable.
pub fn parse_count(root: &Value, paths: Paths) -> Option<u64> {
    paths
        .iter()
        .flat_map(|path| resolve(root, path))
        .find_map(count_of)
}

/// Boolean coercion: JSON booleans or "true"/"yes"/"1" strings
pub fn parse_flag(root: &Value, paths: Paths) -> bool {
    paths
        .iter()
        .flat_map(|path| resolve(root, path))
        .find_map(|node| match node {
            Value::Bool(b) => Some(*b),
            Value::Array(items) => items.first().map(|v| flag_of_str(v.as_str().unwrap_or(""))),
            Value::String(s) => Some(flag_of_str(s)),
            _ => None,
        })
        .unwrap_or(false)
}

fn flag_of_str(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1")
}

/// Normalize a registry date to ISO form.
///
/// Full dates become `YYYY-MM-DD`, month-precision dates `YYYY-MM`.
/// Anything unparseable becomes the empty string.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let day_formats = ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y"];
    for format in &day_formats {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    // Month precision: pin the day so chrono can parse, then drop it again
    let month_formats = [
        ("%Y-%m-%d", format!("{}-01", raw)),
        ("%B %Y %d", format!("{} 01", raw)),
        ("%b %Y %d", format!("{} 01", raw)),
    ];
    for (format, padded) in &month_formats {
        if let Ok(date) = NaiveDate::parse_from_str(padded, format) {
            return date.format("%Y-%m").to_string();
        }
    }

    String::new()
}

/// Map v2 phase codes (`PHASE3`, `EARLY_PHASE1`, `NA`) onto the v1 vocabulary
pub fn canonical_phase(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(caps) = PHASE_CODE.captures(raw) {
        let early = if caps.get(1).is_some() { "Early " } else { "" };
        return format!("{}Phase {}", early, &caps[2]);
    }
    match raw {
        "NA" => "Not Applicable".to_string(),
        other => other.to_string(),
    }
}

/// Map v2 status codes (`COMPLETED`, `ACTIVE_NOT_RECRUITING`) onto the v1 vocabulary
pub fn canonical_status(raw: &str) -> String {
    let raw = raw.trim();
    let is_code = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_uppercase() || c == '_');
    if !is_code {
        return raw.to_string();
    }
    match raw {
        "ACTIVE_NOT_RECRUITING" => "Active, not recruiting".to_string(),
        _ => {
            let lowered = raw.replace('_', " ").to_lowercase();
            let mut chars = lowered.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Drop repeated values, keeping the first occurrence
pub fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
