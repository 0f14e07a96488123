//! Field mapping engine
//!
//! A generic object-reshaping utility with no knowledge of the canonical
//! record shapes: declarative rules copy (and optionally transform) values
//! from dot-delimited source paths onto target fields, leaving every
//! original field in place.

use chrono::{DateTime, NaiveDate, Utc};
use forecourt_core::models::{FieldMapping, Transform};
use serde_json::Value;

/// Apply every rule to `payload`, returning a new object containing all
/// original fields plus each successfully mapped target field.
///
/// A source path that does not resolve is skipped; that is not an error.
pub fn apply_mappings(mappings: &[FieldMapping], payload: &Value) -> Value {
    let mut result = payload.clone();
    let Some(fields) = result.as_object_mut() else {
        return result;
    };

    for rule in mappings {
        let Some(source) = lookup_path(payload, &rule.source_field) else {
            continue;
        };
        fields.insert(
            rule.target_field.clone(),
            apply_transform(source.clone(), rule.transform),
        );
    }

    result
}

/// Walk a dot-delimited path through nested objects
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// Apply one transformation tag.
///
/// String transforms pass non-strings through unchanged; the parse
/// transforms leave unparseable values unchanged rather than guessing.
pub fn apply_transform(value: Value, transform: Transform) -> Value {
    match transform {
        Transform::None => value,
        Transform::Uppercase => match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        },
        Transform::Lowercase => match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        },
        Transform::Trim => match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        },
        Transform::ParseDate => match &value {
            Value::String(s) => parse_date(s).map(|dt| Value::String(dt.to_rfc3339())).unwrap_or(value),
            _ => value,
        },
        Transform::ParseNumber => match &value {
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(value),
            _ => value,
        },
    }
}

/// Accept RFC 3339 timestamps, the common `YYYY-MM-DD HH:MM:SS` shape, and
/// bare dates
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule(source: &str, target: &str, transform: Transform) -> FieldMapping {
        FieldMapping {
            source_field: source.to_string(),
            target_field: target.to_string(),
            transform,
        }
    }

    #[test]
    fn nested_parse_number_lands_alongside_original_fields() {
        let mapped = apply_mappings(
            &[rule("a.b", "x", Transform::ParseNumber)],
            &json!({"a": {"b": "42"}, "keep": true}),
        );
        assert_eq!(mapped["x"], json!(42.0));
        assert_eq!(mapped["keep"], json!(true));
        assert_eq!(mapped["a"]["b"], json!("42"));
    }

    #[test]
    fn unresolved_source_path_is_skipped() {
        let mapped = apply_mappings(
            &[rule("a.missing.deep", "x", Transform::None)],
            &json!({"a": {"b": 1}}),
        );
        assert!(mapped.get("x").is_none());
    }

    #[test]
    fn string_transforms_pass_non_strings_through() {
        assert_eq!(apply_transform(json!(7), Transform::Uppercase), json!(7));
        assert_eq!(apply_transform(json!(" x "), Transform::Trim), json!("x"));
        assert_eq!(apply_transform(json!("Ab"), Transform::Uppercase), json!("AB"));
        assert_eq!(apply_transform(json!("Ab"), Transform::Lowercase), json!("ab"));
    }

    #[test]
    fn parse_date_normalizes_to_rfc3339() {
        let out = apply_transform(json!("2026-03-15"), Transform::ParseDate);
        assert_eq!(out, json!("2026-03-15T00:00:00+00:00"));
        let out = apply_transform(json!("2026-03-15T08:30:00Z"), Transform::ParseDate);
        assert_eq!(out, json!("2026-03-15T08:30:00+00:00"));
        // Unparseable input is left alone.
        let out = apply_transform(json!("next tuesday"), Transform::ParseDate);
        assert_eq!(out, json!("next tuesday"));
    }

    #[test]
    fn parse_number_keeps_numbers_and_rejects_garbage() {
        assert_eq!(apply_transform(json!(3.5), Transform::ParseNumber), json!(3.5));
        assert_eq!(apply_transform(json!("3.5"), Transform::ParseNumber), json!(3.5));
        assert_eq!(apply_transform(json!("abc"), Transform::ParseNumber), json!("abc"));
    }

    #[test]
    fn target_field_overwrites_existing_value() {
        let mapped = apply_mappings(
            &[rule("src", "x", Transform::None)],
            &json!({"src": "new", "x": "old"}),
        );
        assert_eq!(mapped["x"], json!("new"));
    }
}
