//! Field selection for API responses.
//!
//! `?fields=id,name` trims a serialized DTO to the requested top-level
//! properties. Matching is case-insensitive.

use serde::Serialize;
use serde_json::{Map, Value};

/// A DTO whose properties may be selected with `fields`.
pub trait Shapeable: Serialize {
    /// JSON property names clients may request.
    const FIELDS: &'static [&'static str];
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("The provided data shaping fields aren't valid: {}", .0.join(", "))]
pub struct ShapingError(pub Vec<String>);

fn requested(fields: Option<&str>) -> Vec<String> {
    fields
        .unwrap_or_default()
        .split(',')
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Rejects any requested field that `T` does not expose.
pub fn validate_fields<T: Shapeable>(fields: Option<&str>) -> Result<(), ShapingError> {
    let unknown: Vec<String> = requested(fields)
        .into_iter()
        .filter(|f| !T::FIELDS.iter().any(|known| known.eq_ignore_ascii_case(f)))
        .collect();

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ShapingError(unknown))
    }
}

/// Serializes `value` keeping only the requested properties.
///
/// With no `fields` every property is kept. Non-object values pass through.
pub fn shape<T: Serialize>(value: &T, fields: Option<&str>) -> Result<Value, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    let wanted = requested(fields);
    if wanted.is_empty() {
        return Ok(value);
    }

    Ok(match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| wanted.contains(&key.to_lowercase()))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    })
}

/// Adds a `links` property to a shaped object.
pub fn with_links<L: Serialize>(mut shaped: Value, links: &L) -> Result<Value, serde_json::Error> {
    if let Value::Object(map) = &mut shaped {
        map.insert("links".to_string(), serde_json::to_value(links)?);
    }
    Ok(shaped)
}
