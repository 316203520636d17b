//! Query-string helpers shared by the listing services.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::utils::data_shaping::{self, Shapeable};
use crate::utils::hateoas::LinkDto;
use crate::utils::sorting::{self, SortMapping};

/// Validates `fields` against `T`, as a 400 on failure.
pub fn check_fields<T: Shapeable>(fields: Option<&str>) -> Result<(), AppError> {
    data_shaping::validate_fields::<T>(fields)
        .map_err(|e| AppError::bad_request(e.to_string(), json!({ "fields": e.0 })))
}

/// Resolves `sort` into an `ORDER BY` body, as a 400 on failure.
pub fn order_by(
    sort: Option<&str>,
    mappings: &[SortMapping],
    default: &str,
) -> Result<String, AppError> {
    sorting::to_order_by(sort, mappings, default)
        .map_err(|e| AppError::bad_request(e.to_string(), json!({ "sort": sort })))
}

/// Shapes a DTO and, when requested, appends its links.
pub fn shape_item<T: Serialize>(
    item: &T,
    fields: Option<&str>,
    links: Option<Vec<LinkDto>>,
) -> Result<Value, AppError> {
    let shaped = data_shaping::shape(item, fields).map_err(serialization_error)?;
    match links {
        Some(links) => data_shaping::with_links(shaped, &links).map_err(serialization_error),
        None => Ok(shaped),
    }
}

pub fn serialization_error(e: serde_json::Error) -> AppError {
    tracing::error!(error = %e, "Failed to serialize response");
    AppError::internal("Failed to serialize response", json!({}))
}

/// Canonical form of `fields` for cache keys.
pub fn fields_key(fields: Option<&str>) -> String {
    fields.unwrap_or_default().trim().to_lowercase()
}

/// Trims a free-text filter; blank becomes `None`.
pub fn normalize_search(q: Option<&str>) -> Option<String> {
    q.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
}

/// Parses an integer-coded enum from a query parameter.
pub fn parse_code<T: TryFrom<i32, Error = String>>(
    name: &str,
    code: Option<i32>,
) -> Result<Option<T>, AppError> {
    code.map(T::try_from)
        .transpose()
        .map_err(|e| AppError::bad_request(format!("Invalid {name} filter"), json!({ name: e })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::HabitType;

    #[test]
    fn test_normalize_search() {
        assert_eq!(normalize_search(Some("  Morning RUN ")), Some("morning run".to_string()));
        assert_eq!(normalize_search(Some("   ")), None);
        assert_eq!(normalize_search(None), None);
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(
            parse_code::<HabitType>("type", Some(1)).unwrap(),
            Some(HabitType::Binary)
        );
        assert_eq!(parse_code::<HabitType>("type", None).unwrap(), None);
        assert!(parse_code::<HabitType>("type", Some(42)).is_err());
    }

    #[test]
    fn test_fields_key() {
        assert_eq!(fields_key(Some(" Id,Name ")), "id,name");
        assert_eq!(fields_key(None), "");
    }
}
