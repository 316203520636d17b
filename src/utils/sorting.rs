//! Translation of API sort expressions into SQL `ORDER BY` clauses.
//!
//! Clients sort with `sort=name desc,createdAtUtc`. Field names are the API's
//! camelCase property names; each resource declares a table of
//! [`SortMapping`]s and only those columns can reach SQL.

/// Errors produced while parsing a sort expression.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SortError {
    #[error("The provided sort parameter isn't valid: unknown field '{0}'")]
    UnknownField(String),

    #[error("The provided sort parameter isn't valid: unknown direction '{0}'")]
    InvalidDirection(String),
}

/// Maps an API property to a database column.
#[derive(Debug, Clone, Copy)]
pub struct SortMapping {
    pub api_name: &'static str,
    pub db_column: &'static str,
}

impl SortMapping {
    pub const fn new(api_name: &'static str, db_column: &'static str) -> Self {
        Self {
            api_name,
            db_column,
        }
    }
}

fn parse<'m>(
    sort: &str,
    mappings: &'m [SortMapping],
) -> Result<Vec<(&'m SortMapping, bool)>, SortError> {
    let mut terms = Vec::new();

    for term in sort.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let mut parts = term.split_whitespace();
        let field = parts.next().unwrap_or_default();

        let descending = match parts.next() {
            None => false,
            Some(d) if d.eq_ignore_ascii_case("asc") => false,
            Some(d) if d.eq_ignore_ascii_case("desc") => true,
            Some(d) => return Err(SortError::InvalidDirection(d.to_string())),
        };
        if let Some(extra) = parts.next() {
            return Err(SortError::InvalidDirection(extra.to_string()));
        }

        let mapping = mappings
            .iter()
            .find(|m| m.api_name.eq_ignore_ascii_case(field))
            .ok_or_else(|| SortError::UnknownField(field.to_string()))?;

        terms.push((mapping, descending));
    }

    Ok(terms)
}

/// Checks that every field in `sort` is mapped.
pub fn validate(sort: Option<&str>, mappings: &[SortMapping]) -> Result<(), SortError> {
    match sort {
        Some(sort) => parse(sort, mappings).map(|_| ()),
        None => Ok(()),
    }
}

/// Builds the body of an `ORDER BY` clause.
///
/// An empty or missing `sort` falls back to `default`. The row id is always
/// appended as a tiebreak so paging is stable.
pub fn to_order_by(
    sort: Option<&str>,
    mappings: &[SortMapping],
    default: &str,
) -> Result<String, SortError> {
    let mut terms = parse(sort.unwrap_or_default(), mappings)?;
    if terms.is_empty() {
        terms = parse(default, mappings)?;
    }

    let mut clause: Vec<String> = terms
        .into_iter()
        .map(|(m, desc)| format!("{} {}", m.db_column, if desc { "DESC" } else { "ASC" }))
        .collect();
    clause.push("id ASC".to_string());

    Ok(clause.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPINGS: &[SortMapping] = &[
        SortMapping::new("name", "name"),
        SortMapping::new("createdAtUtc", "created_at_utc"),
        SortMapping::new("frequency.type", "frequency_type"),
    ];

    #[test]
    fn test_empty_sort_uses_default() {
        let clause = to_order_by(None, MAPPINGS, "createdAtUtc desc").unwrap();
        assert_eq!(clause, "created_at_utc DESC, id ASC");

        let clause = to_order_by(Some("  "), MAPPINGS, "name").unwrap();
        assert_eq!(clause, "name ASC, id ASC");
    }

    #[test]
    fn test_multiple_fields_case_insensitive() {
        let clause = to_order_by(Some("NAME desc, Frequency.Type"), MAPPINGS, "name").unwrap();
        assert_eq!(clause, "name DESC, frequency_type ASC, id ASC");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert_eq!(
            validate(Some("name,password"), MAPPINGS),
            Err(SortError::UnknownField("password".to_string()))
        );
        assert!(to_order_by(Some("name; DROP TABLE habits"), MAPPINGS, "name").is_err());
    }

    #[test]
    fn test_bad_direction_is_rejected() {
        assert_eq!(
            validate(Some("name sideways"), MAPPINGS),
            Err(SortError::InvalidDirection("sideways".to_string()))
        );
    }

    #[test]
    fn test_missing_sort_is_valid() {
        assert!(validate(None, MAPPINGS).is_ok());
    }
}
