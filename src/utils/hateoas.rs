//! Hypermedia links embedded in API responses.
//!
//! Clients opt in through the `Accept` header by asking for one of the vendor
//! media types in [`HATEOAS_MEDIA_TYPES`]; responses then carry a `links`
//! array next to each resource and each collection.

use serde::{Deserialize, Serialize};

pub const HATEOAS_MEDIA_TYPE: &str = "application/vnd.dev-habit.hateoas+json";
pub const HATEOAS_V1_MEDIA_TYPE: &str = "application/vnd.dev-habit.hateoas.v1+json";
pub const HATEOAS_V2_MEDIA_TYPE: &str = "application/vnd.dev-habit.hateoas.v2+json";

pub const HATEOAS_MEDIA_TYPES: &[&str] = &[
    HATEOAS_MEDIA_TYPE,
    HATEOAS_V1_MEDIA_TYPE,
    HATEOAS_V2_MEDIA_TYPE,
];

pub mod rel {
    pub const SELF: &str = "self";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const NEXT_PAGE: &str = "next-page";
    pub const PREVIOUS_PAGE: &str = "previous-page";
    pub const UPSERT_TAGS: &str = "upsert-tags";
    pub const ARCHIVE: &str = "archive";
    pub const UN_ARCHIVE: &str = "un-archive";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDto {
    pub href: String,
    pub rel: String,
    pub method: String,
}

/// Whether an `Accept` header value asks for a hypermedia representation.
///
/// Media ranges are compared case-insensitively; parameters such as `q=0.9`
/// are ignored.
pub fn wants_hateoas(accept: &str) -> bool {
    accept
        .split(',')
        .filter_map(|range| range.split(';').next())
        .map(str::trim)
        .any(|media| {
            HATEOAS_MEDIA_TYPES
                .iter()
                .any(|known| known.eq_ignore_ascii_case(media))
        })
}

/// Produces absolute links rooted at the public base URL.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds a link to `path`, appending the query pairs that have a value.
    pub fn link(
        &self,
        path: &str,
        query: &[(&str, Option<String>)],
        rel: &str,
        method: &str,
    ) -> LinkDto {
        let mut href = format!("{}{}", self.base_url, path);

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        for (name, value) in query {
            if let Some(value) = value {
                serializer.append_pair(name, value);
                has_query = true;
            }
        }
        if has_query {
            href.push('?');
            href.push_str(&serializer.finish());
        }

        LinkDto {
            href,
            rel: rel.to_string(),
            method: method.to_string(),
        }
    }

    pub fn simple(&self, path: &str, rel: &str, method: &str) -> LinkDto {
        self.link(path, &[], rel, method)
    }
}
