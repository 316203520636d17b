//! Helpers shared by the application and API layers.
//!
//! - [`sorting`] - API sort expressions to safe `ORDER BY` clauses
//! - [`data_shaping`] - `fields` selection on serialized DTOs
//! - [`hateoas`] - Hypermedia link construction and media type negotiation
//! - [`client_ip`] - Client address extraction for rate limiting

pub mod client_ip;
pub mod data_shaping;
pub mod hateoas;
pub mod sorting;
