//! Bearer token verification.
//!
//! Tokens are issued by an external OpenID Connect provider. This module
//! verifies their signature and registered claims and exposes the caller's
//! identity and roles; mapping that identity to an application user happens
//! in [`crate::application::services::UserService`].

pub mod claims;
pub mod jwt;

pub use claims::{Claims, Identity, RoleSet};
pub use jwt::{JwtError, JwtValidator};

/// Role every API caller must hold.
pub const MEMBER_ROLE: &str = "member";
