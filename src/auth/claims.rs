//! Token claims as issued by the identity provider.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The claims the API reads. Issuer, audience and expiry are checked by the
/// validator before these are looked at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RoleSet>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleSet>,
}

impl Claims {
    /// Realm roles merged with the roles granted to `client_id`.
    pub fn roles(&self, client_id: &str) -> BTreeSet<String> {
        let realm = self.realm_access.iter().flat_map(|r| r.roles.iter());
        let client = self
            .resource_access
            .get(client_id)
            .into_iter()
            .flat_map(|r| r.roles.iter());

        realm.chain(client).cloned().collect()
    }

    pub fn into_identity(self, client_id: &str) -> Identity {
        let roles = self.roles(client_id);
        let email = self
            .email
            .or(self.preferred_username)
            .unwrap_or_default();

        Identity {
            subject: self.sub,
            email,
            name: self.name,
            roles,
        }
    }
}

/// A verified caller, before it is mapped to an application user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
