//! Role checks over a resolved identity.
//!
//! Realm roles come from `realm_access.roles`, client roles from
//! `resource_access.<client>.roles`.

use serde_json::Value;

use keygate_core::Identity;

/// Authorization view of an authenticated identity.
#[derive(Debug, Clone)]
pub struct Guard {
    identity: Identity,
    client_id: String,
}

fn role_list<'a>(access: Option<&'a Value>) -> impl Iterator<Item = &'a str> {
    access
        .and_then(|a| a.get("roles"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

impl Guard {
    /// Build a guard for `identity`; `client_id` is the default client for
    /// [`Guard::has_role`].
    #[must_use]
    pub fn new(identity: Identity, client_id: impl Into<String>) -> Self {
        Self {
            identity,
            client_id: client_id.into(),
        }
    }

    /// The identity being guarded.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Realm-level roles.
    pub fn realm_roles(&self) -> impl Iterator<Item = &str> {
        role_list(self.identity.claim("realm_access"))
    }

    /// Roles granted by `client`.
    pub fn client_roles<'a>(&'a self, client: &str) -> impl Iterator<Item = &'a str> {
        role_list(
            self.identity
                .claim("resource_access")
                .and_then(|r| r.get(client)),
        )
    }

    /// Whether the identity holds realm role `role`.
    #[must_use]
    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_roles().any(|r| r == role)
    }

    /// Whether the identity holds `role` on `client`.
    #[must_use]
    pub fn has_client_role(&self, client: &str, role: &str) -> bool {
        self.client_roles(client).any(|r| r == role)
    }

    /// Whether the identity holds `role` on the configured client.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.has_client_role(&self.client_id, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guard() -> Guard {
        let claims = json!({
            "sub": "u-1",
            "realm_access": {"roles": ["offline_access", "admin"]},
            "resource_access": {
                "web": {"roles": ["editor"]},
                "billing": {"roles": ["viewer"]}
            }
        });
        let Value::Object(map) = claims else {
            unreachable!()
        };
        Guard::new(Identity::from_claims(map).unwrap(), "web")
    }

    #[test]
    fn realm_roles() {
        let guard = guard();
        assert!(guard.has_realm_role("admin"));
        assert!(!guard.has_realm_role("editor"));
        assert_eq!(guard.realm_roles().count(), 2);
    }

    #[test]
    fn client_roles() {
        let guard = guard();
        assert!(guard.has_role("editor"));
        assert!(guard.has_client_role("billing", "viewer"));
        assert!(!guard.has_client_role("billing", "editor"));
        assert!(!guard.has_client_role("unknown", "viewer"));
    }

    #[test]
    fn identity_without_access_claims_has_no_roles() {
        let guard = Guard::new(Identity::new("u", serde_json::Map::new()), "web");
        assert!(!guard.has_realm_role("admin"));
        assert!(!guard.has_role("editor"));
    }
}
