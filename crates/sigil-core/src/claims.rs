//! Claim container and fallback-chain resolution.
//!
//! Tokens from the v1 endpoint carry long URI-form claim names while v2
//! tokens use the short JWT names. Every resolver here is an ordered
//! preference list: candidate names are checked in priority order and the
//! first non-empty value wins.

use serde::{Deserialize, Serialize};

/// Well-known claim names for the Microsoft identity platform.
pub mod names {
    /// Object id of the signed-in principal (v2 tokens).
    pub const OID: &str = "oid";
    /// Object id, URI form (v1 tokens).
    pub const OBJECT_IDENTIFIER: &str =
        "http://schemas.microsoft.com/identity/claims/objectidentifier";
    /// Tenant id (v2 tokens).
    pub const TID: &str = "tid";
    /// Tenant id, URI form (v1 tokens).
    pub const TENANT_ID: &str = "http://schemas.microsoft.com/identity/claims/tenantid";
    /// Subject identifier.
    pub const SUB: &str = "sub";
    /// Subject identifier, URI form.
    pub const NAME_IDENTIFIER: &str =
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
    /// Trust framework policy (B2C user flow).
    pub const TFP: &str = "tfp";
    /// Authentication context class reference; older B2C tokens carry the
    /// user flow here instead of `tfp`.
    pub const ACR: &str = "acr";
    /// Token issuer.
    pub const ISS: &str = "iss";
}

/// An ordered collection of claims extracted from a validated token.
///
/// Lookup is exact-match on the claim name; a claim with an empty value is
/// treated as absent. Multiple claims may share a name, in which case the
/// first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    entries: Vec<(String, String)>,
}

impl Claims {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a claim.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Appends a claim, builder-style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Builds a claim set from the string-valued members of a JSON claim map.
    ///
    /// Non-string values (arrays, nested objects, numbers) are skipped; the
    /// claims consulted here are all plain strings in practice.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut claims = Self::new();
        if let Some(map) = value.as_object() {
            for (name, value) in map {
                if let Some(s) = value.as_str() {
                    claims.insert(name, s);
                }
            }
        }
        claims
    }

    /// Returns the first non-empty value for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, v)| n == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// Evaluates candidate claim names in priority order and returns the
    /// first non-empty match.
    #[must_use]
    pub fn first_non_empty(&self, candidates: &[&str]) -> Option<&str> {
        candidates.iter().find_map(|name| self.get(name))
    }

    /// Object id of the principal: `oid`, falling back to the URI form.
    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.first_non_empty(&[names::OID, names::OBJECT_IDENTIFIER])
    }

    /// Tenant id: `tid`, falling back to the URI form.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.first_non_empty(&[names::TID, names::TENANT_ID])
    }

    /// Subject identifier: `sub`, falling back to the URI form.
    #[must_use]
    pub fn name_identifier(&self) -> Option<&str> {
        self.first_non_empty(&[names::SUB, names::NAME_IDENTIFIER])
    }

    /// B2C user flow: `tfp`, falling back to `acr`.
    #[must_use]
    pub fn user_flow(&self) -> Option<&str> {
        self.first_non_empty(&[names::TFP, names::ACR])
    }

    /// Token issuer claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.get(names::ISS)
    }

    /// Returns the number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no claims are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Claims {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_skips_empty_values() {
        let claims = Claims::new().with(names::TID, "").with(names::TID, "tenant-1");
        assert_eq!(claims.get(names::TID), Some("tenant-1"));
    }

    #[test]
    fn test_get_missing() {
        let claims = Claims::new();
        assert_eq!(claims.get(names::TID), None);
    }

    #[test]
    fn test_short_name_preferred_over_uri_form() {
        let claims = Claims::new()
            .with(names::TENANT_ID, "v1-tenant")
            .with(names::TID, "v2-tenant");
        assert_eq!(claims.tenant_id(), Some("v2-tenant"));
    }

    #[test]
    fn test_uri_form_fallback() {
        let claims = Claims::new()
            .with(names::OBJECT_IDENTIFIER, "v1-object")
            .with(names::TENANT_ID, "v1-tenant")
            .with(names::NAME_IDENTIFIER, "v1-subject");
        assert_eq!(claims.object_id(), Some("v1-object"));
        assert_eq!(claims.tenant_id(), Some("v1-tenant"));
        assert_eq!(claims.name_identifier(), Some("v1-subject"));
    }

    #[test]
    fn test_user_flow_tfp_then_acr() {
        let claims = Claims::new().with(names::ACR, "b2c_1_signin");
        assert_eq!(claims.user_flow(), Some("b2c_1_signin"));

        let claims = Claims::new()
            .with(names::TFP, "b2c_1_susi")
            .with(names::ACR, "b2c_1_signin");
        assert_eq!(claims.user_flow(), Some("b2c_1_susi"));
    }

    #[test]
    fn test_from_json_keeps_strings_only() {
        let json = serde_json::json!({
            "tid": "tenant-1",
            "oid": "object-1",
            "amr": ["pwd"],
            "iat": 1700000000,
        });
        let claims = Claims::from_json(&json);
        assert_eq!(claims.tenant_id(), Some("tenant-1"));
        assert_eq!(claims.object_id(), Some("object-1"));
        assert_eq!(claims.get("amr"), None);
        assert_eq!(claims.get("iat"), None);
    }

    #[test]
    fn test_from_iterator() {
        let claims: Claims = [(names::TID, "t"), (names::OID, "o")].into_iter().collect();
        assert_eq!(claims.len(), 2);
        assert!(!claims.is_empty());
    }
}
