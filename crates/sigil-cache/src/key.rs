//! Owner-key derivation for token-cache entries.
//!
//! Keys partition the backing store per principal. The derivation is
//! security-relevant: a wrong key serves one user's tokens to another, so the
//! claim preference chains below must not be reordered.

use sigil_core::Claims;

/// Suffix distinguishing an application (client-credential) cache entry from
/// user entries.
const APP_CACHE_SUFFIX: &str = "_AppTokenCache";

/// Derives the application cache key for `client_id`.
///
/// The caller guarantees a non-empty client id; [`crate::CacheSynchronizer`]
/// enforces that at construction time.
#[must_use]
pub fn app_cache_key(client_id: &str) -> String {
    format!("{client_id}{APP_CACHE_SUFFIX}")
}

/// Derives the cache key for a signed-in user from token claims.
///
/// Priority order:
///
/// 1. subject + tenant + user flow all present → `{sub}-{flow}.{tenant}`
///    (consumer/B2C guest pattern, one entry per user flow);
/// 2. object id + tenant present → `{oid}.{tenant}`;
/// 3. otherwise `None` — the caller must treat this as "no cache entry
///    available", not as an error.
///
/// Each component resolves through its v2/v1 claim-name fallback chain
/// (see [`sigil_core::Claims`]), because v1 and v2 platform tokens populate
/// different claim shapes.
#[must_use]
pub fn user_cache_key(claims: &Claims) -> Option<String> {
    let tenant_id = claims.tenant_id()?;

    if let (Some(name_id), Some(user_flow)) = (claims.name_identifier(), claims.user_flow()) {
        return Some(format!("{name_id}-{user_flow}.{tenant_id}"));
    }

    claims
        .object_id()
        .map(|object_id| format!("{object_id}.{tenant_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::names;

    fn aad_claims() -> Claims {
        Claims::new()
            .with(names::OID, "8f2cbc1f-2d6b-4057-8e34-d93b951e4f2e")
            .with(names::TID, "9188040d-6c67-4c5b-b112-36a304b66dad")
    }

    #[test]
    fn test_app_cache_key() {
        assert_eq!(
            app_cache_key("4a1aa1d5-c567-49d0-ad0b-cd957a47f842"),
            "4a1aa1d5-c567-49d0-ad0b-cd957a47f842_AppTokenCache"
        );
    }

    #[test]
    fn test_user_key_object_id_and_tenant() {
        assert_eq!(
            user_cache_key(&aad_claims()).as_deref(),
            Some("8f2cbc1f-2d6b-4057-8e34-d93b951e4f2e.9188040d-6c67-4c5b-b112-36a304b66dad")
        );
    }

    #[test]
    fn test_user_key_is_deterministic() {
        let first = user_cache_key(&aad_claims());
        let second = user_cache_key(&aad_claims());
        assert_eq!(first, second);
    }

    #[test]
    fn test_user_key_b2c_flow_takes_priority() {
        let claims = aad_claims()
            .with(names::SUB, "subject-1")
            .with(names::TFP, "b2c_1_susi");
        assert_eq!(
            user_cache_key(&claims).as_deref(),
            Some("subject-1-b2c_1_susi.9188040d-6c67-4c5b-b112-36a304b66dad")
        );
    }

    #[test]
    fn test_user_key_flow_without_subject_falls_back_to_object_id() {
        let claims = aad_claims().with(names::TFP, "b2c_1_susi");
        assert_eq!(
            user_cache_key(&claims).as_deref(),
            Some("8f2cbc1f-2d6b-4057-8e34-d93b951e4f2e.9188040d-6c67-4c5b-b112-36a304b66dad")
        );
    }

    #[test]
    fn test_user_key_v1_claim_forms() {
        let claims = Claims::new()
            .with(names::OBJECT_IDENTIFIER, "object-1")
            .with(names::TENANT_ID, "tenant-1");
        assert_eq!(user_cache_key(&claims).as_deref(), Some("object-1.tenant-1"));
    }

    #[test]
    fn test_user_key_missing_tenant_is_none() {
        let claims = Claims::new().with(names::OID, "object-1");
        assert_eq!(user_cache_key(&claims), None);
    }

    #[test]
    fn test_user_key_missing_object_id_is_none() {
        let claims = Claims::new().with(names::TID, "tenant-1");
        assert_eq!(user_cache_key(&claims), None);
    }

    #[test]
    fn test_user_key_empty_claims_is_none() {
        assert_eq!(user_cache_key(&Claims::new()), None);
    }
}
