//! Tenant-templated issuer validation.

use std::collections::HashSet;

use sigil_core::Claims;
use url::Url;

use crate::metadata::MetadataError;

/// The placeholder substituted with the token's tenant id in issuer
/// templates, matched case-insensitively.
const TENANT_PLACEHOLDER: &str = "{tenantid}";

/// Errors produced by issuer validation.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    /// A required argument was empty or unusable. Caller's bug; fail fast.
    #[error("Invalid argument: {name} must not be empty")]
    InvalidArgument {
        /// Name of the offending argument.
        name: &'static str,
    },

    /// The issuer did not match any accepted template, or no tenant id could
    /// be determined for the token.
    #[error("Issuer '{issuer}' is not valid for this application")]
    InvalidIssuer {
        /// The rejected issuer.
        issuer: String,
    },

    /// The instance-metadata document could not be obtained.
    #[error("Instance metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl IssuerError {
    /// Returns `true` if this is an issuer rejection (as opposed to an
    /// argument or infrastructure failure).
    #[must_use]
    pub fn is_invalid_issuer(&self) -> bool {
        matches!(self, Self::InvalidIssuer { .. })
    }
}

/// The issuer templates a token may match.
///
/// Templates contain the literal `{tenantid}` placeholder, e.g.
/// `https://login.microsoftonline.com/{tenantid}/v2.0`. Templates without the
/// placeholder pin a single tenant.
#[derive(Debug, Clone, Default)]
pub struct IssuerValidationParameters {
    /// The explicit single-issuer template, checked first.
    pub valid_issuer: Option<String>,

    /// Additional issuer templates.
    pub valid_issuers: Vec<String>,
}

impl IssuerValidationParameters {
    /// Creates empty parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the explicit single-issuer template.
    #[must_use]
    pub fn with_valid_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.valid_issuer = Some(issuer.into());
        self
    }

    /// Sets the issuer template list.
    #[must_use]
    pub fn with_valid_issuers(mut self, issuers: impl IntoIterator<Item = String>) -> Self {
        self.valid_issuers = issuers.into_iter().collect();
        self
    }

    /// Iterates all non-empty templates in match order.
    fn templates(&self) -> impl Iterator<Item = &str> {
        self.valid_issuer
            .iter()
            .chain(self.valid_issuers.iter())
            .map(String::as_str)
            .filter(|t| !t.trim().is_empty())
    }
}

/// Validates token issuers against the alias set of one authority.
///
/// Instances are bound to an immutable alias set; obtain them from
/// [`crate::IssuerValidatorRegistry`], which caches one per authority.
#[derive(Debug, Clone)]
pub struct AadIssuerValidator {
    alias_set: HashSet<String>,
}

impl AadIssuerValidator {
    /// Creates a validator over the given alias hostnames. Hostnames are
    /// compared case-insensitively.
    #[must_use]
    pub fn new(aliases: impl IntoIterator<Item = String>) -> Self {
        Self {
            alias_set: aliases.into_iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    /// Returns the alias set this validator accepts.
    #[must_use]
    pub fn alias_set(&self) -> &HashSet<String> {
        &self.alias_set
    }

    /// Validates `actual_issuer` against the templates in `params`.
    ///
    /// The tenant id is taken from the token's tenant claim; tokens without
    /// one (some B2C policy tokens) fall back to the first path segment of
    /// the token's own issuer claim (`{domain}/{tenantId}/v2.0`).
    ///
    /// A template accepts the issuer when, after tenant substitution, both
    /// the template's and the issuer's hostnames are in the alias set and
    /// both paths are the tenant id alone or `{tenantId}/v2.0`. Malformed
    /// templates and a malformed issuer are non-matches, not hard failures.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::InvalidArgument` for an empty `actual_issuer`,
    /// and `IssuerError::InvalidIssuer` when no tenant id can be determined
    /// or no template matches.
    pub fn validate(
        &self,
        actual_issuer: &str,
        claims: &Claims,
        params: &IssuerValidationParameters,
    ) -> Result<String, IssuerError> {
        if actual_issuer.trim().is_empty() {
            return Err(IssuerError::InvalidArgument {
                name: "actual_issuer",
            });
        }

        let Some(tenant_id) = tenant_id_for(claims, actual_issuer) else {
            tracing::debug!(issuer = %actual_issuer, "no tenant id in token claims or issuer path");
            return Err(IssuerError::InvalidIssuer {
                issuer: actual_issuer.to_string(),
            });
        };

        if let Ok(actual) = Url::parse(actual_issuer)
            && self.issuer_in_alias_set(&actual, &tenant_id)
        {
            for template in params.templates() {
                let substituted = substitute_tenant(template, &tenant_id);
                let Ok(template_url) = Url::parse(&substituted) else {
                    tracing::trace!(template = %template, "skipping malformed issuer template");
                    continue;
                };

                if self.issuer_in_alias_set(&template_url, &tenant_id) {
                    return Ok(actual_issuer.to_string());
                }
            }
        }

        tracing::debug!(issuer = %actual_issuer, "issuer did not match any accepted template");
        Err(IssuerError::InvalidIssuer {
            issuer: actual_issuer.to_string(),
        })
    }

    /// Returns `true` if the URL's host is an accepted alias and its path is
    /// the tenant id alone or `{tenantId}/v2.0`.
    fn issuer_in_alias_set(&self, url: &Url, tenant_id: &str) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if !self.alias_set.contains(&host.to_lowercase()) {
            return false;
        }

        let path = url.path().trim_matches('/');
        path == tenant_id || path == format!("{tenant_id}/v2.0")
    }
}

/// Resolves the tenant id for a token: the explicit tenant claim, falling
/// back to the first path segment of the token's issuer.
fn tenant_id_for(claims: &Claims, actual_issuer: &str) -> Option<String> {
    if let Some(tenant_id) = claims.tenant_id() {
        return Some(tenant_id.to_string());
    }

    let issuer = claims.issuer().unwrap_or(actual_issuer);
    let url = Url::parse(issuer).ok()?;
    url.path_segments()?
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Replaces every case-insensitive occurrence of the tenant placeholder.
fn substitute_tenant(template: &str, tenant_id: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(idx) = find_ignore_ascii_case(rest, TENANT_PLACEHOLDER) {
        out.push_str(&rest[..idx]);
        out.push_str(tenant_id);
        rest = &rest[idx + TENANT_PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

/// Byte-wise ASCII case-insensitive substring search. The needle is ASCII, so
/// any match index falls on a UTF-8 character boundary.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::names;

    const TENANT: &str = "9188040d-6c67-4c5b-b112-36a304b66dad";
    const B2C_TENANT: &str = "775527ff-9a37-4307-8b3d-cc311f58d925";

    fn aad_validator() -> AadIssuerValidator {
        AadIssuerValidator::new([
            "login.microsoftonline.com".to_string(),
            "sts.windows.net".to_string(),
        ])
    }

    fn v2_params() -> IssuerValidationParameters {
        IssuerValidationParameters::new().with_valid_issuers([
            "https://login.microsoftonline.com/{tenantid}/v2.0".to_string(),
        ])
    }

    #[test]
    fn test_valid_v2_issuer_passes() {
        let issuer = format!("https://login.microsoftonline.com/{TENANT}/v2.0");
        let claims = Claims::new().with(names::TID, TENANT).with(names::ISS, &issuer);

        let validated = aad_validator()
            .validate(&issuer, &claims, &v2_params())
            .unwrap();
        assert_eq!(validated, issuer);
    }

    #[test]
    fn test_aliased_host_passes() {
        let issuer = format!("https://sts.windows.net/{TENANT}/");
        let claims = Claims::new().with(names::TID, TENANT).with(names::ISS, &issuer);
        let params = IssuerValidationParameters::new()
            .with_valid_issuer("https://sts.windows.net/{tenantid}/");

        assert!(aad_validator().validate(&issuer, &claims, &params).is_ok());
    }

    #[test]
    fn test_unknown_host_fails() {
        let issuer = format!("https://badissuer/{TENANT}/v2.0");
        let claims = Claims::new().with(names::TID, TENANT).with(names::ISS, &issuer);

        let err = aad_validator()
            .validate(&issuer, &claims, &v2_params())
            .unwrap_err();
        assert!(err.is_invalid_issuer());
    }

    #[test]
    fn test_tenant_claim_mismatching_issuer_path_fails() {
        let issuer = format!("https://login.microsoftonline.com/{TENANT}/v2.0");
        let claims = Claims::new()
            .with(names::TID, "a7854d33-3b16-4e3c-9f0f-8baf573fbb0e")
            .with(names::ISS, &issuer);

        let err = aad_validator()
            .validate(&issuer, &claims, &v2_params())
            .unwrap_err();
        assert!(err.is_invalid_issuer());
    }

    #[test]
    fn test_b2c_tenant_derived_from_issuer_path() {
        // B2C policy tokens carry no tid; the tenant comes from the issuer
        // path, and the custom domain enters the alias set by self-inclusion.
        let issuer = format!("https://fabrikamb2c.b2clogin.com/{B2C_TENANT}/v2.0/");
        let claims = Claims::new()
            .with(names::TFP, "b2c_1_susi")
            .with(names::ISS, &issuer);
        let validator = AadIssuerValidator::new(["fabrikamb2c.b2clogin.com".to_string()]);
        let params = IssuerValidationParameters::new().with_valid_issuers([
            "https://fabrikamb2c.b2clogin.com/{tenantid}/v2.0".to_string(),
        ]);

        assert!(validator.validate(&issuer, &claims, &params).is_ok());
    }

    #[test]
    fn test_no_tenant_anywhere_fails() {
        let issuer = "https://login.microsoftonline.com/";
        let claims = Claims::new().with(names::ISS, issuer);

        let err = aad_validator()
            .validate(issuer, &claims, &v2_params())
            .unwrap_err();
        assert!(err.is_invalid_issuer());
    }

    #[test]
    fn test_empty_actual_issuer_is_argument_error() {
        let claims = Claims::new().with(names::TID, TENANT);
        let err = aad_validator()
            .validate("  ", &claims, &v2_params())
            .unwrap_err();
        assert!(matches!(err, IssuerError::InvalidArgument { .. }));
    }

    #[test]
    fn test_no_templates_fails() {
        let issuer = format!("https://login.microsoftonline.com/{TENANT}/v2.0");
        let claims = Claims::new().with(names::TID, TENANT).with(names::ISS, &issuer);

        let err = aad_validator()
            .validate(&issuer, &claims, &IssuerValidationParameters::new())
            .unwrap_err();
        assert!(err.is_invalid_issuer());
    }

    #[test]
    fn test_malformed_template_is_skipped() {
        let issuer = format!("https://login.microsoftonline.com/{TENANT}/v2.0");
        let claims = Claims::new().with(names::TID, TENANT).with(names::ISS, &issuer);
        let params = IssuerValidationParameters::new().with_valid_issuers([
            "::not a url::".to_string(),
            "https://login.microsoftonline.com/{tenantid}/v2.0".to_string(),
        ]);

        assert!(aad_validator().validate(&issuer, &claims, &params).is_ok());
    }

    #[test]
    fn test_malformed_actual_issuer_fails() {
        let claims = Claims::new().with(names::TID, TENANT);
        let err = aad_validator()
            .validate("not a url", &claims, &v2_params())
            .unwrap_err();
        assert!(err.is_invalid_issuer());
    }

    #[test]
    fn test_placeholder_is_case_insensitive() {
        let issuer = format!("https://login.microsoftonline.com/{TENANT}/v2.0");
        let claims = Claims::new().with(names::TID, TENANT).with(names::ISS, &issuer);
        let params = IssuerValidationParameters::new().with_valid_issuers([
            "https://login.microsoftonline.com/{TenantID}/v2.0".to_string(),
        ]);

        assert!(aad_validator().validate(&issuer, &claims, &params).is_ok());
    }

    #[test]
    fn test_v1_issuer_without_version_segment_passes() {
        let issuer = format!("https://sts.windows.net/{TENANT}/");
        let claims = Claims::new()
            .with(names::TENANT_ID, TENANT)
            .with(names::ISS, &issuer);
        let params = IssuerValidationParameters::new()
            .with_valid_issuer("https://sts.windows.net/{tenantid}/");

        assert!(aad_validator().validate(&issuer, &claims, &params).is_ok());
    }

    #[test]
    fn test_substitute_tenant_replaces_all_occurrences() {
        assert_eq!(
            substitute_tenant("https://h/{tenantid}/x/{TENANTID}", "t1"),
            "https://h/t1/x/t1"
        );
        assert_eq!(substitute_tenant("no placeholder", "t1"), "no placeholder");
    }
}
