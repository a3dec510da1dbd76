//! # sigil-issuer
//!
//! Issuer validation for multi-tenant applications on the Microsoft identity
//! platform.
//!
//! A multi-tenant application cannot pin a single issuer string: the tenant
//! id varies per signed-in user, and the issuing host has regional and
//! sovereign-cloud mirrors (`login.microsoftonline.com`, `sts.windows.net`,
//! ...). This crate provides:
//!
//! - [`InstanceMetadataClient`] / [`AliasCache`] - fetch and cache the
//!   well-known instance-discovery document listing clusters of equivalent
//!   authority hostnames
//! - [`AadIssuerValidator`] - validates a token's issuer against
//!   tenant-templated patterns (`https://host/{tenantid}/v2.0`) and the
//!   alias set of the configured authority
//! - [`IssuerValidatorRegistry`] - a bounded, TTL-refreshed cache of
//!   validators per authority, built for injection rather than static state
//!
//! ## Example
//!
//! ```ignore
//! use sigil_issuer::{IssuerValidationParameters, IssuerValidatorRegistry};
//!
//! let registry = IssuerValidatorRegistry::with_defaults();
//! let validator = registry
//!     .validator_for("https://login.microsoftonline.com/common/v2.0")
//!     .await?;
//!
//! let params = IssuerValidationParameters::new()
//!     .with_valid_issuer("https://login.microsoftonline.com/{tenantid}/v2.0");
//! let issuer = validator.validate(token_issuer, &claims, &params)?;
//! ```

mod metadata;
mod registry;
mod validator;

pub use metadata::{
    AliasCache, AliasCacheConfig, INSTANCE_DISCOVERY_ENDPOINT, InstanceDiscoveryDocument,
    InstanceMetadataClient, InstanceMetadataEntry, MetadataError,
};
pub use registry::{IssuerValidatorRegistry, RegistryConfig};
pub use validator::{AadIssuerValidator, IssuerError, IssuerValidationParameters};
