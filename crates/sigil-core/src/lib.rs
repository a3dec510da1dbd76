//! # sigil-core
//!
//! Shared claim types for the sigil identity helpers.
//!
//! The Microsoft identity platform issues tokens whose claim names differ
//! between the v1 and v2 endpoints (short names like `tid` versus long URI
//! forms). This crate provides a small [`Claims`] container plus the ordered
//! fallback resolution used by the token-cache key derivation and the issuer
//! validator, so both consult the same preference chains.

mod claims;

pub use claims::{Claims, names};
