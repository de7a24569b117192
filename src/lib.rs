// src/lib.rs

//! Decode and verify JSON Web Tokens against a PEM public key, a shared
//! secret, or the JWKS of an OpenID Connect issuer.

pub mod algorithm;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod oidc;
pub mod validator;
pub mod verifier;

/// The public prelude for the `jwt-trust` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::algorithm::Algorithm;
    pub use crate::codec::{decode_token, Claims, DecodedToken, Header};
    pub use crate::config::{ResolverConfig, ResolverConfigBuilder};
    pub use crate::error::{ErrorKind, JwtTrustError};
    pub use crate::oidc::{HttpTransport, OidcKeyResolver};
    pub use crate::validator::{
        try_verify_with_oidc, try_verify_with_public_key, try_verify_with_resolver,
        try_verify_with_secret, verify_with_oidc, verify_with_public_key, verify_with_resolver,
        verify_with_secret, VerificationResult, VerifiedToken,
    };
}
