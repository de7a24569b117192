// src/oidc/model.rs

use serde::{Deserialize, Serialize};

/// The subset of an OIDC provider's discovery document this crate reads.
/// Found at the `.well-known/openid-configuration` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OidcConfiguration {
    pub issuer: String,
    pub jwks_uri: String,
}

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
///
/// Every member is optional at this level so that one odd entry does not make
/// the whole set unreadable; required members are checked when the key is
/// converted (see [`crate::keys::load_from_jwk`]).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Jwk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_purpose: Option<String>,
    // RSA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    // EC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    // oct
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Returns the first key whose `kid` equals `kid` exactly.
    ///
    /// There is no fallback to another key when nothing matches.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| jwk.kid.as_deref() == Some(kid))
    }
}
