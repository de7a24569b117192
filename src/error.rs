// src/error.rs

use serde::Serialize;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, JwtTrustError>;

/// Which part of a compact token an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Header,
    Payload,
    Signature,
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Segment::Header => "header",
            Segment::Payload => "payload",
            Segment::Signature => "signature",
        })
    }
}

/// The primary error type for the `jwt-trust` library.
///
/// Every failure is scoped to a single verification call. The orchestrator in
/// [`crate::validator`] converts these into a non-throwing
/// [`VerificationResult`](crate::validator::VerificationResult).
#[derive(Debug, Error)]
pub enum JwtTrustError {
    /// The token does not split into exactly three non-empty segments.
    #[error("Malformed token: expected three non-empty 'header.payload.signature' segments")]
    MalformedToken,

    /// A segment is not valid Base64URL text.
    #[error("Malformed token: the {segment} segment is not valid Base64URL")]
    MalformedEncoding { segment: Segment },

    /// A decoded header or payload is not a JSON object.
    #[error("Malformed token: the {segment} is not a JSON object ({reason})")]
    MalformedJson { segment: Segment, reason: String },

    /// A PEM or JWK could not be turned into a key.
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// The algorithm and the key family (or curve) disagree.
    #[error("Algorithm {algorithm} cannot be used with a {key_type} key")]
    AlgorithmKeyMismatch { algorithm: String, key_type: String },

    /// The token header declares a different algorithm than the one verification is pinned to.
    #[error("The token declares algorithm {declared} but verification is pinned to {expected}")]
    AlgorithmNotAllowed { declared: String, expected: String },

    /// The algorithm is outside the supported signing set.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A JWK uses a key type this crate cannot verify with.
    #[error("Unsupported key type: {0} (only RSA and EC verification keys are accepted)")]
    UnsupportedKeyType(String),

    /// The signature was checked and is wrong.
    #[error("Invalid signature: the token was not signed by this key")]
    SignatureMismatch,

    /// The JWT header is missing the 'kid' (Key ID) field.
    #[error("The JWT header is missing the 'kid' (Key ID) field required for JWKS lookup")]
    MissingKeyId,

    /// A key with the specified 'kid' was not found in the JSON Web Key Set.
    #[error("Key not found in JWKS for kid '{0}'")]
    KeyNotFound(String),

    /// The verified token was issued by someone other than the discovered issuer.
    #[error("Issuer mismatch: expected '{expected}', token has '{actual}'")]
    IssuerMismatch { expected: String, actual: String },

    /// The discovery document could not be fetched or read.
    #[error("Failed to fetch OpenID configuration from '{url}': {reason}")]
    DiscoveryFetch { url: String, reason: String },

    /// The discovery document has no usable `jwks_uri`.
    #[error("OpenID configuration at '{0}' does not contain a 'jwks_uri'")]
    DiscoveryMissingJwksUri(String),

    /// The JWKS could not be fetched.
    #[error("Failed to fetch JWKS from '{url}': {reason}")]
    JwksFetch { url: String, reason: String },

    /// The JWKS response is not a JSON Web Key Set.
    #[error("Invalid JWKS document from '{url}': {reason}")]
    JwksParse { url: String, reason: String },

    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),
}

/// Stable, machine-readable classification of a [`JwtTrustError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MalformedToken,
    MalformedEncoding,
    MalformedJson,
    KeyFormat,
    AlgorithmKeyMismatch,
    AlgorithmNotAllowed,
    UnsupportedAlgorithm,
    UnsupportedKeyType,
    SignatureMismatch,
    MissingKeyId,
    KeyNotFound,
    IssuerMismatch,
    DiscoveryFetch,
    DiscoveryMissingJwksUri,
    JwksFetch,
    JwksParse,
    MissingConfiguration,
}

impl JwtTrustError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            JwtTrustError::MalformedToken => ErrorKind::MalformedToken,
            JwtTrustError::MalformedEncoding { .. } => ErrorKind::MalformedEncoding,
            JwtTrustError::MalformedJson { .. } => ErrorKind::MalformedJson,
            JwtTrustError::KeyFormat(_) => ErrorKind::KeyFormat,
            JwtTrustError::AlgorithmKeyMismatch { .. } => ErrorKind::AlgorithmKeyMismatch,
            JwtTrustError::AlgorithmNotAllowed { .. } => ErrorKind::AlgorithmNotAllowed,
            JwtTrustError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            JwtTrustError::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            JwtTrustError::SignatureMismatch => ErrorKind::SignatureMismatch,
            JwtTrustError::MissingKeyId => ErrorKind::MissingKeyId,
            JwtTrustError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            JwtTrustError::IssuerMismatch { .. } => ErrorKind::IssuerMismatch,
            JwtTrustError::DiscoveryFetch { .. } => ErrorKind::DiscoveryFetch,
            JwtTrustError::DiscoveryMissingJwksUri(_) => ErrorKind::DiscoveryMissingJwksUri,
            JwtTrustError::JwksFetch { .. } => ErrorKind::JwksFetch,
            JwtTrustError::JwksParse { .. } => ErrorKind::JwksParse,
            JwtTrustError::MissingConfiguration(_) => ErrorKind::MissingConfiguration,
        }
    }

    /// True for failures caused by the token's structure rather than its key or signature.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedToken | ErrorKind::MalformedEncoding | ErrorKind::MalformedJson
        )
    }
}
