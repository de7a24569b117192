// src/validator.rs

use serde::Serialize;
use tracing::{debug, instrument};

use crate::algorithm::Algorithm;
use crate::codec::{decode_token, Claims, DecodedToken, Header};
use crate::config::ResolverConfig;
use crate::error::{ErrorKind, JwtTrustError, Result};
use crate::keys::{load_asymmetric_public_key, load_symmetric_key, KeyHandle};
use crate::oidc::{HttpTransport, OidcKeyResolver};
use crate::verifier::verify;

/// A token whose signature has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub header: Header,
    pub claims: Claims,
    /// The one algorithm verification was pinned to.
    pub algorithm: Algorithm,
}

/// Outcome of a verification call, safe to hand to any consumer.
///
/// `header` and `payload` are present if and only if `valid` is true, and
/// `kind` is present if and only if it is false. `message` is meant for
/// people; match on `kind` instead.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    valid: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Claims>,
}

impl VerificationResult {
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn payload(&self) -> Option<&Claims> {
        self.payload.as_ref()
    }
}

impl From<Result<VerifiedToken>> for VerificationResult {
    fn from(outcome: Result<VerifiedToken>) -> Self {
        match outcome {
            Ok(token) => VerificationResult {
                valid: true,
                message: format!("Signature verified ({})", token.algorithm),
                kind: None,
                header: Some(token.header),
                payload: Some(token.claims),
            },
            Err(e) => VerificationResult {
                valid: false,
                message: e.to_string(),
                kind: Some(e.kind()),
                header: None,
                payload: None,
            },
        }
    }
}

/// Verifies `token` against a PEM public key.
///
/// The algorithm is `algorithm` when given, otherwise the one the token
/// header declares. Never fails; see [`try_verify_with_public_key`].
pub fn verify_with_public_key(
    token: &str,
    pem: &str,
    algorithm: Option<&str>,
) -> VerificationResult {
    try_verify_with_public_key(token, pem, algorithm).into()
}

#[instrument(skip(token, pem), err)]
pub fn try_verify_with_public_key(
    token: &str,
    pem: &str,
    algorithm: Option<&str>,
) -> Result<VerifiedToken> {
    let decoded = decode_token(token)?;
    let algorithm = match algorithm {
        Some(requested) => requested.parse()?,
        None => header_algorithm(&decoded.header)?,
    };
    ensure_header_allows(&decoded.header, algorithm)?;

    let key = load_asymmetric_public_key(pem, algorithm)?;
    check_signature(decoded, &key, algorithm)
}

/// Verifies an HMAC-signed `token` with a shared secret.
pub fn verify_with_secret(token: &str, secret: &str, algorithm: &str) -> VerificationResult {
    try_verify_with_secret(token, secret, algorithm).into()
}

#[instrument(skip(token, secret), err)]
pub fn try_verify_with_secret(token: &str, secret: &str, algorithm: &str) -> Result<VerifiedToken> {
    let decoded = decode_token(token)?;
    let algorithm: Algorithm = algorithm.parse()?;
    ensure_header_allows(&decoded.header, algorithm)?;

    let key = load_symmetric_key(secret);
    check_signature(decoded, &key, algorithm)
}

/// Verifies `token` with a key discovered from `issuer_url`.
///
/// Fetches the discovery document and JWKS over `reqwest`, through the
/// default proxy when direct requests fail or when `use_proxy_always` is set.
pub async fn verify_with_oidc(
    token: &str,
    issuer_url: &str,
    use_proxy_always: bool,
) -> VerificationResult {
    try_verify_with_oidc(token, issuer_url, use_proxy_always).await.into()
}

#[instrument(skip(token), err)]
pub async fn try_verify_with_oidc(
    token: &str,
    issuer_url: &str,
    use_proxy_always: bool,
) -> Result<VerifiedToken> {
    let decoded = decode_token(token)?;
    let config = ResolverConfig::builder()
        .issuer_url(issuer_url)?
        .use_proxy_always(use_proxy_always)
        .build()?;
    verify_decoded(decoded, &OidcKeyResolver::new(config)).await
}

/// Like [`verify_with_oidc`] but with a caller-built resolver, e.g. one with
/// a custom transport or proxy.
pub async fn verify_with_resolver<T: HttpTransport>(
    token: &str,
    resolver: &OidcKeyResolver<T>,
) -> VerificationResult {
    try_verify_with_resolver(token, resolver).await.into()
}

#[instrument(skip(token, resolver), fields(issuer = %resolver.config().issuer_url), err)]
pub async fn try_verify_with_resolver<T: HttpTransport>(
    token: &str,
    resolver: &OidcKeyResolver<T>,
) -> Result<VerifiedToken> {
    verify_decoded(decode_token(token)?, resolver).await
}

async fn verify_decoded<T: HttpTransport>(
    decoded: DecodedToken,
    resolver: &OidcKeyResolver<T>,
) -> Result<VerifiedToken> {
    let resolved = resolver.resolve_key(&decoded.header).await?;

    let verified = check_signature(decoded, &resolved.key, resolved.algorithm)?;

    // Only a verified token's issuer is meaningful.
    let actual = verified.claims.iss().map(str::to_string);
    if actual.as_deref() != Some(resolved.issuer.as_str()) {
        return Err(JwtTrustError::IssuerMismatch {
            expected: resolved.issuer,
            actual: actual.unwrap_or_else(|| "(missing)".to_string()),
        });
    }
    Ok(verified)
}

fn header_algorithm(header: &Header) -> Result<Algorithm> {
    header
        .alg()
        .ok_or_else(|| JwtTrustError::UnsupportedAlgorithm("(missing alg)".to_string()))?
        .parse()
}

/// The header must not declare an algorithm other than the pinned one.
fn ensure_header_allows(header: &Header, pinned: Algorithm) -> Result<()> {
    match header.alg() {
        Some(declared) if declared != pinned.as_str() => Err(JwtTrustError::AlgorithmNotAllowed {
            declared: declared.to_string(),
            expected: pinned.to_string(),
        }),
        _ => Ok(()),
    }
}

fn check_signature(
    decoded: DecodedToken,
    key: &KeyHandle,
    algorithm: Algorithm,
) -> Result<VerifiedToken> {
    if !verify(key, algorithm, decoded.signing_input.as_bytes(), &decoded.signature)? {
        debug!(%algorithm, key_type = %key.key_type(), "signature mismatch");
        return Err(JwtTrustError::SignatureMismatch);
    }

    Ok(VerifiedToken {
        header: decoded.header,
        claims: decoded.claims,
        algorithm,
    })
}
