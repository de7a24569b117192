// src/oidc/resolver.rs

use serde_json::Value;
use tracing::{debug, instrument};

use super::model::{Jwk, JwkSet, OidcConfiguration};
use super::transport::{
    fetch_with_fallback, sanitize_url_for_display, FetchError, HttpTransport, ReqwestTransport,
};
use crate::algorithm::Algorithm;
use crate::codec::Header;
use crate::config::ResolverConfig;
use crate::error::{JwtTrustError, Result};
use crate::keys::{load_from_jwk, KeyHandle};

const MAX_KID_DISPLAY_CHARS: usize = 128;

/// A verification key resolved from an issuer's JWKS, with the context
/// needed to finish verification.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    pub key: KeyHandle,
    /// The algorithm the token header declares, already checked against the key.
    pub algorithm: Algorithm,
    /// The `issuer` from the discovery document; the token's `iss` must equal it.
    pub issuer: String,
}

/// Resolves signing keys by OIDC discovery and JWKS lookup.
///
/// Nothing is cached: every call to [`resolve_key`](Self::resolve_key)
/// fetches discovery and JWKS again.
#[derive(Debug)]
pub struct OidcKeyResolver<T = ReqwestTransport> {
    config: ResolverConfig,
    transport: T,
}

impl OidcKeyResolver<ReqwestTransport> {
    /// Creates a resolver using `reqwest`, with the configured client if any.
    pub fn new(config: ResolverConfig) -> Self {
        let client = config.http_client.clone().unwrap_or_default();
        let transport = ReqwestTransport::new(client, config.max_response_bytes);
        Self { config, transport }
    }
}

impl<T: HttpTransport> OidcKeyResolver<T> {
    pub fn with_transport(config: ResolverConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        fetch_with_fallback(
            &self.transport,
            url,
            self.config.use_proxy_always,
            &self.config.proxy_prefix,
        )
        .await
    }

    /// Fetches and reads the issuer's discovery document.
    #[instrument(skip(self), fields(issuer = %self.config.issuer_url), err)]
    pub async fn discover(&self) -> Result<OidcConfiguration> {
        let url = self.config.discovery_url();
        let display_url = sanitize_url_for_display(&url);

        let body = self
            .fetch(&url)
            .await
            .map_err(|e| JwtTrustError::DiscoveryFetch {
                url: display_url.clone(),
                reason: e.to_string(),
            })?;

        let document = match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(document)) => document,
            _ => {
                return Err(JwtTrustError::DiscoveryFetch {
                    url: display_url,
                    reason: "response is not a JSON object".to_string(),
                })
            }
        };

        let issuer = match document.get("issuer").and_then(Value::as_str) {
            Some(issuer) if !issuer.is_empty() => issuer.to_string(),
            _ => {
                return Err(JwtTrustError::DiscoveryFetch {
                    url: display_url,
                    reason: "document has no 'issuer'".to_string(),
                })
            }
        };

        let jwks_uri = match document.get("jwks_uri").and_then(Value::as_str) {
            Some(jwks_uri) if !jwks_uri.is_empty() => jwks_uri.to_string(),
            _ => return Err(JwtTrustError::DiscoveryMissingJwksUri(display_url)),
        };

        debug!(
            %issuer,
            jwks_uri = %sanitize_url_for_display(&jwks_uri),
            "discovery document loaded"
        );
        Ok(OidcConfiguration { issuer, jwks_uri })
    }

    /// Fetches and parses the key set at `jwks_uri`.
    #[instrument(skip(self, jwks_uri), fields(jwks_uri = %sanitize_url_for_display(jwks_uri)), err)]
    pub async fn fetch_jwks(&self, jwks_uri: &str) -> Result<JwkSet> {
        let display_url = sanitize_url_for_display(jwks_uri);

        let body = self
            .fetch(jwks_uri)
            .await
            .map_err(|e| JwtTrustError::JwksFetch {
                url: display_url.clone(),
                reason: e.to_string(),
            })?;

        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| JwtTrustError::JwksParse {
            url: display_url,
            reason: e.to_string(),
        })?;

        debug!(keys = jwks.keys.len(), "JWKS loaded");
        Ok(jwks)
    }

    /// Resolves the key for a token with the given header.
    ///
    /// Runs, in order: `kid`/`alg` extraction, discovery, JWKS fetch, exact
    /// `kid` match and JWK conversion. The returned key is guaranteed to
    /// support the header's algorithm.
    #[instrument(skip(self, header), err)]
    pub async fn resolve_key(&self, header: &Header) -> Result<ResolvedKey> {
        // 1. The header must name both a key and an algorithm.
        let kid = header.kid().ok_or(JwtTrustError::MissingKeyId)?;
        let algorithm: Algorithm = header
            .alg()
            .ok_or_else(|| JwtTrustError::UnsupportedAlgorithm("(missing alg)".to_string()))?
            .parse()?;

        // 2. Discovery, then the key set.
        let discovery = self.discover().await?;
        let jwks = self.fetch_jwks(&discovery.jwks_uri).await?;

        // 3. Exact kid match only.
        let jwk = jwks
            .find(kid)
            .ok_or_else(|| JwtTrustError::KeyNotFound(sanitize_kid(kid)))?;

        // 4. Convert and pin to the header algorithm.
        let key = load_from_jwk(jwk)?;
        check_jwk_algorithm(jwk, algorithm, &key)?;
        key.ensure_supports(algorithm)?;

        debug!(kid = %sanitize_kid(kid), %algorithm, key_type = %key.key_type(), "key resolved");
        Ok(ResolvedKey {
            key,
            algorithm,
            issuer: discovery.issuer,
        })
    }
}

/// A JWK that declares its own `alg` may only be used with that algorithm.
fn check_jwk_algorithm(jwk: &Jwk, algorithm: Algorithm, key: &KeyHandle) -> Result<()> {
    match jwk.alg.as_deref() {
        Some(declared) if declared != algorithm.as_str() => {
            Err(JwtTrustError::AlgorithmKeyMismatch {
                algorithm: algorithm.to_string(),
                key_type: format!("{} (JWK restricted to {declared})", key.key_type()),
            })
        }
        _ => Ok(()),
    }
}

/// Makes a `kid` safe to echo back: control characters are replaced and
/// long values are truncated.
pub(crate) fn sanitize_kid(kid: &str) -> String {
    let clean: String = kid
        .chars()
        .map(|c| if c.is_control() { '\u{FFFD}' } else { c })
        .collect();
    match clean.char_indices().nth(MAX_KID_DISPLAY_CHARS) {
        Some((end, _)) => format!("{}...(truncated)", &clean[..end]),
        None => clean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_segment, JsonObject};
    use crate::error::ErrorKind;
    use crate::oidc::transport::tests::FakeTransport;
    use crate::oidc::transport::Attempt;
    use p256::elliptic_curve::sec1::ToEncodedPoint;
    use p256::pkcs8::DecodePublicKey;
    use serde_json::json;

    const ISSUER: &str = "https://id.example";
    const DISCOVERY: &str = "https://id.example/.well-known/openid-configuration";
    const JWKS: &str = "https://id.example/keys";
    const PROXY: &str = "https://proxy.test/?";
    const P256_PUBLIC: &str = include_str!("../../tests/fixtures/ec_p256_public.pem");

    fn config(use_proxy_always: bool) -> ResolverConfig {
        ResolverConfig::builder()
            .issuer_url(ISSUER)
            .unwrap()
            .use_proxy_always(use_proxy_always)
            .proxy_prefix(PROXY)
            .build()
            .unwrap()
    }

    fn header(value: serde_json::Value) -> Header {
        let map: JsonObject = value.as_object().unwrap().clone();
        Header::new(map)
    }

    fn ec_jwk(kid: &str, alg: Option<&str>) -> serde_json::Value {
        let public_key = p256::PublicKey::from_public_key_pem(P256_PUBLIC).unwrap();
        let point = public_key.to_encoded_point(false);
        let mut jwk = json!({
            "kty": "EC",
            "kid": kid,
            "crv": "P-256",
            "x": encode_segment(point.x().unwrap()),
            "y": encode_segment(point.y().unwrap()),
        });
        if let Some(alg) = alg {
            jwk["alg"] = json!(alg);
        }
        jwk
    }

    fn discovery_body() -> String {
        json!({"issuer": ISSUER, "jwks_uri": JWKS}).to_string()
    }

    fn jwks_body(keys: Vec<serde_json::Value>) -> String {
        json!({ "keys": keys }).to_string()
    }

    #[tokio::test]
    async fn test_resolves_matching_kid() {
        let transport = FakeTransport::default()
            .respond(DISCOVERY, 200, &discovery_body())
            .respond(JWKS, 200, &jwks_body(vec![ec_jwk("other", None), ec_jwk("k1", None)]));
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let resolved = resolver
            .resolve_key(&header(json!({"alg": "ES256", "kid": "k1"})))
            .await
            .unwrap();
        assert_eq!(resolved.algorithm, Algorithm::ES256);
        assert_eq!(resolved.issuer, ISSUER);
        assert_eq!(resolver.transport().requested(), vec![DISCOVERY, JWKS]);
    }

    #[tokio::test]
    async fn test_missing_kid_fails_before_any_request() {
        let transport = FakeTransport::default();
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver
            .resolve_key(&header(json!({"alg": "RS256"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingKeyId);
        assert!(resolver.transport().requested().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kid_is_key_not_found_without_fallback() {
        let transport = FakeTransport::default()
            .respond(DISCOVERY, 200, &discovery_body())
            .respond(JWKS, 200, &jwks_body(vec![ec_jwk("k1", None)]));
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver
            .resolve_key(&header(json!({"alg": "ES256", "kid": "k2"})))
            .await
            .unwrap_err();
        assert!(matches!(err, JwtTrustError::KeyNotFound(ref kid) if kid == "k2"));
    }

    #[tokio::test]
    async fn test_discovery_without_jwks_uri() {
        let body = json!({"issuer": ISSUER}).to_string();
        let transport = FakeTransport::default().respond(DISCOVERY, 200, &body);
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver.discover().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiscoveryMissingJwksUri);
    }

    #[tokio::test]
    async fn test_discovery_failure_after_fallback() {
        let transport = FakeTransport::default()
            .respond(DISCOVERY, 500, "")
            .respond(&Attempt::Proxy.url(DISCOVERY, PROXY), 500, "");
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver.discover().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DiscoveryFetch);
        assert!(err.to_string().contains("HTTP 500"));
        assert_eq!(resolver.transport().requested().len(), 2);
    }

    #[tokio::test]
    async fn test_non_json_discovery_is_fetch_error() {
        let transport = FakeTransport::default().respond(DISCOVERY, 200, "<html>");
        let resolver = OidcKeyResolver::with_transport(config(false), transport);
        assert_eq!(resolver.discover().await.unwrap_err().kind(), ErrorKind::DiscoveryFetch);
    }

    #[tokio::test]
    async fn test_jwks_without_keys_is_parse_error() {
        let transport = FakeTransport::default().respond(JWKS, 200, "{\"not_keys\":[]}");
        let resolver = OidcKeyResolver::with_transport(config(false), transport);
        assert_eq!(resolver.fetch_jwks(JWKS).await.unwrap_err().kind(), ErrorKind::JwksParse);
    }

    #[tokio::test]
    async fn test_proxy_always_routes_both_fetches_through_proxy() {
        let transport = FakeTransport::default()
            .respond(&Attempt::Proxy.url(DISCOVERY, PROXY), 200, &discovery_body())
            .respond(&Attempt::Proxy.url(JWKS, PROXY), 200, &jwks_body(vec![ec_jwk("k1", None)]));
        let resolver = OidcKeyResolver::with_transport(config(true), transport);

        resolver
            .resolve_key(&header(json!({"alg": "ES256", "kid": "k1"})))
            .await
            .unwrap();
        let requested = resolver.transport().requested();
        assert_eq!(requested.len(), 2);
        assert!(requested.iter().all(|url| url.starts_with(PROXY)));
    }

    #[tokio::test]
    async fn test_symmetric_jwk_is_rejected() {
        let transport = FakeTransport::default()
            .respond(DISCOVERY, 200, &discovery_body())
            .respond(
                JWKS,
                200,
                &jwks_body(vec![json!({"kty": "oct", "kid": "k1", "k": "c2VjcmV0"})]),
            );
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver
            .resolve_key(&header(json!({"alg": "HS256", "kid": "k1"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedKeyType);
    }

    #[tokio::test]
    async fn test_jwk_alg_restricts_header_alg() {
        let transport = FakeTransport::default()
            .respond(DISCOVERY, 200, &discovery_body())
            .respond(JWKS, 200, &jwks_body(vec![ec_jwk("k1", Some("ES384"))]));
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver
            .resolve_key(&header(json!({"alg": "ES256", "kid": "k1"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlgorithmKeyMismatch);
    }

    #[tokio::test]
    async fn test_header_alg_must_fit_key_type() {
        let transport = FakeTransport::default()
            .respond(DISCOVERY, 200, &discovery_body())
            .respond(JWKS, 200, &jwks_body(vec![ec_jwk("k1", None)]));
        let resolver = OidcKeyResolver::with_transport(config(false), transport);

        let err = resolver
            .resolve_key(&header(json!({"alg": "RS256", "kid": "k1"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlgorithmKeyMismatch);
    }

    #[test]
    fn test_sanitize_kid_replaces_controls_and_truncates() {
        assert_eq!(sanitize_kid("ab\x1b[31mc"), "ab\u{FFFD}[31mc");
        let long = "é".repeat(200);
        let sanitized = sanitize_kid(&long);
        assert!(sanitized.ends_with("...(truncated)"));
        assert_eq!(sanitized.chars().filter(|&c| c == 'é').count(), 128);
    }
}
