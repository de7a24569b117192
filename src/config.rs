// src/config.rs

use crate::error::{JwtTrustError, Result};
use crate::oidc::transport::{DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_PROXY_PREFIX};

/// Settings for resolving verification keys from an OIDC issuer.
///
/// Construct it with [`ResolverConfigBuilder`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// The issuer URL as given, without trailing slashes. Discovery is
    /// fetched from `{issuer_url}/.well-known/openid-configuration`.
    pub issuer_url: String,
    /// Skip the direct request and always go through the proxy.
    pub use_proxy_always: bool,
    /// Prefix the URL-encoded target is appended to for proxied requests.
    pub proxy_prefix: String,
    /// Upper bound on each discovery or JWKS response body.
    pub max_response_bytes: usize,
    /// Client used by the default transport. `None` means a fresh default client.
    pub http_client: Option<reqwest::Client>,
}

impl ResolverConfig {
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::new()
    }

    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.issuer_url)
    }
}

/// A builder for creating a [`ResolverConfig`] instance.
#[derive(Debug, Default)]
pub struct ResolverConfigBuilder {
    issuer_url: Option<String>,
    use_proxy_always: bool,
    proxy_prefix: Option<String>,
    max_response_bytes: Option<usize>,
    http_client: Option<reqwest::Client>,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the issuer URL of the OIDC provider. This is a required field.
    ///
    /// The value is kept as a string. One that is not a fetchable URL fails
    /// at request time like any other transport error, so the proxy route is
    /// still tried.
    ///
    /// # Errors
    ///
    /// `MissingConfiguration` when `url` is empty after trimming.
    pub fn issuer_url(mut self, url: &str) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(JwtTrustError::MissingConfiguration("issuer_url".to_string()));
        }
        self.issuer_url = Some(trimmed.to_string());
        Ok(self)
    }

    pub fn use_proxy_always(mut self, use_proxy_always: bool) -> Self {
        self.use_proxy_always = use_proxy_always;
        self
    }

    /// Overrides the proxy prefix. Defaults to `https://corsproxy.io/?`.
    pub fn proxy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.proxy_prefix = Some(prefix.into());
        self
    }

    /// Defaults to 1 MiB.
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = Some(limit);
        self
    }

    /// Uses a preconfigured client, e.g. one with timeouts set.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Consumes the builder and returns a `ResolverConfig`.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfiguration` if `issuer_url` was never set.
    pub fn build(self) -> Result<ResolverConfig> {
        let issuer_url = self
            .issuer_url
            .ok_or_else(|| JwtTrustError::MissingConfiguration("issuer_url".to_string()))?;

        Ok(ResolverConfig {
            issuer_url,
            use_proxy_always: self.use_proxy_always,
            proxy_prefix: self
                .proxy_prefix
                .unwrap_or_else(|| DEFAULT_PROXY_PREFIX.to_string()),
            max_response_bytes: self
                .max_response_bytes
                .unwrap_or(DEFAULT_MAX_RESPONSE_BYTES),
            http_client: self.http_client,
        })
    }
}
