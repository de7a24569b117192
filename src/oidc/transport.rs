// src/oidc/transport.rs

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Default proxy used when a provider's endpoints cannot be reached directly.
pub const DEFAULT_PROXY_PREFIX: &str = "https://corsproxy.io/?";

/// Default cap on discovery and JWKS response bodies (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    Transport(String),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("response body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Minimal HTTP GET abstraction so the resolver can run against any client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs a GET request. Non-2xx statuses are returned as responses,
    /// not errors.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// [`HttpTransport`] backed by `reqwest`, with a bounded body read.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, max_response_bytes: usize) -> Self {
        Self {
            client,
            max_response_bytes,
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), DEFAULT_MAX_RESPONSE_BYTES)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let mut response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe_reqwest_error(&e)))?;

        let status = response.status().as_u16();
        if let Some(length) = response.content_length() {
            if length > self.max_response_bytes as u64 {
                return Err(FetchError::TooLarge(self.max_response_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(describe_reqwest_error(&e)))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(FetchError::TooLarge(self.max_response_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse { status, body })
    }
}

/// Maps a reqwest error to a short reason without internal details.
fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "connection timed out".to_string()
    } else if err.is_connect() {
        "failed to connect to server".to_string()
    } else if err.is_redirect() {
        "too many redirects".to_string()
    } else if err.is_body() || err.is_decode() {
        "failed to read response body".to_string()
    } else {
        "request failed".to_string()
    }
}

/// One HTTP GET in a fetch plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Direct,
    Proxy,
}

impl Attempt {
    /// `[Direct, Proxy]`, or only `[Proxy]` when the proxy is forced.
    pub fn plan(use_proxy_always: bool) -> &'static [Attempt] {
        if use_proxy_always {
            &[Attempt::Proxy]
        } else {
            &[Attempt::Direct, Attempt::Proxy]
        }
    }

    /// The URL this attempt requests for `original`.
    pub fn url(self, original: &str, proxy_prefix: &str) -> String {
        match self {
            Attempt::Direct => original.to_string(),
            Attempt::Proxy => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
                format!("{proxy_prefix}{encoded}")
            }
        }
    }
}

/// Runs the fetch plan for `original` and returns the first 2xx body.
///
/// HTTP errors and transport errors are treated the same: both move on to
/// the next attempt. When every attempt fails, the last attempt's error is
/// returned.
pub async fn fetch_with_fallback<T: HttpTransport + ?Sized>(
    transport: &T,
    original: &str,
    use_proxy_always: bool,
    proxy_prefix: &str,
) -> Result<Vec<u8>, FetchError> {
    let mut last_error = FetchError::Transport("no fetch attempted".to_string());

    for &attempt in Attempt::plan(use_proxy_always) {
        let url = attempt.url(original, proxy_prefix);
        debug!(?attempt, url = %sanitize_url_for_display(original), "fetching");

        let outcome = match transport.get(&url).await {
            Ok(response) if response.is_success() => return Ok(response.body),
            Ok(response) => FetchError::Status(response.status),
            Err(e) => e,
        };

        warn!(
            ?attempt,
            url = %sanitize_url_for_display(original),
            error = %outcome,
            "fetch attempt failed"
        );
        last_error = outcome;
    }

    Err(last_error)
}

/// Strips credentials, query and fragment from a URL before it is shown.
///
/// Text that does not parse as a URL is returned without any query-like tail.
pub fn sanitize_url_for_display(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}
