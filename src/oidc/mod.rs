// src/oidc/mod.rs

//! OIDC discovery and JWKS key resolution.

pub mod model;
pub mod resolver;
pub mod transport;

pub use model::{Jwk, JwkSet, OidcConfiguration};
pub use resolver::{OidcKeyResolver, ResolvedKey};
pub use transport::{Attempt, FetchError, HttpResponse, HttpTransport, ReqwestTransport};
