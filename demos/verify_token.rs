// demos/verify_token.rs
//
// Usage:
//   cargo run --example verify_token -- pem    <token> <public-key.pem> [--alg RS256]
//   cargo run --example verify_token -- secret <token> <secret> [--alg HS256]
//   cargo run --example verify_token -- oidc   <token> <issuer-url> [--proxy]
//
// Set RUST_LOG=jwt_trust=debug to follow discovery and JWKS fetching.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jwt_trust::prelude::*;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Verify a JSON Web Token and print the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "verify_token")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify against a PEM public key (RSA, P-256, P-384 or P-521).
    Pem {
        token: String,
        /// Path to a `PUBLIC KEY` or `RSA PUBLIC KEY` PEM file.
        key: PathBuf,
        /// Pin the algorithm instead of taking it from the token header.
        #[arg(long)]
        alg: Option<String>,
    },

    /// Verify an HMAC-signed token with a shared secret.
    Secret {
        token: String,
        secret: String,
        #[arg(long, default_value = "HS256")]
        alg: String,
    },

    /// Verify with a key discovered from an OpenID Connect issuer.
    Oidc {
        token: String,
        issuer: String,
        /// Skip the direct request and always go through the proxy.
        #[arg(long)]
        proxy: bool,
    },
}

/// Keeps tokens and secrets out of debug output.
impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Commands::Pem { key, alg, .. } => f
                .debug_struct("Pem")
                .field("token", &"[REDACTED]")
                .field("key", key)
                .field("alg", alg)
                .finish(),
            Commands::Secret { alg, .. } => f
                .debug_struct("Secret")
                .field("token", &"[REDACTED]")
                .field("secret", &"[REDACTED]")
                .field("alg", alg)
                .finish(),
            Commands::Oidc { issuer, proxy, .. } => f
                .debug_struct("Oidc")
                .field("token", &"[REDACTED]")
                .field("issuer", issuer)
                .field("proxy", proxy)
                .finish(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    debug!(?cli, "parsed arguments");

    let result = match cli.command {
        Commands::Pem { token, key, alg } => {
            let pem = match fs::read_to_string(&key) {
                Ok(pem) => pem,
                Err(e) => {
                    error!("Failed to read key file '{}': {}", key.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            verify_with_public_key(&token, &pem, alg.as_deref())
        }
        Commands::Secret { token, secret, alg } => verify_with_secret(&token, &secret, &alg),
        Commands::Oidc {
            token,
            issuer,
            proxy,
        } => verify_with_oidc(&token, &issuer, proxy).await,
    };

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize result: {}", e),
    }

    if result.valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
