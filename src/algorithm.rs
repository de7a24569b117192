// src/algorithm.rs

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::JwtTrustError;

/// The JWS signing algorithms this crate verifies.
///
/// `none` and every encryption-only algorithm are deliberately absent, so a
/// value of this type always pins verification to one concrete scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
    PS256,
    PS384,
    PS512,
}

/// Hash function used by an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Output length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaPadding {
    Pkcs1v15,
    /// PSS with salt length equal to the digest output length.
    Pss,
}

/// NIST curves used by the ES* algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    /// The curve name as written in a JWK `crv` member.
    pub fn jwk_name(self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::P521 => "P-521",
        }
    }

    pub fn from_jwk_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Curve::P256),
            "P-384" => Some(Curve::P384),
            "P-521" => Some(Curve::P521),
            _ => None,
        }
    }

    /// Width in bytes of one field element, i.e. of `r` and of `s` in a JWS signature.
    pub fn field_len(self) -> usize {
        match self {
            Curve::P256 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwk_name())
    }
}

/// An algorithm's family together with the parameters that family needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac {
        digest: DigestAlgorithm,
    },
    Rsa {
        digest: DigestAlgorithm,
        padding: RsaPadding,
    },
    Ecdsa {
        digest: DigestAlgorithm,
        curve: Curve,
    },
}

impl Algorithm {
    pub const ALL: [Algorithm; 12] = [
        Algorithm::HS256,
        Algorithm::HS384,
        Algorithm::HS512,
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::ES512,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
    ];

    pub fn family(self) -> AlgorithmFamily {
        use AlgorithmFamily::*;
        use DigestAlgorithm::*;

        match self {
            Algorithm::HS256 => Hmac { digest: Sha256 },
            Algorithm::HS384 => Hmac { digest: Sha384 },
            Algorithm::HS512 => Hmac { digest: Sha512 },
            Algorithm::RS256 => Rsa {
                digest: Sha256,
                padding: RsaPadding::Pkcs1v15,
            },
            Algorithm::RS384 => Rsa {
                digest: Sha384,
                padding: RsaPadding::Pkcs1v15,
            },
            Algorithm::RS512 => Rsa {
                digest: Sha512,
                padding: RsaPadding::Pkcs1v15,
            },
            Algorithm::PS256 => Rsa {
                digest: Sha256,
                padding: RsaPadding::Pss,
            },
            Algorithm::PS384 => Rsa {
                digest: Sha384,
                padding: RsaPadding::Pss,
            },
            Algorithm::PS512 => Rsa {
                digest: Sha512,
                padding: RsaPadding::Pss,
            },
            Algorithm::ES256 => Ecdsa {
                digest: Sha256,
                curve: Curve::P256,
            },
            Algorithm::ES384 => Ecdsa {
                digest: Sha384,
                curve: Curve::P384,
            },
            Algorithm::ES512 => Ecdsa {
                digest: Sha512,
                curve: Curve::P521,
            },
        }
    }

    pub fn digest(self) -> DigestAlgorithm {
        match self.family() {
            AlgorithmFamily::Hmac { digest }
            | AlgorithmFamily::Rsa { digest, .. }
            | AlgorithmFamily::Ecdsa { digest, .. } => digest,
        }
    }

    pub fn is_symmetric(self) -> bool {
        matches!(self.family(), AlgorithmFamily::Hmac { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
            Algorithm::RS256 => "RS256",
            Algorithm::RS384 => "RS384",
            Algorithm::RS512 => "RS512",
            Algorithm::ES256 => "ES256",
            Algorithm::ES384 => "ES384",
            Algorithm::ES512 => "ES512",
            Algorithm::PS256 => "PS256",
            Algorithm::PS384 => "PS384",
            Algorithm::PS512 => "PS512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = JwtTrustError;

    /// Parses a JWS `alg` value. Matching is exact: `hs256` and `none` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| JwtTrustError::UnsupportedAlgorithm(s.to_string()))
    }
}
