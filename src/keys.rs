// src/keys.rs

use std::fmt;

use rsa::pkcs1;
use rsa::pkcs8::{DecodePublicKey, Document, SubjectPublicKeyInfoRef};
use rsa::{BigUint, RsaPublicKey};
use tracing::debug;

use crate::algorithm::{Algorithm, AlgorithmFamily, Curve};
use crate::codec::decode_segment;
use crate::error::{JwtTrustError, Result};
use crate::oidc::model::Jwk;

/// Largest RSA modulus accepted from a PEM or JWK, in bits.
pub const MAX_RSA_MODULUS_BITS: usize = 16384;

/// Key material ready for signature verification.
///
/// A handle is built fresh for every verification call and knows which
/// algorithm family it can serve.
#[derive(Clone)]
pub enum KeyHandle {
    /// Raw HMAC secret bytes. Usable with any HS* algorithm.
    Hmac(HmacKey),
    /// RSA public key, for RS* and PS*.
    Rsa(RsaPublicKey),
    /// EC public key, for the single ES* algorithm matching its curve.
    Ec(EcPublicKey),
}

/// Shared secret for the HMAC family.
#[derive(Clone)]
pub struct HmacKey(Vec<u8>);

impl HmacKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey([REDACTED; {} bytes])", self.0.len())
    }
}

/// ECDSA verifying key on one of the NIST curves.
#[derive(Clone)]
pub enum EcPublicKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

impl EcPublicKey {
    pub fn curve(&self) -> Curve {
        match self {
            EcPublicKey::P256(_) => Curve::P256,
            EcPublicKey::P384(_) => Curve::P384,
            EcPublicKey::P521(_) => Curve::P521,
        }
    }

    /// Builds a key from uncompressed affine coordinates.
    ///
    /// Coordinates shorter than the field width are left-padded with zeros,
    /// since some producers strip leading zero bytes.
    fn from_coordinates(curve: Curve, x: &[u8], y: &[u8]) -> Result<Self> {
        let width = curve.field_len();
        if x.len() > width || y.len() > width {
            return Err(JwtTrustError::KeyFormat(format!(
                "EC coordinates are longer than {width} bytes for curve {curve}"
            )));
        }

        let mut sec1 = Vec::with_capacity(1 + 2 * width);
        sec1.push(0x04);
        sec1.resize(1 + width - x.len(), 0);
        sec1.extend_from_slice(x);
        sec1.resize(1 + 2 * width - y.len(), 0);
        sec1.extend_from_slice(y);

        let invalid_point =
            |_| JwtTrustError::KeyFormat(format!("EC coordinates are not a point on {curve}"));
        Ok(match curve {
            Curve::P256 => EcPublicKey::P256(
                p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(invalid_point)?,
            ),
            Curve::P384 => EcPublicKey::P384(
                p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(invalid_point)?,
            ),
            Curve::P521 => EcPublicKey::P521(
                p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(invalid_point)?,
            ),
        })
    }
}

impl fmt::Debug for EcPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcPublicKey({})", self.curve())
    }
}

impl KeyHandle {
    /// Human-readable key type, used in mismatch messages.
    pub fn key_type(&self) -> String {
        match self {
            KeyHandle::Hmac(_) => "HMAC secret".to_string(),
            KeyHandle::Rsa(_) => "RSA".to_string(),
            KeyHandle::Ec(key) => format!("EC {}", key.curve()),
        }
    }

    pub fn supports(&self, algorithm: Algorithm) -> bool {
        match (self, algorithm.family()) {
            (KeyHandle::Hmac(_), AlgorithmFamily::Hmac { .. }) => true,
            (KeyHandle::Rsa(_), AlgorithmFamily::Rsa { .. }) => true,
            (KeyHandle::Ec(key), AlgorithmFamily::Ecdsa { curve, .. }) => key.curve() == curve,
            _ => false,
        }
    }

    /// Fails with `AlgorithmKeyMismatch` unless this key can verify `algorithm`.
    pub fn ensure_supports(&self, algorithm: Algorithm) -> Result<()> {
        if self.supports(algorithm) {
            Ok(())
        } else {
            Err(JwtTrustError::AlgorithmKeyMismatch {
                algorithm: algorithm.to_string(),
                key_type: self.key_type(),
            })
        }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyHandle::Hmac(key) => f.debug_tuple("Hmac").field(key).finish(),
            KeyHandle::Rsa(_) => f.write_str("Rsa(..)"),
            KeyHandle::Ec(key) => f.debug_tuple("Ec").field(key).finish(),
        }
    }
}

/// Parses a PEM public key and checks that it can verify `algorithm`.
///
/// Accepts SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) for RSA and the P-256,
/// P-384 and P-521 curves, and PKCS#1 (`BEGIN RSA PUBLIC KEY`) for RSA.
///
/// # Errors
///
/// `KeyFormat` when the PEM cannot be parsed, `AlgorithmKeyMismatch` when
/// the key type (or curve) does not fit the algorithm.
pub fn load_asymmetric_public_key(pem: &str, algorithm: Algorithm) -> Result<KeyHandle> {
    let key = parse_public_key_pem(pem)?;
    debug!(key_type = %key.key_type(), %algorithm, "parsed PEM public key");
    key.ensure_supports(algorithm)?;
    Ok(key)
}

fn parse_public_key_pem(pem: &str) -> Result<KeyHandle> {
    let pem = pem.trim();

    if let Some(key) = parse_rsa_pem(pem) {
        return Ok(KeyHandle::Rsa(key));
    }
    if let Ok(key) = p256::PublicKey::from_public_key_pem(pem) {
        return Ok(KeyHandle::Ec(EcPublicKey::P256(key.into())));
    }
    if let Ok(key) = p384::PublicKey::from_public_key_pem(pem) {
        return Ok(KeyHandle::Ec(EcPublicKey::P384(key.into())));
    }
    if let Ok(key) = p521::PublicKey::from_public_key_pem(pem) {
        let verifying_key = p521::ecdsa::VerifyingKey::from_affine(*key.as_affine())
            .map_err(|_| {
                JwtTrustError::KeyFormat("P-521 public key is the identity point".to_string())
            })?;
        return Ok(KeyHandle::Ec(EcPublicKey::P521(verifying_key)));
    }

    let reason = if pem.contains("PRIVATE KEY") {
        "expected a public key but got a private key"
    } else if pem.contains("CERTIFICATE") {
        "X.509 certificates are not accepted; provide the certificate's public key"
    } else {
        "not a PEM-encoded RSA, P-256, P-384 or P-521 public key"
    };
    Err(JwtTrustError::KeyFormat(reason.to_string()))
}

/// Reads an RSA key from SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM.
///
/// Decoded by hand rather than through `DecodePublicKey`, which caps the
/// modulus at 4096 bits.
fn parse_rsa_pem(pem: &str) -> Option<RsaPublicKey> {
    let (label, document) = Document::from_pem(pem).ok()?;
    let pkcs1_der = match label {
        "PUBLIC KEY" => {
            let spki = SubjectPublicKeyInfoRef::try_from(document.as_bytes()).ok()?;
            if spki.algorithm.oid != pkcs1::ALGORITHM_OID {
                return None;
            }
            spki.subject_public_key.as_bytes()?
        }
        "RSA PUBLIC KEY" => document.as_bytes(),
        _ => return None,
    };
    let key = pkcs1::RsaPublicKey::try_from(pkcs1_der).ok()?;
    rsa_public_key(key.modulus.as_bytes(), key.public_exponent.as_bytes()).ok()
}

fn rsa_public_key(n: &[u8], e: &[u8]) -> rsa::Result<RsaPublicKey> {
    RsaPublicKey::new_with_max_size(
        BigUint::from_bytes_be(n),
        BigUint::from_bytes_be(e),
        MAX_RSA_MODULUS_BITS,
    )
}

/// Wraps a shared secret as an HMAC key.
///
/// The secret's UTF-8 bytes are used as-is. No minimum length is enforced
/// here; secrets shorter than the digest output are weak and are reported as
/// a warning at verification time.
pub fn load_symmetric_key(secret: &str) -> KeyHandle {
    KeyHandle::Hmac(HmacKey(secret.as_bytes().to_vec()))
}

/// Converts an RSA or EC JWK into a verification key.
///
/// # Errors
///
/// `UnsupportedKeyType` for any `kty` other than `RSA` or `EC` (symmetric
/// `oct` keys included), `KeyFormat` for missing or undecodable members.
pub fn load_from_jwk(jwk: &Jwk) -> Result<KeyHandle> {
    match jwk.kty.as_deref() {
        Some("RSA") => {
            let n = jwk_member(jwk.n.as_deref(), "RSA", "n")?;
            let e = jwk_member(jwk.e.as_deref(), "RSA", "e")?;
            let key = rsa_public_key(&n, &e)
                .map_err(|e| JwtTrustError::KeyFormat(format!("invalid RSA JWK: {e}")))?;
            Ok(KeyHandle::Rsa(key))
        }
        Some("EC") => {
            let crv = jwk
                .crv
                .as_deref()
                .ok_or_else(|| JwtTrustError::KeyFormat("EC JWK is missing 'crv'".to_string()))?;
            let curve = Curve::from_jwk_name(crv).ok_or_else(|| {
                JwtTrustError::UnsupportedKeyType(format!("EC on curve {crv}"))
            })?;
            let x = jwk_member(jwk.x.as_deref(), "EC", "x")?;
            let y = jwk_member(jwk.y.as_deref(), "EC", "y")?;
            Ok(KeyHandle::Ec(EcPublicKey::from_coordinates(curve, &x, &y)?))
        }
        Some(other) => Err(JwtTrustError::UnsupportedKeyType(other.to_string())),
        None => Err(JwtTrustError::UnsupportedKeyType("(missing kty)".to_string())),
    }
}

fn jwk_member(value: Option<&str>, kty: &str, name: &str) -> Result<Vec<u8>> {
    let value = value
        .ok_or_else(|| JwtTrustError::KeyFormat(format!("{kty} JWK is missing '{name}'")))?;
    let bytes = decode_segment(value).map_err(|_| {
        JwtTrustError::KeyFormat(format!("{kty} JWK member '{name}' is not valid Base64URL"))
    })?;
    if bytes.is_empty() {
        return Err(JwtTrustError::KeyFormat(format!(
            "{kty} JWK member '{name}' is empty"
        )));
    }
    Ok(bytes)
}
