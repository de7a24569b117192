// src/verifier.rs

use hmac::{Hmac, Mac};
use p256::ecdsa::signature::Verifier;
use rsa::{Pkcs1v15Sign, Pss, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::{debug, warn};

use crate::algorithm::{Algorithm, AlgorithmFamily, DigestAlgorithm, RsaPadding};
use crate::error::{JwtTrustError, Result};
use crate::keys::{EcPublicKey, HmacKey, KeyHandle};

/// Checks `signature` over `signing_input` with `key` under `algorithm`.
///
/// Returns `Ok(false)` when the signature is simply wrong, including ECDSA
/// signatures of the wrong width. `Err` is reserved for an algorithm the key
/// cannot serve, which is detected before any cryptographic work.
pub fn verify(
    key: &KeyHandle,
    algorithm: Algorithm,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<bool> {
    key.ensure_supports(algorithm)?;

    let valid = match (key, algorithm.family()) {
        (KeyHandle::Hmac(secret), AlgorithmFamily::Hmac { digest }) => {
            verify_hmac(secret, digest, signing_input, signature)
        }
        (KeyHandle::Rsa(public_key), AlgorithmFamily::Rsa { digest, padding }) => {
            verify_rsa(public_key, digest, padding, signing_input, signature)
        }
        (KeyHandle::Ec(public_key), AlgorithmFamily::Ecdsa { .. }) => {
            verify_ecdsa(public_key, signing_input, signature)
        }
        // ensure_supports already rejected every other pairing.
        _ => {
            return Err(JwtTrustError::AlgorithmKeyMismatch {
                algorithm: algorithm.to_string(),
                key_type: key.key_type(),
            })
        }
    };

    debug!(%algorithm, valid, "signature checked");
    Ok(valid)
}

fn verify_hmac(
    secret: &HmacKey,
    digest: DigestAlgorithm,
    signing_input: &[u8],
    signature: &[u8],
) -> bool {
    if secret.as_bytes().len() < digest.output_len() {
        warn!(
            secret_len = secret.as_bytes().len(),
            recommended = digest.output_len(),
            "HMAC secret is shorter than the digest output"
        );
    }

    match digest {
        DigestAlgorithm::Sha256 => hmac_matches::<Hmac<Sha256>>(secret, signing_input, signature),
        DigestAlgorithm::Sha384 => hmac_matches::<Hmac<Sha384>>(secret, signing_input, signature),
        DigestAlgorithm::Sha512 => hmac_matches::<Hmac<Sha512>>(secret, signing_input, signature),
    }
}

fn hmac_matches<M: Mac + hmac::digest::KeyInit>(
    secret: &HmacKey,
    signing_input: &[u8],
    signature: &[u8],
) -> bool {
    // HMAC accepts keys of any length, including empty.
    let Ok(mut mac) = <M as hmac::digest::KeyInit>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signing_input);
    // verify_slice compares in constant time.
    mac.verify_slice(signature).is_ok()
}

fn verify_rsa(
    public_key: &RsaPublicKey,
    digest: DigestAlgorithm,
    padding: RsaPadding,
    signing_input: &[u8],
    signature: &[u8],
) -> bool {
    let outcome = match (digest, padding) {
        (DigestAlgorithm::Sha256, RsaPadding::Pkcs1v15) => public_key.verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(signing_input),
            signature,
        ),
        (DigestAlgorithm::Sha384, RsaPadding::Pkcs1v15) => public_key.verify(
            Pkcs1v15Sign::new::<Sha384>(),
            &Sha384::digest(signing_input),
            signature,
        ),
        (DigestAlgorithm::Sha512, RsaPadding::Pkcs1v15) => public_key.verify(
            Pkcs1v15Sign::new::<Sha512>(),
            &Sha512::digest(signing_input),
            signature,
        ),
        // Pss::new uses a salt as long as the digest output.
        (DigestAlgorithm::Sha256, RsaPadding::Pss) => public_key.verify(
            Pss::new::<Sha256>(),
            &Sha256::digest(signing_input),
            signature,
        ),
        (DigestAlgorithm::Sha384, RsaPadding::Pss) => public_key.verify(
            Pss::new::<Sha384>(),
            &Sha384::digest(signing_input),
            signature,
        ),
        (DigestAlgorithm::Sha512, RsaPadding::Pss) => public_key.verify(
            Pss::new::<Sha512>(),
            &Sha512::digest(signing_input),
            signature,
        ),
    };
    outcome.is_ok()
}

/// JWS carries ECDSA signatures as fixed-width `r || s`, not DER. Each
/// curve's verifier hashes with the digest the JWS algorithm prescribes
/// (SHA-256, SHA-384 and SHA-512 respectively).
fn verify_ecdsa(public_key: &EcPublicKey, signing_input: &[u8], signature: &[u8]) -> bool {
    let expected_len = 2 * public_key.curve().field_len();
    if signature.len() != expected_len {
        debug!(
            actual = signature.len(),
            expected = expected_len,
            "ECDSA signature has the wrong width"
        );
        return false;
    }

    match public_key {
        EcPublicKey::P256(key) => p256::ecdsa::Signature::from_slice(signature)
            .map(|sig| key.verify(signing_input, &sig).is_ok())
            .unwrap_or(false),
        EcPublicKey::P384(key) => p384::ecdsa::Signature::from_slice(signature)
            .map(|sig| key.verify(signing_input, &sig).is_ok())
            .unwrap_or(false),
        EcPublicKey::P521(key) => p521::ecdsa::Signature::from_slice(signature)
            .map(|sig| key.verify(signing_input, &sig).is_ok())
            .unwrap_or(false),
    }
}
