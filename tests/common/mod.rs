// tests/common/mod.rs

#![allow(dead_code)]

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use jwt_trust::codec::encode_segment;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;
use p521::ecdsa::signature::Signer;
use p521::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use serde_json::{json, Value};
use wiremock::{Match, Request};

pub const RSA_PRIVATE: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_PUBLIC: &str = include_str!("../fixtures/rsa_public.pem");
pub const P256_PRIVATE: &str = include_str!("../fixtures/ec_p256_private.pem");
pub const P256_PUBLIC: &str = include_str!("../fixtures/ec_p256_public.pem");
pub const P384_PRIVATE: &str = include_str!("../fixtures/ec_p384_private.pem");
pub const P384_PUBLIC: &str = include_str!("../fixtures/ec_p384_public.pem");
pub const P521_PRIVATE: &str = include_str!("../fixtures/ec_p521_private.pem");
pub const P521_PUBLIC: &str = include_str!("../fixtures/ec_p521_public.pem");

pub fn sample_claims(issuer: &str) -> Value {
    json!({
        "iss": issuer,
        "sub": "user-42",
        "aud": "demo-client",
        "iat": 1_700_000_000,
        "name": "Test User",
    })
}

fn header(alg: Algorithm, kid: Option<&str>) -> Header {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    header
}

pub fn mint_hmac(alg: Algorithm, secret: &str, claims: &Value) -> String {
    encode(&header(alg, None), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

/// RS* and PS* tokens signed with the RSA fixture.
pub fn mint_rsa(alg: Algorithm, kid: Option<&str>, claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(RSA_PRIVATE.as_bytes()).unwrap();
    encode(&header(alg, kid), claims, &key).unwrap()
}

/// ES256 or ES384 tokens signed with the matching curve fixture.
pub fn mint_ec(alg: Algorithm, kid: Option<&str>, claims: &Value) -> String {
    let pem = match alg {
        Algorithm::ES256 => P256_PRIVATE,
        Algorithm::ES384 => P384_PRIVATE,
        other => panic!("no EC fixture for {other:?}"),
    };
    let key = EncodingKey::from_ec_pem(pem.as_bytes()).unwrap();
    encode(&header(alg, kid), claims, &key).unwrap()
}

/// ES512 tokens, signed directly with `p521` since `jsonwebtoken` has no ES512 signer.
pub fn mint_es512(kid: Option<&str>, claims: &Value) -> String {
    let mut header = json!({"alg": "ES512", "typ": "JWT"});
    if let Some(kid) = kid {
        header["kid"] = json!(kid);
    }
    let signing_input = format!(
        "{}.{}",
        encode_segment(serde_json::to_vec(&header).unwrap()),
        encode_segment(serde_json::to_vec(claims).unwrap())
    );

    let secret = p521::SecretKey::from_pkcs8_pem(P521_PRIVATE).unwrap();
    let signing_key = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).unwrap();
    let signature: p521::ecdsa::Signature = signing_key.sign(signing_input.as_bytes());

    format!("{signing_input}.{}", encode_segment(signature.to_bytes()))
}

pub fn rsa_jwk(kid: &str) -> Value {
    let key = rsa::RsaPublicKey::from_public_key_pem(RSA_PUBLIC).unwrap();
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "n": encode_segment(key.n().to_bytes_be()),
        "e": encode_segment(key.e().to_bytes_be()),
    })
}

pub fn ec_jwk(kid: &str, crv: &str) -> Value {
    let point = match crv {
        "P-256" => p256::PublicKey::from_public_key_pem(P256_PUBLIC)
            .unwrap()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec(),
        "P-384" => p384::PublicKey::from_public_key_pem(P384_PUBLIC)
            .unwrap()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec(),
        "P-521" => p521::PublicKey::from_public_key_pem(P521_PUBLIC)
            .unwrap()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec(),
        other => panic!("unsupported curve {other}"),
    };
    // Uncompressed SEC1: 0x04 || x || y
    let width = (point.len() - 1) / 2;
    json!({
        "kty": "EC",
        "kid": kid,
        "crv": crv,
        "x": encode_segment(&point[1..1 + width]),
        "y": encode_segment(&point[1 + width..]),
    })
}

pub fn jwks(keys: Vec<Value>) -> Value {
    json!({ "keys": keys })
}

/// Matches requests sent through the test proxy for one original URL.
pub struct ProxiedTarget(pub String);

impl Match for ProxiedTarget {
    fn matches(&self, request: &Request) -> bool {
        let expected: String = url::form_urlencoded::byte_serialize(self.0.as_bytes()).collect();
        request.url.path() == "/proxy" && request.url.query() == Some(expected.as_str())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
