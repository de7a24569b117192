// src/codec.rs

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{JwtTrustError, Result, Segment};

/// A JSON object as found in a JWT header or payload.
pub type JsonObject = Map<String, Value>;

/// URL-safe Base64 that writes no padding and accepts input with or without it.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes one Base64URL segment.
///
/// Characters outside the URL-safe alphabet (including `+` and `/`) and
/// lengths that cannot be produced by an encoder are rejected.
pub fn decode_segment(segment: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL.decode(segment)
}

/// Encodes bytes as unpadded Base64URL.
pub fn encode_segment(bytes: impl AsRef<[u8]>) -> String {
    BASE64_URL.encode(bytes)
}

/// Splits a compact token into its header, payload and signature segments.
///
/// Fails with `MalformedToken` unless the token has exactly three non-empty parts.
pub fn split_token(token: &str) -> Result<(&str, &str, &str)> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
        {
            Ok((header, payload, signature))
        }
        _ => Err(JwtTrustError::MalformedToken),
    }
}

/// Parses bytes as a JSON document whose top-level value must be an object.
pub fn parse_json_object(bytes: &[u8], segment: Segment) -> Result<JsonObject> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(JwtTrustError::MalformedJson {
            segment,
            reason: format!("top-level value is {}", json_type_name(&other)),
        }),
        Err(e) => Err(JwtTrustError::MalformedJson {
            segment,
            reason: e.to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The decoded JOSE header of a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Header(JsonObject);

impl Header {
    pub fn new(fields: JsonObject) -> Self {
        Self(fields)
    }

    /// The declared signing algorithm, if it is a string.
    pub fn alg(&self) -> Option<&str> {
        self.0.get("alg").and_then(Value::as_str)
    }

    /// The key ID used to select a key from a JWKS.
    pub fn kid(&self) -> Option<&str> {
        self.0.get("kid").and_then(Value::as_str)
    }

    pub fn typ(&self) -> Option<&str> {
        self.0.get("typ").and_then(Value::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &JsonObject {
        &self.0
    }

    pub fn into_map(self) -> JsonObject {
        self.0
    }
}

/// The decoded payload (claims set) of a token.
///
/// Claims are open-ended, so the full object is kept and the registered
/// claims are exposed through typed accessors.
#[derive(Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claims(JsonObject);

impl Claims {
    pub fn new(claims: JsonObject) -> Self {
        Self(claims)
    }

    pub fn iss(&self) -> Option<&str> {
        self.0.get("iss").and_then(Value::as_str)
    }

    pub fn sub(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// The audience, normalised to a list (a single string becomes one entry).
    pub fn aud(&self) -> Vec<&str> {
        match self.0.get("aud") {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn exp(&self) -> Option<i64> {
        numeric_date(self.0.get("exp"))
    }

    pub fn nbf(&self) -> Option<i64> {
        numeric_date(self.0.get("nbf"))
    }

    pub fn iat(&self) -> Option<i64> {
        numeric_date(self.0.get("iat"))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &JsonObject {
        &self.0
    }

    pub fn into_map(self) -> JsonObject {
        self.0
    }
}

// Claims routinely carry personal data.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Claims").field(&"[REDACTED]").finish()
    }
}

/// NumericDate values may be written as floats by some issuers; fractions are truncated.
fn numeric_date(value: Option<&Value>) -> Option<i64> {
    let number = value?.as_number()?;
    number
        .as_i64()
        .or_else(|| number.as_f64().map(|secs| secs as i64))
}

/// A token split and decoded, but not verified.
pub struct DecodedToken {
    pub header: Header,
    pub claims: Claims,
    /// The exact `header.payload` text the signature covers.
    pub signing_input: String,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

impl fmt::Debug for DecodedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedToken")
            .field("header", &self.header)
            .field("claims", &"[REDACTED]")
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

/// Splits, Base64URL-decodes and JSON-parses a compact token.
///
/// Surrounding whitespace is ignored. Nothing here checks the signature; a
/// successful decode only means the token is structurally a JWT.
pub fn decode_token(token: &str) -> Result<DecodedToken> {
    let (header_segment, payload_segment, signature_segment) = split_token(token.trim())?;

    let header = decode_json_segment(header_segment, Segment::Header)?;
    let claims = decode_json_segment(payload_segment, Segment::Payload)?;
    let signature =
        decode_segment(signature_segment).map_err(|_| JwtTrustError::MalformedEncoding {
            segment: Segment::Signature,
        })?;

    Ok(DecodedToken {
        header: Header(header),
        claims: Claims(claims),
        signing_input: format!("{header_segment}.{payload_segment}"),
        signature,
    })
}

fn decode_json_segment(encoded: &str, segment: Segment) -> Result<JsonObject> {
    let bytes =
        decode_segment(encoded).map_err(|_| JwtTrustError::MalformedEncoding { segment })?;
    parse_json_object(&bytes, segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    // Header: {"alg":"HS256","typ":"JWT"}
    // Payload: {"sub":"1234567890","name":"Test User","iat":1516239022}
    const SAMPLE_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
                                eyJzdWIiOiIxMjM0NTY3ODkwIiwibmFtZSI6IlRlc3QgVXNlciIsImlhdCI6MTUxNjIzOTAyMn0.\
                                SflKxwRJSMeKKF2QT4fwpMeJf36POk6yJV_adQssw5c";

    #[test]
    fn test_decode_valid_hs256_token() {
        let decoded = decode_token(SAMPLE_TOKEN).unwrap();

        assert_eq!(decoded.header.alg(), Some("HS256"));
        assert_eq!(decoded.header.typ(), Some("JWT"));
        assert_eq!(decoded.claims.sub(), Some("1234567890"));
        assert_eq!(decoded.claims.get("name"), Some(&json!("Test User")));
        assert_eq!(decoded.claims.iat(), Some(1516239022));
        assert_eq!(decoded.signature.len(), 32);
        assert!(SAMPLE_TOKEN.starts_with(&decoded.signing_input));
    }

    #[test]
    fn test_round_trip_recovers_original_objects() {
        let header = json!({"alg": "RS256", "kid": "k1", "nested": {"a": [1, 2, null]}});
        let payload = json!({"iss": "https://issuer.example", "flag": true, "n": 1.5});
        let token = format!(
            "{}.{}.{}",
            encode_segment(serde_json::to_vec(&header).unwrap()),
            encode_segment(serde_json::to_vec(&payload).unwrap()),
            encode_segment(b"sig")
        );

        let decoded = decode_token(&token).unwrap();
        assert_eq!(Value::Object(decoded.header.into_map()), header);
        assert_eq!(Value::Object(decoded.claims.into_map()), payload);
    }

    #[test]
    fn test_not_a_jwt_is_malformed_token() {
        let err = decode_token("not-a-jwt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedToken);
    }

    #[test]
    fn test_split_rejects_wrong_segment_counts() {
        for token in ["", "a", "a.b", "a.b.c.d", "a..c", ".b.c", "a.b.", "...."] {
            assert!(
                matches!(split_token(token), Err(JwtTrustError::MalformedToken)),
                "expected MalformedToken for {token:?}"
            );
        }
        assert_eq!(split_token("a.b.c").unwrap(), ("a", "b", "c"));
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        let padded = format!("  {SAMPLE_TOKEN}\n");
        assert!(decode_token(&padded).is_ok());
    }

    #[test]
    fn test_decode_segment_accepts_missing_and_present_padding() {
        assert_eq!(decode_segment("e30").unwrap(), b"{}");
        assert_eq!(decode_segment("e30=").unwrap(), b"{}");
    }

    #[test]
    fn test_decode_segment_rejects_standard_alphabet() {
        // '+' and '/' belong to the standard alphabet, not the URL-safe one.
        assert!(decode_segment("ab+/").is_err());
    }

    #[test]
    fn test_decode_segment_rejects_impossible_length() {
        assert!(decode_segment("a").is_err());
    }

    #[test]
    fn test_invalid_base64_header_fails() {
        let err = decode_token("!!!invalid!!!.eyJzdWIiOiIxMjM0In0.c2ln").unwrap_err();
        assert!(matches!(
            err,
            JwtTrustError::MalformedEncoding { segment: Segment::Header }
        ));
    }

    #[test]
    fn test_invalid_base64_payload_fails() {
        let err = decode_token("eyJhbGciOiJIUzI1NiJ9.!!!invalid!!!.c2ln").unwrap_err();
        assert!(matches!(
            err,
            JwtTrustError::MalformedEncoding { segment: Segment::Payload }
        ));
    }

    #[test]
    fn test_invalid_base64_signature_fails() {
        let err = decode_token("eyJhbGciOiJIUzI1NiJ9.e30.***").unwrap_err();
        assert!(matches!(
            err,
            JwtTrustError::MalformedEncoding { segment: Segment::Signature }
        ));
    }

    #[test]
    fn test_invalid_json_header_fails() {
        // base64url("not json") = "bm90IGpzb24"
        let err = decode_token("bm90IGpzb24.e30.c2ln").unwrap_err();
        assert!(matches!(
            err,
            JwtTrustError::MalformedJson { segment: Segment::Header, .. }
        ));
    }

    #[test]
    fn test_non_object_payload_fails() {
        // base64url("[1,2]") = "WzEsMl0"
        let err = decode_token("eyJhbGciOiJIUzI1NiJ9.WzEsMl0.c2ln").unwrap_err();
        match err {
            JwtTrustError::MalformedJson { segment, reason } => {
                assert_eq!(segment, Segment::Payload);
                assert!(reason.contains("array"));
            }
            other => panic!("expected MalformedJson, got {other:?}"),
        }
    }

    #[test]
    fn test_claims_accessors() {
        let claims = Claims::new(
            json!({"iss": "me", "aud": ["a", "b"], "exp": 1700000000, "nbf": 1699999999.7})
                .as_object()
                .unwrap()
                .clone(),
        );
        assert_eq!(claims.iss(), Some("me"));
        assert_eq!(claims.aud(), vec!["a", "b"]);
        assert_eq!(claims.exp(), Some(1700000000));
        assert_eq!(claims.nbf(), Some(1699999999));
        assert_eq!(claims.iat(), None);
    }

    #[test]
    fn test_decoded_token_debug_redacts_sensitive_fields() {
        let decoded = decode_token(SAMPLE_TOKEN).unwrap();
        let debug_output = format!("{:?}", decoded);

        assert!(debug_output.contains("HS256"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("1234567890"));
        assert!(!debug_output.contains("Test User"));
    }
}
