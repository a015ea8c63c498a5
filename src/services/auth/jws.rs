//! Compact JWS handling shared by the proof verifier and the token signer.
//!
//! `jsonwebtoken` covers every algorithm except ES512, which is verified and
//! signed with `p521` over the same compact serialization.
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, Validation, errors::ErrorKind};
use p521::ecdsa::signature::{Signer, Verifier};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::services::auth::jwk::{EcCurve, PublicKey, PublicKeyMaterial};

pub type JsonObject = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum JwsError {
    #[error("malformed compact jws: {0}")]
    Malformed(&'static str),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Borrowed view over the three segments of a compact JWS.
#[derive(Debug, Clone, Copy)]
pub struct CompactJws<'a> {
    token: &'a str,
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactJws<'a> {
    pub fn parse(token: &'a str) -> Result<Self, JwsError> {
        let token = token.trim();
        let mut parts = token.split('.');
        let header = parts.next().ok_or(JwsError::Malformed("header"))?;
        let payload = parts.next().ok_or(JwsError::Malformed("payload"))?;
        let signature = parts.next().ok_or(JwsError::Malformed("signature"))?;
        if parts.next().is_some() {
            return Err(JwsError::Malformed("too many segments"));
        }
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(JwsError::Malformed("empty segment"));
        }

        Ok(Self {
            token,
            header,
            payload,
            signature,
        })
    }

    /// Decoded protected header. Not authenticated until `verify` succeeds.
    pub fn header(&self) -> Result<JsonObject, JwsError> {
        decode_object(self.header, "header")
    }

    /// Verify the signature with `key` and return the payload claims.
    ///
    /// Only the signature is checked here; claim validation is up to the caller.
    pub fn verify(&self, key: &PublicKeyMaterial) -> Result<JsonObject, JwsError> {
        let Some(alg) = key.algorithm().jwt_algorithm() else {
            return self.verify_p521(key);
        };

        let decoding_key = decoding_key(key)?;

        let mut validation = Validation::new(alg);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<JsonObject>(self.token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat => JwsError::InvalidSignature,
                _ => JwsError::Jwt(e),
            })?;

        Ok(data.claims)
    }

    fn verify_p521(&self, key: &PublicKeyMaterial) -> Result<JsonObject, JwsError> {
        let PublicKey::Ec {
            curve: EcCurve::P521,
            x,
            y,
        } = key.key()
        else {
            return Err(JwsError::InvalidSignature);
        };

        let verifying_key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&sec1_point(x, y))
            .map_err(|_| JwsError::InvalidSignature)?;

        let signature_bytes = URL_SAFE_NO_PAD
            .decode(self.signature)
            .map_err(|_| JwsError::Malformed("signature"))?;
        let signature = p521::ecdsa::Signature::from_slice(&signature_bytes)
            .map_err(|_| JwsError::InvalidSignature)?;

        verifying_key
            .verify(self.signing_input().as_bytes(), &signature)
            .map_err(|_| JwsError::InvalidSignature)?;

        decode_object(self.payload, "payload")
    }

    fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

/// Sign `claims` as an ES512 compact JWS.
pub fn sign_p521<T: Serialize>(
    key: &p521::ecdsa::SigningKey,
    header: &JsonObject,
    claims: &T,
) -> Result<String, JwsError> {
    let encoded_header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let encoded_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{}.{}", encoded_header, encoded_payload);

    let signature: p521::ecdsa::Signature = key.sign(signing_input.as_bytes());
    let encoded_signature = URL_SAFE_NO_PAD.encode(signature.to_bytes());

    Ok(format!("{}.{}", signing_input, encoded_signature))
}

fn decoding_key(key: &PublicKeyMaterial) -> Result<DecodingKey, JwsError> {
    let decoding_key = match key.key() {
        PublicKey::Ec { x, y, .. } => DecodingKey::from_ec_components(
            &URL_SAFE_NO_PAD.encode(x),
            &URL_SAFE_NO_PAD.encode(y),
        )?,
        PublicKey::Rsa { n, e } => {
            let e = e.to_be_bytes();
            let first = e.iter().position(|b| *b != 0).unwrap_or(e.len() - 1);
            DecodingKey::from_rsa_raw_components(n, &e[first..])
        }
        PublicKey::Ed25519 { x } => DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(x))?,
    };
    Ok(decoding_key)
}

fn sec1_point(x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut point = Vec::with_capacity(1 + x.len() + y.len());
    point.push(0x04);
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    point
}

fn decode_object(segment: &str, what: &'static str) -> Result<JsonObject, JwsError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| JwsError::Malformed(what))?;
    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(JwsError::Malformed(what)),
    }
}
