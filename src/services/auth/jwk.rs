//! Public key extraction from untrusted JWK material.
//!
//! The key family is chosen by the signing algorithm the proof declares, never by
//! the JWK's own `kty`. A JWK that does not fit the declared algorithm is rejected.
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

use crate::services::auth::algorithm::{KeyFamily, SigningAlgorithm, UnsupportedAlgorithm};

/// A JSON Web Key as a raw JSON object.
pub type JwkObject = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "P-256" => Some(Self::P256),
            "P-384" => Some(Self::P384),
            "P-521" => Some(Self::P521),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// Field element size in bytes; JWK coordinates must be exactly this long.
    pub fn coordinate_len(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    pub fn for_algorithm(alg: SigningAlgorithm) -> Option<Self> {
        match alg {
            SigningAlgorithm::ES256 => Some(Self::P256),
            SigningAlgorithm::ES384 => Some(Self::P384),
            SigningAlgorithm::ES512 => Some(Self::P521),
            _ => None,
        }
    }
}

/// Decoded public key, one variant per key family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ec { curve: EcCurve, x: Vec<u8>, y: Vec<u8> },
    Rsa { n: Vec<u8>, e: u64 },
    Ed25519 { x: [u8; 32] },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyMaterialError {
    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithm),
    #[error("missing jwk member '{0}'")]
    MissingField(&'static str),
    #[error("jwk member '{0}' must be a string")]
    NotAString(&'static str),
    #[error("jwk member '{0}' is not valid base64url")]
    InvalidBase64(&'static str),
    #[error("jwk member '{0}' has an invalid length")]
    InvalidLength(&'static str),
    #[error("expected key type '{expected}' but found '{found}'")]
    KeyTypeMismatch { expected: &'static str, found: String },
    #[error("curve '{0}' is not supported")]
    UnsupportedCurve(String),
    #[error("curve '{crv}' cannot be used with {alg}")]
    CurveMismatch { alg: SigningAlgorithm, crv: String },
}

/// A resolved public key plus the JWK echoed back in the issued token's `cnf`.
#[derive(Debug, Clone)]
pub struct PublicKeyMaterial {
    algorithm: SigningAlgorithm,
    key: PublicKey,
    echo: JwkObject,
}

impl PublicKeyMaterial {
    /// Resolve `jwk` for the given algorithm.
    pub fn resolve(alg: SigningAlgorithm, jwk: &JwkObject) -> Result<Self, KeyMaterialError> {
        let mut echo = JwkObject::new();

        let key = match alg.family() {
            KeyFamily::Ec => {
                expect_kty(jwk, "EC", &mut echo)?;

                let crv = string_member(jwk, "crv")?;
                let curve = EcCurve::from_name(crv)
                    .ok_or_else(|| KeyMaterialError::UnsupportedCurve(crv.to_string()))?;
                if EcCurve::for_algorithm(alg) != Some(curve) {
                    return Err(KeyMaterialError::CurveMismatch {
                        alg,
                        crv: crv.to_string(),
                    });
                }
                echo.insert("crv".into(), Value::String(crv.to_string()));

                let x = fixed_len_member(jwk, "x", curve.coordinate_len(), &mut echo)?;
                let y = fixed_len_member(jwk, "y", curve.coordinate_len(), &mut echo)?;

                PublicKey::Ec { curve, x, y }
            }
            KeyFamily::Rsa => {
                expect_kty(jwk, "RSA", &mut echo)?;

                let n = base64_member(jwk, "n", &mut echo)?;
                if n.is_empty() {
                    return Err(KeyMaterialError::InvalidLength("n"));
                }

                let e_bytes = base64_member(jwk, "e", &mut echo)?;
                let e = be_word(&e_bytes).ok_or(KeyMaterialError::InvalidLength("e"))?;

                PublicKey::Rsa { n, e }
            }
            KeyFamily::Ed25519 => {
                expect_kty(jwk, "OKP", &mut echo)?;

                let crv = string_member(jwk, "crv")?;
                if crv != "Ed25519" {
                    return Err(KeyMaterialError::UnsupportedCurve(crv.to_string()));
                }
                echo.insert("crv".into(), Value::String(crv.to_string()));

                let x = fixed_len_member(jwk, "x", 32, &mut echo)?;
                let x: [u8; 32] = x
                    .try_into()
                    .map_err(|_| KeyMaterialError::InvalidLength("x"))?;

                PublicKey::Ed25519 { x }
            }
        };

        Ok(Self {
            algorithm: alg,
            key,
            echo,
        })
    }

    /// Resolve using an algorithm name as it appears in a JWS header.
    pub fn resolve_named(alg: &str, jwk: &JwkObject) -> Result<Self, KeyMaterialError> {
        let alg: SigningAlgorithm = alg.parse()?;
        Self::resolve(alg, jwk)
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    /// The client's key with its original member strings, for `cnf.jwk`.
    pub fn echo_jwk(&self) -> &JwkObject {
        &self.echo
    }
}

fn string_member<'a>(jwk: &'a JwkObject, name: &'static str) -> Result<&'a str, KeyMaterialError> {
    jwk.get(name)
        .ok_or(KeyMaterialError::MissingField(name))?
        .as_str()
        .ok_or(KeyMaterialError::NotAString(name))
}

fn expect_kty(
    jwk: &JwkObject,
    expected: &'static str,
    echo: &mut JwkObject,
) -> Result<(), KeyMaterialError> {
    let kty = string_member(jwk, "kty")?;
    if kty != expected {
        return Err(KeyMaterialError::KeyTypeMismatch {
            expected,
            found: kty.to_string(),
        });
    }
    echo.insert("kty".into(), Value::String(kty.to_string()));
    Ok(())
}

// Decodes a base64url member and copies the original string into the echo JWK.
fn base64_member(
    jwk: &JwkObject,
    name: &'static str,
    echo: &mut JwkObject,
) -> Result<Vec<u8>, KeyMaterialError> {
    let raw = string_member(jwk, name)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|_| KeyMaterialError::InvalidBase64(name))?;
    echo.insert(name.into(), Value::String(raw.to_string()));
    Ok(bytes)
}

fn fixed_len_member(
    jwk: &JwkObject,
    name: &'static str,
    len: usize,
    echo: &mut JwkObject,
) -> Result<Vec<u8>, KeyMaterialError> {
    let bytes = base64_member(jwk, name, echo)?;
    if bytes.len() != len {
        return Err(KeyMaterialError::InvalidLength(name));
    }
    Ok(bytes)
}

/// Big-endian unsigned integer that fits a u64. Zero is not a valid exponent.
fn be_word(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    (value != 0).then_some(value)
}
