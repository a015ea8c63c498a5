//! Test keys and self-signed proofs for every supported algorithm.
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::pkcs8::{EncodePrivateKey as _, LineEnding};
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPrivateKey as _;
use rsa::traits::PublicKeyParts as _;
use serde::Serialize;
use serde_json::{Value, json};

use crate::services::auth::algorithm::SigningAlgorithm;
use crate::services::auth::jwk::JwkObject;
use crate::services::auth::jws::JsonObject;
use crate::services::auth::replay::{ClaimOutcome, LedgerError, NonceLedger};

enum Inner {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
    Rsa(rsa::RsaPrivateKey),
    Ed25519(ed25519_dalek::SigningKey),
}

pub struct TestKey {
    alg: SigningAlgorithm,
    inner: Inner,
}

// 2048-bit generation is slow in debug builds; share one key.
fn shared_rsa_key() -> rsa::RsaPrivateKey {
    static KEY: OnceLock<rsa::RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap())
        .clone()
}

impl TestKey {
    pub fn generate(alg: SigningAlgorithm) -> Self {
        let inner = match alg {
            SigningAlgorithm::ES256 => Inner::P256(p256::SecretKey::random(&mut OsRng)),
            SigningAlgorithm::ES384 => Inner::P384(p384::SecretKey::random(&mut OsRng)),
            SigningAlgorithm::ES512 => Inner::P521(p521::SecretKey::random(&mut OsRng)),
            SigningAlgorithm::RS256 | SigningAlgorithm::RS384 | SigningAlgorithm::RS512 => {
                Inner::Rsa(shared_rsa_key())
            }
            SigningAlgorithm::EdDSA => {
                Inner::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
        };
        Self { alg, inner }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.alg
    }

    /// Public JWK with the members a client would embed.
    pub fn jwk(&self) -> JwkObject {
        use p256::elliptic_curve::sec1::ToEncodedPoint as _;

        let value = match &self.inner {
            Inner::P256(secret) => {
                let point = secret.public_key().to_encoded_point(false);
                ec_jwk("P-256", point.x().unwrap(), point.y().unwrap())
            }
            Inner::P384(secret) => {
                let point = secret.public_key().to_encoded_point(false);
                ec_jwk("P-384", point.x().unwrap(), point.y().unwrap())
            }
            Inner::P521(secret) => {
                let point = secret.public_key().to_encoded_point(false);
                ec_jwk("P-521", point.x().unwrap(), point.y().unwrap())
            }
            Inner::Rsa(key) => json!({
                "kty": "RSA",
                "n": URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()),
                "e": URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()),
            }),
            Inner::Ed25519(key) => json!({
                "kty": "OKP",
                "crv": "Ed25519",
                "x": URL_SAFE_NO_PAD.encode(key.verifying_key().to_bytes()),
            }),
        };
        as_object(value)
    }

    /// Proof header embedding this key.
    pub fn header(&self) -> JsonObject {
        as_object(json!({ "alg": self.alg.as_str(), "typ": "JWT", "jwk": self.jwk() }))
    }

    /// PEM private key in a format the signer loads for this algorithm.
    pub fn private_pem(&self) -> String {
        match &self.inner {
            Inner::P256(secret) => secret.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            Inner::P384(secret) => secret.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            Inner::P521(secret) => secret.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            Inner::Rsa(key) => key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string(),
            Inner::Ed25519(key) => key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
        }
    }

    /// SEC1 (`EC PRIVATE KEY`) PEM, as `openssl ecparam -genkey` writes it.
    pub fn sec1_pem(&self) -> String {
        match &self.inner {
            Inner::P256(secret) => secret.to_sec1_pem(LineEnding::LF).unwrap().to_string(),
            Inner::P384(secret) => secret.to_sec1_pem(LineEnding::LF).unwrap().to_string(),
            Inner::P521(secret) => secret.to_sec1_pem(LineEnding::LF).unwrap().to_string(),
            _ => panic!("not an EC key"),
        }
    }

    pub fn p521_signing_key(&self) -> p521::ecdsa::SigningKey {
        match &self.inner {
            Inner::P521(secret) => p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).unwrap(),
            _ => panic!("not a P-521 key"),
        }
    }

    /// Sign `claims` under `header` as a compact JWS.
    pub fn sign_proof<T: Serialize>(&self, header: &JsonObject, claims: &T) -> String {
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap()),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap()),
        );
        let signature = self.raw_sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    fn raw_sign(&self, message: &[u8]) -> Vec<u8> {
        use p256::ecdsa::signature::Signer as _;
        use rsa::signature::{SignatureEncoding as _, Signer as _};

        match &self.inner {
            Inner::P256(secret) => {
                let key = p256::ecdsa::SigningKey::from(secret);
                let sig: p256::ecdsa::Signature = key.sign(message);
                sig.to_bytes().to_vec()
            }
            Inner::P384(secret) => {
                let key = p384::ecdsa::SigningKey::from(secret);
                let sig: p384::ecdsa::Signature = key.sign(message);
                sig.to_bytes().to_vec()
            }
            Inner::P521(_) => {
                let sig: p521::ecdsa::Signature = self.p521_signing_key().sign(message);
                sig.to_bytes().to_vec()
            }
            Inner::Rsa(key) => match self.alg {
                SigningAlgorithm::RS256 => {
                    rsa::pkcs1v15::SigningKey::<rsa::sha2::Sha256>::new(key.clone())
                        .sign(message)
                        .to_vec()
                }
                SigningAlgorithm::RS384 => {
                    rsa::pkcs1v15::SigningKey::<rsa::sha2::Sha384>::new(key.clone())
                        .sign(message)
                        .to_vec()
                }
                _ => rsa::pkcs1v15::SigningKey::<rsa::sha2::Sha512>::new(key.clone())
                    .sign(message)
                    .to_vec(),
            },
            Inner::Ed25519(key) => {
                use ed25519_dalek::Signer as _;
                key.sign(message).to_bytes().to_vec()
            }
        }
    }
}

fn ec_jwk(crv: &str, x: &[u8], y: &[u8]) -> Value {
    json!({
        "kty": "EC",
        "crv": crv,
        "x": URL_SAFE_NO_PAD.encode(x),
        "y": URL_SAFE_NO_PAD.encode(y),
    })
}

pub fn as_object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// In-process ledger with the same claim semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl NonceLedger for MemoryLedger {
    async fn try_claim(
        &self,
        id: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<ClaimOutcome, LedgerError> {
        let mut records = self.records.lock().unwrap();
        match records.get(id) {
            Some(existing) if *existing > now => Ok(ClaimOutcome::AlreadyClaimed),
            _ => {
                records.insert(id.to_string(), expires_at);
                Ok(ClaimOutcome::Claimed)
            }
        }
    }

    async fn garbage_collect(&self, now: i64) -> Result<u64, LedgerError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, expires_at| *expires_at > now);
        Ok((before - records.len()) as u64)
    }
}
