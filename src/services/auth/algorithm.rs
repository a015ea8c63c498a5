//! JWS signing algorithms accepted for proofs and used for issued tokens.
use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    ES256,
    ES384,
    ES512,
    RS256,
    RS384,
    RS512,
    EdDSA,
}

/// Key family an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Ec,
    Rsa,
    Ed25519,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signing algorithm '{0}' is not supported")]
pub struct UnsupportedAlgorithm(pub String);

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 7] = [
        Self::ES256,
        Self::ES384,
        Self::ES512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::EdDSA,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::EdDSA => "EdDSA",
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::ES256 | Self::ES384 | Self::ES512 => KeyFamily::Ec,
            Self::RS256 | Self::RS384 | Self::RS512 => KeyFamily::Rsa,
            Self::EdDSA => KeyFamily::Ed25519,
        }
    }

    /// The `jsonwebtoken` algorithm, when the crate supports it.
    ///
    /// ES512 has no counterpart there and is handled with `p521` directly.
    pub fn jwt_algorithm(&self) -> Option<Algorithm> {
        match self {
            Self::ES256 => Some(Algorithm::ES256),
            Self::ES384 => Some(Algorithm::ES384),
            Self::ES512 => None,
            Self::RS256 => Some(Algorithm::RS256),
            Self::RS384 => Some(Algorithm::RS384),
            Self::RS512 => Some(Algorithm::RS512),
            Self::EdDSA => Some(Algorithm::EdDSA),
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
