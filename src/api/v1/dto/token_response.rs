use serde::Serialize;

/// `POST /iat` body.
#[derive(Debug, Clone, Serialize)]
pub struct IatResponse {
    pub id_assertion_token: String,
    /// Seconds until expiry.
    pub expires_in: i32,
    /// Space-delimited names of the identity claims in the token.
    pub claims: String,
}

/// `POST /ict` body.
#[derive(Debug, Clone, Serialize)]
pub struct IctResponse {
    pub identity_certification_token: String,
    pub expires_in: i32,
    pub claims: Vec<String>,
    pub e2e_auth_contexts: Vec<String>,
}
