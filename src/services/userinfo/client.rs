use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde_json::Value;
use tracing::warn;

use crate::services::auth::identity::IdentityClaims;
use crate::services::userinfo::{IdentityClaimsFetcher, UserinfoError};

/// Fetches identity claims from the provider's userinfo endpoint.
#[derive(Clone, Debug)]
pub struct UserinfoClient {
    http: reqwest::Client,
    endpoint: String,
    // Sent as `Host`; the provider may sit behind a proxy that routes on it.
    host: Option<String>,
}

impl UserinfoClient {
    pub fn new(http: reqwest::Client, endpoint: String, host: Option<String>) -> Self {
        Self {
            http,
            endpoint,
            host,
        }
    }
}

#[async_trait]
impl IdentityClaimsFetcher for UserinfoClient {
    async fn fetch(&self, bearer: &str) -> Result<IdentityClaims, UserinfoError> {
        let mut request = self.http.get(&self.endpoint).bearer_auth(bearer);
        if let Some(host) = &self.host {
            request = request.header(header::HOST, host);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, endpoint = %self.endpoint, "userinfo request failed");
            UserinfoError::Unavailable(e.to_string())
        })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(UserinfoError::AuthFailed),
            status => {
                warn!(%status, endpoint = %self.endpoint, "unexpected userinfo status");
                return Err(UserinfoError::Unavailable(format!("status {status}")));
            }
        }

        match response.json::<Value>().await {
            Ok(Value::Object(claims)) => Ok(IdentityClaims::new(claims)),
            Ok(_) => Err(UserinfoError::Unavailable(
                "userinfo response is not a json object".into(),
            )),
            Err(e) => {
                warn!(error = %e, "failed to parse userinfo response");
                Err(UserinfoError::Unavailable(e.to_string()))
            }
        }
    }
}
