use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use tracing::warn;

use crate::services::userinfo::{ContextResolver, UserinfoError};

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    scope: Option<String>,
}

/// Token introspection (RFC 7662) used to find the end-to-end contexts a
/// bearer token is authorized for.
///
/// Contexts are scope entries starting with `context_prefix`, prefix stripped.
#[derive(Clone)]
pub struct IntrospectionClient {
    http: reqwest::Client,
    endpoint: String,
    host: Option<String>,
    // Value of the Basic authorization header, already encoded.
    credentials: String,
    context_prefix: String,
}

impl std::fmt::Debug for IntrospectionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionClient")
            .field("endpoint", &self.endpoint)
            .field("host", &self.host)
            .field("context_prefix", &self.context_prefix)
            .finish()
    }
}

impl IntrospectionClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: String,
        host: Option<String>,
        credentials: String,
        context_prefix: String,
    ) -> Self {
        Self {
            http,
            endpoint,
            host,
            credentials,
            context_prefix,
        }
    }

    fn contexts_from_scope(&self, scope: &str) -> Vec<String> {
        scope
            .split(' ')
            .filter_map(|s| s.strip_prefix(self.context_prefix.as_str()))
            .filter(|ctx| !ctx.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl ContextResolver for IntrospectionClient {
    async fn authorized_contexts(&self, bearer: &str) -> Result<Vec<String>, UserinfoError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, format!("Basic {}", self.credentials))
            .form(&[("token", bearer)]);
        if let Some(host) = &self.host {
            request = request.header(header::HOST, host);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, endpoint = %self.endpoint, "introspection request failed");
            UserinfoError::Unavailable(e.to_string())
        })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(UserinfoError::AuthFailed),
            status => {
                warn!(%status, endpoint = %self.endpoint, "unexpected introspection status");
                return Err(UserinfoError::Unavailable(format!("status {status}")));
            }
        }

        let body = response
            .json::<IntrospectionResponse>()
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to parse introspection response");
                UserinfoError::Unavailable(e.to_string())
            })?;

        if !body.active {
            return Err(UserinfoError::AuthFailed);
        }

        Ok(body
            .scope
            .as_deref()
            .map(|scope| self.contexts_from_scope(scope))
            .unwrap_or_default())
    }
}
