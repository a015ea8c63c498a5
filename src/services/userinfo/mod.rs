//! Outbound calls to the identity provider: userinfo and token introspection.
use async_trait::async_trait;

use crate::services::auth::identity::IdentityClaims;

pub mod client;
pub mod introspection;

pub use client::UserinfoClient;
pub use introspection::IntrospectionClient;

#[derive(Debug, thiserror::Error)]
pub enum UserinfoError {
    #[error("upstream rejected the bearer token")]
    AuthFailed,
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

/// Supplies authoritative identity claims for a bearer token.
#[async_trait]
pub trait IdentityClaimsFetcher: Send + Sync {
    async fn fetch(&self, bearer: &str) -> Result<IdentityClaims, UserinfoError>;
}

/// Lists the end-to-end contexts a bearer token is authorized for.
#[async_trait]
pub trait ContextResolver: Send + Sync {
    async fn authorized_contexts(&self, bearer: &str) -> Result<Vec<String>, UserinfoError>;
}

/// `host[:port]` of an absolute URL, for the upstream `Host` header.
pub fn authority_of(url: &str) -> Option<String> {
    let url = url::Url::parse(url).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
