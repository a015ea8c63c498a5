use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::error::AppError;
use crate::state::AppState;

/// Raw bearer token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; repeated spaces are ignored.
#[derive(Clone)]
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

pub(super) fn parse_authorization(value: &str) -> Option<&str> {
    let mut parts = value.split(' ').filter(|p| !p.is_empty());
    let scheme = parts.next()?;
    let token = parts.next()?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

impl FromRequestParts<AppState> for BearerToken
where
    AppState: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::MissingBearer)?;

        let token = parse_authorization(value).ok_or_else(|| {
            tracing::warn!("authorization header is not a bearer credential");
            AppError::MissingBearer
        })?;

        Ok(BearerToken(token.to_string()))
    }
}
