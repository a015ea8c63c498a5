/*
 * Responsibility
 * - POST /iat, POST /ict: body は PoP token の生文字列
 * - IssuanceService に委譲し、201 + no-store で返す
 * - OPTIONS は preflight 用に 204 (CORS ヘッダは middleware が付与)
 */
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};

use crate::api::v1::dto::token_response::{IatResponse, IctResponse};
use crate::api::v1::extractors::bearer::BearerToken;
use crate::error::AppError;
use crate::services::auth::TokenKind;
use crate::services::auth::token_service::Issuance;
use crate::state::AppState;

type NoStore = [(HeaderName, HeaderValue); 2];

const NO_STORE: NoStore = [
    (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
    (header::PRAGMA, HeaderValue::from_static("no-cache")),
];

type RawBody = Result<Bytes, BytesRejection>;

/// The proof token is the whole body, surrounding whitespace ignored.
fn proof_from_body(body: RawBody) -> Result<String, AppError> {
    let bytes = body.map_err(|rejection| {
        tracing::warn!(error = %rejection, "failed to read request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::MissingProof
        }
    })?;

    let proof = std::str::from_utf8(&bytes)
        .map_err(|_| AppError::MissingProof)?
        .trim();
    if proof.is_empty() {
        return Err(AppError::MissingProof);
    }
    Ok(proof.to_string())
}

async fn issue(
    state: &AppState,
    bearer: &str,
    body: RawBody,
    kind: TokenKind,
) -> Result<(Issuance, i32), AppError> {
    let proof = proof_from_body(body)?;

    let out = state.issuance.issue(bearer, &proof, kind).await?;
    let expires_in = i32::try_from(out.token.expires_in).map_err(|_| AppError::Internal)?;
    Ok((out, expires_in))
}

pub async fn issue_iat(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    body: RawBody,
) -> Result<(StatusCode, NoStore, Json<IatResponse>), AppError> {
    let (out, expires_in) = issue(&state, &bearer, body, TokenKind::IdAssertion).await?;

    Ok((
        StatusCode::CREATED,
        NO_STORE,
        Json(IatResponse {
            id_assertion_token: out.token.token,
            expires_in,
            claims: out.token.claim_names.join(" "),
        }),
    ))
}

pub async fn issue_ict(
    State(state): State<AppState>,
    BearerToken(bearer): BearerToken,
    body: RawBody,
) -> Result<(StatusCode, NoStore, Json<IctResponse>), AppError> {
    let (out, expires_in) = issue(&state, &bearer, body, TokenKind::IdentityCertification).await?;

    Ok((
        StatusCode::CREATED,
        NO_STORE,
        Json(IctResponse {
            identity_certification_token: out.token.token,
            expires_in,
            claims: out.token.claim_names,
            e2e_auth_contexts: out.contexts,
        }),
    ))
}

pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}
