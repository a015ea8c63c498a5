/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - domain error (proof / userinfo / issuance) を HTTP の意味に変換
 *   詳細はログにのみ残し、レスポンスは固定文言
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::pop::ProofError;
use crate::services::auth::token_issuer::IssueError;
use crate::services::userinfo::UserinfoError;

#[derive(Debug, Serialize)]
pub struct ErrorStatus {
    pub code: u16,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bearer authentication required")]
    MissingBearer,
    #[error("invalid bearer token")]
    InvalidBearer,
    #[error("proof of possession token required")]
    MissingProof,
    #[error("invalid proof of possession")]
    InvalidProof,
    #[error("proof of possession token already used")]
    ProofReplayed,
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("request timed out")]
    Timeout,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            AppError::MissingBearer => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "bearer authentication required",
            ),
            AppError::InvalidBearer => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "invalid bearer token",
            ),
            AppError::MissingProof => (
                StatusCode::BAD_REQUEST,
                "bad request",
                "proof of possession token required",
            ),
            AppError::InvalidProof => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "invalid proof of possession",
            ),
            AppError::ProofReplayed => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "proof of possession token already used",
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload too large",
                "request body too large",
            ),
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "request timeout",
                "request timed out",
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                "unknown internal server error",
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, text, description) = self.parts();

        let body = ErrorStatus {
            code: status.as_u16(),
            status: text,
            description,
        };

        (status, Json(body)).into_response()
    }
}

impl From<UserinfoError> for AppError {
    fn from(e: UserinfoError) -> Self {
        match e {
            UserinfoError::AuthFailed => AppError::InvalidBearer,
            UserinfoError::Unavailable(_) => AppError::Internal,
        }
    }
}

impl From<ProofError> for AppError {
    fn from(e: ProofError) -> Self {
        match e {
            ProofError::ReplayDetected => AppError::ProofReplayed,
            // Storage failure is ours, not the client's.
            ProofError::Ledger(_) => AppError::Internal,
            _ => AppError::InvalidProof,
        }
    }
}

impl From<IssueError> for AppError {
    fn from(_: IssueError) -> Self {
        AppError::Internal
    }
}
