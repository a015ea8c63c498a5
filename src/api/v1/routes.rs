/*
 * Responsibility
 * - token 発行エンドポイントの URL 構造を定義
 * - /iat, /ict (POST + OPTIONS)
 */
use axum::{Router, routing::post};

use crate::api::v1::handlers::token::{issue_iat, issue_ict, preflight};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/iat", post(issue_iat).options(preflight))
        .route("/ict", post(issue_ict).options(preflight))
}
