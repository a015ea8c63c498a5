//! CORS headers for browser wallets calling `/iat` and `/ict`.
//!
//! Policy:
//! - `Access-Control-Allow-Origin` echoes the request `Origin` when present.
//! - Methods and headers are fixed to what the token endpoints accept.
//! - Headers are set on every response, errors included.
//!
//! Preflight status is owned by the routes (`OPTIONS` -> 204), so this is a
//! plain response decorator rather than `tower_http::cors::CorsLayer`.

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
};

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Authorization, Content-Type";

pub fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(cors_headers))
}

async fn cors_headers(req: Request<Body>, next: Next) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();

    let mut res = next.run(req).await;
    let headers = res.headers_mut();

    if let Some(origin) = origin {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );

    res
}
