/*
 * Responsibility
 * - Config読み込み → 依存生成 (signer / upstream clients / nonce ledger) → Router 組み立て
 * - Middleware の適用 (http / security headers / CORS)
 * - axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use anyhow::Context;
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::Config;
use crate::middleware;
use crate::services::auth::IssuanceService;
use crate::services::auth::jwt::JwtSigner;
use crate::services::auth::pop::{ProofPolicy, ProofVerifier};
use crate::services::auth::replay::{NonceLedger, SqliteNonceLedger, spawn_garbage_collector};
use crate::services::auth::token_issuer::{IssuanceSettings, TokenIssuer};
use crate::services::userinfo::{
    ContextResolver, IntrospectionClient, UserinfoClient, authority_of,
};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,ict_server=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics via tracing; stderr may be hidden depending on how the process runs.
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting token server in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let signer = JwtSigner::from_file(&config.key_file, config.alg, config.kid.clone())?;
    tracing::info!(alg = %signer.algorithm(), kid = signer.kid(), "signing key loaded");

    assemble_state(config, signer).await
}

async fn assemble_state(config: &Config, signer: JwtSigner) -> anyhow::Result<AppState> {
    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("failed to build http client")?;

    let userinfo = Arc::new(UserinfoClient::new(
        http.clone(),
        config.userinfo_endpoint.clone(),
        authority_of(&config.issuer),
    ));

    let contexts = config.introspection.as_ref().map(|c| {
        Arc::new(IntrospectionClient::new(
            http.clone(),
            c.endpoint.clone(),
            c.host.clone(),
            c.credentials.clone(),
            c.context_prefix.clone(),
        )) as Arc<dyn ContextResolver>
    });

    let ledger: Arc<dyn NonceLedger> =
        Arc::new(SqliteNonceLedger::open(&config.nonce_database_url).await?);
    spawn_garbage_collector(ledger.clone(), config.nonce_gc_interval);

    let verifier = ProofVerifier::new(
        ProofPolicy {
            issuer: config.issuer.clone(),
            leeway_seconds: config.proof_leeway_seconds,
        },
        ledger,
    );

    let issuer = TokenIssuer::new(
        signer,
        IssuanceSettings {
            issuer: config.issuer.clone(),
            default_lifetime: config.default_token_period,
            max_lifetime: config.max_token_period,
        },
    );

    let issuance = IssuanceService::new(userinfo, contexts, verifier, issuer);
    Ok(AppState::new(Arc::new(issuance)))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .merge(api::v1::routes())
        .with_state(state);

    // Leave room for the userinfo and introspection calls of one request.
    let request_timeout = config.upstream_timeout * 3;

    let router = middleware::http::apply(router, request_timeout);
    let router = middleware::security_headers::apply(router);
    middleware::cors::apply(router)
}
