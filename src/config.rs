/*
 * Responsibility
 * - 環境変数の読み込み (.env は dotenvy)
 * - 設定値のバリデーション (不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::algorithm::SigningAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Token introspection settings; present only when `TOKEN_INTROSPECTION` is set.
#[derive(Clone, Debug)]
pub struct IntrospectionConfig {
    pub endpoint: String,
    pub host: Option<String>,
    pub credentials: String,
    pub context_prefix: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // Signing key for issued tokens
    pub key_file: String,
    pub kid: String,
    pub alg: SigningAlgorithm,

    pub userinfo_endpoint: String,
    pub issuer: String,
    pub introspection: Option<IntrospectionConfig>,

    // Token lifetimes (seconds)
    pub default_token_period: i64,
    pub max_token_period: i64,

    pub nonce_database_url: String,
    pub nonce_gc_interval: Duration,
    pub proof_leeway_seconds: i64,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let port: u16 = parse_or(get("PORT"), 8080, "PORT")?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV").as_deref());

        let key_file = require("KEY_FILE")?;
        let kid = require("KID")?;
        let alg = match get("ALG") {
            Some(alg) => alg.parse().map_err(|_| ConfigError::Invalid("ALG"))?,
            None => SigningAlgorithm::ES256,
        };

        let userinfo_endpoint = require("USERINFO")?;
        url::Url::parse(&userinfo_endpoint).map_err(|_| ConfigError::Invalid("USERINFO"))?;

        let issuer = require("ISSUER")?;
        let issuer_url = url::Url::parse(&issuer).map_err(|_| ConfigError::Invalid("ISSUER"))?;
        if issuer_url.host_str().is_none() {
            return Err(ConfigError::Invalid("ISSUER"));
        }

        let introspection = match get("TOKEN_INTROSPECTION") {
            Some(endpoint) => {
                url::Url::parse(&endpoint)
                    .map_err(|_| ConfigError::Invalid("TOKEN_INTROSPECTION"))?;
                Some(IntrospectionConfig {
                    endpoint,
                    host: get("TOKEN_INTROSPECTION_HOST"),
                    credentials: require("INTROSPECTION_CREDENTIALS")?,
                    context_prefix: get("CONTEXT_PREFIX").unwrap_or_else(|| "e2e_ctx_".into()),
                })
            }
            None => None,
        };

        let default_token_period: i64 =
            parse_or(get("DEFAULT_TOKEN_PERIOD"), 3_600, "DEFAULT_TOKEN_PERIOD")?; // 1 hour
        let max_token_period: i64 =
            parse_or(get("MAX_TOKEN_PERIOD"), 2_592_000, "MAX_TOKEN_PERIOD")?; // 30 days
        if default_token_period <= 0 {
            return Err(ConfigError::Invalid("DEFAULT_TOKEN_PERIOD"));
        }
        // Reported to clients as an int32 `expires_in`.
        if max_token_period <= 0 || max_token_period > i64::from(i32::MAX) {
            return Err(ConfigError::Invalid("MAX_TOKEN_PERIOD"));
        }
        if default_token_period > max_token_period {
            return Err(ConfigError::Invalid("DEFAULT_TOKEN_PERIOD"));
        }

        let nonce_database_url =
            get("NONCE_DATABASE_URL").unwrap_or_else(|| "sqlite://nonces.db".into());

        let nonce_gc_interval: u64 =
            parse_or(get("NONCE_GC_INTERVAL_SECONDS"), 300, "NONCE_GC_INTERVAL_SECONDS")?;
        if nonce_gc_interval == 0 {
            return Err(ConfigError::Invalid("NONCE_GC_INTERVAL_SECONDS"));
        }

        let proof_leeway_seconds: i64 =
            parse_or(get("PROOF_LEEWAY_SECONDS"), 60, "PROOF_LEEWAY_SECONDS")?;
        if proof_leeway_seconds < 0 {
            return Err(ConfigError::Invalid("PROOF_LEEWAY_SECONDS"));
        }

        let upstream_timeout: u64 =
            parse_or(get("UPSTREAM_TIMEOUT_SECONDS"), 10, "UPSTREAM_TIMEOUT_SECONDS")?;
        if upstream_timeout == 0 {
            return Err(ConfigError::Invalid("UPSTREAM_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            key_file,
            kid,
            alg,
            userinfo_endpoint,
            issuer,
            introspection,
            default_token_period,
            max_token_period,
            nonce_database_url,
            nonce_gc_interval: Duration::from_secs(nonce_gc_interval),
            proof_leeway_seconds,
            upstream_timeout: Duration::from_secs(upstream_timeout),
        })
    }
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    default: T,
    key: &'static str,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
