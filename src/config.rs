/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, REDIS_URL, Auth 設定, perimeter 設定など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::access_jwt::{DEFAULT_CREDENTIAL_COOKIE, VerificationKey};
use crate::services::identity::context::BindingMode;
use crate::services::identity::resolver::DEFAULT_IDENTITY_TTL_SECONDS;

pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
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

/// Perimeter settings: everything applied around the identity pipeline.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
    pub request_timeout: Duration,
    pub ip_allowlist: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            app_env: AppEnv::Development,
            cors_allowed_origins: Vec::new(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            ip_allowlist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub verification_key: VerificationKey,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub access_token_leeway_seconds: u64,
    pub credential_cookie: String,

    pub binding_mode: BindingMode,
    pub require_container_binding: bool,
    pub identity_cache_ttl_seconds: u64,
}

pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub redis_url: Option<String>,

    pub http: HttpConfig,
    pub auth: AuthConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let redis_url = optional("REDIS_URL");

        let http = HttpConfig {
            app_env: AppEnv::from_env(),
            cors_allowed_origins: parse_list(&std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
            body_limit_bytes: parsed("MAX_BODY_BYTES", DEFAULT_BODY_LIMIT_BYTES)?,
            request_timeout: Duration::from_secs(parsed(
                "REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )?),
            ip_allowlist: parse_list(&std::env::var("IP_ALLOWLIST").unwrap_or_default()),
        };

        let verification_key = match (
            optional("ACCESS_JWT_PUBLIC_KEY_PEM"),
            optional("ACCESS_JWT_SECRET"),
        ) {
            (Some(pem), None) => VerificationKey::Ed25519PublicPem(pem.replace("\\n", "\n")),
            (None, Some(secret)) => VerificationKey::Hs256Secret(secret),
            (Some(_), Some(_)) => return Err(ConfigError::Invalid("ACCESS_JWT_SECRET")),
            (None, None) => return Err(ConfigError::Missing("ACCESS_JWT_PUBLIC_KEY_PEM")),
        };

        let binding_mode = match optional("SCOPE_BINDING") {
            Some(raw) => BindingMode::parse(&raw).ok_or(ConfigError::Invalid("SCOPE_BINDING"))?,
            None => BindingMode::default(),
        };

        let require_container_binding = parsed("REQUIRE_CONTAINER_BINDING", false)?;
        check_container_binding(binding_mode, require_container_binding)?;

        let auth = AuthConfig {
            verification_key,
            issuer: optional("AUTH_ISSUER"),
            audience: optional("AUTH_AUDIENCE"),
            access_token_leeway_seconds: parsed("ACCESS_TOKEN_LEEWAY_SECONDS", 60)?,
            credential_cookie: optional("ACCESS_TOKEN_COOKIE")
                .unwrap_or_else(|| DEFAULT_CREDENTIAL_COOKIE.to_string()),
            binding_mode,
            require_container_binding,
            identity_cache_ttl_seconds: parsed(
                "IDENTITY_CACHE_TTL_SECONDS",
                DEFAULT_IDENTITY_TTL_SECONDS,
            )?,
        };

        Ok(Self {
            addr,
            database_url,
            redis_url,
            http,
            auth,
        })
    }
}

// The container claim is part of the tenant binding; minimal mode has none to extend.
fn check_container_binding(mode: BindingMode, require_container: bool) -> Result<(), ConfigError> {
    if require_container && !mode.binds_client() {
        return Err(ConfigError::Invalid("REQUIRE_CONTAINER_BINDING"));
    }
    Ok(())
}

// Unset and blank are the same thing.
fn optional(key: &'static str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Unset falls back to the default; set-but-unparsable fails startup.
fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
