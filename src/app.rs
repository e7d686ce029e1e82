/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config読み込み → 依存生成 (verifier / cache / store / resolver / allow-list / event sink)
 * - Router 組み立てと perimeter middleware の適用
 * - axum::serve() で起動し、Ctrl-C / SIGTERM で graceful shutdown
 */
use std::net::SocketAddr;
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::{Config, HttpConfig};
use crate::error::AppError;
use crate::middleware;
use crate::repos::user_repo::PgUserStore;
use crate::services::auth::build_verifier;
use crate::services::cache::{CacheClient, MemoryCache, ValkeyClient, client::ttl_seconds};
use crate::services::identity::{IdentityContextBuilder, IdentityResolver};
use crate::services::security::{IpAllowList, TracingEventSink};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,identity_gate=debug,security=info cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get "lost".
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.http.app_env.is_production());

    tracing::info!(
        "starting identity gate in {:?} mode on {}",
        config.http.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config.http);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    // ConnectInfo は client address 解決 (ip filter / security events) の最後のフォールバック
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let verifier = build_verifier(&config.auth)?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    let store = Arc::new(PgUserStore::new(pool));

    let cache: Arc<dyn CacheClient> = match &config.redis_url {
        Some(url) => Arc::new(
            ValkeyClient::new(url)
                .await
                .context("failed to connect to REDIS_URL")?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set; identity cache is process-local");
            Arc::new(MemoryCache::new())
        }
    };

    let resolver = IdentityResolver::new(cache, store, config.auth.binding_mode.into())
        .with_ttl(ttl_seconds(config.auth.identity_cache_ttl_seconds));

    let allowlist = IpAllowList::compile(&config.http.ip_allowlist)?;
    if !allowlist.is_empty() {
        tracing::info!(entries = allowlist.len(), "ip allow-list enabled");
    }

    let identity_builder = IdentityContextBuilder::new(config.auth.binding_mode)
        .require_container(config.auth.require_container_binding);

    Ok(AppState::new(
        verifier,
        identity_builder,
        Arc::new(resolver),
        Arc::new(allowlist),
        Arc::new(TracingEventSink),
    ))
}

/// Full application router: routes + perimeter.
pub fn build_router(state: AppState, http: &HttpConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .fallback(|| async { AppError::not_found("route") })
        .with_state(state.clone());

    apply_perimeter(router, state, http)
}

/// Wrap `router` in the perimeter layers.
///
/// Order (outer → inner):
/// security headers → request id / access log / timeout → request_received event
/// → IP allow-list → CORS → body limit → routes (access → permission → handler)
///
/// CORS answers preflights itself, so it sits inside the allow-list and the event layer.
pub fn apply_perimeter(router: Router, state: AppState, http: &HttpConfig) -> Router {
    let router = middleware::http::limit_body(router, http.body_limit_bytes);
    let router = middleware::cors::apply(router, http);
    let router = middleware::ip_filter::apply(router, state.clone());
    let router = middleware::security_events::apply(router, state);
    let router = middleware::http::apply(router, http);
    middleware::security_headers::apply(router, http.app_env)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
