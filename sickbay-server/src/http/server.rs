//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS unless permissive mode is configured
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::Stores;
use crate::models::{AntiTheftPolicy, ValidationError};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    pub bind_addr: SocketAddr,

    /// Allow any origin instead of localhost only
    pub cors_permissive: bool,

    /// Dispensing threshold rule
    pub anti_theft: AntiTheftPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors_permissive: false,
            anti_theft: AntiTheftPolicy::default(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Offline store; every request reads and writes here
    pub pool: PgPool,
    /// Online store, when configured and reachable
    pub online: Option<PgPool>,
    pub anti_theft: AntiTheftPolicy,
}

impl AppState {
    pub fn new(stores: Stores, anti_theft: AntiTheftPolicy) -> Self {
        Self {
            pool: stores.offline,
            online: stores.online,
            anti_theft,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let cors = if cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:8080"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://127.0.0.1:8080"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(routes::health::router())
        .merge(routes::sync::router())
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::warehouses::router())
        .merge(routes::students::router())
        .merge(routes::products::router())
        .merge(routes::consultations::router())
        .merge(routes::drug_tracking::router())
        .merge(routes::dashboard::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server.
///
/// # Example
///
/// ```ignore
/// let stores = Stores::connect(&config.database).await?;
/// run_server(stores, ServerConfig::default()).await?;
/// ```
pub async fn run_server(stores: Stores, config: ServerConfig) -> Result<(), ServerError> {
    config.anti_theft.validate()?;

    tracing::info!(
        online = stores.online.is_some(),
        threshold = config.anti_theft.threshold,
        window_hours = config.anti_theft.window_hours,
        "Starting sickbay server"
    );

    let state = Arc::new(AppState::new(stores, config.anti_theft));
    let app = build_router(state, config.cors_permissive);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid anti-theft policy: {0}")]
    AntiTheft(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(!config.cors_permissive);
        assert_eq!(config.anti_theft, AntiTheftPolicy::default());
    }

    #[tokio::test]
    async fn invalid_policy_refuses_to_start() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://sickbay@127.0.0.1:1/unused")
            .unwrap();
        let config = ServerConfig {
            anti_theft: AntiTheftPolicy {
                threshold: 50,
                window_hours: 0,
            },
            ..Default::default()
        };

        let err = run_server(Stores { offline: pool, online: None }, config)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::AntiTheft(_)));
    }
}
