//! Server module for Polyglot Core.
//!
//! This module contains the HTTP router, handlers and the serve loop.

pub mod handlers;
pub mod logging;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::error::{ConfigError, Result};
use crate::service::TranslationService;
use logging::{REQUEST_ID_HEADER, RequestLoggerLayer};

/// Build the CORS layer for the configured origins.
///
/// # Errors
/// Returns `ConfigError::Invalid` if an origin is not a valid header value.
pub fn cors_layer(origins: &[String]) -> std::result::Result<CorsLayer, ConfigError> {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any).allow_headers(Any));
    }

    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).map_err(|e| ConfigError::invalid("server", format!("bad CORS origin {o}: {e}"))))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .allow_credentials(true))
}

/// Build the HTTP router for the service.
///
/// # Errors
/// Returns `ConfigError::Invalid` for malformed CORS origins.
pub fn router(service: Arc<TranslationService>, cors_origins: &[String]) -> std::result::Result<Router, ConfigError> {
    Ok(Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/languages", get(handlers::languages))
        .route("/translate", post(handlers::translate))
        .layer(cors_layer(cors_origins)?)
        .layer(RequestLoggerLayer)
        .with_state(service))
}

/// Start the Polyglot HTTP server and block until Ctrl-C.
///
/// # Errors
/// Returns an error if the service cannot be built or the address cannot be bound.
pub async fn run(config: &Config) -> Result<()> {
    let service = Arc::new(TranslationService::from_config(config)?);
    serve(service, config).await
}

/// Serve `service` until Ctrl-C, then release its models.
///
/// # Errors
/// Returns an error if the address cannot be bound or serving fails.
pub async fn serve(service: Arc<TranslationService>, config: &Config) -> Result<()> {
    let app = router(Arc::clone(&service), &config.server.cors_origins)?;

    service.cache().start_cleanup_task();
    let preload = config.preload_pairs()?;
    if !preload.is_empty() {
        service.preload(preload);
    }

    let listener = bind(&config.server).await?;
    let addr = listener.local_addr()?;
    info!(%addr, backend = %service.backend(), "Polyglot server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    service.shutdown();
    info!("Polyglot server stopped");
    Ok(())
}

/// Bind the listen socket. The host may be a name, e.g. `localhost`.
///
/// # Errors
/// Returns an error if the host does not resolve or the port is taken.
pub async fn bind(server: &ServerConfig) -> Result<TcpListener> {
    let listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
    Ok(listener)
}

/// Wait for Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
