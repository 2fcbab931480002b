//! Syncline Gateway Server Entry Point
//!
//! Bootstraps configuration, seeds the development catalog, and starts the
//! Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;

use syncline_api::catalog::InMemoryCatalog;
use syncline_api::config::GatewayConfig;
use syncline_api::error::{ApiError, ApiResult};
use syncline_api::routes::GatewayRouterBuilder;
use syncline_api::state::AppState;
use syncline_api::telemetry::init_tracing;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing();

    let config = GatewayConfig::from_env();

    // In-memory catalog for development; a real deployment substitutes its
    // own CatalogSource behind the same trait.
    let catalog = Arc::new(InMemoryCatalog::new());
    if std::env::var("SYNCLINE_SEED_DEMO")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        catalog.seed_demo();
        tracing::info!(entities = catalog.len(), "Seeded demo catalog");
    }

    let state = AppState::new(catalog, config);
    let sweeper = state.spawn_cache_sweeper();

    let app: Router = GatewayRouterBuilder::new(state)?.build();

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Syncline gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    sweeper.abort();
    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("SYNCLINE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("SYNCLINE_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
