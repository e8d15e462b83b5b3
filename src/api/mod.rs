//! HTTP API. Axum server for status queries and session control.
//!
//! Serves the status snapshot, start/stop controls, session details and
//! captured KPIs. CORS is open so a browser UI on another origin can poll.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use routes::ApiState;

/// Serve the API until `shutdown` resolves.
pub async fn serve<F>(state: ApiState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/sim_data", get(routes::get_sim_data))
        .route("/api/start_simulation", post(routes::start_simulation))
        .route("/api/stop_simulation", post(routes::stop_simulation))
        .route("/api/session", get(routes::get_session))
        .route("/kpi", get(routes::get_kpi))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
