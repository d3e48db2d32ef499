//! Routing module for the MCP server

pub mod health;

use crate::state::SharedState;
use axum::{body::Body, extract::Request, middleware::Next, Router};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Creates and configures the application router with all routes and middleware
pub fn create_app_router(state: SharedState) -> Router {
    // Middleware: Log requests
    let log_layer = axum::middleware::from_fn(|req: Request<Body>, next: Next| async move {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let started = Instant::now();
        let res = next.run(req).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if res.status().is_server_error() {
            warn!(%method, %uri, status = res.status().as_u16(), elapsed_ms, "Request failed");
        } else {
            info!(%method, %uri, status = res.status().as_u16(), elapsed_ms, "Request served");
        }
        res
    });

    // Middleware: CORS (clients need to read the session header)
    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::HeaderName::from_static(
            crate::mcp::models::SESSION_HEADER,
        )]);

    // Routes
    Router::new()
        .merge(crate::mcp::routes())
        .merge(health::routes())
        .layer(log_layer)
        .layer(cors_layer)
        .with_state(state)
}
