//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, events, health, reservations};
use crate::state::AppState;

/// Maximum concurrent requests for reservation endpoints. Every paid tool
/// invocation passes through these, so they get the larger share.
const RESERVATION_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for the rest of the v1 API.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts and credits (service API key auth)
/// - `GET /v1/accounts/:user_id` - Get (or lazily create) an account
/// - `GET /v1/credits/:user_id/balance` - Current balance
/// - `POST /v1/credits/grant` - Grant credits (idempotent per key)
/// - `GET /v1/credits/:user_id/purchases` - Purchase history
/// - `GET /v1/credits/:user_id/usage` - Usage history
/// - `GET /v1/credits/:user_id/usage/totals` - Per-tool usage totals
/// - `GET /v1/credits/:user_id/events` - Balance change stream (SSE)
///
/// ## Reservations (service API key auth, concurrency-limited)
/// - `POST /v1/reservations` - Reserve credits for a tool
/// - `GET /v1/reservations/:id` - Look up a reservation's state
/// - `POST /v1/reservations/:id/confirm` - Confirm and charge
/// - `POST /v1/reservations/:id/revert` - Close without charge
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let reservation_routes = Router::new()
        .route("/", post(reservations::reserve))
        .route("/:reservation_id", get(reservations::get_reservation))
        .route("/:reservation_id/confirm", post(reservations::confirm))
        .route("/:reservation_id/revert", post(reservations::revert))
        .layer(ConcurrencyLimitLayer::new(
            RESERVATION_MAX_CONCURRENT_REQUESTS,
        ));

    let api_routes = Router::new()
        // Accounts
        .route("/accounts/:user_id", get(credits::get_account))
        // Credits
        .route("/credits/:user_id/balance", get(credits::get_balance))
        .route("/credits/grant", post(credits::grant_credits))
        .route("/credits/:user_id/purchases", get(credits::list_purchases))
        .route("/credits/:user_id/usage", get(credits::list_usage))
        .route("/credits/:user_id/usage/totals", get(credits::usage_totals))
        .route("/credits/:user_id/events", get(events::balance_events))
        // Reservations (with their own concurrency limit)
        .nest("/reservations", reservation_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limits)
        .route("/health", get(health::health))
        // API v1 routes
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
