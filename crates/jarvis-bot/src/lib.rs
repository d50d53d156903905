pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod state;
pub mod watch;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use jarvis_core::Coordinator;

use config::BotConfig;
use state::AppState;

/// Build the Axum router and application state.
pub fn build_app(config: &BotConfig, coordinator: Arc<Coordinator>) -> (Router<()>, AppState) {
    let state = AppState::new(config, coordinator);

    // Dispatch API (behind bearer auth)
    let api_routes = Router::new()
        .route("/api/v1/dispatch", post(dispatch::dispatch))
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::bearer_auth_middleware,
        ));

    // Webhook routes use their own HMAC verification
    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/webhooks/github", post(webhooks::github::github_webhook))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}
