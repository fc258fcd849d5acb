//! Route definitions
//!
//! All API routes organized by domain and mounted under /api/v1.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{events, health, threads};
use crate::state::AppState;

/// Create the main API router (health routes are merged separately)
pub fn create_router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_routes())
}

/// Health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

/// API v1 routes
fn api_v1_routes() -> Router<AppState> {
    Router::new().merge(event_routes()).merge(thread_routes())
}

/// Ingress event routes
fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events/direct-message", post(events::direct_message))
        .route("/events/staff-command", post(events::staff_command))
        .route("/events/staff-message", post(events::staff_message))
}

/// Thread query routes
fn thread_routes() -> Router<AppState> {
    Router::new()
        .route("/threads", get(threads::list_open_threads))
        .route("/threads/:channel_id", get(threads::get_thread))
        .route("/users/:user_id/thread", get(threads::get_user_thread))
}
