//! HTTP API
//! Mission: Compose every route with its gates
//!
//! Gate order per request: rate limiter (credential endpoints only),
//! authentication, authorization, freshness (sensitive operations only).

pub mod admin;
pub mod applications;
pub mod candidates;
pub mod enterprises;
pub mod extract;
pub mod jobs;

use crate::auth::{
    api::{
        login_admin, login_candidate, login_enterprise, logout, me, refresh_token,
        register_candidate, register_enterprise,
    },
    middleware::{authenticate, authorize, AllowedRoles},
};
use crate::middleware::{auth_rate_limit, AuthRateLimiter};
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Health check endpoint
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "talentbridge-backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Credential endpoints, counted by the per-IP limiter
fn credential_router(limiter: AuthRateLimiter) -> Router<AppState> {
    Router::new()
        .route("/api/auth/register/candidate", post(register_candidate))
        .route("/api/auth/register/enterprise", post(register_enterprise))
        .route("/api/auth/login/candidate", post(login_candidate))
        .route("/api/auth/login/enterprise", post(login_enterprise))
        .route("/api/auth/login/admin", post(login_admin))
        // Legacy candidate paths
        .route("/api/candidats", post(register_candidate))
        .route("/api/candidats/login", post(login_candidate))
        .route_layer(from_fn_with_state(limiter, auth_rate_limit))
}

fn session_router(state: &AppState) -> Router<AppState> {
    let current = Router::new()
        .route("/api/auth/me", get(me))
        .route_layer(from_fn_with_state(AllowedRoles::ANY, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/logout", post(logout))
        .merge(current)
}

/// Full API router. Cross-cutting layers (logging, tracing, CORS) are added by the server.
pub fn router(state: AppState, limiter: AuthRateLimiter) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(credential_router(limiter))
        .merge(session_router(&state))
        .merge(candidates::candidate_router(&state))
        .merge(enterprises::enterprise_router(&state))
        .merge(jobs::job_router(&state))
        .merge(applications::application_router(&state))
        .merge(admin::admin_router(&state))
        .with_state(state)
}
