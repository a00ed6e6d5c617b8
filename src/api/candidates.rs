//! Candidate API Endpoints
//! Mission: Profile, password and application history for candidates

use crate::api::extract::ValidatedJson;
use crate::auth::{
    api::change_password,
    middleware::{authenticate, authorize, require_fresh_token, AllowedRoles, Identity},
    models::{normalize_email, Candidate},
};
use crate::error::ApiError;
use crate::models::Application;
use crate::state::AppState;
use crate::store::CandidateUpdate;
use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

/// Profile update body; omitted fields stay unchanged
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCandidateProfileRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Student ID cannot be empty"))]
    pub student_id: Option<String>,
    #[validate(length(min = 1, message = "Program cannot be empty"))]
    pub program: Option<String>,
}

fn candidate_of(identity: &Identity) -> Result<&Candidate, ApiError> {
    identity
        .candidate()
        .ok_or_else(|| ApiError::Forbidden("Candidate account required".to_string()))
}

/// GET /api/candidats/profile
pub async fn get_profile(identity: Identity) -> Result<Json<Candidate>, ApiError> {
    Ok(Json(candidate_of(&identity)?.clone()))
}

/// PUT /api/candidats/profile
pub async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    ValidatedJson(payload): ValidatedJson<UpdateCandidateProfileRequest>,
) -> Result<Json<Candidate>, ApiError> {
    let candidate = candidate_of(&identity)?;

    let updated = state.store.update_candidate(
        &candidate.id,
        CandidateUpdate {
            name: payload.name.map(|n| n.trim().to_string()),
            email: payload.email.as_deref().map(normalize_email),
            student_id: payload.student_id.map(|s| s.trim().to_string()),
            program: payload.program.map(|p| p.trim().to_string()),
        },
    )?;

    Ok(Json(updated))
}

/// GET /api/candidats/applications
pub async fn my_applications(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<Application>>, ApiError> {
    let candidate = candidate_of(&identity)?;
    Ok(Json(
        state.store.list_applications_for_candidate(&candidate.id)?,
    ))
}

/// Candidate-only routes under /api/candidats
pub fn candidate_router(state: &AppState) -> Router<AppState> {
    let sensitive = Router::new()
        .route("/api/candidats/password", put(change_password))
        .route_layer(from_fn_with_state(state.clone(), require_fresh_token));

    Router::new()
        .route("/api/candidats/profile", get(get_profile).put(update_profile))
        .route("/api/candidats/applications", get(my_applications))
        .merge(sensitive)
        .route_layer(from_fn_with_state(AllowedRoles::CANDIDATE, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}
