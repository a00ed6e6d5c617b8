//! Application API Endpoints

use crate::auth::middleware::{authenticate, authorize, AllowedRoles, Identity};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::delete,
    Router,
};
use tracing::info;
use uuid::Uuid;

/// DELETE /api/applications/:id - a candidate withdraws one of their applications
pub async fn withdraw_application(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let application = state
        .store
        .get_application(&id)?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;

    if application.candidate_id != identity.id {
        return Err(ApiError::Forbidden(
            "You can only withdraw your own applications".to_string(),
        ));
    }

    state.store.delete_application(&application.id)?;
    info!("↩️  Application {} withdrawn", application.id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn application_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/applications/:id", delete(withdraw_application))
        .route_layer(from_fn_with_state(AllowedRoles::CANDIDATE, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}
