//! Enterprise API Endpoints
//! Mission: Profile, password, own job postings and application review

use crate::api::extract::ValidatedJson;
use crate::auth::{
    api::change_password,
    middleware::{authenticate, authorize, require_fresh_token, AllowedRoles, Identity},
    models::{normalize_email, Enterprise},
};
use crate::error::ApiError;
use crate::models::{Application, Job, JobQuery, Page, UpdateApplicationStatusRequest};
use crate::state::AppState;
use crate::store::EnterpriseUpdate;
use axum::{
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEnterpriseProfileRequest {
    #[validate(length(min = 1, message = "Company name cannot be empty"))]
    pub company_name: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Industry cannot be empty"))]
    pub industry: Option<String>,
    #[validate(length(min = 1, message = "Contact person cannot be empty"))]
    pub contact_person: Option<String>,
}

fn enterprise_of(identity: &Identity) -> Result<&Enterprise, ApiError> {
    identity
        .enterprise()
        .ok_or_else(|| ApiError::Forbidden("Enterprise account required".to_string()))
}

/// Load a job and check the caller owns it
fn owned_job(state: &AppState, enterprise: &Enterprise, job_id: &Uuid) -> Result<Job, ApiError> {
    let job = state
        .store
        .get_job(job_id)?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    if job.enterprise_id != enterprise.id {
        return Err(ApiError::Forbidden(
            "This job belongs to another enterprise".to_string(),
        ));
    }
    Ok(job)
}

/// GET /api/enterprise/profile
pub async fn get_profile(identity: Identity) -> Result<Json<Enterprise>, ApiError> {
    Ok(Json(enterprise_of(&identity)?.clone()))
}

/// PUT /api/enterprise/profile
pub async fn update_profile(
    State(state): State<AppState>,
    identity: Identity,
    ValidatedJson(payload): ValidatedJson<UpdateEnterpriseProfileRequest>,
) -> Result<Json<Enterprise>, ApiError> {
    let enterprise = enterprise_of(&identity)?;

    let updated = state.store.update_enterprise(
        &enterprise.id,
        EnterpriseUpdate {
            company_name: payload.company_name.map(|n| n.trim().to_string()),
            email: payload.email.as_deref().map(normalize_email),
            industry: payload.industry.map(|i| i.trim().to_string()),
            contact_person: payload.contact_person.map(|c| c.trim().to_string()),
        },
    )?;

    Ok(Json(updated))
}

/// GET /api/enterprise/jobs - every posting of the caller, any status
pub async fn my_jobs(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<JobQuery>,
) -> Result<Json<Page<Job>>, ApiError> {
    let enterprise = enterprise_of(&identity)?;
    let (jobs, total) = state.store.search_jobs(&query, Some(&enterprise.id))?;
    Ok(Json(Page::new(jobs, total, query.page(), query.limit())))
}

/// GET /api/enterprise/jobs/:id/applications
pub async fn job_applications(
    State(state): State<AppState>,
    identity: Identity,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<Application>>, ApiError> {
    let enterprise = enterprise_of(&identity)?;
    let job = owned_job(&state, enterprise, &job_id)?;
    Ok(Json(state.store.list_applications_for_job(&job.id)?))
}

/// PUT /api/enterprise/applications/:id/status
pub async fn update_application_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(application_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateApplicationStatusRequest>,
) -> Result<Json<Application>, ApiError> {
    let enterprise = enterprise_of(&identity)?;
    let application = state
        .store
        .get_application(&application_id)?
        .ok_or_else(|| ApiError::NotFound("Application not found".to_string()))?;
    owned_job(&state, enterprise, &application.job_id)?;

    let updated = state
        .store
        .set_application_status(&application.id, payload.status)?;
    info!(
        "📋 Application {} marked {} by {}",
        updated.id,
        updated.status.as_str(),
        enterprise.company_name
    );
    Ok(Json(updated))
}

/// Enterprise-only routes under /api/enterprise
pub fn enterprise_router(state: &AppState) -> Router<AppState> {
    let sensitive = Router::new()
        .route("/api/enterprise/password", put(change_password))
        .route_layer(from_fn_with_state(state.clone(), require_fresh_token));

    Router::new()
        .route("/api/enterprise/profile", get(get_profile).put(update_profile))
        .route("/api/enterprise/jobs", get(my_jobs))
        .route("/api/enterprise/jobs/:id/applications", get(job_applications))
        .route(
            "/api/enterprise/applications/:id/status",
            put(update_application_status),
        )
        .merge(sensitive)
        .route_layer(from_fn_with_state(AllowedRoles::ENTERPRISE, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}
