//! Job API Endpoints
//! Mission: Public job search plus posting management and applications

use crate::api::extract::ValidatedJson;
use crate::auth::{
    middleware::{authenticate, authorize, AllowedRoles, Identity},
    models::{permissions, Account},
};
use crate::error::ApiError;
use crate::models::{
    Application, ApplyRequest, CreateJobRequest, Job, JobQuery, JobStatus, Page, UpdateJobRequest,
};
use crate::state::AppState;
use crate::store::NewJob;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

/// Whether `identity` may change or remove `job`
fn ensure_can_manage(identity: &Identity, job: &Job) -> Result<(), ApiError> {
    match &identity.account {
        Account::Enterprise(e) if e.id == job.enterprise_id => Ok(()),
        Account::Admin(a) if a.has_permission(permissions::MANAGE_JOBS) => Ok(()),
        _ => {
            warn!("🚫 {} may not manage job {}", identity.id, job.id);
            Err(ApiError::Forbidden(
                "You are not allowed to manage this job".to_string(),
            ))
        }
    }
}

fn load_job(state: &AppState, id: &Uuid) -> Result<Job, ApiError> {
    state
        .store
        .get_job(id)?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))
}

/// GET /api/jobs - open jobs unless a status filter is given
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(mut query): Query<JobQuery>,
) -> Result<Json<Page<Job>>, ApiError> {
    query.status.get_or_insert(JobStatus::Open);
    let (jobs, total) = state.store.search_jobs(&query, None)?;
    Ok(Json(Page::new(jobs, total, query.page(), query.limit())))
}

/// GET /api/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(load_job(&state, &id)?))
}

/// POST /api/jobs
///
/// Enterprises post for themselves once approved. Admins holding
/// `manage_jobs` post on behalf of the enterprise named in the body.
pub async fn create_job(
    State(state): State<AppState>,
    identity: Identity,
    ValidatedJson(payload): ValidatedJson<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let enterprise_id = match &identity.account {
        Account::Enterprise(enterprise) => {
            if !enterprise.is_approved {
                return Err(ApiError::Forbidden(
                    "Your enterprise account is awaiting approval".to_string(),
                ));
            }
            enterprise.id
        }
        Account::Admin(admin) => {
            if !admin.has_permission(permissions::MANAGE_JOBS) {
                return Err(ApiError::Forbidden(
                    "Missing permission: manage_jobs".to_string(),
                ));
            }
            payload.enterprise_id.ok_or_else(|| {
                ApiError::BadRequest("enterpriseId is required when posting as admin".to_string())
            })?
        }
        Account::Candidate(_) => {
            return Err(ApiError::Forbidden(
                "Candidates cannot post jobs".to_string(),
            ))
        }
    };

    let job = state.store.create_job(NewJob {
        enterprise_id,
        title: payload.title.trim().to_string(),
        description: payload.description.trim().to_string(),
        location: payload.location.trim().to_string(),
        job_type: payload.job_type,
        skills: payload
            .skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        salary: payload.salary,
    })?;

    Ok((StatusCode::CREATED, Json(job)))
}

/// PUT /api/jobs/:id
pub async fn update_job(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateJobRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = load_job(&state, &id)?;
    ensure_can_manage(&identity, &job)?;

    let updated = state.store.update_job(&job.id, payload)?;
    info!("✏️  Job {} updated by {}", updated.id, identity.id);
    Ok(Json(updated))
}

/// DELETE /api/jobs/:id
pub async fn delete_job(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let job = load_job(&state, &id)?;
    ensure_can_manage(&identity, &job)?;

    state.store.delete_job(&job.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/jobs/:id/apply
pub async fn apply(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let candidate = identity
        .candidate()
        .ok_or_else(|| ApiError::Forbidden("Candidate account required".to_string()))?;

    let job = load_job(&state, &id)?;
    if job.status != JobStatus::Open {
        return Err(ApiError::BadRequest(
            "This job is no longer accepting applications".to_string(),
        ));
    }

    let cover_letter = payload
        .cover_letter
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    let application = state
        .store
        .create_application(&job.id, &candidate.id, cover_letter)?;

    Ok((StatusCode::CREATED, Json(application)))
}

/// Routes under /api/jobs
pub fn job_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:id", get(get_job));

    let manage = Router::new()
        .route("/api/jobs", post(create_job))
        .route("/api/jobs/:id", axum::routing::put(update_job).delete(delete_job))
        .route_layer(from_fn_with_state(AllowedRoles::ENTERPRISE_OR_ADMIN, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let candidates = Router::new()
        .route("/api/jobs/:id/apply", post(apply))
        .route_layer(from_fn_with_state(AllowedRoles::CANDIDATE, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    public.merge(manage).merge(candidates)
}
