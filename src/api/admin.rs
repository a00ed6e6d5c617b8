//! Admin API Endpoints
//! Mission: Account moderation, enterprise approval and platform statistics
//!
//! Every handler checks the calling admin's permissions. Only super admins
//! may act on other admin accounts, and no admin may act on their own.

use crate::auth::{
    api::change_password,
    middleware::{authenticate, authorize, require_fresh_token, AllowedRoles, Identity},
    models::{permissions, Account, AccountKind, Admin, Enterprise, Role},
};
use crate::api::extract::ValidatedJson;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::AccountStats;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetStatusRequest {
    pub active: bool,
}

/// `{}` approves; `{"approved": false}` withdraws approval
#[derive(Debug, Deserialize, Validate)]
pub struct ApprovalRequest {
    #[serde(default = "default_approved")]
    pub approved: bool,
}

fn default_approved() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    #[serde(flatten)]
    pub accounts: AccountStats,
    pub jobs: i64,
    pub open_jobs: i64,
    pub applications: i64,
}

/// The calling admin, if it holds `permission`
fn admin_with(identity: &Identity, permission: &str) -> Result<Admin, ApiError> {
    let admin = identity
        .admin()
        .ok_or_else(|| ApiError::Forbidden("Admin account required".to_string()))?;
    if !admin.has_permission(permission) {
        warn!("🚫 Admin {} lacks permission {}", admin.email, permission);
        return Err(ApiError::Forbidden(format!(
            "Missing permission: {}",
            permission
        )));
    }
    Ok(admin.clone())
}

fn parse_kind(raw: &str) -> Result<AccountKind, ApiError> {
    AccountKind::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown account kind: {}", raw)))
}

/// Guards for actions targeting another account
fn ensure_may_target(admin: &Admin, kind: AccountKind, id: &Uuid) -> Result<(), ApiError> {
    if kind == AccountKind::Admin {
        if admin.id == *id {
            return Err(ApiError::BadRequest(
                "You cannot perform this action on your own account".to_string(),
            ));
        }
        if admin.role != Role::SuperAdmin {
            return Err(ApiError::Forbidden(
                "Only a super admin can manage admin accounts".to_string(),
            ));
        }
    }
    Ok(())
}

/// GET /api/admin/users?kind=
pub async fn list_users(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<Account>>, ApiError> {
    admin_with(&identity, permissions::MANAGE_USERS)?;

    let kinds = match query.kind.as_deref() {
        Some(raw) => vec![parse_kind(raw)?],
        None => AccountKind::ALL.to_vec(),
    };

    let mut accounts = Vec::new();
    for kind in kinds {
        accounts.extend(state.store.list_accounts(kind)?);
    }
    Ok(Json(accounts))
}

/// PUT /api/admin/users/:kind/:id/status
///
/// Deactivation also revokes the account's refresh tokens.
pub async fn set_user_status(
    State(state): State<AppState>,
    identity: Identity,
    Path((kind, id)): Path<(String, Uuid)>,
    ValidatedJson(payload): ValidatedJson<SetStatusRequest>,
) -> Result<Json<Account>, ApiError> {
    let admin = admin_with(&identity, permissions::MANAGE_USERS)?;
    let kind = parse_kind(&kind)?;
    ensure_may_target(&admin, kind, &id)?;

    let account = state.store.set_active(kind, &id, payload.active)?;
    if !payload.active {
        let revoked = state.store.revoke_account_refresh_tokens(&id)?;
        info!(
            "⛔ {} deactivated {} {} ({} sessions revoked)",
            admin.email,
            kind.as_str(),
            id,
            revoked
        );
    }
    Ok(Json(account))
}

/// DELETE /api/admin/users/:kind/:id
pub async fn delete_user(
    State(state): State<AppState>,
    identity: Identity,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let admin = admin_with(&identity, permissions::MANAGE_USERS)?;
    let kind = parse_kind(&kind)?;
    ensure_may_target(&admin, kind, &id)?;

    state.store.delete_account(kind, &id)?;
    info!("🗑️  {} deleted {} {}", admin.email, kind.as_str(), id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/enterprises/:id/approve
pub async fn approve_enterprise(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<ApprovalRequest>,
) -> Result<Json<Enterprise>, ApiError> {
    let admin = admin_with(&identity, permissions::APPROVE_ENTERPRISES)?;
    let approved = payload.approved;

    let enterprise = state.store.set_enterprise_approval(&id, approved)?;
    info!(
        "🏢 {} set approval of {} to {}",
        admin.email, enterprise.company_name, approved
    );
    Ok(Json(enterprise))
}

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<PlatformStats>, ApiError> {
    identity
        .admin()
        .ok_or_else(|| ApiError::Forbidden("Admin account required".to_string()))?;

    let accounts = state.store.account_stats()?;
    let (jobs, open_jobs) = state.store.job_counts()?;
    let applications = state.store.application_count()?;

    Ok(Json(PlatformStats {
        accounts,
        jobs,
        open_jobs,
        applications,
    }))
}

/// Admin routes under /api/admin
pub fn admin_router(state: &AppState) -> Router<AppState> {
    let sensitive = Router::new()
        .route("/api/admin/users/:kind/:id", delete(delete_user))
        .route("/api/admin/password", put(change_password))
        .route_layer(from_fn_with_state(state.clone(), require_fresh_token));

    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:kind/:id/status", put(set_user_status))
        .route("/api/admin/enterprises/:id/approve", put(approve_enterprise))
        .route("/api/admin/stats", get(stats))
        .merge(sensitive)
        .route_layer(from_fn_with_state(AllowedRoles::ADMIN, authorize))
        .route_layer(from_fn_with_state(state.clone(), authenticate))
}
