//! Authentication API Endpoints
//! Mission: Registration, login, refresh-token rotation, logout and password changes

use crate::api::extract::ValidatedJson;
use crate::auth::{
    middleware::Identity,
    models::{
        normalize_email, Account, AccountKind, AuthResponse, ChangePasswordRequest, LoginRequest,
        RefreshRequest, RegisterCandidateRequest, RegisterEnterpriseRequest,
    },
};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{NewCandidate, NewEnterprise};
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Random opaque refresh token (32 bytes, hex)
fn new_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Only this digest is stored
pub fn refresh_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issue an access token and a persisted refresh token for `account`
fn issue_session(state: &AppState, account: Account) -> Result<AuthResponse, ApiError> {
    let (token, expires_in) = state.jwt.issue(account.id(), account.role())?;

    let refresh_token = new_refresh_token();
    let refresh_expires_at = (Utc::now() + state.refresh_ttl).timestamp();
    state.store.insert_refresh_token(
        &refresh_token_digest(&refresh_token),
        &account.id(),
        account.role(),
        refresh_expires_at,
    )?;

    Ok(AuthResponse {
        account,
        token,
        refresh_token,
        expires_in,
    })
}

/// Candidate registration - POST /api/auth/register/candidate (also POST /api/candidats)
pub async fn register_candidate(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterCandidateRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let password_hash = state.hasher.hash(&payload.password).await?;

    let candidate = state.store.create_candidate(NewCandidate {
        name: payload.name.trim().to_string(),
        email: normalize_email(&payload.email),
        password_hash,
        student_id: payload.student_id.trim().to_string(),
        program: payload.program.trim().to_string(),
    })?;

    let session = issue_session(&state, Account::Candidate(candidate))?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Enterprise registration - POST /api/auth/register/enterprise
///
/// The account starts unapproved; it can log in but cannot publish jobs.
pub async fn register_enterprise(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterEnterpriseRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let password_hash = state.hasher.hash(&payload.password).await?;

    let enterprise = state.store.create_enterprise(NewEnterprise {
        company_name: payload.company_name.trim().to_string(),
        email: normalize_email(&payload.email),
        password_hash,
        industry: payload.industry.trim().to_string(),
        contact_person: payload.contact_person.trim().to_string(),
    })?;

    let session = issue_session(&state, Account::Enterprise(enterprise))?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login_as(
    state: &AppState,
    kind: AccountKind,
    payload: LoginRequest,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    info!("🔐 Login attempt: {} ({})", email, kind.as_str());

    let account = state.store.find_account_by_email(kind, &email)?;

    // Unknown email still pays for one bcrypt verification
    let valid = state
        .hasher
        .verify_or_reject(&payload.password, account.as_ref().map(|a| a.password_hash()))
        .await?;

    let account = match account {
        Some(account) if valid => account,
        _ => {
            warn!("❌ Failed login attempt: {} ({})", email, kind.as_str());
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !account.is_active() {
        warn!("⛔ Login to deactivated account: {}", email);
        return Err(ApiError::AccountInactive);
    }

    let session = issue_session(state, account)?;
    info!(
        "✅ Login successful: {} ({})",
        session.account.email(),
        session.account.role()
    );
    Ok(Json(session))
}

/// POST /api/auth/login/candidate (also POST /api/candidats/login)
pub async fn login_candidate(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    login_as(&state, AccountKind::Candidate, payload).await
}

/// POST /api/auth/login/enterprise
pub async fn login_enterprise(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    login_as(&state, AccountKind::Enterprise, payload).await
}

/// POST /api/auth/login/admin
pub async fn login_admin(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    login_as(&state, AccountKind::Admin, payload).await
}

/// Rotate a refresh token - POST /api/auth/refresh-token
///
/// Presenting an already revoked token revokes every session of its account.
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let digest = refresh_token_digest(&payload.refresh_token);
    let record = state
        .store
        .find_refresh_token(&digest)?
        .ok_or(ApiError::InvalidRefreshToken)?;

    if record.revoked_at.is_some() {
        warn!(
            "🚨 Revoked refresh token reused for {}, revoking all sessions",
            record.account_id
        );
        state.store.revoke_account_refresh_tokens(&record.account_id)?;
        return Err(ApiError::InvalidRefreshToken);
    }

    if !record.is_usable(Utc::now().timestamp()) {
        return Err(ApiError::InvalidRefreshToken);
    }

    let account = state
        .store
        .find_account(record.role.kind(), &record.account_id)?
        .ok_or(ApiError::InvalidRefreshToken)?;
    if !account.is_active() {
        return Err(ApiError::AccountInactive);
    }

    // Lost a race with a concurrent rotation of the same token
    if !state.store.revoke_refresh_token(&digest)? {
        return Err(ApiError::InvalidRefreshToken);
    }

    let session = issue_session(&state, account)?;
    info!("🔄 Refresh token rotated for {}", record.account_id);
    Ok(Json(session))
}

/// Revoke a refresh token - POST /api/auth/logout
///
/// Always 204 so the endpoint does not reveal whether the token existed.
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RefreshRequest>,
) -> Result<StatusCode, ApiError> {
    let digest = refresh_token_digest(&payload.refresh_token);
    if state.store.revoke_refresh_token(&digest)? {
        info!("👋 Session revoked");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Current account - GET /api/auth/me
pub async fn me(identity: Identity) -> Json<Account> {
    Json(identity.account)
}

/// Change own password - PUT /api/{candidats,enterprise,admin}/password
///
/// Revokes every refresh token of the account and returns a new session.
pub async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let valid = state
        .hasher
        .verify(&payload.current_password, identity.account.password_hash())
        .await?;
    if !valid {
        warn!("❌ Wrong current password for {}", identity.id);
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let kind = identity.role.kind();
    let password_hash = state.hasher.hash(&payload.new_password).await?;
    state
        .store
        .set_password_hash(kind, &identity.id, &password_hash)?;
    let revoked = state.store.revoke_account_refresh_tokens(&identity.id)?;
    info!(
        "🔑 Password changed for {} ({} sessions revoked)",
        identity.id, revoked
    );

    let account = state
        .store
        .find_account(kind, &identity.id)?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;
    Ok(Json(issue_session(&state, account)?))
}
