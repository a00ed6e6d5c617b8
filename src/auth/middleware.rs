//! Authentication Middleware
//! Mission: Protect API endpoints with JWT validation, role allow-lists and freshness checks
//!
//! Route composition must put `authenticate` outside `authorize` and
//! `require_fresh_token`. With axum's `route_layer`, the layer added last
//! runs first.

use crate::auth::jwt::is_fresh;
use crate::auth::models::{Account, Admin, Candidate, Enterprise, Role};
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// The authenticated caller, attached to request extensions by `authenticate`
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
    /// `iat` of the presented access token
    pub issued_at: i64,
    pub account: Account,
}

impl Identity {
    pub fn candidate(&self) -> Option<&Candidate> {
        match &self.account {
            Account::Candidate(c) => Some(c),
            _ => None,
        }
    }

    pub fn enterprise(&self) -> Option<&Enterprise> {
        match &self.account {
            Account::Enterprise(e) => Some(e),
            _ => None,
        }
    }

    pub fn admin(&self) -> Option<&Admin> {
        match &self.account {
            Account::Admin(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Per-route role allow-list, passed as middleware state to `authorize`
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

impl AllowedRoles {
    pub const CANDIDATE: AllowedRoles = AllowedRoles(&[Role::Candidate]);
    pub const ENTERPRISE: AllowedRoles = AllowedRoles(&[Role::Enterprise]);
    pub const ADMIN: AllowedRoles = AllowedRoles(&[Role::Admin, Role::SuperAdmin]);
    pub const ENTERPRISE_OR_ADMIN: AllowedRoles =
        AllowedRoles(&[Role::Enterprise, Role::Admin, Role::SuperAdmin]);
    pub const ANY: AllowedRoles = AllowedRoles(&[
        Role::Candidate,
        Role::Enterprise,
        Role::Admin,
        Role::SuperAdmin,
    ]);

    pub fn permits(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or(AuthError::MissingToken)
}

/// Authentication gate: bearer token -> verified claims -> active account -> `Identity`
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;

    let claims = state.jwt.verify(&token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        AuthError::InvalidToken
    })?;

    let account_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    // The token's role picks the table to search
    let account = state
        .store
        .find_account(claims.role.kind(), &account_id)
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .ok_or_else(|| {
            warn!("❌ Token for unknown {} {}", claims.role, account_id);
            AuthError::AccountNotFound
        })?;

    if account.role() != claims.role {
        warn!(
            "❌ Token role {} does not match account {} ({})",
            claims.role,
            account_id,
            account.role()
        );
        return Err(AuthError::InvalidToken);
    }

    if !account.is_active() {
        warn!("⛔ Inactive account attempted access: {}", account_id);
        return Err(AuthError::AccountInactive);
    }

    if let Some(valid_after) = account.tokens_valid_after() {
        if claims.iat < valid_after {
            debug!("Token for {} predates password change", account_id);
            return Err(AuthError::TokenRevoked);
        }
    }

    req.extensions_mut().insert(Identity {
        id: account_id,
        role: claims.role,
        issued_at: claims.iat,
        account,
    });

    Ok(next.run(req).await)
}

/// Authorization gate: the attached role must be in the allow-list
pub async fn authorize(
    State(allowed): State<AllowedRoles>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let role = req
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.role)
        .ok_or(AuthError::Unauthenticated)?;

    if !allowed.permits(role) {
        warn!("🚫 Role {} denied on {}", role, req.uri().path());
        return Err(AuthError::Forbidden(role));
    }

    Ok(next.run(req).await)
}

/// Freshness gate for sensitive operations: re-verifies the bearer token and
/// requires it to have been issued within the last 15 minutes
pub async fn require_fresh_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;
    let claims = state
        .jwt
        .verify(&token)
        .map_err(|_| AuthError::InvalidToken)?;

    if !is_fresh(&claims, Utc::now()) {
        debug!("Stale token for {} on {}", claims.sub, req.uri().path());
        return Err(AuthError::StaleToken);
    }

    Ok(next.run(req).await)
}

/// Auth error types
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    AccountNotFound,
    AccountInactive,
    /// Issued before the account's last password change
    TokenRevoked,
    /// No identity attached; the authentication gate did not run
    Unauthenticated,
    Forbidden(Role),
    StaleToken,
    Internal(String),
}

impl AuthError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Not authorized, no token".to_string(),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Not authorized, invalid or expired token".to_string(),
            ),
            AuthError::AccountNotFound => (
                StatusCode::UNAUTHORIZED,
                "Not authorized, account not found".to_string(),
            ),
            AuthError::AccountInactive => (
                StatusCode::UNAUTHORIZED,
                "Account is deactivated".to_string(),
            ),
            AuthError::TokenRevoked => (
                StatusCode::UNAUTHORIZED,
                "Token is no longer valid, please log in again".to_string(),
            ),
            AuthError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Not authorized".to_string(),
            ),
            AuthError::Forbidden(role) => (
                StatusCode::FORBIDDEN,
                format!("User role {} is not authorized to access this route", role),
            ),
            AuthError::StaleToken => (
                StatusCode::UNAUTHORIZED,
                "Please log in again to perform this operation".to_string(),
            ),
            AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(detail) = &self {
            error!("Authentication gate failed: {}", detail);
        }
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtHandler, PasswordHasher};
    use crate::store::{NewAdmin, NewCandidate, Store};
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request as HttpRequest},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use chrono::Duration;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "an-adequately-long-test-secret-0123456789";

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(Store::in_memory().unwrap()),
            Arc::new(JwtHandler::new(SECRET, Duration::days(30))),
            PasswordHasher::new(4).unwrap(),
            Duration::days(90),
        )
    }

    fn seed_candidate(state: &AppState) -> Uuid {
        state
            .store
            .create_candidate(NewCandidate {
                name: "A".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
                student_id: "S1".to_string(),
                program: "informatique".to_string(),
            })
            .unwrap()
            .id
    }

    async fn whoami(identity: Identity) -> String {
        identity.role.to_string()
    }

    fn app(state: AppState) -> Router {
        let admin_only = Router::new()
            .route("/admin", get(whoami))
            .route_layer(from_fn_with_state(AllowedRoles::ADMIN, authorize))
            .route_layer(from_fn_with_state(state.clone(), authenticate));

        let sensitive = Router::new()
            .route("/sensitive", get(whoami))
            .route_layer(from_fn_with_state(state.clone(), require_fresh_token))
            .route_layer(from_fn_with_state(state.clone(), authenticate));

        Router::new()
            .route("/me", get(whoami))
            .route_layer(from_fn_with_state(state.clone(), authenticate))
            .merge(admin_only)
            .merge(sensitive)
    }

    async fn call(app: Router, path: &str, token: Option<&str>) -> (StatusCode, String) {
        let mut builder = HttpRequest::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let resp = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let state = test_state();
        let (status, body) = call(app(state), "/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("no token"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let state = test_state();
        let (status, _) = call(app(state), "/me", Some("not.a.jwt")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let state = test_state();
        let id = seed_candidate(&state);
        let (token, _) = state.jwt.issue(id, Role::Candidate).unwrap();

        let (status, body) = call(app(state), "/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "candidat");
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let state = test_state();
        let id = seed_candidate(&state);
        let (token, _) = state
            .jwt
            .issue_at(id, Role::Candidate, Utc::now() - Duration::days(31))
            .unwrap();

        let (status, _) = call(app(state), "/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_for_deleted_account_is_rejected() {
        let state = test_state();
        let (token, _) = state.jwt.issue(Uuid::new_v4(), Role::Candidate).unwrap();

        let (status, body) = call(app(state), "/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("account not found"));
    }

    #[tokio::test]
    async fn test_token_role_must_match_account() {
        let state = test_state();
        let id = seed_candidate(&state);
        // Candidate id presented with an enterprise role finds nothing
        let (token, _) = state.jwt.issue(id, Role::Enterprise).unwrap();

        let (status, _) = call(app(state), "/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_inactive_account_is_rejected_with_fresh_token() {
        let state = test_state();
        let id = seed_candidate(&state);
        state
            .store
            .set_active(crate::auth::AccountKind::Candidate, &id, false)
            .unwrap();
        let (token, _) = state.jwt.issue(id, Role::Candidate).unwrap();

        let (status, body) = call(app(state), "/me", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("deactivated"));
    }

    #[tokio::test]
    async fn test_wrong_role_is_forbidden() {
        let state = test_state();
        let id = seed_candidate(&state);
        let (token, _) = state.jwt.issue(id, Role::Candidate).unwrap();

        let (status, body) = call(app(state), "/admin", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("User role candidat is not authorized"));
    }

    #[tokio::test]
    async fn test_admin_token_predating_password_change_is_rejected() {
        let state = test_state();
        let admin = state
            .store
            .create_admin(NewAdmin {
                first_name: "Ada".to_string(),
                last_name: "Root".to_string(),
                email: "ada@x.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Admin,
                permissions: vec![],
            })
            .unwrap();
        let (old_token, _) = state
            .jwt
            .issue_at(admin.id, Role::Admin, Utc::now() - Duration::minutes(5))
            .unwrap();

        let (status, _) = call(app(state.clone()), "/admin", Some(&old_token)).await;
        assert_eq!(status, StatusCode::OK);

        state
            .store
            .set_password_hash(crate::auth::AccountKind::Admin, &admin.id, "new-hash")
            .unwrap();

        let (status, body) = call(app(state.clone()), "/admin", Some(&old_token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("no longer valid"));

        let (new_token, _) = state.jwt.issue(admin.id, Role::Admin).unwrap();
        let (status, _) = call(app(state), "/admin", Some(&new_token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_freshness_gate() {
        let state = test_state();
        let id = seed_candidate(&state);

        let (recent, _) = state
            .jwt
            .issue_at(id, Role::Candidate, Utc::now() - Duration::minutes(14))
            .unwrap();
        let (status, _) = call(app(state.clone()), "/sensitive", Some(&recent)).await;
        assert_eq!(status, StatusCode::OK);

        let (stale, _) = state
            .jwt
            .issue_at(id, Role::Candidate, Utc::now() - Duration::minutes(16))
            .unwrap();
        let (status, body) = call(app(state), "/sensitive", Some(&stale)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Please log in again"));
    }

    #[tokio::test]
    async fn test_authorize_without_authentication_is_unauthorized() {
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(AllowedRoles::ADMIN, authorize));

        let resp = app
            .oneshot(HttpRequest::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_auth_error_responses() {
        assert_eq!(
            AuthError::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden(Role::Candidate).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Internal("db".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
