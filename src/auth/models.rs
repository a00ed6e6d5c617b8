//! Authentication Models
//! Mission: Define accounts, roles, token claims and auth request/response bodies

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Roles carried in access tokens and checked by the authorization gate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "candidat", alias = "candidate")]
    Candidate,
    #[serde(rename = "entreprise", alias = "enterprise")]
    Enterprise,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "super_admin")]
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidat",
            Role::Enterprise => "entreprise",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "candidat" | "candidate" => Some(Role::Candidate),
            "entreprise" | "enterprise" => Some(Role::Enterprise),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Which account table holds accounts with this role
    pub fn kind(&self) -> AccountKind {
        match self {
            Role::Candidate => AccountKind::Candidate,
            Role::Enterprise => AccountKind::Enterprise,
            Role::Admin | Role::SuperAdmin => AccountKind::Admin,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three account variants, each persisted in its own table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Candidate,
    Enterprise,
    Admin,
}

impl AccountKind {
    pub const ALL: [AccountKind; 3] = [
        AccountKind::Candidate,
        AccountKind::Enterprise,
        AccountKind::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Candidate => "candidate",
            AccountKind::Enterprise => "enterprise",
            AccountKind::Admin => "admin",
        }
    }

    /// Accepts singular/plural and the French spellings used by the frontend
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().trim_end_matches('s') {
            "candidate" | "candidat" => Some(AccountKind::Candidate),
            "enterprise" | "entreprise" => Some(AccountKind::Enterprise),
            "admin" => Some(AccountKind::Admin),
            _ => None,
        }
    }
}

/// Candidate account (self-registered student)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    #[serde(rename = "userType")]
    pub role: Role,
    pub student_id: String,
    pub program: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Enterprise account (self-registered, pending admin approval)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enterprise {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub company_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "userType")]
    pub role: Role,
    pub industry: String,
    pub contact_person: String,
    pub is_approved: bool,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    Active,
    Inactive,
    Suspended,
}

impl AdminStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminStatus::Active => "active",
            AdminStatus::Inactive => "inactive",
            AdminStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AdminStatus::Active),
            "inactive" => Some(AdminStatus::Inactive),
            "suspended" => Some(AdminStatus::Suspended),
            _ => None,
        }
    }
}

/// Admin account (provisioned out-of-band)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "userType")]
    pub role: Role,
    pub permissions: Vec<String>,
    pub status: AdminStatus,
    /// Unix seconds of the last password change; older tokens are refused
    pub password_changed_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Permissions an admin may hold. Super admins implicitly hold all of them.
pub mod permissions {
    pub const MANAGE_USERS: &str = "manage_users";
    pub const MANAGE_JOBS: &str = "manage_jobs";
    pub const APPROVE_ENTERPRISES: &str = "approve_enterprises";

    pub const ALL: [&str; 3] = [MANAGE_USERS, MANAGE_JOBS, APPROVE_ENTERPRISES];
}

impl Admin {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.role == Role::SuperAdmin || self.permissions.iter().any(|p| p == permission)
    }
}

/// Any persisted account
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Account {
    Candidate(Candidate),
    Enterprise(Enterprise),
    Admin(Admin),
}

impl Account {
    pub fn id(&self) -> Uuid {
        match self {
            Account::Candidate(c) => c.id,
            Account::Enterprise(e) => e.id,
            Account::Admin(a) => a.id,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Account::Candidate(c) => &c.email,
            Account::Enterprise(e) => &e.email,
            Account::Admin(a) => &a.email,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Account::Candidate(c) => c.role,
            Account::Enterprise(e) => e.role,
            Account::Admin(a) => a.role,
        }
    }

    pub fn kind(&self) -> AccountKind {
        self.role().kind()
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Account::Candidate(c) => &c.password_hash,
            Account::Enterprise(e) => &e.password_hash,
            Account::Admin(a) => &a.password_hash,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Account::Candidate(c) => c.active,
            Account::Enterprise(e) => e.active,
            Account::Admin(a) => a.status == AdminStatus::Active,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Account::Candidate(c) => c.name.clone(),
            Account::Enterprise(e) => e.company_name.clone(),
            Account::Admin(a) => format!("{} {}", a.first_name, a.last_name),
        }
    }

    /// Tokens issued before this instant (unix seconds) are no longer accepted
    pub fn tokens_valid_after(&self) -> Option<i64> {
        match self {
            Account::Admin(a) => a.password_changed_at,
            _ => None,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // subject (account id)
    pub role: Role,
    pub iat: i64, // issued at, unix seconds
    pub exp: i64, // expiration, unix seconds
}

/// Candidate registration body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCandidateRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Student ID is required"))]
    pub student_id: String,
    #[validate(length(min = 1, message = "Program is required"))]
    pub program: String,
}

/// Enterprise registration body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterEnterpriseRequest {
    #[validate(length(min = 1, message = "Company name is required"))]
    pub company_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Industry is required"))]
    pub industry: String,
    #[validate(length(min = 1, message = "Contact person is required"))]
    pub contact_person: String,
}

/// Login request body
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Login/registration response: the account plus its session tokens
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(flatten)]
    pub account: Account,
    pub token: String,
    pub refresh_token: String,
    pub expires_in: i64, // seconds until access token expiration
}

/// Lower-cases and trims an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            id: Uuid::new_v4(),
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Candidate,
            student_id: "S1".to_string(),
            program: "informatique".to_string(),
            active: true,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Candidate).unwrap(), r#""candidat""#);
        assert_eq!(serde_json::to_string(&Role::Enterprise).unwrap(), r#""entreprise""#);

        let candidate: Role = serde_json::from_str(r#""candidate""#).unwrap();
        assert_eq!(candidate, Role::Candidate);
        let enterprise: Role = serde_json::from_str(r#""enterprise""#).unwrap();
        assert_eq!(enterprise, Role::Enterprise);
        assert!(serde_json::from_str::<Role>(r#""root""#).is_err());
    }

    #[test]
    fn test_role_string_conversion() {
        assert_eq!(Role::parse("CANDIDATE"), Some(Role::Candidate));
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("invalid"), None);
        assert_eq!(Role::SuperAdmin.kind(), AccountKind::Admin);
    }

    #[test]
    fn test_account_kind_parse() {
        assert_eq!(AccountKind::parse("candidats"), Some(AccountKind::Candidate));
        assert_eq!(AccountKind::parse("entreprises"), Some(AccountKind::Enterprise));
        assert_eq!(AccountKind::parse("admins"), Some(AccountKind::Admin));
        assert_eq!(AccountKind::parse("jobs"), None);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let account = Account::Candidate(candidate());
        let json = serde_json::to_value(&account).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["userType"], "candidat");
        assert_eq!(json["studentId"], "S1");
        assert!(json.get("_id").is_some());
    }

    #[test]
    fn test_auth_response_flattens_account() {
        let response = AuthResponse {
            account: Account::Candidate(candidate()),
            token: "t".to_string(),
            refresh_token: "r".to_string(),
            expires_in: 60,
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["name"], "A");
        assert_eq!(json["token"], "t");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["expiresIn"], 60);
    }

    #[test]
    fn test_admin_permissions() {
        let mut admin = Admin {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Root".to_string(),
            email: "ada@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            permissions: vec![permissions::MANAGE_JOBS.to_string()],
            status: AdminStatus::Active,
            password_changed_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        assert!(admin.has_permission(permissions::MANAGE_JOBS));
        assert!(!admin.has_permission(permissions::MANAGE_USERS));

        admin.role = Role::SuperAdmin;
        assert!(admin.has_permission(permissions::MANAGE_USERS));
    }

    #[test]
    fn test_registration_validation() {
        let ok = RegisterCandidateRequest {
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password: "Secret123!".to_string(),
            student_id: "S1".to_string(),
            program: "informatique".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterCandidateRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            ..ok
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }
}
