//! Authentication Module
//! Mission: Role-based access with JWT tokens, bcrypt credentials and refresh rotation

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use jwt::JwtHandler;
pub use middleware::{authenticate, authorize, require_fresh_token, AllowedRoles, Identity};
pub use models::{Account, AccountKind, Claims, Role};
pub use password::PasswordHasher;
