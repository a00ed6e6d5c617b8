//! TalentBridge Backend Library
//!
//! Job-matching REST API: candidates, enterprises and admins authenticate with
//! role-scoped JWTs; enterprises publish jobs and candidates apply to them.
//! Exposes every module for the binary and the integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod server;
pub mod state;
pub mod store;

pub use error::ApiError;
pub use state::AppState;
