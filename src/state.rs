//! Shared application state handed to every handler and auth gate

use crate::auth::{JwtHandler, PasswordHasher};
use crate::store::Store;
use chrono::Duration;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub jwt: Arc<JwtHandler>,
    pub hasher: PasswordHasher,
    /// Lifetime of refresh tokens
    pub refresh_ttl: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        jwt: Arc<JwtHandler>,
        hasher: PasswordHasher,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            store,
            jwt,
            hasher,
            refresh_ttl,
        }
    }
}
