//! Server bootstrap
//! Mission: Wire store, token handler, hasher and limiter into a running axum server

use crate::api;
use crate::auth::{models::normalize_email, JwtHandler, PasswordHasher, Role};
use crate::config::{Config, CreateAdminArgs};
use crate::middleware::{
    request_logging, AuthRateLimiter, CounterStore, MemoryCounterStore, RedisCounterStore,
};
use crate::state::AppState;
use crate::store::{NewAdmin, Store};
use anyhow::{Context, Result};
use axum::{http::HeaderValue, middleware::from_fn, Router};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(600);

/// Pick the counter store: Redis when configured and reachable, otherwise memory
async fn counter_store(config: &Config) -> Arc<dyn CounterStore> {
    if let Some(url) = config.rate_limit_redis_url.as_deref() {
        match RedisCounterStore::connect(url).await {
            Ok(store) => {
                info!("🧮 Auth rate limit counters in Redis");
                return Arc::new(store);
            }
            Err(e) => {
                warn!(
                    "Redis unavailable for rate limiting ({:#}), using in-memory counters",
                    e
                );
            }
        }
    }
    Arc::new(MemoryCounterStore::new())
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    match origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .with_context(|| format!("Invalid CORS_ORIGIN: {}", origin))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        None => Ok(CorsLayer::permissive()),
    }
}

/// Build shared state from a validated config
pub async fn build_state(config: &Config) -> Result<(AppState, AuthRateLimiter)> {
    let store = Store::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;
    let jwt = JwtHandler::new(&config.jwt_secret, config.token_ttl());
    let hasher = PasswordHasher::new(config.bcrypt_cost)?;

    let state = AppState::new(Arc::new(store), Arc::new(jwt), hasher, config.refresh_ttl());
    let limiter = AuthRateLimiter::new(config.rate_limit(), counter_store(config).await);
    Ok((state, limiter))
}

/// Router with the cross-cutting layers applied
pub fn app(state: AppState, limiter: AuthRateLimiter, cors: CorsLayer) -> Router {
    api::router(state, limiter)
        .layer(from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Periodically drop expired refresh tokens and rate-limit windows
fn spawn_maintenance(state: AppState, limiter: AuthRateLimiter) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            ticker.tick().await;
            match state
                .store
                .purge_expired_refresh_tokens(Utc::now().timestamp())
            {
                Ok(0) => {}
                Ok(n) => info!("🧹 Purged {} expired refresh tokens", n),
                Err(e) => warn!("Refresh token purge failed: {}", e),
            }
            let purged = limiter.cleanup().await;
            if purged > 0 {
                info!("🧹 Purged {} rate limit windows", purged);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}

/// `serve` subcommand
pub async fn serve(config: Config) -> Result<()> {
    config.validate()?;

    let (state, limiter) = build_state(&config).await?;
    info!(
        "🔐 Tokens valid {}d, refresh {}d, bcrypt cost {}, auth limit {}/{}s ({})",
        config.token_ttl_days,
        config.refresh_ttl_days,
        state.hasher.cost(),
        config.auth_rate_limit_max,
        config.auth_rate_limit_window_secs,
        limiter.backend()
    );

    spawn_maintenance(state.clone(), limiter.clone());
    let app = app(state, limiter, cors_layer(config.cors_origin.as_deref())?);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🚀 TalentBridge API listening on http://{}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}

/// `create-admin` subcommand
pub async fn create_admin(args: CreateAdminArgs) -> Result<()> {
    args.validate()?;

    let store = Store::open(&args.database_path)
        .with_context(|| format!("Failed to open database at {}", args.database_path))?;
    let hasher = PasswordHasher::new(args.bcrypt_cost)?;
    let password_hash = hasher.hash(&args.password).await?;

    let role = if args.super_admin {
        Role::SuperAdmin
    } else {
        Role::Admin
    };
    let admin = store
        .create_admin(NewAdmin {
            first_name: args.first_name.trim().to_string(),
            last_name: args.last_name.trim().to_string(),
            email: normalize_email(&args.email),
            password_hash,
            role,
            permissions: crate::auth::models::permissions::ALL
                .iter()
                .map(|p| p.to_string())
                .collect(),
        })
        .context("Failed to create admin")?;

    info!("✅ Admin {} ({}) created with id {}", admin.email, role, admin.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer() {
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("https://talentbridge.io")).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }

    #[tokio::test]
    async fn test_create_admin_writes_account() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        create_admin(CreateAdminArgs {
            database_path: db_path.clone(),
            email: " Root@TalentBridge.io ".to_string(),
            password: "Sup3rSecret!".to_string(),
            first_name: "Root".to_string(),
            last_name: "Admin".to_string(),
            super_admin: true,
            bcrypt_cost: 4,
        })
        .await
        .unwrap();

        let store = Store::open(&db_path).unwrap();
        let account = store
            .find_account_by_email(crate::auth::AccountKind::Admin, "root@talentbridge.io")
            .unwrap()
            .unwrap();
        assert_eq!(account.role(), Role::SuperAdmin);
    }
}
