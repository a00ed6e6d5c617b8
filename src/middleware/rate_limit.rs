//! Rate limiting middleware for authentication endpoints.
//!
//! Fixed-window counter per client IP. The first hit of a window sets its
//! expiry; counts above the limit are rejected with 429 until it resets.
//! Counting is delegated to a [`CounterStore`]: in-memory for a single node,
//! Redis when several instances share the limit. A failing store lets the
//! request through.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of counting one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Hits in the current window, including this one
    pub count: u64,
    /// Time until the window resets
    pub reset_in: Duration,
}

/// Shared counter backend
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, opening a window of length `window` when none is live
    async fn hit(&self, key: &str, window: Duration) -> anyhow::Result<Hit>;

    /// Drop windows that have expired. Backends with native expiry do nothing.
    async fn purge_expired(&self) -> usize {
        0
    }

    fn backend(&self) -> &'static str;
}

struct Window {
    count: u64,
    expires_at: Instant,
}

/// Process-local counter store
#[derive(Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hit_at(&self, key: &str, window: Duration, now: Instant) -> Hit {
        let mut windows = self.windows.lock();
        let entry = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            expires_at: now + window,
        });

        // Reset window if expired
        if now >= entry.expires_at {
            entry.count = 0;
            entry.expires_at = now + window;
        }

        entry.count += 1;
        Hit {
            count: entry.count,
            reset_in: entry.expires_at.saturating_duration_since(now),
        }
    }

    fn purge_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| w.expires_at > now);
        before - windows.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> anyhow::Result<Hit> {
        Ok(self.hit_at(key, window, Instant::now()))
    }

    async fn purge_expired(&self) -> usize {
        self.purge_at(Instant::now())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Redis-backed counter store (INCR + EXPIRE)
pub struct RedisCounterStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> anyhow::Result<Hit> {
        let mut conn = self.conn.clone();
        let window_secs = window.as_secs().max(1);

        let count: u64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
        }

        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        let reset_in = if ttl < 0 {
            // Key lost its expiry (e.g. crash between INCR and EXPIRE)
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
            window_secs
        } else {
            ttl as u64
        };

        Ok(Hit {
            count,
            reset_in: Duration::from_secs(reset_in),
        })
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window duration.
    pub window: Duration,
    /// Take the client address from `X-Forwarded-For`.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(3600),
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u64 },
    Exceeded { retry_after: Duration },
}

/// Limiter for the authentication endpoints
#[derive(Clone)]
pub struct AuthRateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
}

impl AuthRateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { config, store }
    }

    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(MemoryCounterStore::new()))
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Count one attempt for `client`. Store failures allow the request.
    pub async fn check(&self, client: &str) -> RateDecision {
        let key = format!("auth:{}", client);
        match self.store.hit(&key, self.config.window).await {
            Ok(hit) if hit.count > self.config.max_requests => RateDecision::Exceeded {
                retry_after: hit.reset_in,
            },
            Ok(hit) => RateDecision::Allowed {
                remaining: self.config.max_requests - hit.count,
            },
            Err(e) => {
                warn!(
                    backend = self.store.backend(),
                    key = %key,
                    "Rate limit store failed, allowing request: {:#}",
                    e
                );
                RateDecision::Allowed {
                    remaining: self.config.max_requests,
                }
            }
        }
    }

    /// Periodic cleanup of old entries (call from a background task).
    pub async fn cleanup(&self) -> usize {
        self.store.purge_expired().await
    }
}

/// Client address: first `X-Forwarded-For` entry when proxies are trusted,
/// otherwise the socket peer.
pub fn client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }
    connect_info.map(|ConnectInfo(addr)| addr.ip())
}

/// Rate limiting middleware function.
pub async fn auth_rate_limit(
    State(limiter): State<AuthRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
        limiter.config.trust_proxy,
    )
    .map(|ip| ip.to_string())
    .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&client).await {
        RateDecision::Allowed { remaining } => {
            debug!(client = %client, remaining, "Auth attempt counted");
            next.run(request).await
        }
        RateDecision::Exceeded { retry_after } => {
            warn!(
                client = %client,
                retry_after_secs = retry_after.as_secs(),
                "Auth rate limit exceeded"
            );

            let body = serde_json::json!({
                "success": false,
                "message": "Too many authentication attempts, please try again later",
                "retryAfterSeconds": retry_after.as_secs(),
            });

            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::connect_info::MockConnectInfo, middleware::from_fn_with_state, routing::post, Router};
    use tower::ServiceExt;

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn hit(&self, _key: &str, _window: Duration) -> anyhow::Result<Hit> {
            anyhow::bail!("connection refused")
        }

        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    fn limiter(max_requests: u64) -> AuthRateLimiter {
        AuthRateLimiter::in_memory(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(3600),
            trust_proxy: false,
        })
    }

    #[tokio::test]
    async fn test_tenth_allowed_eleventh_rejected() {
        let limiter = limiter(10);

        for i in 1..=10 {
            match limiter.check("10.0.0.1").await {
                RateDecision::Allowed { remaining } => assert_eq!(remaining, 10 - i),
                other => panic!("attempt {} should be allowed, got {:?}", i, other),
            }
        }

        match limiter.check("10.0.0.1").await {
            RateDecision::Exceeded { retry_after } => {
                assert!(retry_after <= Duration::from_secs(3600))
            }
            other => panic!("11th attempt should be rejected, got {:?}", other),
        }

        // Other clients are counted separately
        assert!(matches!(
            limiter.check("10.0.0.2").await,
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(60);
        let start = Instant::now();

        assert_eq!(store.hit_at("auth:ip", window, start).count, 1);
        assert_eq!(store.hit_at("auth:ip", window, start).count, 2);

        let later = start + Duration::from_secs(61);
        let hit = store.hit_at("auth:ip", window, later);
        assert_eq!(hit.count, 1);
        assert_eq!(hit.reset_in, window);
    }

    #[test]
    fn test_purge_drops_expired_windows() {
        let store = MemoryCounterStore::new();
        let start = Instant::now();
        store.hit_at("auth:a", Duration::from_secs(10), start);
        store.hit_at("auth:b", Duration::from_secs(100), start);

        assert_eq!(store.purge_at(start + Duration::from_secs(20)), 1);
        assert_eq!(store.windows.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_broken_store_fails_open() {
        let limiter = AuthRateLimiter::new(RateLimitConfig::default(), Arc::new(BrokenStore));

        for _ in 0..20 {
            assert!(matches!(
                limiter.check("10.0.0.1").await,
                RateDecision::Allowed { .. }
            ));
        }
    }

    #[test]
    fn test_client_ip_resolution() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));

        assert_eq!(
            client_ip(&headers, Some(&peer), true),
            Some("203.0.113.7".parse().unwrap())
        );
        // Header ignored unless proxies are trusted
        assert_eq!(
            client_ip(&headers, Some(&peer), false),
            Some("127.0.0.1".parse().unwrap())
        );
        assert_eq!(client_ip(&HeaderMap::new(), None, false), None);
    }

    #[tokio::test]
    async fn test_middleware_returns_429_with_retry_after() {
        let app = Router::new()
            .route("/login", post(|| async { "ok" }))
            .route_layer(from_fn_with_state(limiter(2), auth_rate_limit))
            .layer(MockConnectInfo(SocketAddr::from(([192, 168, 1, 9], 5555))));

        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/login")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(resp.headers().contains_key("retry-after"));
    }
}
