//! Middleware for observability and rate limiting.
//!
//! This module provides:
//! - Request logging with latency tracking
//! - Per-IP rate limiting for authentication endpoints

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::{
    auth_rate_limit, AuthRateLimiter, CounterStore, MemoryCounterStore, RateLimitConfig,
    RedisCounterStore,
};
