//! Configuration
//! Mission: Parse command line and environment into a validated runtime config
//!
//! Every setting can come from a flag or an environment variable (`.env` is
//! loaded first). `JWT_SECRET` and `DATABASE_PATH` have no defaults.

use crate::middleware::RateLimitConfig;
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;

/// HS256 secrets shorter than this are refused at startup
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Parser, Debug)]
#[command(name = "talentbridge")]
#[command(version, about = "TalentBridge job-matching API backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(Config),
    /// Provision an admin account
    CreateAdmin(CreateAdminArgs),
}

/// Server settings
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: String,

    /// HS256 signing secret (at least 32 bytes)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind_addr: SocketAddr,

    /// Access token lifetime
    #[arg(long, env = "TOKEN_TTL_DAYS", default_value_t = 30)]
    pub token_ttl_days: i64,

    /// Refresh token lifetime
    #[arg(long, env = "REFRESH_TTL_DAYS", default_value_t = 90)]
    pub refresh_ttl_days: i64,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Attempts allowed per client IP per window on credential endpoints
    #[arg(long, env = "AUTH_RATE_LIMIT_MAX", default_value_t = 10)]
    pub auth_rate_limit_max: u64,

    #[arg(long, env = "AUTH_RATE_LIMIT_WINDOW_SECS", default_value_t = 3600)]
    pub auth_rate_limit_window_secs: u64,

    /// Share rate-limit counters through Redis instead of process memory
    #[arg(long, env = "RATE_LIMIT_REDIS_URL")]
    pub rate_limit_redis_url: Option<String>,

    /// Use the first X-Forwarded-For entry as the client address
    #[arg(long, env = "TRUST_PROXY", default_value_t = false)]
    pub trust_proxy: bool,

    /// Allowed CORS origin; any origin when unset
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,
}

impl Config {
    /// Fail fast on settings the server cannot run safely with
    pub fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            bail!("DATABASE_PATH must not be empty");
        }
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!(
                "JWT_SECRET must be at least {} bytes (got {})",
                MIN_JWT_SECRET_LEN,
                self.jwt_secret.len()
            );
        }
        validate_bcrypt_cost(self.bcrypt_cost)?;
        if self.token_ttl_days <= 0 {
            bail!("TOKEN_TTL_DAYS must be positive");
        }
        if self.refresh_ttl_days <= 0 {
            bail!("REFRESH_TTL_DAYS must be positive");
        }
        if self.auth_rate_limit_max == 0 || self.auth_rate_limit_window_secs == 0 {
            bail!("AUTH_RATE_LIMIT_MAX and AUTH_RATE_LIMIT_WINDOW_SECS must be positive");
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.token_ttl_days)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_ttl_days)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.auth_rate_limit_max,
            window: std::time::Duration::from_secs(self.auth_rate_limit_window_secs),
            trust_proxy: self.trust_proxy,
        }
    }
}

/// `create-admin` arguments
#[derive(Args, Debug, Clone)]
pub struct CreateAdminArgs {
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    /// Grant the super_admin role (all permissions, may manage other admins)
    #[arg(long, default_value_t = false)]
    pub super_admin: bool,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl CreateAdminArgs {
    pub fn validate(&self) -> Result<()> {
        if !self.email.contains('@') {
            bail!("--email must be an email address");
        }
        if self.password.len() < 8 {
            bail!("Admin password must be at least 8 characters");
        }
        validate_bcrypt_cost(self.bcrypt_cost)
    }
}

fn validate_bcrypt_cost(cost: u32) -> Result<()> {
    if !(4..=31).contains(&cost) {
        bail!("BCRYPT_COST must be between 4 and 31 (got {})", cost);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn serve_config(args: &[&str]) -> Config {
        let mut argv = vec![
            "talentbridge",
            "serve",
            "--database-path",
            "talentbridge.db",
            "--jwt-secret",
            SECRET,
            "--bcrypt-cost",
            "10",
            "--auth-rate-limit-max",
            "10",
            "--auth-rate-limit-window-secs",
            "3600",
            "--token-ttl-days",
            "30",
            "--refresh-ttl-days",
            "90",
        ];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(config) => config,
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn test_serve_parses_and_validates() {
        let config = serve_config(&["--bind-addr", "127.0.0.1:8080"]);

        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.token_ttl(), chrono::Duration::days(30));
        assert_eq!(config.rate_limit().max_requests, 10);
        assert_eq!(
            config.rate_limit().window,
            std::time::Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let mut config = serve_config(&[]);
        config.jwt_secret = "too-short".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_bad_bcrypt_cost_is_rejected() {
        let mut config = serve_config(&[]);
        config.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_ttl_is_rejected() {
        let mut config = serve_config(&[]);
        config.token_ttl_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_create_admin_parses() {
        let cli = Cli::try_parse_from([
            "talentbridge",
            "create-admin",
            "--database-path",
            "talentbridge.db",
            "--email",
            "root@talentbridge.io",
            "--password",
            "Sup3rSecret!",
            "--first-name",
            "Root",
            "--last-name",
            "Admin",
            "--super-admin",
            "--bcrypt-cost",
            "10",
        ])
        .unwrap();

        let Command::CreateAdmin(args) = cli.command else {
            panic!("expected create-admin");
        };
        assert!(args.super_admin);
        assert!(args.validate().is_ok());
    }
}
