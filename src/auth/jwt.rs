//! JWT Token Handler
//! Mission: Issue and verify signed, time-bounded access tokens

use crate::auth::models::{Claims, Role};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::debug;
use uuid::Uuid;

/// Sensitive operations require a token issued within this window
pub const FRESHNESS_WINDOW_SECS: i64 = 15 * 60;

/// Why a token was refused. All variants produce the same 401 at the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::BadSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key and token lifetime
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Generate a token for an account, issued now
    pub fn issue(&self, account_id: Uuid, role: Role) -> Result<(String, i64)> {
        self.issue_at(account_id, role, Utc::now())
    }

    /// Generate a token as if issued at `issued_at`
    pub fn issue_at(
        &self,
        account_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, i64)> {
        let expiration = issued_at
            .checked_add_signed(self.ttl)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: account_id.to_string(),
            role,
            iat: issued_at.timestamp(),
            exp: expiration.timestamp(),
        };

        debug!(
            "Generating JWT for {} ({}), expires in {}d",
            account_id,
            role,
            self.ttl.num_days()
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to generate JWT")?;

        Ok((token, self.ttl.num_seconds()))
    }

    /// Validate a token's signature and expiry and extract its claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            },
        )?;

        debug!("Validated JWT for {}", decoded.claims.sub);

        Ok(decoded.claims)
    }
}

/// Whether a token is recent enough for sensitive operations at `now`
pub fn is_fresh(claims: &Claims, now: DateTime<Utc>) -> bool {
    now.timestamp() - claims.iat <= FRESHNESS_WINDOW_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> JwtHandler {
        JwtHandler::new("test-secret-key-0123456789abcdef", Duration::days(30))
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let handler = handler();
        let id = Uuid::new_v4();

        let (token, expires_in) = handler.issue(id, Role::Candidate).unwrap();
        assert!(!token.is_empty());
        assert_eq!(expires_in, 30 * 24 * 3600);

        let claims = handler.verify(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Candidate);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
    }

    #[test]
    fn test_round_trip_for_every_role() {
        let handler = handler();
        for role in [Role::Candidate, Role::Enterprise, Role::Admin, Role::SuperAdmin] {
            let id = Uuid::new_v4();
            let (token, _) = handler.issue(id, role).unwrap();
            let claims = handler.verify(&token).unwrap();
            assert_eq!(claims.sub, id.to_string());
            assert_eq!(claims.role, role);
        }
    }

    #[test]
    fn test_malformed_token_rejected() {
        let handler = handler();

        assert_eq!(handler.verify("invalid.token.here"), Err(TokenError::Malformed));
        assert_eq!(handler.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_different_secrets_reject() {
        let issuer = JwtHandler::new("secret-one-0123456789abcdef0123", Duration::days(30));
        let verifier = JwtHandler::new("secret-two-0123456789abcdef0123", Duration::days(30));

        let (token, _) = issuer.issue(Uuid::new_v4(), Role::Admin).unwrap();
        assert_eq!(verifier.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_expired_token_rejected() {
        let handler = handler();
        let issued_at = Utc::now() - Duration::days(31);

        let (token, _) = handler
            .issue_at(Uuid::new_v4(), Role::Candidate, issued_at)
            .unwrap();
        assert_eq!(handler.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_freshness_boundary() {
        let now = Utc::now();
        let claims_at = |age: Duration| Claims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Candidate,
            iat: (now - age).timestamp(),
            exp: (now + Duration::days(1)).timestamp(),
        };

        assert!(is_fresh(&claims_at(Duration::seconds(14 * 60 + 59)), now));
        assert!(is_fresh(&claims_at(Duration::minutes(15)), now));
        assert!(!is_fresh(&claims_at(Duration::seconds(15 * 60 + 1)), now));
    }
}
