//! Refresh token storage
//!
//! Only the SHA-256 digest of a refresh token is persisted.

use super::{parse_uuid, Store, StoreError, StoreResult};
use crate::auth::models::Role;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub account_id: Uuid,
    pub role: Role,
    pub expires_at: i64,
    pub revoked_at: Option<i64>,
}

impl RefreshTokenRecord {
    pub fn is_usable(&self, now: i64) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

impl Store {
    pub fn insert_refresh_token(
        &self,
        token_hash: &str,
        account_id: &Uuid,
        role: Role,
        expires_at: i64,
    ) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO refresh_tokens (token_hash, account_id, role, expires_at, revoked_at, created_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                token_hash,
                account_id.to_string(),
                role.as_str(),
                expires_at,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn find_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshTokenRecord>> {
        let row = self
            .conn()
            .query_row(
                "SELECT token_hash, account_id, role, expires_at, revoked_at
                 FROM refresh_tokens WHERE token_hash = ?1",
                params![token_hash],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        parse_uuid(&row.get::<_, String>(1)?)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(
            |(token_hash, account_id, role, expires_at, revoked_at)| -> StoreResult<_> {
                let role = Role::parse(&role)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown role {}", role)))?;
                Ok(RefreshTokenRecord {
                    token_hash,
                    account_id,
                    role,
                    expires_at,
                    revoked_at,
                })
            },
        )
        .transpose()
    }

    /// Revoke one token. Returns whether a live token was revoked.
    pub fn revoke_refresh_token(&self, token_hash: &str) -> StoreResult<bool> {
        let changed = self.conn().execute(
            "UPDATE refresh_tokens SET revoked_at = ?2 WHERE token_hash = ?1 AND revoked_at IS NULL",
            params![token_hash, Utc::now().timestamp()],
        )?;
        Ok(changed > 0)
    }

    /// Revoke every live token of an account; returns how many were revoked
    pub fn revoke_account_refresh_tokens(&self, account_id: &Uuid) -> StoreResult<usize> {
        let changed = self.conn().execute(
            "UPDATE refresh_tokens SET revoked_at = ?2 WHERE account_id = ?1 AND revoked_at IS NULL",
            params![account_id.to_string(), Utc::now().timestamp()],
        )?;
        Ok(changed)
    }

    /// Drop tokens that expired before `now`
    pub fn purge_expired_refresh_tokens(&self, now: i64) -> StoreResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
            params![now],
        )?;
        Ok(removed)
    }
}
