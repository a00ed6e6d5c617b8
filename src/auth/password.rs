//! Password Hashing
//! Mission: Salted, adaptive-cost password digests off the async executor

use anyhow::{Context, Result};
use std::sync::Arc;

/// bcrypt hasher; hashing and verification run on the blocking pool
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the email is unknown, so both failure paths cost one bcrypt run
    dummy_hash: Arc<String>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self> {
        let dummy_hash =
            bcrypt::hash("talentbridge-timing-equalizer", cost).context("Failed to hash password")?;
        Ok(Self {
            cost,
            dummy_hash: Arc::new(dummy_hash),
        })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a new plaintext password
    pub async fn hash(&self, plaintext: &str) -> Result<String> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")
    }

    /// Check a plaintext password against a stored hash
    pub async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        let plaintext = plaintext.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .context("Password verification task failed")?
            .context("Failed to verify password")
    }

    /// Verify against the stored hash if there is one, otherwise against a dummy
    /// hash and report failure.
    pub async fn verify_or_reject(&self, plaintext: &str, hash: Option<&str>) -> Result<bool> {
        match hash {
            Some(hash) => self.verify(plaintext, hash).await,
            None => {
                let _ = self.verify(plaintext, &self.dummy_hash).await?;
                Ok(false)
            }
        }
    }
}
