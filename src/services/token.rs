// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session tokens.
//!
//! Access tokens are stateless HS256 JWTs. Refresh tokens are HS256 JWTs
//! signed with a separate secret; the one currently valid for a user is
//! stored on the user record, so issuing a new pair invalidates the previous
//! refresh token and logout revokes it.

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::models::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

/// Access token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
}

/// Refresh token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Unique per issuance
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, verifies, rotates and revokes session tokens.
#[derive(Clone)]
pub struct TokenService {
    db: Arc<dyn Database>,
    access_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_secret: Vec<u8>,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &Config, db: Arc<dyn Database>) -> Self {
        Self {
            db,
            access_secret: config.access_token_secret.clone(),
            access_ttl: config.access_token_ttl,
            refresh_secret: config.refresh_token_secret.clone(),
            refresh_ttl: config.refresh_token_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue a new pair for `user_id` and persist the refresh token,
    /// replacing whatever was stored before.
    pub async fn issue_token_pair(&self, user_id: &str) -> Result<TokenPair, AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let pair = self.sign_pair(&user)?;

        if !self
            .db
            .set_refresh_token(user_id, Some(&pair.refresh_token))
            .await?
        {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        tracing::debug!(user_id, "Issued token pair");
        Ok(pair)
    }

    /// Verify an access token's signature and expiry.
    pub fn verify_access(&self, token: Option<&str>) -> Result<AccessClaims, AppError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::MissingToken)?;

        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(&self.access_secret),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
    }

    /// Verify a refresh token's signature and expiry (not its staleness).
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AppError> {
        decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(&self.refresh_secret),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
    }

    /// Exchange a current refresh token for a new pair.
    ///
    /// A token that verifies but no longer matches the stored one has been
    /// superseded (or revoked) and fails with `StaleToken`.
    pub async fn rotate(&self, refresh_token: &str) -> Result<(User, TokenPair), AppError> {
        let claims = self.verify_refresh(refresh_token)?;

        let user = self
            .db
            .get_user(&claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let matches = user
            .refresh_token
            .as_deref()
            .map(|stored| bool::from(stored.as_bytes().ct_eq(refresh_token.as_bytes())))
            .unwrap_or(false);

        if !matches {
            tracing::warn!(user_id = %user.id, "Stale refresh token presented");
            return Err(AppError::StaleToken);
        }

        let pair = self.sign_pair(&user)?;

        if !self
            .db
            .swap_refresh_token(&user.id, refresh_token, &pair.refresh_token)
            .await?
        {
            tracing::warn!(user_id = %user.id, "Refresh token rotated concurrently");
            return Err(AppError::StaleToken);
        }

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok((user, pair))
    }

    /// Clear the stored refresh token. Revoking twice is not an error.
    pub async fn revoke(&self, user_id: &str) -> Result<(), AppError> {
        if !self.db.set_refresh_token(user_id, None).await? {
            tracing::debug!(user_id, "Revoke for unknown user ignored");
        }
        Ok(())
    }

    fn sign_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = unix_now()?;

        let access = AccessClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            iat: now,
            exp: now + self.access_ttl.as_secs() as usize,
        };

        let refresh = RefreshClaims {
            sub: user.id.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.refresh_ttl.as_secs() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(
            &header,
            &access,
            &EncodingKey::from_secret(&self.access_secret),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
        let refresh_token = encode(
            &header,
            &refresh,
            &EncodingKey::from_secret(&self.refresh_secret),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

fn unix_now() -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_secs() as usize)
}
