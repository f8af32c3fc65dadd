// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User model for storage and API.
//!
//! `User` is the stored document and holds the credential hash and the
//! current refresh token. Everything sent to a caller goes through one of
//! the projections below, none of which has a field for either secret.

use crate::models::MediaAsset;
use serde::{Deserialize, Serialize};

/// User account stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Random UUID (also used as document ID)
    pub id: String,
    /// Unique, stored trimmed and lower-cased
    pub username: String,
    /// Unique, stored trimmed and lower-cased
    pub email: String,
    pub full_name: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub avatar: Option<MediaAsset>,
    pub cover_image: Option<MediaAsset>,
    /// The single active refresh token, if logged in
    pub refresh_token: Option<String>,
    /// Watched video IDs, oldest first
    #[serde(default)]
    pub watch_history: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.as_ref().map(|a| a.url.clone()),
            cover_image: self.cover_image.as_ref().map(|a| a.url.clone()),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    pub fn owner_summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.as_ref().map(|a| a.url.clone()),
        }
    }
}

/// User projection returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Owner details embedded in video responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub avatar: Option<String>,
}

/// Channel view: public profile plus subscription aggregates, relative to
/// the viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub subscribers_count: u64,
    pub channels_subscribed_to_count: u64,
    pub is_subscribed: bool,
}
