// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account lifecycle: registration, login, session rotation, profile and
//! credential changes, avatar/cover replacement, and the read-side channel
//! and history views.
//!
//! Every operation returns projections; the stored `User` never leaves this
//! module.

use crate::db::{Database, UserUpdate};
use crate::error::AppError;
use crate::models::{
    ChannelProfile, MediaAsset, MediaKind, OwnerSummary, Subscription, User, UserProfile,
    VideoWithOwner,
};
use crate::services::password;
use crate::services::token::{TokenPair, TokenService};
use crate::services::upload::{StagedFile, UploadPipeline};
use crate::time_utils::now_rfc3339;
use std::collections::HashMap;
use std::sync::Arc;
use validator::ValidateEmail;

/// Registration input, as submitted.
#[derive(Debug, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Which image slot on the user record is being replaced.
#[derive(Debug, Clone, Copy)]
pub enum ProfileImage {
    Avatar,
    CoverImage,
}

impl ProfileImage {
    fn current(self, user: &User) -> Option<&MediaAsset> {
        match self {
            ProfileImage::Avatar => user.avatar.as_ref(),
            ProfileImage::CoverImage => user.cover_image.as_ref(),
        }
    }

    fn update(self, asset: MediaAsset) -> UserUpdate {
        match self {
            ProfileImage::Avatar => UserUpdate {
                avatar: Some(asset),
                ..Default::default()
            },
            ProfileImage::CoverImage => UserUpdate {
                cover_image: Some(asset),
                ..Default::default()
            },
        }
    }

    fn label(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "Avatar",
            ProfileImage::CoverImage => "Cover image",
        }
    }
}

/// Coordinates account operations across the database, token service and
/// upload pipeline.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<dyn Database>,
    tokens: TokenService,
    uploads: UploadPipeline,
}

/// Trim a required field, failing if nothing is left.
pub(crate) fn required_field(value: &str, name: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", name)));
    }
    Ok(trimmed.to_string())
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = required_field(email, "Email")?.to_lowercase();
    if !email.validate_email() {
        return Err(AppError::Validation("Email is invalid".to_string()));
    }
    Ok(email)
}

fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

impl AccountService {
    pub fn new(db: Arc<dyn Database>, tokens: TokenService, uploads: UploadPipeline) -> Self {
        Self {
            db,
            tokens,
            uploads,
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<User, AppError> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    /// Create an account. The avatar is required, the cover image optional.
    pub async fn register(
        &self,
        input: Registration,
        avatar: Option<StagedFile>,
        cover_image: Option<StagedFile>,
    ) -> Result<UserProfile, AppError> {
        if [
            &input.username,
            &input.email,
            &input.full_name,
            &input.password,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(AppError::Validation("All fields are required".to_string()));
        }

        let username = normalize_identifier(&input.username);
        let email = normalize_email(&input.email)?;
        let full_name = input.full_name.trim().to_string();

        let avatar =
            avatar.ok_or_else(|| AppError::Validation("Avatar image is required".to_string()))?;

        if self.db.find_user_by_username(&username).await?.is_some()
            || self.db.find_user_by_email(&email).await?.is_some()
        {
            return Err(AppError::Conflict(
                "User with this username or email already exists".to_string(),
            ));
        }

        let password_hash = password::hash(input.password).await?;

        let mut files = vec![(avatar, MediaKind::Image)];
        if let Some(cover) = cover_image {
            files.push((cover, MediaKind::Image));
        }
        let mut uploaded = self.uploads.externalize_all(files).await?.into_iter();
        let avatar = uploaded.next().map(|m| m.asset);
        let cover_image = uploaded.next().map(|m| m.asset);

        let now = now_rfc3339();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            full_name,
            password_hash,
            avatar,
            cover_image,
            refresh_token: None,
            watch_history: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        if let Err(e) = self.db.insert_user(&user).await {
            self.uploads
                .discard_all(user.avatar.iter().chain(user.cover_image.iter()))
                .await;
            return Err(e);
        }

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user.profile())
    }

    /// Authenticate by username or email. Unknown identifiers and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(UserProfile, TokenPair), AppError> {
        let identifier = normalize_identifier(identifier);
        if identifier.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Identifier and password are required".to_string(),
            ));
        }

        let user = match self.db.find_user_by_username(&identifier).await? {
            Some(user) => Some(user),
            None => self.db.find_user_by_email(&identifier).await?,
        };

        let Some(user) = user else {
            tracing::info!("Login failed: unknown identifier");
            return Err(AppError::InvalidCredentials);
        };

        if !password::verify(password.to_string(), user.password_hash.clone()).await {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let pair = self.tokens.issue_token_pair(&user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok((user.profile(), pair))
    }

    pub async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        self.tokens.revoke(user_id).await?;
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Rotate a refresh token into a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(UserProfile, TokenPair), AppError> {
        let (user, pair) = self.tokens.rotate(refresh_token).await?;
        Ok((user.profile(), pair))
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if new_password.trim().is_empty() {
            return Err(AppError::Validation("New password is required".to_string()));
        }

        let user = self.load_user(user_id).await?;

        if !password::verify(old_password.to_string(), user.password_hash).await {
            return Err(AppError::InvalidCredentials);
        }

        let update = UserUpdate {
            password_hash: Some(password::hash(new_password.to_string()).await?),
            ..Default::default()
        };
        self.db.update_user_fields(user_id, &update).await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Update email and/or full name.
    pub async fn update_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<UserProfile, AppError> {
        if email.is_none() && full_name.is_none() {
            return Err(AppError::Validation(
                "Email or full name is required".to_string(),
            ));
        }

        let email = email.map(normalize_email).transpose()?;
        let full_name = full_name
            .map(|name| required_field(name, "Full name"))
            .transpose()?;

        let update = UserUpdate {
            email,
            full_name,
            ..Default::default()
        };
        let updated = self.db.update_user_fields(user_id, &update).await?;
        Ok(updated.current.profile())
    }

    /// Replace the avatar or cover image. The previous asset is deleted from
    /// media storage once the new reference is committed.
    pub async fn replace_image(
        &self,
        user_id: &str,
        image: ProfileImage,
        file: Option<StagedFile>,
    ) -> Result<UserProfile, AppError> {
        let file = file
            .ok_or_else(|| AppError::Validation(format!("{} file is missing", image.label())))?;

        self.load_user(user_id).await?;

        let uploaded = self.uploads.externalize(file, MediaKind::Image).await?;
        let updated = match self
            .db
            .update_user_fields(user_id, &image.update(uploaded.asset.clone()))
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.uploads.discard(&uploaded.asset).await;
                return Err(e);
            }
        };

        if let Some(previous) = image.current(&updated.previous) {
            self.uploads.discard(previous).await;
        }

        tracing::info!(user_id, image = image.label(), "Profile image replaced");
        Ok(updated.current.profile())
    }

    pub async fn current_user(&self, user_id: &str) -> Result<UserProfile, AppError> {
        Ok(self.load_user(user_id).await?.profile())
    }

    /// Public channel view, relative to `viewer_id`.
    pub async fn channel_profile(
        &self,
        viewer_id: &str,
        username: &str,
    ) -> Result<ChannelProfile, AppError> {
        let username = normalize_identifier(username);
        if username.is_empty() {
            return Err(AppError::Validation("Username is missing".to_string()));
        }

        let channel = self
            .db
            .find_user_by_username(&username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel {} does not exist", username)))?;

        let (subscribers_count, channels_subscribed_to_count, subscription) = tokio::try_join!(
            self.db.count_subscribers(&channel.id),
            self.db.count_subscriptions(&channel.id),
            self.db.get_subscription(viewer_id, &channel.id),
        )?;

        Ok(ChannelProfile {
            id: channel.id,
            username: channel.username,
            email: channel.email,
            full_name: channel.full_name,
            avatar: channel.avatar.map(|a| a.url),
            cover_image: channel.cover_image.map(|a| a.url),
            subscribers_count,
            channels_subscribed_to_count,
            is_subscribed: subscription.is_some(),
        })
    }

    /// Subscribe to a channel, or unsubscribe if already subscribed.
    /// Returns whether the viewer is subscribed afterwards.
    pub async fn toggle_subscription(
        &self,
        viewer_id: &str,
        username: &str,
    ) -> Result<bool, AppError> {
        let username = normalize_identifier(username);
        let channel = self
            .db
            .find_user_by_username(&username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel {} does not exist", username)))?;

        if channel.id == viewer_id {
            return Err(AppError::Validation(
                "You cannot subscribe to your own channel".to_string(),
            ));
        }

        if self
            .db
            .get_subscription(viewer_id, &channel.id)
            .await?
            .is_some()
        {
            self.db.delete_subscription(viewer_id, &channel.id).await?;
            tracing::info!(subscriber = viewer_id, channel = %channel.id, "Unsubscribed");
            return Ok(false);
        }

        self.db
            .insert_subscription(&Subscription {
                subscriber: viewer_id.to_string(),
                channel: channel.id.clone(),
                created_at: now_rfc3339(),
            })
            .await?;
        tracing::info!(subscriber = viewer_id, channel = %channel.id, "Subscribed");
        Ok(true)
    }

    /// Watched videos, most recent first. Videos deleted since are skipped.
    pub async fn watch_history(&self, user_id: &str) -> Result<Vec<VideoWithOwner>, AppError> {
        let user = self.load_user(user_id).await?;
        let mut owners: HashMap<String, Option<OwnerSummary>> = HashMap::new();
        let mut history = Vec::with_capacity(user.watch_history.len());

        for video_id in user.watch_history.iter().rev() {
            let Some(video) = self.db.get_video(video_id).await? else {
                continue;
            };

            if !owners.contains_key(&video.owner) {
                let owner = self
                    .db
                    .get_user(&video.owner)
                    .await?
                    .map(|u| u.owner_summary());
                owners.insert(video.owner.clone(), owner);
            }
            let owner = owners.get(&video.owner).cloned().flatten();

            history.push(VideoWithOwner::new(&video, owner));
        }

        Ok(history)
    }
}
