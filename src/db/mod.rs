//! Database layer.
//!
//! Route handlers and services only see the [`Database`] trait. Production
//! uses Firestore; the in-memory backend serves local development and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{MediaAsset, Subscription, Tweet, User, Video};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const VIDEOS: &str = "videos";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const TWEETS: &str = "tweets";
}

/// Document store operations used by the service.
#[async_trait]
pub trait Database: Send + Sync {
    // ─── Users ───────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Create a user. Fails with `Conflict` if the username or email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    /// Apply a partial update to profile fields and credentials.
    ///
    /// Only the fields set in `update` (plus `updated_at`) are written; the
    /// refresh token and watch history are never touched. Fails with
    /// `NotFound` if the user is gone and `Conflict` if a new email belongs
    /// to another account.
    async fn update_user_fields(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<UpdatedUser, AppError>;

    /// Unconditionally replace the stored refresh token.
    ///
    /// Returns `false` if the user does not exist.
    async fn set_refresh_token(&self, user_id: &str, token: Option<&str>)
        -> Result<bool, AppError>;

    /// Replace the stored refresh token only if it still equals `expected`.
    ///
    /// Returns `false` if the stored value changed underneath the caller or
    /// the user does not exist.
    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError>;

    /// Record a watched video as the most recent history entry.
    async fn push_watch_history(&self, user_id: &str, video_id: &str) -> Result<(), AppError>;

    // ─── Videos ──────────────────────────────────────────────

    async fn insert_video(&self, video: &Video) -> Result<(), AppError>;

    async fn get_video(&self, video_id: &str) -> Result<Option<Video>, AppError>;

    /// Videos owned by a user, newest first.
    async fn list_videos_by_owner(&self, owner: &str) -> Result<Vec<Video>, AppError>;

    async fn update_video(&self, video: &Video) -> Result<(), AppError>;

    /// Delete a video. Returns `false` if it did not exist.
    async fn delete_video(&self, video_id: &str) -> Result<bool, AppError>;

    /// Increment the view counter and return the updated record.
    async fn increment_views(&self, video_id: &str) -> Result<Option<Video>, AppError>;

    // ─── Subscriptions ───────────────────────────────────────

    async fn get_subscription(
        &self,
        subscriber: &str,
        channel: &str,
    ) -> Result<Option<Subscription>, AppError>;

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError>;

    async fn delete_subscription(&self, subscriber: &str, channel: &str)
        -> Result<(), AppError>;

    async fn count_subscribers(&self, channel: &str) -> Result<u64, AppError>;

    async fn count_subscriptions(&self, subscriber: &str) -> Result<u64, AppError>;

    // ─── Tweets ──────────────────────────────────────────────

    async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), AppError>;

    /// Tweets by a user, newest first.
    async fn list_tweets_by_owner(&self, owner: &str) -> Result<Vec<Tweet>, AppError>;
}

/// Partial update of a user's owned fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub avatar: Option<MediaAsset>,
    pub cover_image: Option<MediaAsset>,
}

impl UserUpdate {
    /// Copy the set fields onto `user` and stamp `updated_at`.
    pub fn apply(&self, user: &mut User, updated_at: &str) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
        if let Some(cover_image) = &self.cover_image {
            user.cover_image = Some(cover_image.clone());
        }
        user.updated_at = updated_at.to_string();
    }

    /// Stored field names written by this update.
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.email.is_some() {
            paths.push("email");
        }
        if self.full_name.is_some() {
            paths.push("full_name");
        }
        if self.password_hash.is_some() {
            paths.push("password_hash");
        }
        if self.avatar.is_some() {
            paths.push("avatar");
        }
        if self.cover_image.is_some() {
            paths.push("cover_image");
        }
        paths.push("updated_at");
        paths
    }
}

/// A user record before and after a partial update.
#[derive(Debug, Clone)]
pub struct UpdatedUser {
    pub previous: User,
    pub current: User,
}

/// Append `video_id` to a history list, moving it to the end if present.
pub(crate) fn record_history(history: &mut Vec<String>, video_id: &str) {
    history.retain(|id| id != video_id);
    history.push(video_id.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_update_paths_follow_set_fields() {
        let update = UserUpdate {
            full_name: Some("New Name".to_string()),
            ..Default::default()
        };
        assert_eq!(update.field_paths(), vec!["full_name", "updated_at"]);
        assert!(!update.field_paths().contains(&"refresh_token"));
    }

    #[test]
    fn test_record_history_moves_to_most_recent() {
        let mut history = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        record_history(&mut history, "a");
        assert_eq!(history, vec!["b", "c", "a"]);

        record_history(&mut history, "d");
        assert_eq!(history, vec!["b", "c", "a", "d"]);
    }
}
