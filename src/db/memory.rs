// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store for local development and tests.
//!
//! Mirrors the Firestore semantics the service relies on. Writes can be made
//! to fail on demand to simulate an unavailable database.

use crate::db::{record_history, Database, UpdatedUser, UserUpdate};
use crate::error::AppError;
use crate::models::{Subscription, Tweet, User, Video};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Collections {
    users: DashMap<String, User>,
    videos: DashMap<String, Video>,
    subscriptions: DashMap<String, Subscription>,
    tweets: DashMap<String, Tweet>,
}

/// In-memory database.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Collections>,
    /// Serializes uniqueness checks on username/email.
    identity_lock: Arc<Mutex<()>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.inner.users.len()
    }

    pub fn video_count(&self) -> usize {
        self.inner.videos.len()
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("Write rejected (database unavailable)".to_string()));
        }
        Ok(())
    }

    fn identity_taken(&self, user: &User) -> Option<&'static str> {
        self.inner.users.iter().find_map(|entry| {
            let other = entry.value();
            if other.id == user.id {
                None
            } else if other.username == user.username {
                Some("username")
            } else if other.email == user.email {
                Some("email")
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.inner.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .inner
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .inner
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.check_writable()?;
        let _guard = self
            .identity_lock
            .lock()
            .map_err(|_| AppError::Database("identity lock poisoned".to_string()))?;

        if self.inner.users.contains_key(&user.id) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        if let Some(field) = self.identity_taken(user) {
            return Err(AppError::Conflict(format!(
                "User with this {} already exists",
                field
            )));
        }

        self.inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update_user_fields(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<UpdatedUser, AppError> {
        self.check_writable()?;
        let _guard = self
            .identity_lock
            .lock()
            .map_err(|_| AppError::Database("identity lock poisoned".to_string()))?;

        if let Some(email) = &update.email {
            let taken = self
                .inner
                .users
                .iter()
                .any(|u| u.id != user_id && &u.email == email);
            if taken {
                return Err(AppError::Conflict(
                    "User with this email already exists".to_string(),
                ));
            }
        }

        // Fields not named in `update` (refresh token, history) stay as the
        // shard lock finds them.
        let mut user = self
            .inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        let previous = user.clone();
        update.apply(&mut user, &now_rfc3339());
        Ok(UpdatedUser {
            previous,
            current: user.clone(),
        })
    }

    async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<bool, AppError> {
        self.check_writable()?;
        match self.inner.users.get_mut(user_id) {
            Some(mut user) => {
                user.refresh_token = token.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        self.check_writable()?;
        // The shard write lock held by `get_mut` makes compare + set atomic.
        match self.inner.users.get_mut(user_id) {
            Some(mut user) if user.refresh_token.as_deref() == Some(expected) => {
                user.refresh_token = Some(new.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn push_watch_history(&self, user_id: &str, video_id: &str) -> Result<(), AppError> {
        self.check_writable()?;
        match self.inner.users.get_mut(user_id) {
            Some(mut user) => {
                record_history(&mut user.watch_history, video_id);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User {} not found", user_id))),
        }
    }

    async fn insert_video(&self, video: &Video) -> Result<(), AppError> {
        self.check_writable()?;
        self.inner.videos.insert(video.id.clone(), video.clone());
        Ok(())
    }

    async fn get_video(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        Ok(self.inner.videos.get(video_id).map(|v| v.clone()))
    }

    async fn list_videos_by_owner(&self, owner: &str) -> Result<Vec<Video>, AppError> {
        let mut videos: Vec<Video> = self
            .inner
            .videos
            .iter()
            .filter(|v| v.owner == owner)
            .map(|v| v.clone())
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    async fn update_video(&self, video: &Video) -> Result<(), AppError> {
        self.check_writable()?;
        match self.inner.videos.get_mut(&video.id) {
            Some(mut existing) => {
                *existing = video.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Video {} not found", video.id))),
        }
    }

    async fn delete_video(&self, video_id: &str) -> Result<bool, AppError> {
        self.check_writable()?;
        Ok(self.inner.videos.remove(video_id).is_some())
    }

    async fn increment_views(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        self.check_writable()?;
        Ok(self.inner.videos.get_mut(video_id).map(|mut video| {
            video.views += 1;
            video.clone()
        }))
    }

    async fn get_subscription(
        &self,
        subscriber: &str,
        channel: &str,
    ) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .inner
            .subscriptions
            .get(&Subscription::doc_id(subscriber, channel))
            .map(|s| s.clone()))
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        self.check_writable()?;
        self.inner.subscriptions.insert(
            Subscription::doc_id(&subscription.subscriber, &subscription.channel),
            subscription.clone(),
        );
        Ok(())
    }

    async fn delete_subscription(
        &self,
        subscriber: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        self.check_writable()?;
        self.inner
            .subscriptions
            .remove(&Subscription::doc_id(subscriber, channel));
        Ok(())
    }

    async fn count_subscribers(&self, channel: &str) -> Result<u64, AppError> {
        Ok(self
            .inner
            .subscriptions
            .iter()
            .filter(|s| s.channel == channel)
            .count() as u64)
    }

    async fn count_subscriptions(&self, subscriber: &str) -> Result<u64, AppError> {
        Ok(self
            .inner
            .subscriptions
            .iter()
            .filter(|s| s.subscriber == subscriber)
            .count() as u64)
    }

    async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), AppError> {
        self.check_writable()?;
        self.inner.tweets.insert(tweet.id.clone(), tweet.clone());
        Ok(())
    }

    async fn list_tweets_by_owner(&self, owner: &str) -> Result<Vec<Tweet>, AppError> {
        let mut tweets: Vec<Tweet> = self
            .inner
            .tweets
            .iter()
            .filter(|t| t.owner == owner)
            .map(|t| t.clone())
            .collect();
        tweets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tweets)
    }
}
