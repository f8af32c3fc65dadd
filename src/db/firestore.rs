// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, credential hash, current refresh token, watch history)
//! - Videos
//! - Subscriptions (subscriber → channel join collection)
//! - Tweets
//!
//! Every call is bounded by the configured upstream timeout.

use crate::db::{collections, record_history, Database, UpdatedUser, UserUpdate};
use crate::error::AppError;
use crate::models::{Subscription, Tweet, User, Video};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    op_timeout: Duration,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, op_timeout: Duration) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, op_timeout).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            op_timeout,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(
        project_id: &str,
        op_timeout: Duration,
    ) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            op_timeout,
        })
    }

    /// Create an offline client. All database operations return an error.
    pub fn new_offline() -> Self {
        Self {
            client: None,
            op_timeout: Duration::from_secs(1),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Run a Firestore operation under the upstream timeout.
    async fn timed<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| AppError::UpstreamTimeout(format!("Firestore {} timed out", op)))?
    }

    async fn find_user_by_field(&self, field: &str, value: &str) -> Result<Option<User>, AppError> {
        let value = value.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field(field).eq(value.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    async fn write_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn read_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_video(&self, video: &Video) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::VIDEOS)
            .document_id(&video.id)
            .object(video)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn read_video(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::VIDEOS)
            .obj()
            .one(video_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_subscriptions_where(&self, field: &str, value: &str) -> Result<u64, AppError> {
        let value = value.to_string();
        let subscriptions: Vec<Subscription> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(|q| q.for_all([q.field(field).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(subscriptions.len() as u64)
    }

    /// Read a user, apply `modify`, and write back only `fields`, all in one
    /// transaction.
    ///
    /// Returns `None` if the user does not exist. A concurrent write to the
    /// same document aborts the commit.
    async fn modify_user_tx<F>(
        &self,
        user_id: &str,
        fields: &[&str],
        modify: F,
    ) -> Result<Option<UpdatedUser>, AppError>
    where
        F: FnOnce(&mut User),
    {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );
        let current: Option<User> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read user in transaction: {}", e)))?;

        let Some(previous) = current else {
            rollback(transaction, user_id).await;
            return Ok(None);
        };

        let mut user = previous.clone();
        modify(&mut user);

        client
            .fluent()
            .update()
            .fields(fields)
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add user to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit user update: {}", e)))?;

        Ok(Some(UpdatedUser {
            previous,
            current: user,
        }))
    }

    /// Conditionally replace a user's refresh token inside a transaction.
    ///
    /// If another request rotates the token concurrently, Firestore aborts
    /// the commit and the caller sees a failed swap instead of a lost update.
    async fn swap_refresh_token_tx(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // 1. Read the current user within the transaction
        //    This registers the document for conflict detection
        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );
        let current: Option<User> = tx_client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read user in transaction: {}", e)))?;

        let Some(mut user) = current else {
            rollback(transaction, user_id).await;
            return Ok(false);
        };

        // 2. Compare against what the caller read
        if user.refresh_token.as_deref() != Some(expected) {
            tracing::debug!(user_id, "Refresh token changed before swap");
            rollback(transaction, user_id).await;
            return Ok(false);
        }

        // 3. Add the write and commit
        user.refresh_token = Some(new.to_string());
        client
            .fluent()
            .update()
            .fields(["refresh_token"])
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add user to transaction: {}", e))
            })?;

        match transaction.commit().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Refresh token swap lost a race");
                Ok(false)
            }
        }
    }
}

/// Roll back an abandoned transaction, logging any failure.
async fn rollback(transaction: firestore::FirestoreTransaction<'_>, user_id: &str) {
    if let Err(e) = transaction.rollback().await {
        tracing::debug!(user_id, error = %e, "Transaction rollback failed");
    }
}

#[async_trait]
impl Database for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.timed("get_user", self.read_user(user_id)).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.timed(
            "find_user_by_username",
            self.find_user_by_field("username", username),
        )
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.timed("find_user_by_email", self.find_user_by_field("email", email))
            .await
    }

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.timed("insert_user", async {
            // Firestore has no unique secondary indexes; check before writing.
            if self.find_user_by_field("username", &user.username).await?.is_some()
                || self.find_user_by_field("email", &user.email).await?.is_some()
            {
                return Err(AppError::Conflict("User already exists".to_string()));
            }
            self.write_user(user).await
        })
        .await
    }

    async fn update_user_fields(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<UpdatedUser, AppError> {
        self.timed("update_user_fields", async {
            // Check-then-write, like insert_user.
            if let Some(email) = &update.email {
                if let Some(other) = self.find_user_by_field("email", email).await? {
                    if other.id != user_id {
                        return Err(AppError::Conflict(
                            "User with this email already exists".to_string(),
                        ));
                    }
                }
            }
            let updated_at = now_rfc3339();
            self.modify_user_tx(user_id, &update.field_paths(), |user| {
                update.apply(user, &updated_at)
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
        })
        .await
    }

    async fn set_refresh_token(
        &self,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<bool, AppError> {
        self.timed("set_refresh_token", async {
            let updated = self
                .modify_user_tx(user_id, &["refresh_token"], |user| {
                    user.refresh_token = token.map(str::to_string);
                })
                .await?;
            Ok(updated.is_some())
        })
        .await
    }

    async fn swap_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        self.timed(
            "swap_refresh_token",
            self.swap_refresh_token_tx(user_id, expected, new),
        )
        .await
    }

    async fn push_watch_history(&self, user_id: &str, video_id: &str) -> Result<(), AppError> {
        self.timed("push_watch_history", async {
            self.modify_user_tx(user_id, &["watch_history"], |user| {
                record_history(&mut user.watch_history, video_id);
            })
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
        })
        .await
    }

    // ─── Video Operations ────────────────────────────────────────

    async fn insert_video(&self, video: &Video) -> Result<(), AppError> {
        self.timed("insert_video", self.write_video(video)).await
    }

    async fn get_video(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        self.timed("get_video", self.read_video(video_id)).await
    }

    async fn list_videos_by_owner(&self, owner: &str) -> Result<Vec<Video>, AppError> {
        let owner = owner.to_string();
        self.timed("list_videos_by_owner", async {
            self.get_client()?
                .fluent()
                .select()
                .from(collections::VIDEOS)
                .filter(|q| q.for_all([q.field("owner").eq(owner.clone())]))
                .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))
        })
        .await
    }

    async fn update_video(&self, video: &Video) -> Result<(), AppError> {
        self.timed("update_video", async {
            if self.read_video(&video.id).await?.is_none() {
                return Err(AppError::NotFound(format!("Video {} not found", video.id)));
            }
            self.write_video(video).await
        })
        .await
    }

    async fn delete_video(&self, video_id: &str) -> Result<bool, AppError> {
        self.timed("delete_video", async {
            if self.read_video(video_id).await?.is_none() {
                return Ok(false);
            }
            self.get_client()?
                .fluent()
                .delete()
                .from(collections::VIDEOS)
                .document_id(video_id)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(true)
        })
        .await
    }

    async fn increment_views(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        // Read-modify-write; concurrent views may undercount.
        self.timed("increment_views", async {
            let Some(mut video) = self.read_video(video_id).await? else {
                return Ok(None);
            };
            video.views += 1;
            self.write_video(&video).await?;
            Ok(Some(video))
        })
        .await
    }

    // ─── Subscription Operations ─────────────────────────────────

    async fn get_subscription(
        &self,
        subscriber: &str,
        channel: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let doc_id = Subscription::doc_id(subscriber, channel);
        self.timed("get_subscription", async {
            self.get_client()?
                .fluent()
                .select()
                .by_id_in(collections::SUBSCRIPTIONS)
                .obj()
                .one(&doc_id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))
        })
        .await
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let doc_id = Subscription::doc_id(&subscription.subscriber, &subscription.channel);
        self.timed("insert_subscription", async {
            let _: () = self
                .get_client()?
                .fluent()
                .update()
                .in_col(collections::SUBSCRIPTIONS)
                .document_id(&doc_id)
                .object(subscription)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete_subscription(
        &self,
        subscriber: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        let doc_id = Subscription::doc_id(subscriber, channel);
        self.timed("delete_subscription", async {
            self.get_client()?
                .fluent()
                .delete()
                .from(collections::SUBSCRIPTIONS)
                .document_id(&doc_id)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn count_subscribers(&self, channel: &str) -> Result<u64, AppError> {
        self.timed(
            "count_subscribers",
            self.count_subscriptions_where("channel", channel),
        )
        .await
    }

    async fn count_subscriptions(&self, subscriber: &str) -> Result<u64, AppError> {
        self.timed(
            "count_subscriptions",
            self.count_subscriptions_where("subscriber", subscriber),
        )
        .await
    }

    // ─── Tweet Operations ────────────────────────────────────────

    async fn insert_tweet(&self, tweet: &Tweet) -> Result<(), AppError> {
        self.timed("insert_tweet", async {
            let _: () = self
                .get_client()?
                .fluent()
                .update()
                .in_col(collections::TWEETS)
                .document_id(&tweet.id)
                .object(tweet)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn list_tweets_by_owner(&self, owner: &str) -> Result<Vec<Tweet>, AppError> {
        let owner = owner.to_string();
        self.timed("list_tweets_by_owner", async {
            self.get_client()?
                .fluent()
                .select()
                .from(collections::TWEETS)
                .filter(|q| q.for_all([q.field("owner").eq(owner.clone())]))
                .order_by([("createdAt", firestore::FirestoreQueryDirection::Descending)])
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))
        })
        .await
    }
}
