// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tweet routes under `/api/v1/tweets`.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Tweet;
use crate::routes::{json_body, ApiResponse};
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/v1/tweets", get(list_tweets).post(create_tweet))
}

#[derive(Deserialize)]
pub struct CreateTweetRequest {
    #[serde(default)]
    content: String,
}

async fn create_tweet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<CreateTweetRequest>, JsonRejection>,
) -> Result<ApiResponse<Tweet>> {
    let request = json_body(body)?;
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Tweet content is required".to_string()));
    }

    let now = now_rfc3339();
    let tweet = Tweet {
        id: uuid::Uuid::new_v4().to_string(),
        owner: user.user_id.clone(),
        content: content.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.insert_tweet(&tweet).await?;

    tracing::info!(tweet_id = %tweet.id, owner = %user.user_id, "Tweet created");
    Ok(ApiResponse::created(tweet, "Tweet created"))
}

async fn list_tweets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<Tweet>>> {
    let tweets = state.db.list_tweets_by_owner(&user.user_id).await?;
    Ok(ApiResponse::ok(tweets, "Tweets fetched"))
}
