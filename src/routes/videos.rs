// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Video routes under `/api/v1/videos`.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::VideoWithOwner;
use crate::routes::form::MultipartForm;
use crate::routes::{json_body, ApiResponse};
use crate::services::VideoDetails;
use crate::AppState;
use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Video routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/videos", get(list_videos).post(publish_video))
        .route(
            "/api/v1/videos/{id}",
            get(watch_video).patch(update_video).delete(delete_video),
        )
        .route("/api/v1/videos/{id}/thumbnail", patch(update_thumbnail))
}

async fn publish_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<VideoWithOwner>> {
    let mut form =
        MultipartForm::stage(multipart, &state.config.upload_dir, &["video", "thumbnail"])
            .await?;

    let details = VideoDetails {
        title: form.text("title"),
        description: form.text("description"),
    };
    let video = state
        .videos
        .publish(
            &user.user_id,
            details,
            form.take_file("video"),
            form.take_file("thumbnail"),
        )
        .await?;

    Ok(ApiResponse::created(video, "Video uploaded successfully"))
}

async fn list_videos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<VideoWithOwner>>> {
    let videos = state.videos.list_own(&user.user_id).await?;
    Ok(ApiResponse::ok(videos, "Videos fetched"))
}

async fn watch_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<VideoWithOwner>> {
    let video = state.videos.watch(&user.user_id, &id).await?;
    Ok(ApiResponse::ok(video, "Video fetched"))
}

#[derive(Deserialize)]
pub struct UpdateVideoRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn update_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: std::result::Result<Json<UpdateVideoRequest>, JsonRejection>,
) -> Result<ApiResponse<VideoWithOwner>> {
    let request = json_body(body)?;
    let video = state
        .videos
        .update_details(
            &user.user_id,
            &id,
            request.title.as_deref(),
            request.description.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(video, "Video details updated"))
}

async fn update_thumbnail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<VideoWithOwner>> {
    let mut form = MultipartForm::stage(multipart, &state.config.upload_dir, &["thumbnail"]).await?;
    let video = state
        .videos
        .change_thumbnail(&user.user_id, &id, form.take_file("thumbnail"))
        .await?;
    Ok(ApiResponse::ok(video, "Thumbnail updated"))
}

#[derive(Serialize)]
pub struct DeletedVideo {
    pub id: String,
}

async fn delete_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<ApiResponse<DeletedVideo>> {
    state.videos.delete(&user.user_id, &id).await?;
    Ok(ApiResponse::ok(DeletedVideo { id }, "Video deleted"))
}
