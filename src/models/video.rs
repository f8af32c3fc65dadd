// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Video model for storage and API.

use crate::models::{MediaAsset, OwnerSummary};
use serde::{Deserialize, Serialize};

/// Stored video record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Random UUID (also used as document ID)
    pub id: String,
    pub video_file: MediaAsset,
    pub thumbnail: MediaAsset,
    pub title: String,
    pub description: String,
    /// Duration in seconds, as reported by media storage
    pub duration: f64,
    pub views: u64,
    /// Owning user ID; set at creation, never changed
    pub owner: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Video with owner details, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoWithOwner {
    pub id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: u64,
    pub owner_details: Option<OwnerSummary>,
    pub created_at: String,
}

impl VideoWithOwner {
    pub fn new(video: &Video, owner: Option<OwnerSummary>) -> Self {
        Self {
            id: video.id.clone(),
            video_file: video.video_file.url.clone(),
            thumbnail: video.thumbnail.url.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            duration: video.duration,
            views: video.views,
            owner_details: owner,
            created_at: video.created_at.clone(),
        }
    }
}
