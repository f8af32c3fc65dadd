// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Vidhost: a video-hosting REST backend.
//!
//! Accounts with rotating session tokens, avatar and cover images, channel
//! subscriptions and watch history; videos with thumbnails, kept in an
//! external media store and referenced from a document database.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{AccountService, MediaStorage, TokenService, UploadPipeline, VideoService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Database>,
    pub tokens: TokenService,
    pub accounts: AccountService,
    pub videos: VideoService,
}

impl AppState {
    /// Wire the services over the chosen database and media backends.
    pub fn new(config: Config, db: Arc<dyn Database>, media: Arc<dyn MediaStorage>) -> Self {
        let tokens = TokenService::new(&config, db.clone());
        let uploads = UploadPipeline::new(media);
        let accounts = AccountService::new(db.clone(), tokens.clone(), uploads.clone());
        let videos = VideoService::new(db.clone(), uploads);

        Self {
            config,
            db,
            tokens,
            accounts,
            videos,
        }
    }
}
