// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External media storage.
//!
//! Implementations take a local file path and return a durable reference.

use crate::error::AppError;
use crate::models::{MediaAsset, MediaKind};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Result of externalizing one file.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub asset: MediaAsset,
    /// Media duration in seconds (video only)
    pub duration: Option<f64>,
}

/// Media storage backend.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Push a local file to durable storage.
    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, AppError>;

    /// Remove a previously uploaded asset.
    async fn delete(&self, asset: &MediaAsset) -> Result<(), AppError>;
}

/// Media storage held in process memory, for local development and tests.
#[derive(Clone)]
pub struct MemoryMediaStorage {
    assets: Arc<DashMap<String, MediaAsset>>,
    /// Upload attempts before failing; `usize::MAX` means never fail.
    uploads_before_failure: Arc<AtomicUsize>,
    fail_deletes: Arc<AtomicBool>,
}

impl Default for MemoryMediaStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMediaStorage {
    pub fn new() -> Self {
        Self {
            assets: Arc::new(DashMap::new()),
            uploads_before_failure: Arc::new(AtomicUsize::new(usize::MAX)),
            fail_deletes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Let `n` more uploads succeed, then fail every following one.
    pub fn fail_uploads_after(&self, n: usize) {
        self.uploads_before_failure.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.assets.contains_key(public_id)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }
}

#[async_trait]
impl MediaStorage for MemoryMediaStorage {
    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, AppError> {
        let allowed = self
            .uploads_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if !allowed {
            return Err(AppError::StorageUpload("upload rejected".to_string()));
        }

        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| AppError::StorageUpload(format!("cannot read staged file: {}", e)))?
            .len();

        let public_id = uuid::Uuid::new_v4().simple().to_string();
        let asset = MediaAsset {
            url: format!("memory://{}/{}", kind.as_str(), public_id),
            public_id: public_id.clone(),
            kind,
        };
        self.assets.insert(public_id, asset.clone());

        let duration = match kind {
            // Pretend one second per KiB.
            MediaKind::Video => Some(size as f64 / 1024.0),
            MediaKind::Image => None,
        };

        Ok(UploadedMedia { asset, duration })
    }

    async fn delete(&self, asset: &MediaAsset) -> Result<(), AppError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::StorageUpload("delete rejected".to_string()));
        }
        self.assets.remove(&asset.public_id);
        Ok(())
    }
}
