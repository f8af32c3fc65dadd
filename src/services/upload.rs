// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload pipeline: staged file → media storage → database reference.
//!
//! A [`StagedFile`] owns a transient file in the upload directory and removes
//! it when externalization finishes or when it is dropped, whichever comes
//! first. Cleanup failures are logged and never change the outcome.
//!
//! Media storage and the database are not transactional together. When a
//! later step fails, assets already externalized for the same request are
//! deleted again (`discard`), best effort.

use crate::error::AppError;
use crate::models::{MediaAsset, MediaKind};
use crate::services::media::{MediaStorage, UploadedMedia};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// A client-submitted file held in local transient storage.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    field: String,
    file_name: Option<String>,
    removed: bool,
}

impl StagedFile {
    /// Create an empty staged file under `dir` with a random name that keeps
    /// the original extension.
    pub async fn create(
        dir: &Path,
        field: &str,
        file_name: Option<&str>,
    ) -> Result<(Self, tokio::fs::File), AppError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to create upload directory: {}", e))
        })?;

        let extension = file_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();

        let path = dir.join(format!("{}{}", uuid::Uuid::new_v4().simple(), extension));
        let file = tokio::fs::File::create(&path).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to stage upload: {}", e))
        })?;

        let staged = Self {
            path,
            field: field.to_string(),
            file_name: file_name.map(str::to_string),
            removed: false,
        };
        Ok((staged, file))
    }

    /// Stage a complete in-memory payload.
    pub async fn from_bytes(
        dir: &Path,
        field: &str,
        file_name: Option<&str>,
        data: &[u8],
    ) -> Result<Self, AppError> {
        let (staged, mut file) = Self::create(dir, field, file_name).await?;
        file.write_all(data)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to stage upload: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to stage upload: {}", e)))?;
        Ok(staged)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Multipart field the file arrived in.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Remove the transient file now.
    pub async fn remove(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            log_cleanup_error(&self.path, &e);
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log_cleanup_error(&self.path, &e);
            }
        }
    }
}

fn log_cleanup_error(path: &Path, e: &std::io::Error) {
    if e.kind() != std::io::ErrorKind::NotFound {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
    }
}

/// Moves staged files to media storage.
#[derive(Clone)]
pub struct UploadPipeline {
    media: Arc<dyn MediaStorage>,
}

impl UploadPipeline {
    pub fn new(media: Arc<dyn MediaStorage>) -> Self {
        Self { media }
    }

    /// Externalize one staged file. The local file is gone afterwards,
    /// whether or not the upload succeeded.
    pub async fn externalize(
        &self,
        file: StagedFile,
        kind: MediaKind,
    ) -> Result<UploadedMedia, AppError> {
        let result = self.media.upload(file.path(), kind).await;
        let field = file.field().to_string();
        file.remove().await;

        match &result {
            Ok(uploaded) => tracing::info!(
                field = %field,
                public_id = %uploaded.asset.public_id,
                "Externalized staged upload"
            ),
            Err(e) => tracing::warn!(field = %field, error = %e, "Externalization failed"),
        }
        result
    }

    /// Externalize several files concurrently.
    ///
    /// All-or-nothing from the caller's point of view: if any upload fails,
    /// the ones that succeeded are discarded and the first error returned.
    pub async fn externalize_all(
        &self,
        files: Vec<(StagedFile, MediaKind)>,
    ) -> Result<Vec<UploadedMedia>, AppError> {
        let results = join_all(
            files
                .into_iter()
                .map(|(file, kind)| self.externalize(file, kind)),
        )
        .await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(media) => uploaded.push(media),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => Ok(uploaded),
            Some(e) => {
                self.discard_all(uploaded.iter().map(|m| &m.asset)).await;
                Err(e)
            }
        }
    }

    /// Delete an externalized asset that will not be referenced. Failures are
    /// logged; the asset is then an orphan.
    pub async fn discard(&self, asset: &MediaAsset) {
        match self.media.delete(asset).await {
            Ok(()) => tracing::info!(public_id = %asset.public_id, "Discarded media asset"),
            Err(e) => tracing::error!(
                public_id = %asset.public_id,
                error = %e,
                "Failed to discard media asset, left orphaned"
            ),
        }
    }

    pub async fn discard_all<'a>(&self, assets: impl IntoIterator<Item = &'a MediaAsset>) {
        join_all(assets.into_iter().map(|asset| self.discard(asset))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media::MemoryMediaStorage;

    #[tokio::test]
    async fn test_staged_file_keeps_extension_and_drops() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::from_bytes(dir.path(), "avatar", Some("Me.PNG"), b"img")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(staged.file_name(), Some("Me.PNG"));

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_suspicious_extension_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedFile::from_bytes(dir.path(), "avatar", Some("x.p/ng"), b"img")
            .await
            .unwrap();
        assert!(staged.path().extension().is_none());
    }

    #[tokio::test]
    async fn test_externalize_removes_file_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let media = MemoryMediaStorage::new();
        let pipeline = UploadPipeline::new(Arc::new(media.clone()));

        let staged = StagedFile::from_bytes(dir.path(), "avatar", Some("a.png"), b"img")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();

        let uploaded = pipeline.externalize(staged, MediaKind::Image).await.unwrap();
        assert!(!path.exists());
        assert!(media.contains(&uploaded.asset.public_id));
    }

    #[tokio::test]
    async fn test_externalize_removes_file_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let media = MemoryMediaStorage::new();
        media.fail_uploads_after(0);
        let pipeline = UploadPipeline::new(Arc::new(media));

        let staged = StagedFile::from_bytes(dir.path(), "avatar", Some("a.png"), b"img")
            .await
            .unwrap();
        let path = staged.path().to_path_buf();

        let err = pipeline
            .externalize(staged, MediaKind::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageUpload(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_partial_failure_discards_successful_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let media = MemoryMediaStorage::new();
        media.fail_uploads_after(1);
        let pipeline = UploadPipeline::new(Arc::new(media.clone()));

        let video = StagedFile::from_bytes(dir.path(), "video", Some("v.mp4"), b"vid")
            .await
            .unwrap();
        let thumb = StagedFile::from_bytes(dir.path(), "thumbnail", Some("t.png"), b"img")
            .await
            .unwrap();

        let result = pipeline
            .externalize_all(vec![(video, MediaKind::Video), (thumb, MediaKind::Image)])
            .await;

        assert!(result.is_err());
        assert_eq!(media.asset_count(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_discard_failure_is_swallowed() {
        let media = MemoryMediaStorage::new();
        media.set_fail_deletes(true);
        let pipeline = UploadPipeline::new(Arc::new(media));

        pipeline
            .discard(&MediaAsset {
                url: "memory://image/x".to_string(),
                public_id: "x".to_string(),
                kind: MediaKind::Image,
            })
            .await;
    }
}
