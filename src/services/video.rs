// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Video publishing and management.

use crate::db::Database;
use crate::error::AppError;
use crate::models::{MediaKind, OwnerSummary, Video, VideoWithOwner};
use crate::services::account::required_field;
use crate::services::upload::{StagedFile, UploadPipeline};
use crate::time_utils::now_rfc3339;
use std::sync::Arc;

/// Title and description of a new video.
#[derive(Debug, Default)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
}

#[derive(Clone)]
pub struct VideoService {
    db: Arc<dyn Database>,
    uploads: UploadPipeline,
}

impl VideoService {
    pub fn new(db: Arc<dyn Database>, uploads: UploadPipeline) -> Self {
        Self { db, uploads }
    }

    async fn owner_summary(&self, user_id: &str) -> Result<Option<OwnerSummary>, AppError> {
        Ok(self.db.get_user(user_id).await?.map(|u| u.owner_summary()))
    }

    async fn load_video(&self, video_id: &str) -> Result<Video, AppError> {
        self.db
            .get_video(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))
    }

    /// Load a video the caller is about to modify.
    async fn load_owned(&self, user_id: &str, video_id: &str) -> Result<Video, AppError> {
        let video = self.load_video(video_id).await?;
        if video.owner != user_id {
            tracing::warn!(user_id, video_id, "Rejected modification by non-owner");
            return Err(AppError::Forbidden(
                "You are not the owner of this video".to_string(),
            ));
        }
        Ok(video)
    }

    /// Publish a video. Both the video file and its thumbnail are required.
    pub async fn publish(
        &self,
        owner_id: &str,
        details: VideoDetails,
        video_file: Option<StagedFile>,
        thumbnail: Option<StagedFile>,
    ) -> Result<VideoWithOwner, AppError> {
        let title = required_field(&details.title, "Title")?;
        let description = required_field(&details.description, "Description")?;
        let video_file =
            video_file.ok_or_else(|| AppError::Validation("Video file is required".to_string()))?;
        let thumbnail =
            thumbnail.ok_or_else(|| AppError::Validation("Thumbnail is required".to_string()))?;

        let owner = self
            .owner_summary(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", owner_id)))?;

        let mut uploaded = self
            .uploads
            .externalize_all(vec![
                (video_file, MediaKind::Video),
                (thumbnail, MediaKind::Image),
            ])
            .await?
            .into_iter();

        let (Some(video_media), Some(thumbnail_media)) = (uploaded.next(), uploaded.next()) else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Media storage returned fewer assets than uploaded"
            )));
        };

        let now = now_rfc3339();
        let video = Video {
            id: uuid::Uuid::new_v4().to_string(),
            video_file: video_media.asset,
            thumbnail: thumbnail_media.asset,
            title,
            description,
            duration: video_media.duration.unwrap_or_default(),
            views: 0,
            owner: owner_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };

        if let Err(e) = self.db.insert_video(&video).await {
            self.uploads
                .discard_all([&video.video_file, &video.thumbnail])
                .await;
            return Err(e);
        }

        tracing::info!(video_id = %video.id, owner = owner_id, "Video published");
        Ok(VideoWithOwner::new(&video, Some(owner)))
    }

    /// The caller's own videos, newest first.
    pub async fn list_own(&self, owner_id: &str) -> Result<Vec<VideoWithOwner>, AppError> {
        let owner = self.owner_summary(owner_id).await?;
        let videos = self.db.list_videos_by_owner(owner_id).await?;
        Ok(videos
            .iter()
            .map(|v| VideoWithOwner::new(v, owner.clone()))
            .collect())
    }

    /// Fetch a video for playback: counts a view and records it in the
    /// viewer's watch history.
    pub async fn watch(&self, viewer_id: &str, video_id: &str) -> Result<VideoWithOwner, AppError> {
        let video = self
            .db
            .increment_views(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

        self.db.push_watch_history(viewer_id, video_id).await?;

        let owner = self.owner_summary(&video.owner).await?;
        Ok(VideoWithOwner::new(&video, owner))
    }

    /// Change title and/or description.
    pub async fn update_details(
        &self,
        user_id: &str,
        video_id: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<VideoWithOwner, AppError> {
        if title.is_none() && description.is_none() {
            return Err(AppError::Validation(
                "Title or description is required".to_string(),
            ));
        }
        let title = title.map(|t| required_field(t, "Title")).transpose()?;
        let description = description
            .map(|d| required_field(d, "Description"))
            .transpose()?;

        let mut video = self.load_owned(user_id, video_id).await?;
        if let Some(title) = title {
            video.title = title;
        }
        if let Some(description) = description {
            video.description = description;
        }
        video.updated_at = now_rfc3339();

        self.db.update_video(&video).await?;

        let owner = self.owner_summary(user_id).await?;
        Ok(VideoWithOwner::new(&video, owner))
    }

    /// Replace the thumbnail; the previous one is deleted from media storage
    /// after the record is updated.
    pub async fn change_thumbnail(
        &self,
        user_id: &str,
        video_id: &str,
        thumbnail: Option<StagedFile>,
    ) -> Result<VideoWithOwner, AppError> {
        let thumbnail =
            thumbnail.ok_or_else(|| AppError::Validation("Thumbnail is required".to_string()))?;

        let mut video = self.load_owned(user_id, video_id).await?;

        let uploaded = self.uploads.externalize(thumbnail, MediaKind::Image).await?;
        let previous = std::mem::replace(&mut video.thumbnail, uploaded.asset);
        video.updated_at = now_rfc3339();

        if let Err(e) = self.db.update_video(&video).await {
            self.uploads.discard(&video.thumbnail).await;
            return Err(e);
        }
        self.uploads.discard(&previous).await;

        let owner = self.owner_summary(user_id).await?;
        Ok(VideoWithOwner::new(&video, owner))
    }

    /// Delete the record, then its media.
    pub async fn delete(&self, user_id: &str, video_id: &str) -> Result<(), AppError> {
        let video = self.load_owned(user_id, video_id).await?;

        if !self.db.delete_video(video_id).await? {
            return Err(AppError::NotFound(format!("Video {} not found", video_id)));
        }
        self.uploads
            .discard_all([&video.video_file, &video.thumbnail])
            .await;

        tracing::info!(video_id, owner = user_id, "Video deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::models::User;
    use crate::services::media::MemoryMediaStorage;

    struct Fixture {
        service: VideoService,
        db: MemoryDb,
        media: MemoryMediaStorage,
        dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let db = MemoryDb::new();
        for (id, name) in [("u1", "alice"), ("u2", "bob")] {
            db.insert_user(&User {
                id: id.to_string(),
                username: name.to_string(),
                email: format!("{}@x.com", name),
                full_name: name.to_string(),
                password_hash: "hash".to_string(),
                avatar: None,
                cover_image: None,
                refresh_token: None,
                watch_history: vec![],
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
                updated_at: "2026-01-01T00:00:00.000Z".to_string(),
            })
            .await
            .unwrap();
        }
        let media = MemoryMediaStorage::new();
        let service = VideoService::new(
            Arc::new(db.clone()),
            UploadPipeline::new(Arc::new(media.clone())),
        );
        Fixture {
            service,
            db,
            media,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    impl Fixture {
        async fn staged(&self, field: &str, name: &str, len: usize) -> StagedFile {
            StagedFile::from_bytes(self.dir.path(), field, Some(name), &vec![7u8; len])
                .await
                .unwrap()
        }

        async fn publish(&self, owner: &str, title: &str) -> VideoWithOwner {
            let video = self.staged("video", "clip.mp4", 4096).await;
            let thumb = self.staged("thumbnail", "thumb.png", 16).await;
            self.service
                .publish(
                    owner,
                    VideoDetails {
                        title: title.to_string(),
                        description: "desc".to_string(),
                    },
                    Some(video),
                    Some(thumb),
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_publish_records_duration_and_owner() {
        let f = fixture().await;
        let video = f.publish("u1", "First").await;

        assert_eq!(video.duration, 4.0);
        assert_eq!(video.views, 0);
        assert_eq!(video.owner_details.unwrap().username, "alice");
        assert_eq!(f.media.asset_count(), 2);
        assert_eq!(std::fs::read_dir(f.dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_publish_requires_both_files() {
        let f = fixture().await;
        let video = f.staged("video", "clip.mp4", 10).await;
        let err = f
            .service
            .publish(
                "u1",
                VideoDetails {
                    title: "t".to_string(),
                    description: "d".to_string(),
                },
                Some(video),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.media.asset_count(), 0);
        assert_eq!(std::fs::read_dir(f.dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_publish_db_failure_discards_media() {
        let f = fixture().await;
        f.db.set_fail_writes(true);

        let video = f.staged("video", "clip.mp4", 10).await;
        let thumb = f.staged("thumbnail", "thumb.png", 10).await;
        let result = f
            .service
            .publish(
                "u1",
                VideoDetails {
                    title: "t".to_string(),
                    description: "d".to_string(),
                },
                Some(video),
                Some(thumb),
            )
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(f.media.asset_count(), 0);
        assert_eq!(f.db.video_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_counts_views_and_history() {
        let f = fixture().await;
        let first = f.publish("u1", "First").await;
        let second = f.publish("u1", "Second").await;

        f.service.watch("u2", &first.id).await.unwrap();
        f.service.watch("u2", &second.id).await.unwrap();
        let watched = f.service.watch("u2", &first.id).await.unwrap();
        assert_eq!(watched.views, 2);

        let bob = f.db.get_user("u2").await.unwrap().unwrap();
        assert_eq!(bob.watch_history, vec![second.id.clone(), first.id.clone()]);

        assert!(matches!(
            f.service.watch("u2", "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_modify() {
        let f = fixture().await;
        let video = f.publish("u1", "Mine").await;

        let err = f
            .service
            .update_details("u2", &video.id, Some("Hijacked"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = f.service.delete("u2", &video.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(f.db.video_count(), 1);
    }

    #[tokio::test]
    async fn test_update_and_change_thumbnail() {
        let f = fixture().await;
        let video = f.publish("u1", "Draft").await;

        let updated = f
            .service
            .update_details("u1", &video.id, Some("Final"), None)
            .await
            .unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.description, "desc");

        let thumb = f.staged("thumbnail", "new.png", 8).await;
        let changed = f
            .service
            .change_thumbnail("u1", &video.id, Some(thumb))
            .await
            .unwrap();
        assert_ne!(changed.thumbnail, video.thumbnail);
        assert_eq!(f.media.asset_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_media() {
        let f = fixture().await;
        let video = f.publish("u1", "Gone soon").await;

        f.service.delete("u1", &video.id).await.unwrap();
        assert_eq!(f.db.video_count(), 0);
        assert_eq!(f.media.asset_count(), 0);

        assert!(matches!(
            f.service.delete("u1", &video.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_own_newest_first() {
        let f = fixture().await;
        f.publish("u1", "Older").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        f.publish("u1", "Newer").await;
        f.publish("u2", "Other").await;

        let titles: Vec<_> = f
            .service
            .list_own("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.title)
            .collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }
}
