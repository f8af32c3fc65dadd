// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`); they are skipped otherwise.

use vidhost::db::{Database, UserUpdate};
use vidhost::error::AppError;
use vidhost::models::{MediaAsset, MediaKind, Subscription, Tweet, User, Video};
use vidhost::time_utils::now_rfc3339;

mod common;
use common::test_db;

/// Unique suffix for test isolation.
fn unique() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn test_user(suffix: &str) -> User {
    let now = now_rfc3339();
    User {
        id: uuid::Uuid::new_v4().to_string(),
        username: format!("user{}", suffix),
        email: format!("{}@example.com", suffix),
        full_name: "Test User".to_string(),
        password_hash: "$argon2id$v=19$test".to_string(),
        avatar: Some(MediaAsset {
            url: "https://cdn.example/a.png".to_string(),
            public_id: format!("avatar-{}", suffix),
            kind: MediaKind::Image,
        }),
        cover_image: None,
        refresh_token: None,
        watch_history: vec![],
        created_at: now.clone(),
        updated_at: now,
    }
}

fn test_video(owner: &str) -> Video {
    let now = now_rfc3339();
    Video {
        id: uuid::Uuid::new_v4().to_string(),
        video_file: MediaAsset {
            url: "https://cdn.example/v.mp4".to_string(),
            public_id: unique(),
            kind: MediaKind::Video,
        },
        thumbnail: MediaAsset {
            url: "https://cdn.example/t.png".to_string(),
            public_id: unique(),
            kind: MediaKind::Image,
        },
        title: "Clip".to_string(),
        description: "desc".to_string(),
        duration: 12.5,
        views: 0,
        owner: owner.to_string(),
        created_at: now.clone(),
        updated_at: now,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_roundtrip_and_lookup() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());

    db.insert_user(&user).await.expect("insert");

    let by_id = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, user.username);
    assert_eq!(by_id.avatar.unwrap().public_id, user.avatar.unwrap().public_id);

    let by_name = db.find_user_by_username(&user.username).await.unwrap();
    assert_eq!(by_name.unwrap().id, user.id);
    let by_email = db.find_user_by_email(&user.email).await.unwrap();
    assert_eq!(by_email.unwrap().id, user.id);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    require_emulator!();
    let db = test_db().await;
    let suffix = unique();
    let first = test_user(&suffix);
    db.insert_user(&first).await.unwrap();

    let mut second = test_user(&suffix);
    second.email = format!("other-{}@example.com", suffix);
    let err = db.insert_user(&second).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_refresh_token_compare_and_swap() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();

    assert!(db.set_refresh_token(&user.id, Some("one")).await.unwrap());
    assert!(db.swap_refresh_token(&user.id, "one", "two").await.unwrap());
    assert!(!db.swap_refresh_token(&user.id, "one", "three").await.unwrap());

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("two"));

    assert!(db.set_refresh_token(&user.id, None).await.unwrap());
    assert!(!db.swap_refresh_token(&user.id, "two", "four").await.unwrap());
    assert!(!db.set_refresh_token("missing-user", None).await.unwrap());
}

#[tokio::test]
async fn test_field_update_leaves_session_and_history() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();
    db.set_refresh_token(&user.id, Some("current")).await.unwrap();
    db.push_watch_history(&user.id, "video-1").await.unwrap();

    let updated = db
        .update_user_fields(
            &user.id,
            &UserUpdate {
                password_hash: Some("$argon2id$v=19$new".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.previous.password_hash, user.password_hash);

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash, "$argon2id$v=19$new");
    assert_eq!(stored.refresh_token.as_deref(), Some("current"));
    assert_eq!(stored.watch_history, vec!["video-1".to_string()]);

    let err = db
        .update_user_fields("missing-user", &UserUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// VIDEO TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_video_views_and_history() {
    require_emulator!();
    let db = test_db().await;
    let user = test_user(&unique());
    db.insert_user(&user).await.unwrap();

    let video = test_video(&user.id);
    db.insert_video(&video).await.unwrap();

    db.increment_views(&video.id).await.unwrap();
    let updated = db.increment_views(&video.id).await.unwrap().unwrap();
    assert_eq!(updated.views, 2);

    db.push_watch_history(&user.id, &video.id).await.unwrap();
    db.push_watch_history(&user.id, &video.id).await.unwrap();
    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.watch_history, vec![video.id.clone()]);

    let listed = db.list_videos_by_owner(&user.id).await.unwrap();
    assert_eq!(listed.len(), 1);

    assert!(db.delete_video(&video.id).await.unwrap());
    assert!(!db.delete_video(&video.id).await.unwrap());
    assert!(db.increment_views(&video.id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION & TWEET TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_subscription_counts() {
    require_emulator!();
    let db = test_db().await;
    let channel = test_user(&unique());
    let viewer = test_user(&unique());
    db.insert_user(&channel).await.unwrap();
    db.insert_user(&viewer).await.unwrap();

    db.insert_subscription(&Subscription {
        subscriber: viewer.id.clone(),
        channel: channel.id.clone(),
        created_at: now_rfc3339(),
    })
    .await
    .unwrap();

    assert_eq!(db.count_subscribers(&channel.id).await.unwrap(), 1);
    assert_eq!(db.count_subscriptions(&viewer.id).await.unwrap(), 1);
    assert!(db
        .get_subscription(&viewer.id, &channel.id)
        .await
        .unwrap()
        .is_some());

    db.delete_subscription(&viewer.id, &channel.id).await.unwrap();
    assert_eq!(db.count_subscribers(&channel.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_tweets_newest_first() {
    require_emulator!();
    let db = test_db().await;
    let owner = unique();

    for (content, created_at) in [
        ("older", "2026-01-01T00:00:00.000Z"),
        ("newer", "2026-01-02T00:00:00.000Z"),
    ] {
        db.insert_tweet(&Tweet {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.clone(),
            content: content.to_string(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        })
        .await
        .unwrap();
    }

    let tweets = db.list_tweets_by_owner(&owner).await.unwrap();
    let contents: Vec<_> = tweets.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["newer", "older"]);
}
