// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod media;
pub mod subscription;
pub mod tweet;
pub mod user;
pub mod video;

pub use media::{MediaAsset, MediaKind};
pub use subscription::Subscription;
pub use tweet::Tweet;
pub use user::{ChannelProfile, OwnerSummary, User, UserProfile};
pub use video::{Video, VideoWithOwner};
