// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! References to assets held by the external media storage.

use serde::{Deserialize, Serialize};

/// Kind of media being externalized; selects the storage resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Durable reference to an externalized file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Permanent public URL
    pub url: String,
    /// Storage-side identifier, needed to delete the asset
    pub public_id: String,
    pub kind: MediaKind,
}
