// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod cloudinary;
pub mod media;
pub mod password;
pub mod token;
pub mod upload;
pub mod video;

pub use account::{AccountService, ProfileImage, Registration};
pub use cloudinary::CloudinaryStorage;
pub use media::{MediaStorage, MemoryMediaStorage, UploadedMedia};
pub use token::{AccessClaims, TokenPair, TokenService};
pub use upload::{StagedFile, UploadPipeline};
pub use video::{VideoDetails, VideoService};
