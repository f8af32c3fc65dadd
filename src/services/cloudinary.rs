// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloudinary upload API client.
//!
//! Handles:
//! - Signed uploads of staged files (image and video resources)
//! - Signed deletes, used for compensation and asset replacement
//! - Timeout detection (surfaced as `UpstreamTimeout`)

use crate::config::CloudinaryConfig;
use crate::error::AppError;
use crate::models::{MediaAsset, MediaKind};
use crate::services::media::{MediaStorage, UploadedMedia};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cloudinary API client. Credentials are fixed at construction.
#[derive(Clone)]
pub struct CloudinaryStorage {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStorage {
    pub fn new(config: &CloudinaryConfig, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: format!("https://api.cloudinary.com/v1_1/{}", config.cloud_name),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn timestamp() -> Result<String, AppError> {
        Ok(SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
            .as_secs()
            .to_string())
    }

    /// Map a transport error, separating timeouts from other failures.
    fn transport_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::UpstreamTimeout(format!("Cloudinary request timed out: {}", e))
        } else {
            AppError::StorageUpload(e.to_string())
        }
    }

    /// Check response status and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StorageUpload(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StorageUpload(format!("JSON parse error: {}", e)))
    }
}

/// Sign request parameters: sorted `key=value` pairs joined by `&`, followed
/// by the API secret, hashed with SHA-256.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Upload response from Cloudinary.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    duration: Option<f64>,
}

/// Destroy response from Cloudinary.
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[async_trait]
impl MediaStorage for CloudinaryStorage {
    async fn upload(&self, path: &Path, kind: MediaKind) -> Result<UploadedMedia, AppError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::StorageUpload(format!("cannot read staged file: {}", e)))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = Self::timestamp()?;
        let signature = sign_params(&[("timestamp", timestamp.as_str())], &self.api_secret);

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature)
            .part(
                "file",
                reqwest::multipart::Part::bytes(data).file_name(file_name),
            );

        let url = format!("{}/{}/upload", self.base_url, kind.as_str());
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body: UploadResponse = Self::check_response_json(response).await?;

        tracing::info!(
            public_id = %body.public_id,
            kind = kind.as_str(),
            "Uploaded media to Cloudinary"
        );

        Ok(UploadedMedia {
            asset: MediaAsset {
                url: body.secure_url,
                public_id: body.public_id,
                kind,
            },
            duration: body.duration,
        })
    }

    async fn delete(&self, asset: &MediaAsset) -> Result<(), AppError> {
        let timestamp = Self::timestamp()?;
        let signature = sign_params(
            &[
                ("public_id", asset.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.api_secret,
        );

        let url = format!("{}/{}/destroy", self.base_url, asset.kind.as_str());
        let response = self
            .http
            .post(&url)
            .form(&[
                ("public_id", asset.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.api_key.as_str()),
                ("signature_algorithm", "sha256"),
                ("signature", signature.as_str()),
            ])
            .send()
            .await
            .map_err(Self::transport_error)?;

        let body: DestroyResponse = Self::check_response_json(response).await?;
        match body.result.as_str() {
            "ok" | "not found" => {
                tracing::info!(public_id = %asset.public_id, result = %body.result, "Deleted media");
                Ok(())
            }
            other => Err(AppError::StorageUpload(format!("destroy returned {}", other))),
        }
    }
}
