// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multipart form intake.
//!
//! File parts are streamed straight into the upload directory as
//! [`StagedFile`]s; text parts are collected in memory. Each endpoint names
//! the file fields it accepts, and each may appear at most once. Anything
//! staged is removed again if intake fails part-way, since the
//! `StagedFile`s are dropped with the partially built form.

use crate::error::{AppError, Result};
use crate::services::StagedFile;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// A parsed multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, StagedFile>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("Upload exceeds the maximum allowed size".to_string())
    } else {
        AppError::Validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}

async fn stage_field(dir: &Path, name: &str, mut field: Field<'_>) -> Result<StagedFile> {
    let (staged, mut file) = StagedFile::create(dir, name, field.file_name()).await?;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to write staged upload: {}", e))
        })?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to write staged upload: {}", e)))?;

    Ok(staged)
}

impl MultipartForm {
    /// Read the whole request, staging files for the `file_fields` given.
    pub async fn stage(
        multipart: std::result::Result<Multipart, MultipartRejection>,
        dir: &Path,
        file_fields: &[&str],
    ) -> Result<Self> {
        let mut multipart = multipart.map_err(|rejection| {
            AppError::Validation(format!("Expected a multipart form: {}", rejection.body_text()))
        })?;

        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name() {
                None => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, value);
                    continue;
                }
                // Browsers send an empty file part when nothing was chosen.
                Some("") => continue,
                Some(_) => {}
            }

            if !file_fields.contains(&name.as_str()) {
                return Err(AppError::Validation(format!(
                    "Unexpected file field '{}'",
                    name
                )));
            }
            if form.files.contains_key(&name) {
                return Err(AppError::Validation(format!(
                    "Only one file is allowed for '{}'",
                    name
                )));
            }

            let staged = stage_field(dir, &name, field).await?;
            tracing::debug!(field = %name, path = %staged.path().display(), "Staged upload");
            form.files.insert(name, staged);
        }

        Ok(form)
    }

    /// Text value of a field, or empty if it was not sent.
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<StagedFile> {
        self.files.remove(name)
    }
}
