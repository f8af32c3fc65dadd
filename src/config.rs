// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Built once at startup and shared through `AppState`; nothing downstream
//! reads the environment again.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Firestore,
    Memory,
}

/// Which media storage backs the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaBackend {
    Cloudinary,
    Memory,
}

/// Credentials for the Cloudinary upload API.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    /// Allowed cross-origin caller
    pub cors_origin: String,
    /// Whether auth cookies carry the `Secure` attribute
    pub cookie_secure: bool,

    // --- Storage ---
    pub database_backend: DatabaseBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    pub media_backend: MediaBackend,
    pub cloudinary: Option<CloudinaryConfig>,
    /// Local staging directory for inbound uploads
    pub upload_dir: PathBuf,
    /// Largest accepted multipart body
    pub max_upload_bytes: usize,
    /// Bound on every database and media storage call
    pub upstream_timeout: Duration,

    // --- Secrets ---
    pub access_token_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_secret: Vec<u8>,
    pub refresh_token_ttl: Duration,
}

impl Config {
    /// Deterministic config for tests, using in-memory backends.
    pub fn test_default() -> Self {
        Self {
            port: 8000,
            cors_origin: "http://localhost:5173".to_string(),
            cookie_secure: true,
            database_backend: DatabaseBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            media_backend: MediaBackend::Memory,
            cloudinary: None,
            upload_dir: env::temp_dir().join("vidhost-test-uploads"),
            max_upload_bytes: 16 * 1024 * 1024,
            upstream_timeout: Duration::from_secs(5),
            access_token_secret: b"test_access_secret_32_bytes_min!".to_vec(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_secret: b"test_refresh_secret_32_bytes_mn!".to_vec(),
            refresh_token_ttl: Duration::from_secs(10 * 24 * 60 * 60),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let database_backend = match env::var("DATABASE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .as_str()
        {
            "firestore" => DatabaseBackend::Firestore,
            "memory" => DatabaseBackend::Memory,
            _ => return Err(ConfigError::Invalid("DATABASE_BACKEND")),
        };

        let media_backend = match env::var("MEDIA_BACKEND")
            .unwrap_or_else(|_| "cloudinary".to_string())
            .as_str()
        {
            "cloudinary" => MediaBackend::Cloudinary,
            "memory" => MediaBackend::Memory,
            _ => return Err(ConfigError::Invalid("MEDIA_BACKEND")),
        };

        let cloudinary = match media_backend {
            MediaBackend::Cloudinary => Some(CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            }),
            MediaBackend::Memory => None,
        };

        let access_token_secret = required("ACCESS_TOKEN_SECRET")?.into_bytes();
        let refresh_token_secret = required("REFRESH_TOKEN_SECRET")?.into_bytes();
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid("REFRESH_TOKEN_SECRET"));
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            cookie_secure: env::var("COOKIE_SECURE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            database_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            media_backend,
            cloudinary,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./public/temp")),
            max_upload_bytes: match env::var("MAX_UPLOAD_BYTES") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| ConfigError::Invalid("MAX_UPLOAD_BYTES"))?,
                Err(_) => 100 * 1024 * 1024,
            },
            upstream_timeout: match env::var("UPSTREAM_TIMEOUT_SECS") {
                Ok(v) => Duration::from_secs(
                    v.parse()
                        .map_err(|_| ConfigError::Invalid("UPSTREAM_TIMEOUT_SECS"))?,
                ),
                Err(_) => Duration::from_secs(30),
            },
            access_token_secret,
            access_token_ttl: expiry("ACCESS_TOKEN_EXPIRY", "1d")?,
            refresh_token_secret,
            refresh_token_ttl: expiry("REFRESH_TOKEN_EXPIRY", "10d")?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn expiry(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_expiry(&raw).ok_or(ConfigError::Invalid(name))
}

/// Parse a token lifetime such as `15m`, `1d`, `12h`, `30s` or `3600`.
pub fn parse_expiry(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };

    let value: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };

    match value.checked_mul(multiplier)? {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
