// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vidhost API Server
//!
//! Serves account, session and video endpoints over a document database and
//! an external media store.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidhost::{
    config::{Config, DatabaseBackend, MediaBackend},
    db::{Database, FirestoreDb, MemoryDb},
    services::{CloudinaryStorage, MediaStorage, MemoryMediaStorage},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Vidhost API");

    let db: Arc<dyn Database> = match config.database_backend {
        DatabaseBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id, config.upstream_timeout).await?;
            tracing::info!(project = %config.gcp_project_id, "Firestore connected");
            Arc::new(db)
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory database; data is lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    let media: Arc<dyn MediaStorage> = match (&config.media_backend, &config.cloudinary) {
        (MediaBackend::Cloudinary, Some(cloudinary)) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "Cloudinary media storage");
            Arc::new(CloudinaryStorage::new(cloudinary, config.upstream_timeout)?)
        }
        (MediaBackend::Cloudinary, None) => {
            return Err("Cloudinary selected but not configured".into());
        }
        (MediaBackend::Memory, _) => {
            tracing::warn!("Using in-memory media storage; uploads are lost on restart");
            Arc::new(MemoryMediaStorage::new())
        }
    };

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tracing::info!(path = %config.upload_dir.display(), "Upload staging directory ready");

    let port = config.port;
    let state = Arc::new(AppState::new(config, db, media));

    // Build router
    let app = vidhost::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidhost=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
