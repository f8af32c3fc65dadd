// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;
use vidhost::config::Config;
use vidhost::db::{FirestoreDb, MemoryDb};
use vidhost::routes::create_router;
use vidhost::services::MemoryMediaStorage;
use vidhost::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project", std::time::Duration::from_secs(10))
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Router plus handles on the in-memory backends behind it.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
    pub media: MemoryMediaStorage,
    pub upload_dir: tempfile::TempDir,
}

impl TestApp {
    /// Send one request through a clone of the router.
    #[allow(dead_code)]
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Number of files left in the staging directory.
    #[allow(dead_code)]
    pub fn staged_file_count(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

/// Create a test app over in-memory backends and a private staging dir.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(mut config: Config) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    config.upload_dir = upload_dir.path().to_path_buf();

    let db = MemoryDb::new();
    let media = MemoryMediaStorage::new();
    let state = Arc::new(AppState::new(
        config,
        Arc::new(db.clone()),
        Arc::new(media.clone()),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        media,
        upload_dir,
    }
}

// ─── Request helpers ─────────────────────────────────────────

pub const BOUNDARY: &str = "vidhost-test-boundary";

/// One part of a multipart body.
#[allow(dead_code)]
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

#[allow(dead_code)]
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                field,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        field, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[allow(dead_code)]
pub fn multipart_request(method: &str, uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Value of a cookie set by the response, if any.
#[allow(dead_code)]
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookie_headers(response).into_iter().find_map(|header| {
        header
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

// ─── Account helpers ─────────────────────────────────────────

/// Register a user with an avatar; returns the response JSON.
#[allow(dead_code)]
pub async fn register(app: &TestApp, username: &str, email: &str, password: &str) -> serde_json::Value {
    let response = app
        .send(multipart_request(
            "POST",
            "/api/v1/users/register",
            None,
            &[
                Part::Text("username", username),
                Part::Text("email", email),
                Part::Text("fullName", "Test User"),
                Part::Text("password", password),
                Part::File {
                    field: "avatar",
                    file_name: "avatar.png",
                    content_type: "image/png",
                    data: b"\x89PNG fake avatar",
                },
            ],
        ))
        .await;
    assert_eq!(response.status(), 201, "registration failed");
    body_json(response).await
}

/// Log in and return (access token, refresh token).
#[allow(dead_code)]
pub async fn login(app: &TestApp, identifier: &str, password: &str) -> (String, String) {
    let response = app
        .send(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            serde_json::json!({ "identifier": identifier, "password": password }),
        ))
        .await;
    assert_eq!(response.status(), 200, "login failed");
    let body = body_json(response).await;
    (
        body["data"]["accessToken"].as_str().unwrap().to_string(),
        body["data"]["refreshToken"].as_str().unwrap().to_string(),
    )
}

/// Register then log in; returns the access token.
#[allow(dead_code)]
pub async fn signed_in_user(app: &TestApp, username: &str) -> String {
    let email = format!("{}@example.com", username);
    register(app, username, &email, "Secr3t!").await;
    login(app, username, "Secr3t!").await.0
}
