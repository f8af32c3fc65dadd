// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes under `/api/v1/users`.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::models::{ChannelProfile, UserProfile, VideoWithOwner};
use crate::routes::form::MultipartForm;
use crate::routes::{json_body, ApiResponse};
use crate::services::{ProfileImage, Registration, TokenPair};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Registration, login and refresh.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/login", post(login))
        .route("/api/v1/users/refresh-token", post(refresh_token))
}

/// Routes that act on the authenticated caller.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/logout", post(logout))
        .route("/api/v1/users/reset-password", post(reset_password))
        .route("/api/v1/users/profile", patch(update_profile))
        .route("/api/v1/users/me", get(get_me))
        .route("/api/v1/users/avatar", patch(update_avatar))
        .route("/api/v1/users/cover-image", patch(update_cover_image))
        .route("/api/v1/users/channel/{username}", get(get_channel))
        .route(
            "/api/v1/users/channel/{username}/subscribe",
            post(toggle_subscription),
        )
        .route("/api/v1/users/history", get(get_watch_history))
}

// ─── Cookies ─────────────────────────────────────────────────

fn session_cookie(
    config: &Config,
    name: &'static str,
    value: String,
    ttl: Duration,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(config.cookie_secure)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

fn removal_cookie(config: &Config, name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .secure(config.cookie_secure)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

fn with_session_cookies(jar: CookieJar, state: &AppState, pair: &TokenPair) -> CookieJar {
    jar.add(session_cookie(
        &state.config,
        ACCESS_TOKEN_COOKIE,
        pair.access_token.clone(),
        state.tokens.access_ttl(),
    ))
    .add(session_cookie(
        &state.config,
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.clone(),
        state.tokens.refresh_ttl(),
    ))
}

// ─── Registration & Session ──────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>> {
    let mut form =
        MultipartForm::stage(multipart, &state.config.upload_dir, &["avatar", "coverImage"])
            .await?;

    let registration = Registration {
        username: form.text("username"),
        email: form.text("email"),
        full_name: form.text("fullName"),
        password: form.text("password"),
    };
    let avatar = form.take_file("avatar");
    let cover_image = form.take_file("coverImage");

    let profile = state
        .accounts
        .register(registration, avatar, cover_image)
        .await?;

    Ok(ApiResponse::created(profile, "User registered successfully"))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email
    #[serde(alias = "username", alias = "email")]
    identifier: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SessionResponse>)> {
    let request = json_body(body)?;
    let (user, pair) = state
        .accounts
        .login(&request.identifier, &request.password)
        .await?;

    let jar = with_session_cookies(jar, &state, &pair);
    Ok((
        jar,
        ApiResponse::ok(
            SessionResponse {
                user,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>)> {
    state.accounts.logout(&user.user_id).await?;

    let jar = jar
        .add(removal_cookie(&state.config, ACCESS_TOKEN_COOKIE))
        .add(removal_cookie(&state.config, REFRESH_TOKEN_COOKIE));
    Ok((
        jar,
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Refresh token from the cookie, else from an optional JSON body.
fn presented_refresh_token(jar: &CookieJar, body: &[u8]) -> Option<String> {
    if let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<RefreshRequest>(body)
        .ok()
        .and_then(|r| r.refresh_token)
        .filter(|t| !t.trim().is_empty())
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<SessionResponse>)> {
    let token = presented_refresh_token(&jar, &body).ok_or(AppError::MissingToken)?;
    let (user, pair) = state.accounts.refresh(&token).await?;

    let jar = with_session_cookies(jar, &state, &pair);
    Ok((
        jar,
        ApiResponse::ok(
            SessionResponse {
                user,
                access_token: pair.access_token,
                refresh_token: pair.refresh_token,
            },
            "Access token refreshed",
        ),
    ))
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    old_password: String,
    new_password: String,
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<serde_json::Value>> {
    let request = json_body(body)?;
    state
        .accounts
        .change_password(&user.user_id, &request.old_password, &request.new_password)
        .await?;
    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<ApiResponse<UserProfile>> {
    let request = json_body(body)?;
    let profile = state
        .accounts
        .update_profile(
            &user.user_id,
            request.email.as_deref(),
            request.full_name.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(profile, "Account details updated"))
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<UserProfile>> {
    let profile = state.accounts.current_user(&user.user_id).await?;
    Ok(ApiResponse::ok(profile, "Current user fetched"))
}

async fn replace_image(
    state: &AppState,
    user: &AuthUser,
    multipart: std::result::Result<Multipart, MultipartRejection>,
    field: &str,
    image: ProfileImage,
) -> Result<UserProfile> {
    let mut form = MultipartForm::stage(multipart, &state.config.upload_dir, &[field]).await?;
    state
        .accounts
        .replace_image(&user.user_id, image, form.take_file(field))
        .await
}

async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>> {
    let profile = replace_image(&state, &user, multipart, "avatar", ProfileImage::Avatar).await?;
    Ok(ApiResponse::ok(profile, "Avatar updated"))
}

async fn update_cover_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>> {
    let profile = replace_image(
        &state,
        &user,
        multipart,
        "coverImage",
        ProfileImage::CoverImage,
    )
    .await?;
    Ok(ApiResponse::ok(profile, "Cover image updated"))
}

// ─── Channels & History ──────────────────────────────────────

async fn get_channel(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<ApiResponse<ChannelProfile>> {
    let channel = state
        .accounts
        .channel_profile(&user.user_id, &username)
        .await?;
    Ok(ApiResponse::ok(channel, "Channel fetched"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub is_subscribed: bool,
}

async fn toggle_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(username): Path<String>,
) -> Result<ApiResponse<SubscriptionResponse>> {
    let is_subscribed = state
        .accounts
        .toggle_subscription(&user.user_id, &username)
        .await?;
    let message = if is_subscribed {
        "Subscribed"
    } else {
        "Unsubscribed"
    };
    Ok(ApiResponse::ok(SubscriptionResponse { is_subscribed }, message))
}

async fn get_watch_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<Vec<VideoWithOwner>>> {
    let history = state.accounts.watch_history(&user.user_id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::COOKIE, Request};

    fn jar_with(cookie: &str) -> CookieJar {
        let request = Request::builder()
            .header(COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        CookieJar::from_headers(request.headers())
    }

    #[test]
    fn test_refresh_token_sources() {
        let empty = CookieJar::new();
        assert_eq!(presented_refresh_token(&empty, b""), None);
        assert_eq!(
            presented_refresh_token(&empty, br#"{"refreshToken":"body-token"}"#).as_deref(),
            Some("body-token")
        );
        assert_eq!(presented_refresh_token(&empty, b"not json"), None);

        let jar = jar_with("refreshToken=cookie-token");
        assert_eq!(
            presented_refresh_token(&jar, br#"{"refreshToken":"body-token"}"#).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = Config::test_default();
        let cookie = session_cookie(
            &config,
            ACCESS_TOKEN_COOKIE,
            "abc".to_string(),
            Duration::from_secs(900),
        );
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("accessToken=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Max-Age=900"));
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let rendered = removal_cookie(&Config::test_default(), REFRESH_TOKEN_COOKIE).to_string();
        assert!(rendered.starts_with("refreshToken=;"));
        assert!(rendered.contains("Max-Age=0"));
    }
}
