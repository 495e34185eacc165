//! Account and session endpoints.

use super::extract::{AuthUser, bearer_token};
use crate::db::User;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::tokens;
use crate::state::AppState;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Public view of a user account.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub last_seen_at: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            created_at: user.created_at,
            last_seen_at: user.last_seen_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

fn validate_username(username: &str) -> ApiResult<()> {
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be 3-32 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ApiError::Validation(
            "username may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    Ok(())
}

fn validate_password(state: &AppState, password: &str) -> ApiResult<()> {
    let min = state.config.security.min_password_len;
    if password.len() < min {
        return Err(ApiError::Validation(format!(
            "password must be at least {min} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> ApiResult<()> {
    if !email.contains('@') || email.len() > 254 {
        return Err(ApiError::Validation("invalid email address".into()));
    }
    Ok(())
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    validate_username(&req.username)?;
    validate_password(&state, &req.password)?;
    if let Some(ref email) = req.email {
        validate_email(email)?;
    }

    let user = state
        .db
        .users()
        .register(&req.username, &req.password, req.email.as_deref())
        .await?;

    metrics::inc(&metrics::USERS_REGISTERED);
    tracing::info!(username = %user.username, id = user.id, "account registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: UserResponse,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    // Stricter than the global request limiter: failed guesses are cheap
    // for the client and expensive for us (Argon2).
    if !state.limiter.check_login_rate(addr.ip()) {
        metrics::record_rate_limited();
        return Err(ApiError::RateLimited);
    }

    let user = state
        .db
        .users()
        .authenticate(&req.username, &req.password)
        .await?;

    let (token, digest) = tokens::generate();
    let expires_at = state
        .db
        .sessions()
        .create(user.id, &digest, state.session_ttl_secs())
        .await?;

    tracing::info!(username = %user.username, "login");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        user: user.into(),
    }))
}

/// POST /api/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let token = bearer_token(&headers)?;
    let digest = tokens::hash(token);

    if !state.db.sessions().revoke(&digest).await? {
        return Err(ApiError::Unauthorized);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// PATCH /api/me
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateMeRequest>,
) -> ApiResult<Json<UserResponse>> {
    if let Some(ref email) = req.email {
        validate_email(email)?;
    }

    let updated = state
        .db
        .users()
        .update_profile(user.id, req.email.as_deref(), req.display_name.as_deref())
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// PUT /api/me/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    validate_password(&state, &req.new_password)?;

    state
        .db
        .users()
        .change_password(user.id, &req.old_password, &req.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DeleteMeRequest {
    pub password: String,
}

/// DELETE /api/me
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<DeleteMeRequest>,
) -> ApiResult<StatusCode> {
    state.db.users().delete(user.id, &req.password).await?;
    tracing::info!(username = %user.username, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}
