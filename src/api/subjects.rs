//! Subject endpoints.

use super::extract::AuthUser;
use crate::db::SubjectRecord;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct SubjectResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

impl From<SubjectRecord> for SubjectResponse {
    fn from(subject: SubjectRecord) -> Self {
        Self {
            id: subject.id,
            name: subject.name,
            description: subject.description,
            created_at: subject.created_at,
        }
    }
}

fn validate_name(name: &str) -> ApiResult<()> {
    if name.trim().is_empty() || name.len() > 100 {
        return Err(ApiError::Validation(
            "subject name must be 1-100 characters".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub description: Option<String>,
}

/// POST /api/subjects
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateSubjectRequest>,
) -> ApiResult<(StatusCode, Json<SubjectResponse>)> {
    validate_name(&req.name)?;

    let subject = state
        .db
        .subjects()
        .create(user.id, req.name.trim(), req.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(subject.into())))
}

/// GET /api/subjects
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<SubjectResponse>>> {
    let subjects = state.db.subjects().list(user.id).await?;
    Ok(Json(subjects.into_iter().map(Into::into).collect()))
}

/// GET /api/subjects/:id
pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SubjectResponse>> {
    let subject = state
        .db
        .subjects()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("subject"))?;
    Ok(Json(subject.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// PATCH /api/subjects/:id
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSubjectRequest>,
) -> ApiResult<Json<SubjectResponse>> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }

    let subject = state
        .db
        .subjects()
        .update(
            user.id,
            id,
            req.name.as_deref().map(str::trim),
            req.description.as_deref(),
        )
        .await?
        .ok_or(ApiError::NotFound("subject"))?;

    Ok(Json(subject.into()))
}

/// DELETE /api/subjects/:id
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.db.subjects().delete(user.id, id).await? {
        return Err(ApiError::NotFound("subject"));
    }
    Ok(StatusCode::NO_CONTENT)
}
