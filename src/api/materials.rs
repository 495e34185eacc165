//! Study material endpoints.
//!
//! Material rows are usually created by the upload `complete` endpoint;
//! POST here binds metadata to an already-assembled file instead (the
//! two-step flow some clients prefer).

use super::ensure_subject;
use super::extract::AuthUser;
use crate::db::{MaterialRecord, NewMaterial};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Serialize)]
pub struct MaterialResponse {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub original_name: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub created_at: i64,
}

impl From<MaterialRecord> for MaterialResponse {
    fn from(material: MaterialRecord) -> Self {
        Self {
            id: material.id,
            subject_id: material.subject_id,
            title: material.title,
            description: material.description,
            original_name: material.original_name,
            size_bytes: material.size_bytes,
            sha256: material.sha256,
            created_at: material.created_at,
        }
    }
}

pub(crate) fn validate_title(title: &str) -> ApiResult<()> {
    if title.trim().is_empty() || title.len() > 200 {
        return Err(ApiError::Validation(
            "material title must be 1-200 characters".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateMaterialRequest {
    pub title: String,
    pub description: Option<String>,
    pub subject_id: Option<i64>,
    /// Name returned by the upload `complete` endpoint.
    pub file_name: String,
    pub original_name: Option<String>,
}

/// POST /api/materials
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateMaterialRequest>,
) -> ApiResult<(StatusCode, Json<MaterialResponse>)> {
    validate_title(&req.title)?;
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    // File names are upload-session UUIDs; anything else (especially
    // anything path-like) is rejected before touching the filesystem.
    if !req
        .file_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ApiError::Validation("invalid file name".into()));
    }

    let path = state.uploads.file_path(&req.file_name);
    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound("file"))?;
    let digest = Sha256::digest(&data);
    let sha256: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    let material = state
        .db
        .materials()
        .create(NewMaterial {
            user_id: user.id,
            subject_id: req.subject_id,
            title: req.title.trim(),
            description: req.description.as_deref(),
            file_name: &req.file_name,
            original_name: req.original_name.as_deref().unwrap_or(&req.file_name),
            size_bytes: data.len() as i64,
            sha256: &sha256,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(material.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListMaterialsQuery {
    pub subject: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/materials
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListMaterialsQuery>,
) -> ApiResult<Json<Vec<MaterialResponse>>> {
    let (limit, offset) = super::page_bounds(&state, query.page, query.per_page);
    let materials = state
        .db
        .materials()
        .list(user.id, query.subject, limit, offset)
        .await?;
    Ok(Json(materials.into_iter().map(Into::into).collect()))
}

/// GET /api/materials/:id
pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MaterialResponse>> {
    let material = state
        .db
        .materials()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("material"))?;
    Ok(Json(material.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject_id: Option<i64>,
}

/// PATCH /api/materials/:id
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMaterialRequest>,
) -> ApiResult<Json<MaterialResponse>> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let material = state
        .db
        .materials()
        .update(
            user.id,
            id,
            req.title.as_deref().map(str::trim),
            req.description.as_deref(),
            req.subject_id.map(Some),
        )
        .await?
        .ok_or(ApiError::NotFound("material"))?;

    Ok(Json(material.into()))
}

/// DELETE /api/materials/:id
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let material = state
        .db
        .materials()
        .delete(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("material"))?;

    state.uploads.remove_file(&material.file_name).await;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/materials/:id/download
pub async fn download(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let material = state
        .db
        .materials()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("material"))?;

    let path = state.uploads.file_path(&material.file_name);
    let data = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!(material = id, error = %e, "stored file missing or unreadable");
        ApiError::NotFound("file")
    })?;

    // Quotes and control characters would corrupt the header value.
    let safe_name: String = material
        .original_name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{safe_name}\""),
            ),
        ],
        data,
    ))
}
