//! Chunked upload endpoints.
//!
//! Lifecycle: `begin` declares the file (size, chunk count, optional
//! digest), `put_chunk` stages one chunk at a time, `complete` assembles
//! and verifies, `abort` discards. Sessions are scoped to their creator.

use super::extract::AuthUser;
use super::{ensure_subject, materials};
use crate::db::NewMaterial;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BeginUploadRequest {
    pub file_name: String,
    pub total_size: u64,
    pub chunk_count: u32,
    pub sha256: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BeginUploadResponse {
    pub id: String,
    pub file_name: String,
    pub total_size: u64,
    pub chunk_count: u32,
}

/// POST /api/uploads
pub async fn begin(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<BeginUploadRequest>,
) -> ApiResult<(StatusCode, Json<BeginUploadResponse>)> {
    if req.file_name.trim().is_empty() || req.file_name.len() > 255 {
        return Err(ApiError::Validation("file name must be 1-255 characters".into()));
    }
    if req.total_size == 0 {
        return Err(ApiError::Validation("total_size must be greater than zero".into()));
    }
    let max = state.config.storage.max_upload_bytes;
    if req.total_size > max {
        return Err(ApiError::PayloadTooLarge(format!(
            "declared size {} exceeds the {max} byte limit",
            req.total_size
        )));
    }
    if req.chunk_count == 0 || u64::from(req.chunk_count) > req.total_size {
        return Err(ApiError::Validation(
            "chunk_count must be between 1 and total_size".into(),
        ));
    }
    if let Some(ref digest) = req.sha256
        && (digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return Err(ApiError::Validation(
            "sha256 must be 64 hex characters".into(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let session = state
        .db
        .uploads()
        .create(
            &id,
            user.id,
            req.file_name.trim(),
            req.total_size as i64,
            req.chunk_count,
            req.sha256.as_deref(),
        )
        .await?;

    metrics::inc(&metrics::UPLOADS_STARTED);
    tracing::info!(upload = %id, file = %session.file_name, chunks = req.chunk_count, "upload session opened");

    Ok((
        StatusCode::CREATED,
        Json(BeginUploadResponse {
            id: session.id,
            file_name: session.file_name,
            total_size: req.total_size,
            chunk_count: session.chunk_count,
        }),
    ))
}

/// PUT /api/uploads/:id/chunks/:index
pub async fn put_chunk(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((id, index)): Path<(String, u32)>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let session = state
        .db
        .uploads()
        .find(user.id, &id)
        .await?
        .ok_or(ApiError::NotFound("upload"))?;

    if index >= session.chunk_count {
        return Err(ApiError::Validation(format!(
            "chunk index {index} out of range (chunk_count = {})",
            session.chunk_count
        )));
    }
    if body.is_empty() {
        return Err(ApiError::Validation("chunk body must be non-empty".into()));
    }
    let max_chunk = state.config.storage.max_chunk_bytes;
    if body.len() as u64 > max_chunk {
        return Err(ApiError::PayloadTooLarge(format!(
            "chunk of {} bytes exceeds the {max_chunk} byte limit",
            body.len()
        )));
    }
    if !state.limiter.check_upload_rate(user.id) {
        metrics::record_rate_limited();
        return Err(ApiError::RateLimited);
    }

    state.uploads.write_chunk(&id, index, &body).await?;
    state
        .db
        .uploads()
        .record_chunk(&id, index, body.len() as i64)
        .await?;

    metrics::inc(&metrics::UPLOAD_CHUNKS);
    metrics::inc_by(&metrics::UPLOAD_BYTES, body.len() as u64);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteUploadRequest {
    /// When present, a material record is created for the assembled file.
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub material: Option<materials::MaterialResponse>,
}

/// POST /api/uploads/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    body: Option<Json<CompleteUploadRequest>>,
) -> ApiResult<Json<CompleteUploadResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let session = state
        .db
        .uploads()
        .find(user.id, &id)
        .await?
        .ok_or(ApiError::NotFound("upload"))?;

    if let Some(ref title) = req.title {
        materials::validate_title(title)?;
    }
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let received = state.db.uploads().chunks(&id).await?.len() as u32;
    if received != session.chunk_count {
        return Err(ApiError::UploadIncomplete {
            expected: session.chunk_count,
            received,
        });
    }

    let assembled = state
        .uploads
        .assemble(
            &id,
            session.chunk_count,
            session.total_size as u64,
            session.declared_sha256.as_deref(),
        )
        .await?;

    state.db.uploads().delete(&id).await?;
    metrics::inc(&metrics::UPLOADS_COMPLETED);
    tracing::info!(
        upload = %id,
        size = assembled.size_bytes,
        sha256 = %assembled.sha256,
        "upload assembled"
    );

    let material = match req.title {
        Some(title) => Some(
            state
                .db
                .materials()
                .create(NewMaterial {
                    user_id: user.id,
                    subject_id: req.subject_id,
                    title: title.trim(),
                    description: req.description.as_deref(),
                    file_name: &assembled.file_name,
                    original_name: &session.file_name,
                    size_bytes: assembled.size_bytes as i64,
                    sha256: &assembled.sha256,
                })
                .await?
                .into(),
        ),
        None => None,
    };

    Ok(Json(CompleteUploadResponse {
        file_name: assembled.file_name,
        size_bytes: assembled.size_bytes,
        sha256: assembled.sha256,
        material,
    }))
}

/// DELETE /api/uploads/:id
pub async fn abort(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db
        .uploads()
        .find(user.id, &id)
        .await?
        .ok_or(ApiError::NotFound("upload"))?;

    state.db.uploads().delete(&id).await?;
    state.uploads.remove_staging(&id).await;
    metrics::inc(&metrics::UPLOADS_ABORTED);
    tracing::info!(upload = %id, "upload aborted");

    Ok(StatusCode::NO_CONTENT)
}
