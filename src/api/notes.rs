//! Note endpoints.

use super::extract::AuthUser;
use super::{PageQuery, ensure_subject};
use crate::db::{NotePatch, NoteRecord};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: i64,
    pub user_id: i64,
    pub subject_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub shared: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<NoteRecord> for NoteResponse {
    fn from(note: NoteRecord) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id,
            subject_id: note.subject_id,
            title: note.title,
            body: note.body,
            shared: note.shared,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

fn validate_title(title: &str) -> ApiResult<()> {
    if title.trim().is_empty() || title.len() > 200 {
        return Err(ApiError::Validation(
            "note title must be 1-200 characters".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub shared: bool,
}

/// POST /api/notes
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<(StatusCode, Json<NoteResponse>)> {
    validate_title(&req.title)?;
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let note = state
        .db
        .notes()
        .create(user.id, req.subject_id, req.title.trim(), &req.body, req.shared)
        .await?;

    Ok((StatusCode::CREATED, Json(note.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListNotesQuery {
    pub subject: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/notes
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListNotesQuery>,
) -> ApiResult<Json<Vec<NoteResponse>>> {
    let (limit, offset) = super::page_bounds(&state, query.page, query.per_page);
    let notes = state
        .db
        .notes()
        .list(user.id, query.subject, limit, offset)
        .await?;
    Ok(Json(notes.into_iter().map(Into::into).collect()))
}

/// GET /api/notes/shared
pub async fn list_shared(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<NoteResponse>>> {
    let (limit, offset) = query.bounds(&state);
    let notes = state.db.notes().list_shared(user.id, limit, offset).await?;
    Ok(Json(notes.into_iter().map(Into::into).collect()))
}

/// GET /api/notes/:id
pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<NoteResponse>> {
    let note = state
        .db
        .notes()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("note"))?;
    Ok(Json(note.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub subject_id: Option<i64>,
    pub shared: Option<bool>,
}

/// PATCH /api/notes/:id
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<NoteResponse>> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let note = state
        .db
        .notes()
        .update(
            user.id,
            id,
            NotePatch {
                subject_id: req.subject_id.map(Some),
                title: req.title.as_deref().map(str::trim),
                body: req.body.as_deref(),
                shared: req.shared,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("note"))?;

    Ok(Json(note.into()))
}

/// DELETE /api/notes/:id
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.db.notes().delete(user.id, id).await? {
        return Err(ApiError::NotFound("note"));
    }
    Ok(StatusCode::NO_CONTENT)
}
