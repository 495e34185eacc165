//! Flashcard endpoints, including the SM-2 review operation.

use super::ensure_subject;
use super::extract::AuthUser;
use crate::db::{FlashcardPatch, FlashcardRecord};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use study_srs::Quality;

#[derive(Debug, Serialize)]
pub struct FlashcardResponse {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub front: String,
    pub back: String,
    pub repetition: u32,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub due_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<FlashcardRecord> for FlashcardResponse {
    fn from(card: FlashcardRecord) -> Self {
        Self {
            id: card.id,
            subject_id: card.subject_id,
            front: card.front,
            back: card.back,
            repetition: card.repetition,
            interval_days: card.interval_days,
            ease_factor: card.ease_factor,
            due_at: card.due_at,
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

fn validate_sides(front: &str, back: &str) -> ApiResult<()> {
    if front.trim().is_empty() || back.trim().is_empty() {
        return Err(ApiError::Validation(
            "flashcard front and back must be non-empty".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateFlashcardRequest {
    pub front: String,
    pub back: String,
    pub subject_id: Option<i64>,
}

/// POST /api/flashcards
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFlashcardRequest>,
) -> ApiResult<(StatusCode, Json<FlashcardResponse>)> {
    validate_sides(&req.front, &req.back)?;
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let card = state
        .db
        .flashcards()
        .create(user.id, req.subject_id, &req.front, &req.back)
        .await?;

    Ok((StatusCode::CREATED, Json(card.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListFlashcardsQuery {
    pub subject: Option<i64>,
    /// `due=true` restricts to cards due now.
    pub due: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/flashcards
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListFlashcardsQuery>,
) -> ApiResult<Json<Vec<FlashcardResponse>>> {
    let (limit, offset) = super::page_bounds(&state, query.page, query.per_page);
    let due_before = if query.due.unwrap_or(false) {
        Some(chrono::Utc::now().timestamp())
    } else {
        None
    };

    let cards = state
        .db
        .flashcards()
        .list(user.id, query.subject, due_before, limit, offset)
        .await?;
    Ok(Json(cards.into_iter().map(Into::into).collect()))
}

/// GET /api/flashcards/:id
pub async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<FlashcardResponse>> {
    let card = state
        .db
        .flashcards()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;
    Ok(Json(card.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFlashcardRequest {
    pub front: Option<String>,
    pub back: Option<String>,
    pub subject_id: Option<i64>,
}

/// PATCH /api/flashcards/:id
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFlashcardRequest>,
) -> ApiResult<Json<FlashcardResponse>> {
    if let (Some(front), Some(back)) = (&req.front, &req.back) {
        validate_sides(front, back)?;
    }
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let card = state
        .db
        .flashcards()
        .update(
            user.id,
            id,
            FlashcardPatch {
                subject_id: req.subject_id.map(Some),
                front: req.front.as_deref(),
                back: req.back.as_deref(),
            },
        )
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;

    Ok(Json(card.into()))
}

/// DELETE /api/flashcards/:id
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.db.flashcards().delete(user.id, id).await? {
        return Err(ApiError::NotFound("flashcard"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub quality: u8,
}

/// POST /api/flashcards/:id/review
///
/// Applies one SM-2 review: the recall grade updates the card's
/// scheduling state, the new due date is derived from "now", and the
/// owning subject's progress counter is bumped.
pub async fn review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<Json<FlashcardResponse>> {
    let quality = Quality::new(req.quality)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let card = state
        .db
        .flashcards()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;

    let outcome = study_srs::review(card.card_state(), quality);
    let due_at = (chrono::Utc::now() + chrono::Duration::days(i64::from(outcome.due_in_days)))
        .timestamp();

    let updated = state
        .db
        .flashcards()
        .apply_review(user.id, id, outcome.state, due_at)
        .await?
        .ok_or(ApiError::NotFound("flashcard"))?;

    if let Some(subject_id) = updated.subject_id {
        state.db.progress().record_review(user.id, subject_id).await?;
    }

    metrics::record_review(quality.value());
    tracing::debug!(
        card = id,
        quality = quality.value(),
        interval_days = outcome.state.interval_days,
        "flashcard reviewed"
    );

    Ok(Json(updated.into()))
}
