//! Progress summary endpoint.

use super::extract::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub subject_id: i64,
    pub subject: String,
    pub cards_reviewed: i64,
    pub quizzes_taken: i64,
    pub questions_answered: i64,
    pub correct_answers: i64,
    /// Fraction of quiz answers that were correct, 0.0 when none yet.
    pub accuracy: f64,
    pub last_activity_at: i64,
}

/// GET /api/progress
pub async fn summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<ProgressResponse>>> {
    let rows = state.db.progress().summary(user.id).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| {
                let accuracy = if row.questions_answered > 0 {
                    row.correct_answers as f64 / row.questions_answered as f64
                } else {
                    0.0
                };
                ProgressResponse {
                    subject_id: row.subject_id,
                    subject: row.subject_name,
                    cards_reviewed: row.cards_reviewed,
                    quizzes_taken: row.quizzes_taken,
                    questions_answered: row.questions_answered,
                    correct_answers: row.correct_answers,
                    accuracy,
                    last_activity_at: row.last_activity_at,
                }
            })
            .collect(),
    ))
}
