//! Practice question endpoints and quiz building/grading.
//!
//! The correct answer index never leaves the server in a quiz payload;
//! grading happens here, and the verdicts (with the correct index) are
//! only revealed in the submission response.

use super::extract::AuthUser;
use super::{PageQuery, ensure_subject};
use crate::db::{QuestionPatch, QuestionRecord, QuizAttempt};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

const DEFAULT_QUIZ_SIZE: u32 = 10;
const MAX_QUIZ_SIZE: u32 = 50;

/// Owner's view of a question (includes the answer).
#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<QuestionRecord> for QuestionResponse {
    fn from(question: QuestionRecord) -> Self {
        Self {
            id: question.id,
            subject_id: question.subject_id,
            prompt: question.prompt,
            options: question.options,
            correct_index: question.correct_index,
            created_at: question.created_at,
            updated_at: question.updated_at,
        }
    }
}

fn validate_question(prompt: &str, options: &[String], correct_index: u32) -> ApiResult<()> {
    if prompt.trim().is_empty() {
        return Err(ApiError::Validation("question prompt must be non-empty".into()));
    }
    if options.len() < 2 || options.len() > 10 {
        return Err(ApiError::Validation(
            "questions need between 2 and 10 options".into(),
        ));
    }
    if options.iter().any(|option| option.trim().is_empty()) {
        return Err(ApiError::Validation("options must be non-empty".into()));
    }
    if correct_index as usize >= options.len() {
        return Err(ApiError::Validation(
            "correct_index is out of range for the given options".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: u32,
    pub subject_id: Option<i64>,
}

/// POST /api/questions
pub async fn create_question(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateQuestionRequest>,
) -> ApiResult<(StatusCode, Json<QuestionResponse>)> {
    validate_question(&req.prompt, &req.options, req.correct_index)?;
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let question = state
        .db
        .questions()
        .create(user.id, req.subject_id, &req.prompt, &req.options, req.correct_index)
        .await?;

    Ok((StatusCode::CREATED, Json(question.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListQuestionsQuery {
    pub subject: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/questions
pub async fn list_questions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuestionsQuery>,
) -> ApiResult<Json<Vec<QuestionResponse>>> {
    let (limit, offset) = super::page_bounds(&state, query.page, query.per_page);
    let questions = state
        .db
        .questions()
        .list(user.id, query.subject, limit, offset)
        .await?;
    Ok(Json(questions.into_iter().map(Into::into).collect()))
}

/// GET /api/questions/:id
pub async fn retrieve_question(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<QuestionResponse>> {
    let question = state
        .db
        .questions()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("question"))?;
    Ok(Json(question.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub prompt: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_index: Option<u32>,
    pub subject_id: Option<i64>,
}

/// PATCH /api/questions/:id
pub async fn update_question(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateQuestionRequest>,
) -> ApiResult<Json<QuestionResponse>> {
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    // Validate the patched question as a whole, not field by field.
    let existing = state
        .db
        .questions()
        .find(user.id, id)
        .await?
        .ok_or(ApiError::NotFound("question"))?;
    let prompt = req.prompt.as_deref().unwrap_or(&existing.prompt);
    let options = req.options.as_deref().unwrap_or(&existing.options);
    let correct_index = req.correct_index.unwrap_or(existing.correct_index);
    validate_question(prompt, options, correct_index)?;

    let question = state
        .db
        .questions()
        .update(
            user.id,
            id,
            QuestionPatch {
                subject_id: req.subject_id.map(Some),
                prompt: req.prompt.as_deref(),
                options: req.options.as_deref(),
                correct_index: req.correct_index,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("question"))?;

    Ok(Json(question.into()))
}

/// DELETE /api/questions/:id
pub async fn remove_question(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.db.questions().delete(user.id, id).await? {
        return Err(ApiError::NotFound("question"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// A question as presented in a quiz: the answer is withheld.
#[derive(Debug, Serialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BuildQuizQuery {
    pub subject: Option<i64>,
    pub count: Option<u32>,
}

/// GET /api/quiz
pub async fn build(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<BuildQuizQuery>,
) -> ApiResult<Json<Vec<QuizQuestion>>> {
    if let Some(subject_id) = query.subject {
        ensure_subject(&state, user.id, subject_id).await?;
    }
    let count = query.count.unwrap_or(DEFAULT_QUIZ_SIZE).clamp(1, MAX_QUIZ_SIZE);

    let questions = state
        .db
        .questions()
        .sample(user.id, query.subject, count)
        .await?;

    Ok(Json(
        questions
            .into_iter()
            .map(|question| QuizQuestion {
                id: question.id,
                prompt: question.prompt,
                options: question.options,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct QuizAnswer {
    pub question_id: i64,
    pub choice: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub subject_id: Option<i64>,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Serialize)]
pub struct AnswerVerdict {
    pub question_id: i64,
    pub correct: bool,
    pub correct_index: u32,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub attempt_id: i64,
    pub total: u32,
    pub correct: u32,
    pub score_percent: f64,
    pub results: Vec<AnswerVerdict>,
}

/// POST /api/quiz
pub async fn submit(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<SubmitQuizRequest>,
) -> ApiResult<Json<SubmitQuizResponse>> {
    if req.answers.is_empty() {
        return Err(ApiError::Validation("a quiz needs at least one answer".into()));
    }
    if let Some(subject_id) = req.subject_id {
        ensure_subject(&state, user.id, subject_id).await?;
    }

    let mut results = Vec::with_capacity(req.answers.len());
    let mut correct_count: u32 = 0;

    for answer in &req.answers {
        let question = state
            .db
            .questions()
            .find(user.id, answer.question_id)
            .await?
            .ok_or(ApiError::NotFound("question"))?;

        let correct = answer.choice == question.correct_index;
        if correct {
            correct_count += 1;
        }
        results.push(AnswerVerdict {
            question_id: question.id,
            correct,
            correct_index: question.correct_index,
        });
    }

    let total = req.answers.len() as u32;
    let attempt = state
        .db
        .questions()
        .record_attempt(user.id, req.subject_id, total, correct_count)
        .await?;

    if let Some(subject_id) = req.subject_id {
        state
            .db
            .progress()
            .record_quiz(user.id, subject_id, total, correct_count)
            .await?;
    }

    metrics::inc(&metrics::QUIZZES_GRADED);
    tracing::debug!(user = user.id, total, correct = correct_count, "quiz graded");

    Ok(Json(SubmitQuizResponse {
        attempt_id: attempt.id,
        total,
        correct: correct_count,
        score_percent: f64::from(correct_count) / f64::from(total) * 100.0,
        results,
    }))
}

#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub total: u32,
    pub correct: u32,
    pub taken_at: i64,
}

impl From<QuizAttempt> for AttemptResponse {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            id: attempt.id,
            subject_id: attempt.subject_id,
            total: attempt.total,
            correct: attempt.correct,
            taken_at: attempt.taken_at,
        }
    }
}

/// GET /api/quiz/attempts
pub async fn attempts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Vec<AttemptResponse>>> {
    let (limit, offset) = query.bounds(&state);
    let attempts = state.db.questions().list_attempts(user.id, limit, offset).await?;
    Ok(Json(attempts.into_iter().map(Into::into).collect()))
}
