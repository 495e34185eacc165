//! REST API surface.
//!
//! One submodule per entity; this module owns the router, the CORS and
//! metrics/rate-limit middleware, and the health endpoint.

mod auth;
mod extract;
mod flashcards;
mod materials;
mod notes;
mod progress;
mod quiz;
mod subjects;
mod uploads;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::extract::{ConnectInfo, DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // Browser frontends talk to this API from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    // Chunk bodies may exceed axum's 2 MiB default; JSON bodies never
    // get near this.
    let body_limit = state.config.storage.max_chunk_bytes as usize + 64 * 1024;

    let api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route(
            "/me",
            get(auth::me).patch(auth::update_me).delete(auth::delete_me),
        )
        .route("/me/password", put(auth::change_password))
        .route("/subjects", post(subjects::create).get(subjects::list))
        .route(
            "/subjects/:id",
            get(subjects::retrieve)
                .patch(subjects::update)
                .delete(subjects::remove),
        )
        .route("/notes", post(notes::create).get(notes::list))
        .route("/notes/shared", get(notes::list_shared))
        .route(
            "/notes/:id",
            get(notes::retrieve).patch(notes::update).delete(notes::remove),
        )
        .route("/flashcards", post(flashcards::create).get(flashcards::list))
        .route(
            "/flashcards/:id",
            get(flashcards::retrieve)
                .patch(flashcards::update)
                .delete(flashcards::remove),
        )
        .route("/flashcards/:id/review", post(flashcards::review))
        .route("/questions", post(quiz::create_question).get(quiz::list_questions))
        .route(
            "/questions/:id",
            get(quiz::retrieve_question)
                .patch(quiz::update_question)
                .delete(quiz::remove_question),
        )
        .route("/quiz", get(quiz::build).post(quiz::submit))
        .route("/quiz/attempts", get(quiz::attempts))
        .route("/materials", post(materials::create).get(materials::list))
        .route(
            "/materials/:id",
            get(materials::retrieve)
                .patch(materials::update)
                .delete(materials::remove),
        )
        .route("/materials/:id/download", get(materials::download))
        .route("/uploads", post(uploads::begin))
        .route("/uploads/:id/chunks/:index", put(uploads::put_chunk))
        .route("/uploads/:id/complete", post(uploads::complete))
        .route("/uploads/:id", delete(uploads::abort))
        .route("/progress", get(progress::summary));

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn(track_metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Record throughput and latency for every request.
async fn track_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().as_str().to_owned();
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::record_request(
        &route,
        &method,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Reject clients that exceed the per-IP request budget.
async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    if !state.limiter.check_request_rate(addr.ip()) {
        metrics::record_rate_limited();
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server: String,
}

/// Liveness plus a database ping.
async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.db.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        server: state.config.server.name.clone(),
    }))
}

/// Verify that `subject_id` exists and belongs to `user_id`.
///
/// Foreign keys only guarantee the subject exists; ownership is an
/// application rule enforced here for every entity that files under a
/// subject.
pub(crate) async fn ensure_subject(
    state: &AppState,
    user_id: i64,
    subject_id: i64,
) -> ApiResult<()> {
    state
        .db
        .subjects()
        .find(user_id, subject_id)
        .await?
        .ok_or(ApiError::NotFound("subject"))?;
    Ok(())
}

/// Paging parameters shared by the list endpoints.
///
/// Kept as plain fields on each query struct (rather than a flattened
/// struct) because serde's flatten buffers query-string values as
/// strings, which breaks typed fields under `serde_urlencoded`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Resolve to `(limit, offset)` under the configured caps.
    pub(crate) fn bounds(&self, state: &AppState) -> (u32, u32) {
        page_bounds(state, self.page, self.per_page)
    }
}

/// Resolve client paging to `(limit, offset)` under the configured caps.
pub(crate) fn page_bounds(state: &AppState, page: Option<u32>, per_page: Option<u32>) -> (u32, u32) {
    let limit = state.config.limits.clamp_page_size(per_page);
    let page = page.unwrap_or(1).max(1);
    (limit, (page - 1).saturating_mul(limit))
}
