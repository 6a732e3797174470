//! Embedded HTTP API for the flashcard scheduler.
//!
//! Thin transport layer over the lifecycle, review, and queue services.
//! This is the only place the wall clock is read: each request captures
//! `Utc::now()` once and threads it through the service calls, so the
//! library below stays deterministic under test.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::flashcards::{
    CardLifecycle, CardSnapshot, CardSource, CardStatus, Difficulty, DueQueue, Flashcard,
    FlashcardError, FlashcardStore, ReviewSession, ReviewStats,
};

/// Due-queue page size when the caller does not specify one.
const DEFAULT_DUE_LIMIT: usize = 20;

/// Shared service handles, one set per server.
#[derive(Clone)]
pub struct ApiState {
    lifecycle: Arc<CardLifecycle>,
    session: Arc<ReviewSession>,
    queue: Arc<DueQueue>,
}

impl ApiState {
    pub fn new(store: Arc<dyn FlashcardStore>, config: SchedulerConfig) -> Self {
        Self {
            lifecycle: Arc::new(CardLifecycle::new(store.clone(), config.clone())),
            session: Arc::new(ReviewSession::new(store.clone(), config.clone())),
            queue: Arc::new(DueQueue::new(store, config)),
        }
    }
}

/// JSON error body, e.g. `{"error": "flashcard not found"}`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(FlashcardError);

impl From<FlashcardError> for ApiError {
    fn from(err: FlashcardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            FlashcardError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FlashcardError::NotFound => StatusCode::NOT_FOUND,
            FlashcardError::Conflict { .. } => StatusCode::CONFLICT,
            FlashcardError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFlashcardRequest {
    owner_id: Uuid,
    question_ref: String,
    front: String,
    back: String,
    explanation: Option<String>,
    category: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    source: CardSource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    owner_id: Uuid,
    quality: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerRequest {
    owner_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DueQuery {
    owner_id: Uuid,
    limit: Option<usize>,
    /// Timestamp to evaluate dueness against; defaults to the current time.
    as_of: Option<DateTime<Utc>>,
    #[serde(default)]
    include_mastered: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsQuery {
    owner_id: Uuid,
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/flashcards", post(create_flashcard))
        .route("/flashcards/due", get(due_cards))
        .route("/flashcards/stats", get(review_stats))
        .route("/flashcards/{id}/review", post(submit_review))
        .route("/flashcards/{id}/archive", post(archive_card))
        .route("/flashcards/{id}/unarchive", post(unarchive_card))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve the API until the task is cancelled.
pub async fn serve(addr: SocketAddr, state: ApiState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("flashcard API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn create_flashcard(
    State(state): State<ApiState>,
    Json(req): Json<CreateFlashcardRequest>,
) -> Result<Json<Flashcard>, ApiError> {
    let snapshot = CardSnapshot {
        front: req.front,
        back: req.back,
        explanation: req.explanation,
        category: req.category,
        tags: req.tags,
        difficulty: req.difficulty,
    };
    let card = state
        .lifecycle
        .create_or_get(req.owner_id, req.question_ref, snapshot, req.source, Utc::now())
        .await?;
    Ok(Json(card))
}

async fn submit_review(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Flashcard>, ApiError> {
    let card = state
        .session
        .review(id, req.owner_id, req.quality, Utc::now())
        .await?;
    Ok(Json(card))
}

async fn archive_card(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<OwnerRequest>,
) -> Result<Json<Flashcard>, ApiError> {
    let card = state.lifecycle.archive(id, req.owner_id, Utc::now()).await?;
    Ok(Json(card))
}

async fn unarchive_card(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(req): Json<OwnerRequest>,
) -> Result<Json<Flashcard>, ApiError> {
    let card = state.lifecycle.unarchive(id, req.owner_id, Utc::now()).await?;
    Ok(Json(card))
}

async fn due_cards(
    State(state): State<ApiState>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Vec<Flashcard>>, ApiError> {
    let exclude: &[CardStatus] = if query.include_mastered {
        &[]
    } else {
        &[CardStatus::Mastered]
    };
    let cards = state
        .queue
        .due_cards(
            query.owner_id,
            query.as_of.unwrap_or_else(Utc::now),
            query.limit.unwrap_or(DEFAULT_DUE_LIMIT),
            exclude,
        )
        .await?;
    Ok(Json(cards))
}

async fn review_stats(
    State(state): State<ApiState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ReviewStats>, ApiError> {
    let stats = state.lifecycle.stats(query.owner_id, Utc::now()).await?;
    Ok(Json(stats))
}
