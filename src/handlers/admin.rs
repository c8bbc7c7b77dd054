// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    error::AppError,
    models::question::{QuestionFilter, QuestionPayload},
    placement::service::PlacementService,
};

/// Lists bank questions, answer keys included.
/// Admin only. Filters: category, difficulty, questionType, isActive, page, perPage.
pub async fn list_questions(
    State(service): State<PlacementService>,
    Query(filter): Query<QuestionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let page = service.list_questions(&filter).await?;
    Ok(Json(page))
}

pub async fn get_question(
    State(service): State<PlacementService>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = service.get_question(id).await?;
    Ok(Json(question))
}

/// Creates a question.
/// Admin only. The answer key must be consistent with the question type.
pub async fn create_question(
    State(service): State<PlacementService>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let question = service.create_question(payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// Replaces a question. Sessions already graded keep their recorded results.
pub async fn update_question(
    State(service): State<PlacementService>,
    Path(id): Path<i64>,
    Json(payload): Json<QuestionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let question = service.update_question(id, payload).await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(service): State<PlacementService>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Level distribution, score histogram and category averages.
pub async fn get_statistics(
    State(service): State<PlacementService>,
) -> Result<impl IntoResponse, AppError> {
    let stats = service.statistics().await?;
    Ok(Json(stats))
}

/// Lets a user take the placement test again.
/// Idempotent: repeated calls report zero abandoned sessions.
pub async fn allow_retake(
    State(service): State<PlacementService>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let abandoned = service.allow_retake(user_id).await?;
    Ok(Json(json!({
        "userId": user_id,
        "abandonedSessions": abandoned,
    })))
}
