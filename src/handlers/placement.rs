// src/handlers/placement.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::session::SubmitAnswerRequest,
    placement::service::PlacementService,
    utils::jwt::Claims,
};

/// Starts a placement test for the caller.
///
/// * Samples a balanced question set from the active bank.
/// * Fails with 409 if the caller already has a session in progress.
/// * Returns the questions without answer keys.
pub async fn start_session(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let started = service.start_session(claims.user_id()?).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// Resumes the caller's in-progress session.
pub async fn current_session(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let current = service.current_session(claims.user_id()?).await?;
    Ok(Json(current))
}

/// Lists every attempt of the caller, oldest first.
pub async fn list_sessions(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = service.history(claims.user_id()?).await?;
    Ok(Json(sessions))
}

pub async fn session_questions(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = service.session_questions(claims.user_id()?, id).await?;
    Ok(Json(questions))
}

/// Grades a single answer.
///
/// Returns 400 for a question outside the session, a repeated answer or a
/// passed deadline, and 409 if another request updated the session first.
pub async fn submit_answer(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let graded = service.submit_answer(claims.user_id()?, id, req).await?;
    Ok(Json(graded))
}

/// Finalizes the session and returns the scored result with the level assignment.
pub async fn complete_session(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = service.complete_session(claims.user_id()?, id).await?;
    Ok(Json(result))
}

pub async fn cancel_session(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = service.cancel_session(claims.user_id()?, id).await?;
    Ok(Json(session))
}

pub async fn get_session(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = service.session_result(claims.user_id()?, id).await?;
    Ok(Json(session))
}

/// The caller's current placement (level, score, strength and improvement areas).
pub async fn my_placement(
    State(service): State<PlacementService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let placement = service.placement(claims.user_id()?).await?;
    Ok(Json(placement))
}
