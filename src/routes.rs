// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, placement},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Placement routes require a valid bearer token.
/// * Admin routes additionally require the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let placement_routes = Router::new()
        .route(
            "/sessions",
            get(placement::list_sessions).post(placement::start_session),
        )
        .route("/sessions/current", get(placement::current_session))
        .route("/sessions/{id}", get(placement::get_session))
        .route("/sessions/{id}/questions", get(placement::session_questions))
        .route("/sessions/{id}/answers", post(placement::submit_answer))
        .route("/sessions/{id}/complete", post(placement::complete_session))
        .route("/sessions/{id}/cancel", post(placement::cancel_session))
        .route("/me", get(placement::my_placement))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            get(admin::get_question)
                .put(admin::update_question)
                .delete(admin::delete_question),
        )
        .route("/statistics", get(admin::get_statistics))
        .route("/users/{id}/retake", post(admin::allow_retake))
        // Auth first, then the admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/placement", placement_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
