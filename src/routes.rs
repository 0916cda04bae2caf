// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{ai, analytics, auth, public, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, public, ai).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, text generator).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Owner surface: everything requires a valid token.
    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route("/{id}", get(quiz::get_quiz).put(quiz::update_quiz))
        .route("/{id}/publish", put(quiz::set_published))
        .route("/{id}/responses", get(analytics::list_responses))
        .route("/{id}/analyze", post(ai::analyze_responses))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Respondent surface: reachable without an account, published quizzes
    // only.
    let public_routes = Router::new()
        .route("/quizzes/{id}", get(public::get_public_quiz))
        .route("/quizzes/{id}/responses", post(public::submit_response))
        .route(
            "/quizzes/{id}/responses/{response_id}/result",
            get(public::get_result),
        )
        .route(
            "/quizzes/{id}/responses/{response_id}/advice",
            post(public::get_advice),
        );

    let ai_routes = Router::new()
        .route("/generate", post(ai::generate))
        .route("/generate-quiz", post(ai::generate_quiz))
        .route("/extend-questions", post(ai::extend_questions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/public", public_routes)
        .nest("/api/ai", ai_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
