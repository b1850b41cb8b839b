// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{answer, daily, profile},
    state::AppState,
    utils::jwt::{auth_middleware, generator_middleware},
};

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Merges all sub-routers (challenges, achievements, profile).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, daily service).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let challenge_routes = Router::new()
        .route("/", get(daily::list_challenges))
        // Scheduler/operator only: Auth first, then role check
        .merge(
            Router::new()
                .route("/generate", post(daily::generate_daily))
                .layer(middleware::from_fn(generator_middleware))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            Router::new()
                .route("/{id}/answer", post(answer::submit_answer))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let achievement_routes = Router::new().route("/", get(profile::list_achievements));

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/attempts", get(profile::list_my_attempts))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/challenges", challenge_routes)
        .nest("/api/achievements", achievement_routes)
        .nest("/api/profile", profile_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
