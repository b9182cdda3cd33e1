pub mod components;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<services::user_service::UserService>,
    pub config: Arc<config::AppConfig>,
}

/// Builds the admin router with all pages, static files and layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { axum::response::Redirect::to("/users") }))
        .route("/health", get(handlers::health_handler))
        .route("/users", get(handlers::list_users_page))
        .route(
            "/users/create",
            get(handlers::create_user_page).post(handlers::create_user_handler),
        )
        .route("/users/{id}", get(handlers::user_detail_page))
        .route("/users/{id}/prefetch", post(handlers::prefetch_user_handler))
        .nest_service("/static", ServeDir::new("static"))
        .fallback(|| async { error::AppError::NotFound })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::add_security_headers))
                .layer(axum_middleware::from_fn(middleware::advertise_client_hints)),
        )
        .with_state(state)
}
