//! Route definitions and router setup
//!
//! Configures all API routes and middleware. The acting user is resolved
//! from the `X-User-Id` header; session and token mechanics live in front
//! of this service.

mod admin;
mod proposals;
mod reviews;
mod tags;
mod users;

use crate::config::Settings;
use crate::error::AppError;
use crate::state::SharedState;
use crate::users::User;
use axum::{
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{header, request::Parts, Method},
    routing::{get, patch, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;
use uuid::Uuid;

/// Uploads are capped at the request level before domain rules run
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Build the router
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Users (actor bootstrap)
        .route("/api/users", post(users::create_user).get(users::list_users))
        // Proposals
        .route(
            "/api/proposals",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route("/api/proposals/top-rated", get(proposals::top_rated))
        .route(
            "/api/proposals/{id}",
            get(proposals::get_proposal)
                .patch(proposals::update_proposal)
                .delete(proposals::delete_proposal),
        )
        .route("/api/proposals/{id}/download", get(proposals::download_file))
        // Reviews
        .route(
            "/api/proposals/{id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route("/api/proposals/{id}/reviews/{review_id}", get(reviews::get_review))
        // Tags
        .route("/api/tags", get(tags::list_tags).post(tags::create_tag))
        // Admin moderation
        .route("/api/admin/proposals", get(admin::list_all_proposals))
        .route(
            "/api/admin/proposals/{id}/status",
            patch(admin::update_proposal_status),
        )
        // Apply middleware and state
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::CONTENT_TYPE, header::ACCEPT, USER_ID_HEADER];

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .max_age(Duration::from_secs(3600))
    }
}

/// Header carrying the acting user's id
pub const USER_ID_HEADER: header::HeaderName = header::HeaderName::from_static("x-user-id");

/// The acting user, resolved from the `X-User-Id` header
pub struct CurrentUser(pub User);

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthenticated("Missing X-User-Id header".to_string())
            })?;
        let id: Uuid = raw.parse().map_err(|_| {
            AppError::Unauthenticated(format!("Invalid user id '{}'", raw))
        })?;
        let user = state
            .users
            .find(id)
            .await
            .ok_or_else(|| AppError::Unauthenticated(format!("Unknown user {}", id)))?;
        Ok(CurrentUser(user))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
