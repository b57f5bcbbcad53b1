//! User route handlers
//!
//! Minimal account bootstrap so the other endpoints have actors to resolve.

use crate::error::{validation_error, ApiResult};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use crate::users::{User, UserRole};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: String,
}

/// Create a user
pub async fn create_user(
    State(state): State<SharedState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<User>>)> {
    payload
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;
    let role = UserRole::parse(&payload.role).ok_or_else(|| {
        validation_error(format!(
            "Invalid role '{}'. Valid roles: {}",
            payload.role,
            UserRole::values().join(", ")
        ))
    })?;

    let user = state
        .users
        .create(User::new(payload.name, payload.email, role))
        .await?;
    info!(user_id = %user.id, role = ?user.role, "User created");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("User created successfully.", user)),
    ))
}

/// List all users, oldest first
pub async fn list_users(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<User>>>> {
    let users = state.users.list().await;
    Ok(Json(SuccessResponse::with_data(
        "Users fetched successfully.",
        users,
    )))
}
