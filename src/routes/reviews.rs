//! Review route handlers

use crate::error::{validation_error, ApiResult, AppError};
use crate::models::SuccessResponse;
use crate::proposal::Review;
use crate::routes::CurrentUser;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub rating: u8,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// List the reviews of one proposal, newest first
pub async fn list_reviews(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<uuid::Uuid>,
) -> ApiResult<Json<SuccessResponse<Vec<Review>>>> {
    // Visibility follows the proposal itself
    state.proposal_service.get(&actor, id).await?;
    let reviews = state.reviews.list_for_proposal(id).await;
    Ok(Json(SuccessResponse::with_data(
        "Reviews fetched successfully.",
        reviews,
    )))
}

/// Rate a proposal. Reviewers only, one review per reviewer.
pub async fn create_review(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<uuid::Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Review>>)> {
    payload
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;
    let review = state
        .proposal_service
        .create_review(&actor, id, payload.rating, payload.comment)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Review submitted successfully.",
            review,
        )),
    ))
}

/// Fetch a single review of a proposal
pub async fn get_review(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path((id, review_id)): Path<(uuid::Uuid, uuid::Uuid)>,
) -> ApiResult<Json<SuccessResponse<Review>>> {
    state.proposal_service.get(&actor, id).await?;
    let review = state.reviews.get(review_id).await?;
    if review.proposal_id != id {
        return Err(AppError::NotFound(format!(
            "Review {} not found for this proposal",
            review_id
        )));
    }
    Ok(Json(SuccessResponse::with_data(
        "Review fetched successfully.",
        review,
    )))
}
