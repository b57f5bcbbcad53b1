//! Tag route handlers
//!
//! The unfiltered tag listing is cached; any tag creation forgets it.

use crate::cache::CacheLayer;
use crate::error::{validation_error, ApiResult, AppError};
use crate::models::SuccessResponse;
use crate::proposal::Tag;
use crate::routes::CurrentUser;
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use validator::Validate;

const TAGS_CACHE_TTL: Duration = Duration::from_secs(900);

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

/// List tags ordered by name, optionally filtered by substring
pub async fn list_tags(
    State(state): State<SharedState>,
    CurrentUser(_actor): CurrentUser,
    Query(query): Query<ListTagsQuery>,
) -> ApiResult<Json<SuccessResponse<serde_json::Value>>> {
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());

    // Only the unfiltered listing is worth caching
    if search.is_none() {
        if let Some(cached) = state.cache.get(&CacheLayer::tags_key()).await {
            debug!("Tag listing served from cache");
            return Ok(Json(SuccessResponse::with_data(
                "Tags fetched successfully.",
                cached,
            )));
        }
    }

    let tags = state.tags.list(search).await;
    let value = serde_json::to_value(&tags).map_err(|e| AppError::Internal(e.to_string()))?;
    if search.is_none() {
        state
            .cache
            .set(&CacheLayer::tags_key(), value.clone(), TAGS_CACHE_TTL)
            .await;
    }
    Ok(Json(SuccessResponse::with_data(
        "Tags fetched successfully.",
        value,
    )))
}

/// Create a tag. Idempotent by name: an existing tag is returned as-is.
pub async fn create_tag(
    State(state): State<SharedState>,
    CurrentUser(_actor): CurrentUser,
    Json(payload): Json<CreateTagRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Tag>>)> {
    payload
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;

    let tag = state.tags.first_or_create(payload.name.trim()).await;
    state.cache.forget_tags().await;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Tag created successfully.", tag)),
    ))
}
