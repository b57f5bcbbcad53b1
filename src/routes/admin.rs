//! Admin moderation route handlers

use crate::error::{validation_error, ApiResult};
use crate::models::SuccessResponse;
use crate::proposal::ProposalView;
use crate::routes::proposals::{ListProposalsQuery, ProposalListResponse};
use crate::routes::CurrentUser;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1))]
    pub status: String,
}

/// List every proposal, with optional status/search/speaker filters
pub async fn list_all_proposals(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListProposalsQuery>,
) -> ApiResult<Json<SuccessResponse<ProposalListResponse>>> {
    let query = query.into_domain()?;
    let (proposals, pagination) = state.proposal_service.admin_list(&actor, &query).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposals fetched successfully.",
        ProposalListResponse {
            proposals,
            pagination,
        },
    )))
}

/// Moderate a proposal's status
pub async fn update_proposal_status(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<uuid::Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<SuccessResponse<ProposalView>>> {
    payload
        .validate()
        .map_err(|e| validation_error(e.to_string()))?;
    let view = state
        .proposal_service
        .update_status(&actor, id, &payload.status)
        .await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal status updated successfully.",
        view,
    )))
}
