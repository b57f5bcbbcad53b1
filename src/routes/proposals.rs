//! Proposal route handlers
//!
//! Create and update accept multipart bodies (fields plus an optional PDF
//! attachment). Request-shape validation happens here; domain rules such as
//! the PDF signature and the storage quota live in the file service.

use crate::error::{validation_error, ApiResult, AppError};
use crate::models::{PaginationMeta, SuccessResponse, DEFAULT_PER_PAGE, DEFAULT_TOP_RATED_LIMIT};
use crate::proposal::{
    CreateProposalInput, ProposalListQuery, ProposalStatus, ProposalView, UpdateProposalInput,
};
use crate::routes::{CurrentUser, MAX_UPLOAD_BYTES};
use crate::state::SharedState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

/// Collected multipart fields; everything optional at the parse stage
#[derive(Debug, Default, Validate)]
pub struct ProposalForm {
    #[validate(length(min = 3, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 10000))]
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub file: Option<Vec<u8>>,
}

async fn parse_proposal_form(mut multipart: Multipart) -> ApiResult<ProposalForm> {
    let mut form = ProposalForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| validation_error(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "tags" | "tags[]" => {
                let value = read_text(field).await?;
                form.tags.get_or_insert_with(Vec::new).push(value);
            }
            "file" => {
                let pdf_extension = field
                    .file_name()
                    .map(|n| n.to_lowercase().ends_with(".pdf"))
                    .unwrap_or(true);
                if !pdf_extension {
                    return Err(validation_error("Only PDF attachments are accepted"));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| validation_error(format!("Failed to read file field: {}", e)))?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(validation_error("File may not be larger than 10 MB"));
                }
                form.file = Some(bytes.to_vec());
            }
            other => {
                debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }
    form.validate().map_err(|e| validation_error(e.to_string()))?;
    if let Some(tags) = &form.tags {
        for tag in tags {
            if tag.trim().is_empty() || tag.len() > 50 {
                return Err(validation_error(
                    "Tag names must be between 1 and 50 characters",
                ));
            }
        }
    }
    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| validation_error(format!("Failed to read form field: {}", e)))
}

fn parse_status(value: &str) -> ApiResult<ProposalStatus> {
    ProposalStatus::parse(value).ok_or_else(|| {
        validation_error(format!(
            "Invalid status '{}'. Valid statuses: {}",
            value,
            ProposalStatus::values().join(", ")
        ))
    })
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

#[derive(Debug, Deserialize)]
pub struct ListProposalsQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    pub search: Option<String>,
    pub status: Option<String>,
    pub tag_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ListProposalsQuery {
    pub fn into_domain(self) -> ApiResult<ProposalListQuery> {
        let status = match self.status.as_deref() {
            Some(s) => Some(parse_status(s)?),
            None => None,
        };
        Ok(ProposalListQuery {
            page: self.page,
            per_page: self.per_page.clamp(1, 100),
            search: self.search,
            status,
            tag_id: self.tag_id,
            user_id: self.user_id,
        })
    }
}

#[derive(Serialize)]
pub struct ProposalListResponse {
    pub proposals: Vec<ProposalView>,
    pub pagination: PaginationMeta,
}

/// List proposals. Speakers see their own, reviewers and admins see all.
pub async fn list_proposals(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Query(query): Query<ListProposalsQuery>,
) -> ApiResult<Json<SuccessResponse<ProposalListResponse>>> {
    let query = query.into_domain()?;
    let (proposals, pagination) = state.proposal_service.list(&actor, &query).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposals fetched successfully.",
        ProposalListResponse {
            proposals,
            pagination,
        },
    )))
}

/// Submit a new proposal (multipart: title, description, tags[], file)
pub async fn create_proposal(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SuccessResponse<ProposalView>>)> {
    let form = parse_proposal_form(multipart).await?;
    let title = form
        .title
        .ok_or_else(|| validation_error("Title is required"))?;
    let description = form
        .description
        .ok_or_else(|| validation_error("Description is required"))?;

    let view = state
        .proposal_service
        .create(
            &actor,
            CreateProposalInput {
                title,
                description,
                tags: form.tags.unwrap_or_default(),
                file: form.file,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Proposal submitted successfully.",
            view,
        )),
    ))
}

/// Fetch one proposal with author, tags and review aggregates
pub async fn get_proposal(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ProposalView>>> {
    let view = state.proposal_service.get(&actor, id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal fetched successfully.",
        view,
    )))
}

/// Update fields, tags and/or the attachment (multipart, all fields optional)
pub async fn update_proposal(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<SuccessResponse<ProposalView>>> {
    let form = parse_proposal_form(multipart).await?;
    let view = state
        .proposal_service
        .update(
            &actor,
            id,
            UpdateProposalInput {
                title: form.title,
                description: form.description,
                tags: form.tags,
                file: form.file,
            },
        )
        .await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposal updated successfully.",
        view,
    )))
}

/// Delete a proposal; the attached file is removed best-effort
pub async fn delete_proposal(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<()>>> {
    state.proposal_service.delete(&actor, id).await?;
    Ok(Json(SuccessResponse::<()>::message_only(
        "Proposal deleted successfully.",
    )))
}

#[derive(Debug, Deserialize)]
pub struct TopRatedQuery {
    pub limit: Option<usize>,
}

/// Approved proposals with the best review averages, cached per limit
pub async fn top_rated(
    State(state): State<SharedState>,
    CurrentUser(_actor): CurrentUser,
    Query(query): Query<TopRatedQuery>,
) -> ApiResult<Json<SuccessResponse<Value>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_RATED_LIMIT).clamp(1, 100);
    let data = state.proposal_service.top_rated(limit).await?;
    Ok(Json(SuccessResponse::with_data(
        "Top rated proposals fetched successfully.",
        data,
    )))
}

/// Download the attached PDF
pub async fn download_file(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let view = state.proposal_service.get(&actor, id).await?;
    let path = view
        .proposal
        .file_path
        .ok_or_else(|| AppError::NotFound("Proposal has no attached file".to_string()))?;
    let bytes = state.files.read_file(&path).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"proposal-{}.pdf\"", id),
        ),
    ];
    Ok((headers, bytes))
}
