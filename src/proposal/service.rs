//! Proposal lifecycle orchestration
//!
//! Single entry point for every proposal mutation. Each operation follows
//! the same shape: authorize, persist, invalidate caches, then emit the
//! domain event (or enqueue jobs directly) once the write is visible.

use crate::cache::CacheLayer;
use crate::config::RatingConfig;
use crate::error::{validation_error, ApiResult, AppError};
use crate::events::{DomainEvent, EventBus};
use crate::files::FileService;
use crate::jobs::{Job, JobQueue};
use crate::models::paginate;
use crate::models::PaginationMeta;
use crate::proposal::{
    AuthorView, Proposal, ProposalStatus, ProposalStore, ProposalView, Review, ReviewRating,
    ReviewStore, TagStore,
};
use crate::search::{SearchFilters, SearchIndex};
use crate::users::{User, UserStore};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Input for proposal creation (already shape-validated by the HTTP layer)
#[derive(Debug, Clone)]
pub struct CreateProposalInput {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub file: Option<Vec<u8>>,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateProposalInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub file: Option<Vec<u8>>,
}

/// Listing parameters shared by the speaker and admin endpoints
#[derive(Debug, Clone)]
pub struct ProposalListQuery {
    pub page: usize,
    pub per_page: usize,
    pub search: Option<String>,
    pub status: Option<ProposalStatus>,
    pub tag_id: Option<Uuid>,
    /// Admin listing only: restrict to one speaker
    pub user_id: Option<Uuid>,
}

impl Default for ProposalListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: crate::models::DEFAULT_PER_PAGE,
            search: None,
            status: None,
            tag_id: None,
            user_id: None,
        }
    }
}

/// Orchestrates the proposal lifecycle across stores, files, caches,
/// events and the job queue
#[derive(Clone)]
pub struct ProposalService {
    proposals: ProposalStore,
    reviews: ReviewStore,
    tags: TagStore,
    users: UserStore,
    files: FileService,
    cache: CacheLayer,
    search: Arc<dyn SearchIndex>,
    events: Arc<EventBus>,
    queue: Arc<dyn JobQueue>,
    ratings: RatingConfig,
}

impl ProposalService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proposals: ProposalStore,
        reviews: ReviewStore,
        tags: TagStore,
        users: UserStore,
        files: FileService,
        cache: CacheLayer,
        search: Arc<dyn SearchIndex>,
        events: Arc<EventBus>,
        queue: Arc<dyn JobQueue>,
        ratings: RatingConfig,
    ) -> Self {
        Self {
            proposals,
            reviews,
            tags,
            users,
            files,
            cache,
            search,
            events,
            queue,
            ratings,
        }
    }

    /// Create a proposal for the acting speaker.
    ///
    /// The attached file is validated and stored before the entity exists;
    /// if entity creation then fails, the stored file is cleaned up.
    pub async fn create(&self, actor: &User, input: CreateProposalInput) -> ApiResult<ProposalView> {
        let file_path = match &input.file {
            Some(bytes) => {
                self.files.validate_domain_rules(bytes, actor.id).await?;
                Some(self.files.store_upload(bytes).await?)
            }
            None => None,
        };

        let proposal = Proposal::new(actor.id, input.title, input.description, file_path.clone());
        let proposal = match self.proposals.create(proposal).await {
            Ok(p) => p,
            Err(e) => {
                if let Some(path) = &file_path {
                    self.files.delete_file(path).await;
                }
                return Err(e);
            }
        };

        if !input.tags.is_empty() {
            self.sync_tag_names(proposal.id, &input.tags).await;
        }

        self.cache.forget_proposal_related(proposal.id).await;
        self.cache.forget_user_related(actor.id).await;

        self.events.emit(&DomainEvent::Submitted {
            proposal: proposal.clone(),
            file_path,
            owner_id: actor.id,
        });

        info!(proposal_id = %proposal.id, user_id = %actor.id, "Proposal created");
        self.load_view(proposal).await
    }

    /// Fetch one proposal. Owners, reviewers and admins may view.
    pub async fn get(&self, actor: &User, id: Uuid) -> ApiResult<ProposalView> {
        let proposal = self.proposals.get(id).await?;
        if proposal.user_id != actor.id && !actor.is_reviewer() {
            return Err(AppError::Forbidden(
                "You are not allowed to view this proposal".to_string(),
            ));
        }
        self.load_view(proposal).await
    }

    /// Update fields, tags and/or the attached file. Owner or admin only.
    pub async fn update(
        &self,
        actor: &User,
        id: Uuid,
        input: UpdateProposalInput,
    ) -> ApiResult<ProposalView> {
        let mut proposal = self.proposals.get(id).await?;
        self.authorize_owner_or_admin(actor, &proposal)?;

        let mut new_file_path = None;
        if let Some(bytes) = &input.file {
            // Quota is charged to the proposal owner, not the acting admin
            self.files.validate_domain_rules(bytes, proposal.user_id).await?;
            let path = self.files.store_upload(bytes).await?;
            if let Some(old) = proposal.file_path.take() {
                self.files.delete_file(&old).await;
            }
            proposal.file_path = Some(path.clone());
            new_file_path = Some(path);
        }
        if let Some(title) = input.title {
            proposal.title = title;
        }
        if let Some(description) = input.description {
            proposal.description = description;
        }
        proposal.updated_at = chrono::Utc::now();
        let proposal = self.proposals.update(proposal).await?;

        if let Some(tags) = &input.tags {
            self.sync_tag_names(proposal.id, tags).await;
        }

        self.cache.forget_proposal_related(proposal.id).await;
        self.cache.forget_user_related(proposal.user_id).await;

        if let Some(path) = new_file_path {
            self.queue.enqueue(Job::ProcessFile {
                proposal_id: proposal.id,
                file_path: path,
                owner_id: proposal.user_id,
            });
        }
        self.queue.enqueue(Job::Reindex {
            proposal_id: proposal.id,
        });

        info!(proposal_id = %proposal.id, "Proposal updated");
        self.load_view(proposal).await
    }

    /// Delete a proposal and its reviews. The attached file is removed
    /// best-effort; a failed blob delete never blocks entity deletion.
    pub async fn delete(&self, actor: &User, id: Uuid) -> ApiResult<()> {
        let proposal = self.proposals.get(id).await?;
        self.authorize_owner_or_admin(actor, &proposal)?;

        if let Some(path) = &proposal.file_path {
            self.files.delete_file(path).await;
        }
        self.reviews.delete_for_proposal(id).await;
        self.proposals.delete(id).await?;

        self.cache.forget_proposal_related(id).await;
        self.cache.forget_user_related(proposal.user_id).await;

        // The reindex executor unindexes proposals it can no longer load
        self.queue.enqueue(Job::Reindex { proposal_id: id });

        info!(proposal_id = %id, "Proposal deleted");
        Ok(())
    }

    /// Move a proposal to a new status. Admin only; any status may move to
    /// any other. Equal old and new status invalidates caches but emits no
    /// event.
    pub async fn update_status(
        &self,
        actor: &User,
        id: Uuid,
        status_value: &str,
    ) -> ApiResult<ProposalView> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins can change proposal status".to_string(),
            ));
        }
        let status = ProposalStatus::parse(status_value).ok_or_else(|| {
            validation_error(format!(
                "Invalid status '{}'. Valid statuses: {}",
                status_value,
                ProposalStatus::values().join(", ")
            ))
        })?;

        let (old, proposal) = self.proposals.update_status(id, status).await?;

        self.cache.forget_proposal_related(id).await;
        self.cache.forget_user_related(proposal.user_id).await;

        if old != status {
            info!(
                proposal_id = %id,
                old_status = old.as_str(),
                new_status = status.as_str(),
                "Proposal status changed"
            );
            self.events.emit(&DomainEvent::StatusChanged {
                proposal: proposal.clone(),
                old_status: old,
                new_status: status,
            });
        } else {
            debug!(proposal_id = %id, status = status.as_str(), "Status unchanged, no event emitted");
        }

        self.load_view(proposal).await
    }

    /// Create a review. Reviewers only, one per (proposal, reviewer), and
    /// never on the reviewer's own proposal.
    pub async fn create_review(
        &self,
        actor: &User,
        proposal_id: Uuid,
        rating_value: u8,
        comment: Option<String>,
    ) -> ApiResult<Review> {
        if !actor.is_reviewer() {
            return Err(AppError::Forbidden(
                "Only reviewers can review proposals".to_string(),
            ));
        }
        let proposal = self.proposals.get(proposal_id).await?;
        if proposal.user_id == actor.id {
            return Err(AppError::Forbidden(
                "You cannot review your own proposal".to_string(),
            ));
        }
        let rating = ReviewRating::from_value(rating_value).ok_or_else(|| {
            validation_error(format!(
                "Invalid rating {}. Valid ratings: {:?}",
                rating_value,
                ReviewRating::values()
            ))
        })?;

        let review = self
            .reviews
            .create(Review::new(proposal_id, actor.id, rating, comment))
            .await?;

        self.cache.forget_proposal_related(proposal_id).await;

        self.events.emit(&DomainEvent::Reviewed {
            proposal,
            review: review.clone(),
        });

        info!(proposal_id = %proposal_id, review_id = %review.id, "Review created");
        Ok(review)
    }

    /// Approved proposals with an average rating at or above the configured
    /// threshold, ordered by average then review count, both descending.
    /// Cached per limit.
    pub async fn top_rated(&self, limit: usize) -> ApiResult<Value> {
        let key = CacheLayer::top_rated_key(limit);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(limit, "Top-rated listing served from cache");
            return Ok(cached);
        }

        let approved = self.proposals.list_by_status(ProposalStatus::Approved).await;
        let mut rated = Vec::new();
        for proposal in approved {
            let (avg, count) = self.reviews.aggregate_for_proposal(proposal.id).await;
            if let Some(avg) = avg {
                if avg >= self.ratings.top_rated_min_rating {
                    rated.push((proposal, avg, count));
                }
            }
        }
        rated.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(b.2.cmp(&a.2))
        });
        rated.truncate(limit);

        let mut views = Vec::with_capacity(rated.len());
        for (proposal, _, _) in rated {
            views.push(self.load_view(proposal).await?);
        }
        let value = serde_json::to_value(&views).map_err(|e| AppError::Internal(e.to_string()))?;

        self.cache
            .set(
                &key,
                value.clone(),
                Duration::from_secs(self.ratings.top_rated_cache_ttl_secs),
            )
            .await;
        Ok(value)
    }

    /// Speaker-facing listing: speakers see their own proposals, reviewers
    /// and admins see all.
    pub async fn list(
        &self,
        actor: &User,
        query: &ProposalListQuery,
    ) -> ApiResult<(Vec<ProposalView>, PaginationMeta)> {
        let scope = if actor.is_reviewer() {
            None
        } else {
            Some(actor.id)
        };
        self.list_scoped(scope, query).await
    }

    /// Admin listing: all proposals, optionally restricted to one speaker.
    pub async fn admin_list(
        &self,
        actor: &User,
        query: &ProposalListQuery,
    ) -> ApiResult<(Vec<ProposalView>, PaginationMeta)> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins can list all proposals".to_string(),
            ));
        }
        self.list_scoped(query.user_id, query).await
    }

    async fn list_scoped(
        &self,
        scope_user: Option<Uuid>,
        query: &ProposalListQuery,
    ) -> ApiResult<(Vec<ProposalView>, PaginationMeta)> {
        let proposals = match query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(text) => {
                let filters = SearchFilters {
                    status: query.status,
                    user_id: scope_user,
                    tag_ids: query.tag_id.into_iter().collect(),
                };
                let ids = self
                    .search
                    .query(text, &filters)
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                let mut hits = Vec::with_capacity(ids.len());
                for id in ids {
                    // The index can lag behind the store; skip stale hits
                    if let Some(p) = self.proposals.find(id).await {
                        hits.push(p);
                    }
                }
                hits
            }
            None => {
                let base = match scope_user {
                    Some(user_id) => self.proposals.list_by_user(user_id).await,
                    None => self.proposals.list().await,
                };
                let mut filtered = Vec::with_capacity(base.len());
                for p in base {
                    if let Some(status) = query.status {
                        if p.status != status {
                            continue;
                        }
                    }
                    if let Some(tag_id) = query.tag_id {
                        if !self.proposals.tag_ids(p.id).await.contains(&tag_id) {
                            continue;
                        }
                    }
                    filtered.push(p);
                }
                filtered
            }
        };

        let (page_items, meta) = paginate(&proposals, query.page, query.per_page);
        let mut views = Vec::with_capacity(page_items.len());
        for proposal in page_items {
            views.push(self.load_view(proposal).await?);
        }
        Ok((views, meta))
    }

    /// Load the full aggregate: author, tags and review aggregates.
    pub async fn load_view(&self, proposal: Proposal) -> ApiResult<ProposalView> {
        let author = self.users.get(proposal.user_id).await?;
        let tag_ids = self.proposals.tag_ids(proposal.id).await;
        let tags = self.tags.get_many(&tag_ids).await;
        let (avg_rating, reviews_count) = self.reviews.aggregate_for_proposal(proposal.id).await;
        Ok(ProposalView {
            proposal,
            author: AuthorView {
                id: author.id,
                name: author.name,
                email: author.email,
            },
            tags,
            avg_rating,
            reviews_count,
        })
    }

    fn authorize_owner_or_admin(&self, actor: &User, proposal: &Proposal) -> ApiResult<()> {
        if proposal.user_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "You are not allowed to modify this proposal".to_string(),
            ));
        }
        Ok(())
    }

    async fn sync_tag_names(&self, proposal_id: Uuid, names: &[String]) {
        let mut tag_ids = Vec::with_capacity(names.len());
        for name in names {
            let tag = self.tags.first_or_create(name).await;
            tag_ids.push(tag.id);
        }
        self.proposals.sync_tags(proposal_id, tag_ids).await;
        self.cache.forget_tags().await;
    }
}
