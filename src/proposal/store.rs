//! Proposal, review and tag storage
//!
//! Thread-safe in-memory stores standing in for the relational collaborator.
//! Relation loading is explicit: `ProposalStore::tag_ids` plus the tag and
//! review stores reconstruct the aggregate.

use crate::error::AppError;
use crate::proposal::{Proposal, ProposalStatus, Review, Tag};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe proposal store with per-proposal tag links
#[derive(Clone)]
pub struct ProposalStore {
    proposals: Arc<RwLock<HashMap<Uuid, Proposal>>>,
    tag_links: Arc<RwLock<HashMap<Uuid, Vec<Uuid>>>>,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self {
            proposals: Arc::new(RwLock::new(HashMap::new())),
            tag_links: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a new proposal
    pub async fn create(&self, proposal: Proposal) -> Result<Proposal, AppError> {
        let mut proposals = self.proposals.write().await;
        proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    /// Get a proposal by ID
    pub async fn get(&self, id: Uuid) -> Result<Proposal, AppError> {
        let proposals = self.proposals.read().await;
        proposals
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))
    }

    pub async fn find(&self, id: Uuid) -> Option<Proposal> {
        self.proposals.read().await.get(&id).cloned()
    }

    /// List all proposals, newest first
    pub async fn list(&self) -> Vec<Proposal> {
        let proposals = self.proposals.read().await;
        let mut all: Vec<Proposal> = proposals.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// List proposals owned by a user, newest first
    pub async fn list_by_user(&self, user_id: Uuid) -> Vec<Proposal> {
        self.list()
            .await
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect()
    }

    pub async fn list_by_status(&self, status: ProposalStatus) -> Vec<Proposal> {
        self.list()
            .await
            .into_iter()
            .filter(|p| p.status == status)
            .collect()
    }

    /// File paths of all files attached to a user's proposals (quota scan)
    pub async fn file_paths_for_user(&self, user_id: Uuid) -> Vec<String> {
        let proposals = self.proposals.read().await;
        proposals
            .values()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| p.file_path.clone())
            .collect()
    }

    /// Update a proposal in place
    pub async fn update(&self, proposal: Proposal) -> Result<Proposal, AppError> {
        let mut proposals = self.proposals.write().await;
        if !proposals.contains_key(&proposal.id) {
            return Err(AppError::NotFound(format!(
                "Proposal {} not found",
                proposal.id
            )));
        }
        proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    /// Persist a status change, returning the old status and updated row
    pub async fn update_status(
        &self,
        id: Uuid,
        status: ProposalStatus,
    ) -> Result<(ProposalStatus, Proposal), AppError> {
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;

        let old = proposal.status;
        proposal.status = status;
        proposal.updated_at = chrono::Utc::now();
        Ok((old, proposal.clone()))
    }

    /// Clear the stored file path (background validation rejected the file)
    pub async fn detach_file(&self, id: Uuid) -> Result<(), AppError> {
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;
        proposal.file_path = None;
        proposal.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Delete a proposal and its tag links
    pub async fn delete(&self, id: Uuid) -> Result<Proposal, AppError> {
        let mut proposals = self.proposals.write().await;
        let removed = proposals
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Proposal {} not found", id)))?;
        self.tag_links.write().await.remove(&id);
        Ok(removed)
    }

    /// Replace the full tag set for a proposal atomically
    pub async fn sync_tags(&self, proposal_id: Uuid, tag_ids: Vec<Uuid>) {
        let mut links = self.tag_links.write().await;
        links.insert(proposal_id, tag_ids);
    }

    pub async fn tag_ids(&self, proposal_id: Uuid) -> Vec<Uuid> {
        let links = self.tag_links.read().await;
        links.get(&proposal_id).cloned().unwrap_or_default()
    }

    pub async fn count(&self) -> usize {
        self.proposals.read().await.len()
    }
}

impl Default for ProposalStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe review store. Enforces one review per (proposal, reviewer).
#[derive(Clone)]
pub struct ReviewStore {
    reviews: Arc<RwLock<HashMap<Uuid, Review>>>,
}

impl ReviewStore {
    pub fn new() -> Self {
        Self {
            reviews: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a review; fails with a conflict if the reviewer already
    /// reviewed this proposal.
    pub async fn create(&self, review: Review) -> Result<Review, AppError> {
        let mut reviews = self.reviews.write().await;
        let exists = reviews
            .values()
            .any(|r| r.proposal_id == review.proposal_id && r.reviewer_id == review.reviewer_id);
        if exists {
            return Err(AppError::Conflict(
                "You have already reviewed this proposal".to_string(),
            ));
        }
        reviews.insert(review.id, review.clone());
        Ok(review)
    }

    pub async fn get(&self, id: Uuid) -> Result<Review, AppError> {
        let reviews = self.reviews.read().await;
        reviews
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Review {} not found", id)))
    }

    /// Reviews for one proposal, newest first
    pub async fn list_for_proposal(&self, proposal_id: Uuid) -> Vec<Review> {
        let reviews = self.reviews.read().await;
        let mut result: Vec<Review> = reviews
            .values()
            .filter(|r| r.proposal_id == proposal_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// (average rating, review count) for a proposal
    pub async fn aggregate_for_proposal(&self, proposal_id: Uuid) -> (Option<f64>, usize) {
        let reviews = self.list_for_proposal(proposal_id).await;
        if reviews.is_empty() {
            return (None, 0);
        }
        let sum: u32 = reviews.iter().map(|r| r.rating.value() as u32).sum();
        let avg = sum as f64 / reviews.len() as f64;
        (Some(avg), reviews.len())
    }

    pub async fn delete_for_proposal(&self, proposal_id: Uuid) {
        let mut reviews = self.reviews.write().await;
        reviews.retain(|_, r| r.proposal_id != proposal_id);
    }
}

impl Default for ReviewStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe tag store with case-sensitive unique names
#[derive(Clone)]
pub struct TagStore {
    tags: Arc<RwLock<HashMap<Uuid, Tag>>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self {
            tags: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look the tag up by name, creating it if absent. First use wins.
    pub async fn first_or_create(&self, name: &str) -> Tag {
        let mut tags = self.tags.write().await;
        if let Some(existing) = tags.values().find(|t| t.name == name) {
            return existing.clone();
        }
        let tag = Tag::new(name.to_string());
        tags.insert(tag.id, tag.clone());
        tag
    }

    pub async fn get(&self, id: Uuid) -> Result<Tag, AppError> {
        let tags = self.tags.read().await;
        tags.get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", id)))
    }

    pub async fn get_many(&self, ids: &[Uuid]) -> Vec<Tag> {
        let tags = self.tags.read().await;
        ids.iter().filter_map(|id| tags.get(id).cloned()).collect()
    }

    /// All tags ordered by name, optionally filtered by substring
    pub async fn list(&self, search: Option<&str>) -> Vec<Tag> {
        let tags = self.tags.read().await;
        let mut result: Vec<Tag> = tags
            .values()
            .filter(|t| search.map_or(true, |s| t.name.contains(s)))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }

    pub async fn count(&self) -> usize {
        self.tags.read().await.len()
    }
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::ReviewRating;

    fn proposal(user_id: Uuid) -> Proposal {
        Proposal::new(user_id, "Async Rust in Anger".into(), "Lessons learned".into(), None)
    }

    #[tokio::test]
    async fn test_update_status_returns_old_status() {
        let store = ProposalStore::new();
        let p = store.create(proposal(Uuid::new_v4())).await.unwrap();

        let (old, updated) = store
            .update_status(p.id, ProposalStatus::Approved)
            .await
            .unwrap();
        assert_eq!(old, ProposalStatus::Pending);
        assert_eq!(updated.status, ProposalStatus::Approved);
    }

    #[tokio::test]
    async fn test_delete_removes_tag_links() {
        let store = ProposalStore::new();
        let p = store.create(proposal(Uuid::new_v4())).await.unwrap();
        store.sync_tags(p.id, vec![Uuid::new_v4()]).await;

        store.delete(p.id).await.unwrap();
        assert!(store.tag_ids(p.id).await.is_empty());
        assert!(store.find(p.id).await.is_none());
    }

    #[tokio::test]
    async fn test_file_paths_for_user_skips_missing() {
        let store = ProposalStore::new();
        let user = Uuid::new_v4();
        let mut with_file = proposal(user);
        with_file.file_path = Some("proposals/a.pdf".into());
        store.create(with_file).await.unwrap();
        store.create(proposal(user)).await.unwrap();
        store.create(proposal(Uuid::new_v4())).await.unwrap();

        let paths = store.file_paths_for_user(user).await;
        assert_eq!(paths, vec!["proposals/a.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_review_conflicts() {
        let store = ReviewStore::new();
        let proposal_id = Uuid::new_v4();
        let reviewer_id = Uuid::new_v4();

        store
            .create(Review::new(proposal_id, reviewer_id, ReviewRating::Four, None))
            .await
            .unwrap();

        let err = store
            .create(Review::new(proposal_id, reviewer_id, ReviewRating::Five, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Same reviewer, different proposal is fine
        store
            .create(Review::new(Uuid::new_v4(), reviewer_id, ReviewRating::Five, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_review_aggregate() {
        let store = ReviewStore::new();
        let proposal_id = Uuid::new_v4();
        for rating in [ReviewRating::Four, ReviewRating::Five] {
            store
                .create(Review::new(proposal_id, Uuid::new_v4(), rating, None))
                .await
                .unwrap();
        }

        let (avg, count) = store.aggregate_for_proposal(proposal_id).await;
        assert_eq!(avg, Some(4.5));
        assert_eq!(count, 2);

        let (avg, count) = store.aggregate_for_proposal(Uuid::new_v4()).await;
        assert_eq!(avg, None);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_tag_first_or_create_is_idempotent() {
        let store = TagStore::new();
        let first = store.first_or_create("WebAssembly").await;
        let second = store.first_or_create("WebAssembly").await;
        assert_eq!(first.id, second.id);
        assert_eq!(store.count().await, 1);

        // Case-sensitive: different case is a different tag
        let third = store.first_or_create("webassembly").await;
        assert_ne!(first.id, third.id);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn test_tag_list_ordered_by_name() {
        let store = TagStore::new();
        store.first_or_create("rust").await;
        store.first_or_create("async").await;
        let names: Vec<String> = store.list(None).await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["async".to_string(), "rust".to_string()]);
    }
}
