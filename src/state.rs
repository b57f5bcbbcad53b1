//! Application state management
//!
//! Wires stores, collaborator implementations, the event bus and the job
//! queue into one shared state. Handlers only ever see this struct.

use crate::cache::{CacheLayer, MemoryCache};
use crate::config::Settings;
use crate::events::EventBus;
use crate::files::{BlobStorage, FileService, LocalDiskStorage};
use crate::jobs::{ChannelQueue, Job, JobContext, JobQueue};
use crate::mailer::{LogMailer, Mailer};
use crate::proposal::{ProposalService, ProposalStore, ReviewStore, TagStore};
use crate::search::{InMemorySearchIndex, SearchIndex};
use crate::users::UserStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Application state shared across all handlers
pub struct AppState {
    pub users: UserStore,
    pub proposals: ProposalStore,
    pub reviews: ReviewStore,
    pub tags: TagStore,
    pub files: FileService,
    pub cache: CacheLayer,
    pub proposal_service: ProposalService,
}

impl AppState {
    /// Build the state with the default collaborators: local-disk blob
    /// storage, in-memory search index, logging mailer, channel job queue.
    ///
    /// Returns the queue receiver and the job context alongside the state so
    /// the caller can start the worker pool.
    pub fn build(
        settings: &Settings,
    ) -> (SharedState, mpsc::UnboundedReceiver<Job>, Arc<JobContext>) {
        let storage: Arc<dyn BlobStorage> =
            Arc::new(LocalDiskStorage::new(settings.storage.root_dir.clone()));
        let search: Arc<dyn SearchIndex> = Arc::new(InMemorySearchIndex::new());
        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
        Self::build_with(settings, storage, search, mailer)
    }

    /// Build the state with injected collaborators (tests swap in in-memory
    /// implementations here).
    pub fn build_with(
        settings: &Settings,
        storage: Arc<dyn BlobStorage>,
        search: Arc<dyn SearchIndex>,
        mailer: Arc<dyn Mailer>,
    ) -> (SharedState, mpsc::UnboundedReceiver<Job>, Arc<JobContext>) {
        let users = UserStore::new();
        let proposals = ProposalStore::new();
        let reviews = ReviewStore::new();
        let tags = TagStore::new();

        let files = FileService::new(storage, proposals.clone(), &settings.storage);
        let cache = CacheLayer::new(Arc::new(MemoryCache::new()));

        let (queue, rx) = ChannelQueue::new();
        let queue: Arc<dyn JobQueue> = queue;
        let events = Arc::new(EventBus::standard(queue.clone()));

        let proposal_service = ProposalService::new(
            proposals.clone(),
            reviews.clone(),
            tags.clone(),
            users.clone(),
            files.clone(),
            cache.clone(),
            search.clone(),
            events,
            queue,
            settings.ratings,
        );

        let ctx = Arc::new(JobContext {
            proposals: proposals.clone(),
            reviews: reviews.clone(),
            tags: tags.clone(),
            users: users.clone(),
            files: files.clone(),
            search,
            mailer,
        });

        let state = Arc::new(AppState {
            users,
            proposals,
            reviews,
            tags,
            files,
            cache,
            proposal_service,
        });

        (state, rx, ctx)
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
