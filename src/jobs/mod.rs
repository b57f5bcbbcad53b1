//! Background jobs
//!
//! Every side effect behind the HTTP path (mail, search indexing, file
//! post-processing) runs as a single-responsibility job consumed by a
//! worker pool. Jobs are idempotent and retried with a bounded budget.

mod notify;
mod process_file;
mod reindex;
pub mod runner;

pub use notify::{notify_reviewed, notify_status_changed, notify_submitted};
pub use process_file::process_file;
pub use reindex::reindex;

use crate::files::FileService;
use crate::mailer::Mailer;
use crate::proposal::{ProposalStore, ReviewStore, TagStore};
use crate::search::SearchIndex;
use crate::users::UserStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Background job payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Re-push a proposal to the search index (or unindex a deleted one)
    Reindex { proposal_id: Uuid },
    /// Re-validate an already-stored proposal file against domain rules
    ProcessFile {
        proposal_id: Uuid,
        file_path: String,
        owner_id: Uuid,
    },
    /// Notify all admins that a proposal was submitted
    NotifySubmitted { proposal_id: Uuid },
    /// Notify the speaker that their proposal status changed
    NotifyStatusChanged {
        proposal_id: Uuid,
        old_status: String,
        new_status: String,
    },
    /// Notify the speaker that their proposal received a review
    NotifyReviewed { proposal_id: Uuid, review_id: Uuid },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Reindex { .. } => "reindex",
            Job::ProcessFile { .. } => "process_file",
            Job::NotifySubmitted { .. } => "notify_submitted",
            Job::NotifyStatusChanged { .. } => "notify_status_changed",
            Job::NotifyReviewed { .. } => "notify_reviewed",
        }
    }
}

/// Queue producer seam. Listeners enqueue and return immediately; the
/// worker pool consumes on its own schedule.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: Job);
}

/// mpsc-channel backed queue
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl ChannelQueue {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl JobQueue for ChannelQueue {
    fn enqueue(&self, job: Job) {
        // Receiver dropped means the worker pool is shutting down; the job
        // is lost, which matches the no-persistence queue semantics.
        if let Err(e) = self.tx.send(job) {
            tracing::warn!(error = %e, "Job queue closed, dropping job");
        }
    }
}

/// Queue that records enqueued jobs instead of running them (tests)
#[cfg(test)]
#[derive(Default)]
pub struct RecordingQueue {
    jobs: std::sync::Mutex<Vec<Job>>,
}

#[cfg(test)]
impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl JobQueue for RecordingQueue {
    fn enqueue(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }
}

/// Collaborators available to job executors
#[derive(Clone)]
pub struct JobContext {
    pub proposals: ProposalStore,
    pub reviews: ReviewStore,
    pub tags: TagStore,
    pub users: UserStore,
    pub files: FileService,
    pub search: Arc<dyn SearchIndex>,
    pub mailer: Arc<dyn Mailer>,
}
