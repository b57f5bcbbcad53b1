//! Job worker pool and retry loop
//!
//! Consumes jobs off the queue channel and executes each with a bounded
//! retry budget and fixed backoff. Terminal outcomes are logged; nothing
//! is ever surfaced back to the HTTP path.

use crate::config::JobConfig;
use crate::jobs::{self, Job, JobContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Terminal outcome of one job, after retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    FailedPermanently,
}

/// Spawn the queue consumer. Each job runs on its own task so a slow
/// notification cannot delay a reindex.
pub fn spawn_workers(
    mut rx: mpsc::UnboundedReceiver<Job>,
    ctx: Arc<JobContext>,
    config: JobConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            max_attempts = config.max_attempts,
            backoff_secs = config.backoff_secs,
            "Job worker pool started"
        );
        while let Some(job) = rx.recv().await {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                run_with_retry(&job, &ctx, config).await;
            });
        }
        info!("Job queue closed, worker pool stopping");
    })
}

/// Execute one job with up to `max_attempts` attempts and a fixed backoff
/// between them.
pub async fn run_with_retry(job: &Job, ctx: &JobContext, config: JobConfig) -> JobOutcome {
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        debug!(job = job.name(), attempt, "Processing job");
        match execute(job, ctx).await {
            Ok(()) => {
                debug!(job = job.name(), attempt, "Job succeeded");
                return JobOutcome::Succeeded;
            }
            Err(e) if attempt < max_attempts => {
                warn!(
                    job = job.name(),
                    attempt,
                    error = %e,
                    "Job attempt failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(config.backoff_secs)).await;
            }
            Err(e) => {
                error!(
                    job = job.name(),
                    attempts = max_attempts,
                    error = %e,
                    "Job failed permanently"
                );
                failed(job, ctx).await;
                return JobOutcome::FailedPermanently;
            }
        }
    }

    unreachable!("retry loop always returns")
}

async fn execute(job: &Job, ctx: &JobContext) -> anyhow::Result<()> {
    match job {
        Job::Reindex { proposal_id } => jobs::reindex(ctx, *proposal_id).await,
        Job::ProcessFile {
            proposal_id,
            file_path,
            owner_id,
        } => jobs::process_file(ctx, *proposal_id, file_path, *owner_id).await,
        Job::NotifySubmitted { proposal_id } => jobs::notify_submitted(ctx, *proposal_id).await,
        Job::NotifyStatusChanged {
            proposal_id,
            old_status,
            new_status,
        } => jobs::notify_status_changed(ctx, *proposal_id, old_status, new_status).await,
        Job::NotifyReviewed {
            proposal_id,
            review_id,
        } => jobs::notify_reviewed(ctx, *proposal_id, *review_id).await,
    }
}

/// Permanent-failure hooks
async fn failed(job: &Job, ctx: &JobContext) {
    if let Job::ProcessFile { file_path, .. } = job {
        super::process_file::process_file_failed(ctx, file_path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::files::{FileService, MemoryBlobStorage};
    use crate::mailer::MemoryMailer;
    use crate::proposal::{Proposal, ProposalStore, Review, ReviewRating, ReviewStore, TagStore};
    use crate::search::{InMemorySearchIndex, SearchFilters, SearchIndex};
    use crate::users::{User, UserRole, UserStore};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct Harness {
        ctx: JobContext,
        mailer: Arc<MemoryMailer>,
        search: Arc<InMemorySearchIndex>,
    }

    fn harness() -> Harness {
        let proposals = ProposalStore::new();
        let storage = Arc::new(MemoryBlobStorage::new());
        let files = FileService::new(
            storage,
            proposals.clone(),
            &StorageConfig {
                root_dir: "unused".into(),
                quota_per_user_mb: 100,
            },
        );
        let mailer = MemoryMailer::new();
        let search = Arc::new(InMemorySearchIndex::new());
        let ctx = JobContext {
            proposals,
            reviews: ReviewStore::new(),
            tags: TagStore::new(),
            users: UserStore::new(),
            files,
            search: search.clone(),
            mailer: mailer.clone(),
        };
        Harness { ctx, mailer, search }
    }

    fn fast_config() -> JobConfig {
        JobConfig {
            max_attempts: 3,
            backoff_secs: 0,
        }
    }

    async fn seed_proposal(ctx: &JobContext, owner: &User) -> Proposal {
        ctx.proposals
            .create(Proposal::new(
                owner.id,
                "Borrow Checker Tales".into(),
                "Stories from the trenches".into(),
                None,
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reindex_upserts_reloaded_state() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let proposal = seed_proposal(&h.ctx, &owner).await;

        let outcome = run_with_retry(
            &Job::Reindex {
                proposal_id: proposal.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        assert_eq!(outcome, JobOutcome::Succeeded);
        let hits = h
            .search
            .query("borrow", &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(hits, vec![proposal.id]);
    }

    #[tokio::test]
    async fn test_reindex_missing_proposal_unindexes() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let proposal = seed_proposal(&h.ctx, &owner).await;
        run_with_retry(
            &Job::Reindex {
                proposal_id: proposal.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        h.ctx.proposals.delete(proposal.id).await.unwrap();
        let outcome = run_with_retry(
            &Job::Reindex {
                proposal_id: proposal.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        assert_eq!(outcome, JobOutcome::Succeeded);
        let hits = h
            .search
            .query("borrow", &SearchFilters::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_process_file_deletes_invalid_file_and_detaches() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let mut proposal = seed_proposal(&h.ctx, &owner).await;

        let path = h.ctx.files.store_upload(b"<html>not a pdf</html>").await.unwrap();
        proposal.file_path = Some(path.clone());
        h.ctx.proposals.update(proposal.clone()).await.unwrap();

        let outcome = run_with_retry(
            &Job::ProcessFile {
                proposal_id: proposal.id,
                file_path: path.clone(),
                owner_id: owner.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        assert_eq!(outcome, JobOutcome::FailedPermanently);
        assert!(!h.ctx.files.file_exists(&path).await);
        let reloaded = h.ctx.proposals.get(proposal.id).await.unwrap();
        assert!(reloaded.file_path.is_none());
    }

    #[tokio::test]
    async fn test_process_file_accepts_valid_pdf() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let mut proposal = seed_proposal(&h.ctx, &owner).await;

        let path = h.ctx.files.store_upload(b"%PDF-1.4 real content").await.unwrap();
        proposal.file_path = Some(path.clone());
        h.ctx.proposals.update(proposal.clone()).await.unwrap();

        let outcome = run_with_retry(
            &Job::ProcessFile {
                proposal_id: proposal.id,
                file_path: path.clone(),
                owner_id: owner.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        assert_eq!(outcome, JobOutcome::Succeeded);
        assert!(h.ctx.files.file_exists(&path).await);
    }

    #[tokio::test]
    async fn test_notify_submitted_sends_one_mail_per_admin() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        for i in 0..2 {
            h.ctx
                .users
                .create(User::new(
                    format!("Admin {}", i),
                    format!("admin{}@conf.test", i),
                    UserRole::Admin,
                ))
                .await
                .unwrap();
        }
        let proposal = seed_proposal(&h.ctx, &owner).await;

        let outcome = run_with_retry(
            &Job::NotifySubmitted {
                proposal_id: proposal.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        assert_eq!(outcome, JobOutcome::Succeeded);
        let sent = h.mailer.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.contains("Borrow Checker Tales"));
    }

    #[tokio::test]
    async fn test_notify_submitted_skips_when_no_admins() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let proposal = seed_proposal(&h.ctx, &owner).await;

        let outcome = run_with_retry(
            &Job::NotifySubmitted {
                proposal_id: proposal.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        // Graceful skip, not a failure
        assert_eq!(outcome, JobOutcome::Succeeded);
        assert!(h.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_notify_status_changed_mails_speaker() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let proposal = seed_proposal(&h.ctx, &owner).await;

        run_with_retry(
            &Job::NotifyStatusChanged {
                proposal_id: proposal.id,
                old_status: "pending".into(),
                new_status: "approved".into(),
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        let sent = h.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "sam@conf.test");
        assert!(sent[0].body.contains("pending"));
        assert!(sent[0].body.contains("approved"));
    }

    #[tokio::test]
    async fn test_notify_reviewed_includes_rating_label() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let proposal = seed_proposal(&h.ctx, &owner).await;
        let review = h
            .ctx
            .reviews
            .create(Review::new(proposal.id, Uuid::new_v4(), ReviewRating::Ten, None))
            .await
            .unwrap();

        run_with_retry(
            &Job::NotifyReviewed {
                proposal_id: proposal.id,
                review_id: review.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        let sent = h.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("10 - Outstanding"));
    }

    #[tokio::test]
    async fn test_missing_file_exhausts_retries() {
        let h = harness();
        let owner = h
            .ctx
            .users
            .create(User::new("Sam".into(), "sam@conf.test".into(), UserRole::Speaker))
            .await
            .unwrap();
        let proposal = seed_proposal(&h.ctx, &owner).await;

        let outcome = run_with_retry(
            &Job::ProcessFile {
                proposal_id: proposal.id,
                file_path: "proposals/never-stored.pdf".into(),
                owner_id: owner.id,
            },
            &h.ctx,
            fast_config(),
        )
        .await;

        assert_eq!(outcome, JobOutcome::FailedPermanently);
    }
}
