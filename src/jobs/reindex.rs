//! Search reindex job
//!
//! Reloads the proposal from the store rather than trusting the snapshot
//! that was current at enqueue time. A proposal that no longer exists is
//! removed from the index.

use crate::jobs::JobContext;
use crate::search::ProposalSearchRecord;
use tracing::{debug, info};
use uuid::Uuid;

pub async fn reindex(ctx: &JobContext, proposal_id: Uuid) -> anyhow::Result<()> {
    let Some(proposal) = ctx.proposals.find(proposal_id).await else {
        debug!(proposal_id = %proposal_id, "Proposal gone, removing from index");
        ctx.search.remove(proposal_id).await?;
        return Ok(());
    };

    let author_name = ctx
        .users
        .find(proposal.user_id)
        .await
        .map(|u| u.name)
        .unwrap_or_default();

    let tag_ids = ctx.proposals.tag_ids(proposal.id).await;
    let tag_names = ctx
        .tags
        .get_many(&tag_ids)
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();

    let record = ProposalSearchRecord {
        id: proposal.id,
        user_id: proposal.user_id,
        title: proposal.title,
        description: proposal.description,
        status: proposal.status,
        author_name,
        tag_ids,
        tag_names,
    };

    ctx.search.upsert(record).await?;
    info!(proposal_id = %proposal_id, "Proposal indexed successfully");
    Ok(())
}
