//! Notification jobs
//!
//! Three variants: submitted (to all admins), status changed (to the
//! speaker) and reviewed (to the speaker). Missing recipients are skipped
//! with a warning rather than failing the job.

use crate::jobs::JobContext;
use crate::mailer::Email;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn notify_submitted(ctx: &JobContext, proposal_id: Uuid) -> anyhow::Result<()> {
    let Some(proposal) = ctx.proposals.find(proposal_id).await else {
        warn!(proposal_id = %proposal_id, "Proposal gone, skipping submitted notification");
        return Ok(());
    };

    let admins = ctx.users.admins().await;
    if admins.is_empty() {
        warn!(
            proposal_id = %proposal_id,
            "No admin users found to notify about proposal submission"
        );
        return Ok(());
    }

    let speaker_name = ctx
        .users
        .find(proposal.user_id)
        .await
        .map(|u| u.name)
        .unwrap_or_else(|| "A speaker".to_string());

    let admin_count = admins.len();
    for admin in admins {
        ctx.mailer
            .send(Email {
                to: admin.email,
                subject: format!("New Proposal Submitted: {}", proposal.title),
                body: format!(
                    "Hello {},\n\n{} submitted a new talk proposal \"{}\".\n\n{}\n\nPlease review it in the admin dashboard.",
                    admin.name, speaker_name, proposal.title, proposal.description
                ),
            })
            .await?;
    }

    info!(
        proposal_id = %proposal_id,
        admin_count,
        "Proposal submitted notifications sent"
    );
    Ok(())
}

pub async fn notify_status_changed(
    ctx: &JobContext,
    proposal_id: Uuid,
    old_status: &str,
    new_status: &str,
) -> anyhow::Result<()> {
    let Some(proposal) = ctx.proposals.find(proposal_id).await else {
        warn!(proposal_id = %proposal_id, "Proposal gone, skipping status notification");
        return Ok(());
    };

    let Some(speaker) = ctx.users.find(proposal.user_id).await else {
        warn!(
            proposal_id = %proposal_id,
            user_id = %proposal.user_id,
            "Speaker not found, skipping status notification"
        );
        return Ok(());
    };

    ctx.mailer
        .send(Email {
            to: speaker.email,
            subject: format!("Your Proposal Status Changed: {}", proposal.title),
            body: format!(
                "Hello {},\n\nYour proposal \"{}\" moved from {} to {}.",
                speaker.name, proposal.title, old_status, new_status
            ),
        })
        .await?;

    info!(proposal_id = %proposal_id, "Proposal status changed notification sent");
    Ok(())
}

pub async fn notify_reviewed(
    ctx: &JobContext,
    proposal_id: Uuid,
    review_id: Uuid,
) -> anyhow::Result<()> {
    let Some(proposal) = ctx.proposals.find(proposal_id).await else {
        warn!(proposal_id = %proposal_id, "Proposal gone, skipping review notification");
        return Ok(());
    };

    let Some(speaker) = ctx.users.find(proposal.user_id).await else {
        warn!(
            proposal_id = %proposal_id,
            user_id = %proposal.user_id,
            "Speaker not found, skipping review notification"
        );
        return Ok(());
    };

    let rating_line = match ctx.reviews.get(review_id).await {
        Ok(review) => format!("Rating: {}", review.rating.label()),
        Err(_) => "A new review was posted.".to_string(),
    };

    ctx.mailer
        .send(Email {
            to: speaker.email,
            subject: format!("Your Proposal Received a Review: {}", proposal.title),
            body: format!(
                "Hello {},\n\nYour proposal \"{}\" received a new review.\n{}",
                speaker.name, proposal.title, rating_line
            ),
        })
        .await?;

    info!(proposal_id = %proposal_id, review_id = %review_id, "Proposal reviewed notification sent");
    Ok(())
}
