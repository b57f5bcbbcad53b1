//! Proposal file post-processing job
//!
//! Domain-level validation (PDF signature, storage quota) of a file that
//! was stored during the request. A file that fails validation is deleted
//! and detached from the proposal; this job is allowed to fail.

use crate::error::AppError;
use crate::jobs::JobContext;
use anyhow::bail;
use tracing::{error, info};
use uuid::Uuid;

pub async fn process_file(
    ctx: &JobContext,
    proposal_id: Uuid,
    file_path: &str,
    owner_id: Uuid,
) -> anyhow::Result<()> {
    let bytes = match ctx.files.read_file(file_path).await {
        Ok(bytes) => bytes,
        Err(AppError::NotFound(_)) => {
            bail!("File not found at path: {}", file_path);
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = ctx.files.validate_domain_rules(&bytes, owner_id).await {
        error!(
            proposal_id = %proposal_id,
            file_path = %file_path,
            error = %e,
            "Failed to process proposal file"
        );
        ctx.files.delete_file(file_path).await;
        if let Err(detach_err) = ctx.proposals.detach_file(proposal_id).await {
            error!(proposal_id = %proposal_id, error = %detach_err, "Failed to detach invalid file");
        }
        return Err(e.into());
    }

    info!(
        proposal_id = %proposal_id,
        file_path = %file_path,
        "Proposal file processed successfully"
    );
    Ok(())
}

/// Permanent-failure hook: the file must not remain attached, so delete it
/// defensively (idempotent when already removed).
pub async fn process_file_failed(ctx: &JobContext, file_path: &str) {
    ctx.files.delete_file(file_path).await;
}
