//! TalkFlow API - Conference Talk Proposal Management
//!
//! Speakers submit proposals (with optional PDF attachments), reviewers rate
//! them, admins moderate status. Side effects behind every mutation (mail,
//! search indexing, file post-processing) run as background jobs fed by
//! domain events.

mod cache;
mod config;
mod error;
mod events;
mod files;
mod jobs;
mod mailer;
mod models;
mod proposal;
mod routes;
mod search;
mod state;
mod users;

use crate::config::Settings;
use crate::jobs::runner::spawn_workers;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting TalkFlow - Conference Proposal Management API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    // Wire stores, collaborators, event bus and job queue
    let (state, job_rx, job_ctx) = AppState::build(&settings);

    // Start the background worker pool
    let _workers = spawn_workers(job_rx, job_ctx, settings.jobs);

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   ─── Users ───");
    info!("   POST  /api/users                        - Create a user");
    info!("   GET   /api/users                        - List users");
    info!("");
    info!("   ─── Proposals ───");
    info!("   GET   /api/proposals                    - List proposals (own for speakers)");
    info!("   POST  /api/proposals                    - Submit a proposal (multipart)");
    info!("   GET   /api/proposals/top-rated          - Best approved proposals");
    info!("   GET   /api/proposals/{{id}}               - Fetch one proposal");
    info!("   PATCH /api/proposals/{{id}}               - Update fields/tags/file");
    info!("   DELETE /api/proposals/{{id}}              - Delete a proposal");
    info!("   GET   /api/proposals/{{id}}/download      - Download the attached PDF");
    info!("");
    info!("   ─── Reviews ───");
    info!("   GET   /api/proposals/{{id}}/reviews       - List reviews");
    info!("   POST  /api/proposals/{{id}}/reviews       - Rate a proposal");
    info!("");
    info!("   ─── Tags ───");
    info!("   GET   /api/tags                         - List tags");
    info!("   POST  /api/tags                         - Create a tag");
    info!("");
    info!("   ─── Admin ───");
    info!("   GET   /api/admin/proposals              - List all proposals");
    info!("   PATCH /api/admin/proposals/{{id}}/status  - Moderate status");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,talkflow_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
