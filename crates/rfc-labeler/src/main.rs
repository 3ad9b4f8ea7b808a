//! rfc-labeler service: webhook receiver plus periodic sweeps.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rfc_labeler::server::{build_router, AppState};
use rfc_labeler::{GitHubClient, LabelerApp, RepoScheduler, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();
    init_tracing(&settings);

    let dry_run = settings.dry_run();
    let github = Arc::new(
        GitHubClient::with_base_url(&settings.github_token, &settings.github_api_url)
            .context("Failed to create GitHub client")?,
    );
    let scheduler = Arc::new(RepoScheduler::new(
        settings.repositories.clone(),
        settings.sweep_interval(),
    ));
    let app = LabelerApp::new(github, scheduler.clone(), dry_run);

    info!(
        repositories = settings.repositories.len(),
        interval_secs = settings.sweep_interval().as_secs(),
        dry_run,
        "Starting sweep scheduler"
    );
    let sweeps = tokio::spawn(scheduler.run(app.clone()));

    let router = build_router(AppState {
        app,
        webhook_secret: settings.webhook_secret.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening for GitHub webhooks");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeps.abort();
    info!("Shut down");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if settings.verbose {
            EnvFilter::new("rfc_labeler=debug,tower_http=debug,info")
        } else {
            EnvFilter::new("rfc_labeler=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    // If the handler cannot be installed the server simply runs until killed.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
