//! Desk Daemon - helpdesk automation pipeline
//!
//! Ingests tickets, runs them through SLA check, answer lookup and
//! human approval, and schedules rejected tickets for technician
//! assignment with external ticketing sync.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use deskd::approval::ApprovalGate;
use deskd::assignment::AssignmentEngine;
use deskd::collaborators::{
    AnswerLookup, DisabledAnswerLookup, DisabledSlaChecker, DisabledTracker, HttpAnswerLookup,
    HttpSlaChecker, IssueTracker, JiraTracker, KeywordClassifier, SlaCheck,
};
use deskd::config::DeskConfig;
use deskd::coordinator::{Coordinator, TimelineLog};
use deskd::directory::TechnicianDirectory;
use deskd::notify::NotificationHub;
use deskd::scheduler::PriorityScheduler;
use deskd::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("[BOOT] Desk Daemon v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = DeskConfig::load();
    let collaborator_timeout = Duration::from_secs(config.collaborator_timeout_secs);

    let directory = Arc::new(
        TechnicianDirectory::open_at(&config.db_path)
            .with_context(|| format!("Failed to open technician store at {}", config.db_path))?,
    );
    info!("[BOOT] Technician store ready ({})", config.db_path);

    // Collaborators: HTTP where configured, deterministic fallbacks
    // otherwise.
    let sla: Arc<dyn SlaCheck> = match &config.sla_url {
        Some(url) => Arc::new(
            HttpSlaChecker::new(url, collaborator_timeout)
                .context("Failed to build SLA checker")?,
        ),
        None => {
            warn!("[BOOT] No SLA endpoint configured, all tickets will fail SLA");
            Arc::new(DisabledSlaChecker)
        }
    };

    let lookup: Arc<dyn AnswerLookup> = match &config.retrieval_url {
        Some(url) => Arc::new(
            HttpAnswerLookup::new(url, collaborator_timeout)
                .context("Failed to build retrieval client")?,
        ),
        None => {
            warn!("[BOOT] No retrieval endpoint configured, lookups return not_found");
            Arc::new(DisabledAnswerLookup)
        }
    };

    let tracker: Arc<dyn IssueTracker> = match config.tracker.clone() {
        Some(tracker_config) => Arc::new(
            JiraTracker::new(tracker_config, collaborator_timeout)
                .context("Failed to build external tracker client")?,
        ),
        None => {
            info!("[BOOT] No external tracker configured, assignment stays local");
            Arc::new(DisabledTracker)
        }
    };

    let timeline = TimelineLog::new();
    let notifier = NotificationHub::new();
    let gate = Arc::new(ApprovalGate::new());

    let engine = Arc::new(AssignmentEngine::new(
        directory.clone(),
        Arc::new(KeywordClassifier),
        tracker,
        timeline.clone(),
        notifier.clone(),
    ));
    let scheduler = Arc::new(PriorityScheduler::new(
        engine,
        Duration::from_secs(config.assign_timeout_secs),
    ));

    let coordinator = Arc::new(Coordinator::new(
        sla,
        lookup,
        config.retrieval_k,
        gate.clone(),
        scheduler.clone(),
        directory,
        timeline,
        notifier.clone(),
    ));

    // Seed the backlog from the configured ticket file, if any.
    if let Some(path) = &config.tickets_path {
        match coordinator.ingest_file(path) {
            Ok(count) => info!("[BOOT] Loaded {} tickets from {}", count, path),
            Err(e) => warn!("[BOOT] Could not load tickets from {}: {}", path, e),
        }
    }

    // Background scheduling loop with a stop signal for shutdown.
    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(
        scheduler
            .clone()
            .run(Duration::from_millis(config.tick_interval_ms), stop_rx),
    );
    info!(
        "[BOOT] Scheduler loop started ({}ms interval)",
        config.tick_interval_ms
    );

    let state = AppState::new(coordinator, scheduler, gate, notifier);

    info!("[READY] deskd operational");

    tokio::select! {
        result = server::run(state, &config.bind_addr) => {
            result.context("HTTP server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    let _ = stop_tx.send(true);
    let _ = scheduler_task.await;
    info!("Shutting down gracefully");

    Ok(())
}
