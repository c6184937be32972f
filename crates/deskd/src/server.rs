//! HTTP server for deskd

use crate::approval::ApprovalGate;
use crate::coordinator::Coordinator;
use crate::notify::NotificationHub;
use crate::routes;
use crate::scheduler::PriorityScheduler;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub scheduler: Arc<PriorityScheduler>,
    pub gate: Arc<ApprovalGate>,
    pub notifier: NotificationHub,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        coordinator: Arc<Coordinator>,
        scheduler: Arc<PriorityScheduler>,
        gate: Arc<ApprovalGate>,
        notifier: NotificationHub,
    ) -> Self {
        Self {
            coordinator,
            scheduler,
            gate,
            notifier,
            start_time: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::ticket_routes())
        .merge(routes::queue_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("  Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
