//! API routes for deskd

use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use desk_common::rpc::{
    ApproveRequest, ApproveResponse, HealthResponse, IngestRequest, IngestResponse,
    PendingApprovalResponse, ProcessNextResponse, QueueStatsResponse, TimelineResponse,
};
use desk_common::DeskError;
use std::sync::Arc;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Ticket Routes
// ============================================================================

pub fn ticket_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/tickets/ingest", post(ingest_tickets))
        .route("/v1/tickets/process-next", post(process_next))
        .route("/v1/tickets/timeline", get(get_timeline))
        .route("/v1/tickets/pending-approval", get(get_pending_approval))
        .route("/v1/tickets/approve", post(approve_ticket))
}

async fn ingest_tickets(
    State(state): State<AppStateArc>,
    Json(req): Json<IngestRequest>,
) -> Json<IngestResponse> {
    info!("  Ingesting batch of {} tickets", req.tickets.len());

    let tickets = req.tickets.into_iter().map(|t| t.into_ticket()).collect();
    let ingested = state.coordinator.ingest(tickets);

    Json(IngestResponse {
        status: "success".to_string(),
        ingested,
        total_pending: state.coordinator.backlog_remaining(),
    })
}

async fn process_next(State(state): State<AppStateArc>) -> Json<ProcessNextResponse> {
    Json(state.coordinator.process_next().await)
}

async fn get_timeline(State(state): State<AppStateArc>) -> Json<TimelineResponse> {
    Json(TimelineResponse {
        timeline: state.coordinator.timeline().snapshot(),
    })
}

async fn get_pending_approval(State(state): State<AppStateArc>) -> Json<PendingApprovalResponse> {
    Json(PendingApprovalResponse {
        pending_tickets: state.coordinator.pending_approval(),
    })
}

async fn approve_ticket(
    State(state): State<AppStateArc>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>, (StatusCode, String)> {
    info!(
        "  Approval decision for ticket {}: approved={}",
        req.ticket_id, req.approved
    );

    state
        .coordinator
        .resolve_approval(req.ticket_id, req.approved)
        .map(Json)
        .map_err(|e| match e {
            DeskError::TicketNotFound(id) => {
                error!("  Ticket {} not found in approval queue", id);
                (
                    StatusCode::NOT_FOUND,
                    format!("Ticket {} not found in approval queue", id),
                )
            }
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })
}

// ============================================================================
// Queue Routes
// ============================================================================

pub fn queue_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/queues", get(get_queues))
}

async fn get_queues(State(state): State<AppStateArc>) -> Json<QueueStatsResponse> {
    let stats = state.scheduler.stats();
    Json(QueueStatsResponse {
        high_depth: stats.high_depth,
        medium_depth: stats.medium_depth,
        low_depth: stats.low_depth,
        high_credits: stats.high_credits,
        medium_credits: stats.medium_credits,
        low_credits: stats.low_credits,
    })
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(get_health))
}

async fn get_health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: desk_common::VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tickets_pending_ingestion: state.coordinator.backlog_remaining(),
        tickets_awaiting_approval: state.gate.len(),
    })
}
