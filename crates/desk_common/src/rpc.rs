//! Request/response payloads for the deskd HTTP API.
//!
//! Callers get explicit `status` fields (`success`, `sla_failed`,
//! `no_more_tickets`, `error`) instead of raw errors.

use crate::ticket::{Priority, Ticket};
use crate::timeline::TimelineEntry;
use serde::{Deserialize, Serialize};

/// One ticket in an ingest batch. Unknown priorities default to low.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestTicket {
    pub ticket_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

impl IngestTicket {
    pub fn into_ticket(self) -> Ticket {
        let priority = self
            .priority
            .as_deref()
            .map(Priority::parse)
            .unwrap_or_default();
        Ticket::new(self.ticket_id, &self.title, &self.description, priority)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub tickets: Vec<IngestTicket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub ingested: usize,
    pub total_pending: usize,
}

/// Outcome of advancing the coordinator by one ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessNextResponse {
    /// `success`, `sla_failed`, or `no_more_tickets`
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub ticket: Option<ProcessedTicket>,
}

/// Summary of the ticket just processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedTicket {
    pub ticket_id: i64,
    pub title: String,
    #[serde(default)]
    pub candidate_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResponse {
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingApprovalResponse {
    pub pending_tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    pub ticket_id: i64,
    pub approved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveResponse {
    pub status: String,
    pub message: String,
}

/// Scheduler lane depths and remaining credits, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatsResponse {
    pub high_depth: usize,
    pub medium_depth: usize,
    pub low_depth: usize,
    pub high_credits: u32,
    pub medium_credits: u32,
    pub low_credits: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tickets_pending_ingestion: usize,
    pub tickets_awaiting_approval: usize,
}
