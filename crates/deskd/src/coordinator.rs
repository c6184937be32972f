//! Ticket lifecycle coordinator.
//!
//! Owns the ingestion backlog and drives one ticket at a time through
//! SLA check, answer lookup, and the human approval gate. The cursor
//! only advances when a ticket reaches a decided stage (sla_failed or
//! pending_approval); a collaborator error never stalls the pipeline,
//! it degrades to a defensive default instead.

use desk_common::error::Result;
use desk_common::events::DeskEvent;
use desk_common::rpc::{ApproveResponse, ProcessNextResponse, ProcessedTicket};
use desk_common::timeline::TimelineEntry;
use desk_common::{Ticket, TicketStatus};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::approval::ApprovalGate;
use crate::collaborators::{AnswerLookup, SlaCheck, SlaResult};
use crate::directory::TechnicianDirectory;
use crate::notify::NotificationHub;
use crate::scheduler::PriorityScheduler;

// ============================================================================
// Timeline log
// ============================================================================

/// Shared append-only timeline, one entry per ticket picked up by the
/// coordinator. Cloning shares the underlying log.
#[derive(Clone)]
pub struct TimelineLog {
    entries: Arc<Mutex<Vec<TimelineEntry>>>,
}

impl TimelineLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn create_entry(&self, ticket: &Ticket) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(TimelineEntry::new(ticket.ticket_id, &ticket.title));
    }

    /// Mutate the entry for `ticket_id`, if one exists.
    pub fn with_entry<F>(&self, ticket_id: i64, f: F)
    where
        F: FnOnce(&mut TimelineEntry),
    {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.ticket_id == ticket_id) {
            f(entry);
        }
    }

    /// Snapshot, newest entry first.
    pub fn snapshot(&self) -> Vec<TimelineEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimelineLog {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

struct Backlog {
    tickets: Vec<Ticket>,
    cursor: usize,
}

/// Lifecycle coordinator. One instance per daemon.
pub struct Coordinator {
    backlog: Mutex<Backlog>,
    /// process_next is strictly single-flight; concurrent API calls
    /// queue up here rather than double-advancing the cursor.
    advance: tokio::sync::Mutex<()>,
    sla: Arc<dyn SlaCheck>,
    lookup: Arc<dyn AnswerLookup>,
    retrieval_k: usize,
    gate: Arc<ApprovalGate>,
    scheduler: Arc<PriorityScheduler>,
    directory: Arc<TechnicianDirectory>,
    timeline: TimelineLog,
    notifier: NotificationHub,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sla: Arc<dyn SlaCheck>,
        lookup: Arc<dyn AnswerLookup>,
        retrieval_k: usize,
        gate: Arc<ApprovalGate>,
        scheduler: Arc<PriorityScheduler>,
        directory: Arc<TechnicianDirectory>,
        timeline: TimelineLog,
        notifier: NotificationHub,
    ) -> Self {
        Self {
            backlog: Mutex::new(Backlog {
                tickets: Vec::new(),
                cursor: 0,
            }),
            advance: tokio::sync::Mutex::new(()),
            sla,
            lookup,
            retrieval_k,
            gate,
            scheduler,
            directory,
            timeline,
            notifier,
        }
    }

    pub fn timeline(&self) -> &TimelineLog {
        &self.timeline
    }

    /// Append a batch to the backlog. Unprocessed tickets (cursor and
    /// beyond) are re-sorted by ticket_id; already-processed ones keep
    /// their order.
    pub fn ingest(&self, tickets: Vec<Ticket>) -> usize {
        let mut backlog = self.backlog.lock().unwrap();
        let added = tickets.len();
        backlog.tickets.extend(tickets);
        let cursor = backlog.cursor;
        backlog.tickets[cursor..].sort_by_key(|t| t.ticket_id);
        info!(
            "Ingested {} tickets, {} pending",
            added,
            backlog.tickets.len() - cursor
        );
        added
    }

    /// Load a ticket batch from a JSON file (array of ingest tickets).
    pub fn ingest_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            desk_common::DeskError::Ingestion(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let batch: Vec<desk_common::rpc::IngestTicket> = serde_json::from_str(&raw)
            .map_err(|e| desk_common::DeskError::Ingestion(format!("invalid ticket JSON: {}", e)))?;
        let tickets = batch.into_iter().map(|t| t.into_ticket()).collect();
        Ok(self.ingest(tickets))
    }

    pub fn backlog_remaining(&self) -> usize {
        let backlog = self.backlog.lock().unwrap();
        backlog.tickets.len() - backlog.cursor
    }

    pub fn pending_approval(&self) -> Vec<Ticket> {
        self.gate.snapshot()
    }

    /// Advance the pipeline by exactly one ticket.
    pub async fn process_next(&self) -> ProcessNextResponse {
        let _single_flight = self.advance.lock().await;

        let ticket = {
            let backlog = self.backlog.lock().unwrap();
            match backlog.tickets.get(backlog.cursor) {
                Some(ticket) => ticket.clone(),
                None => {
                    info!("No more tickets to process");
                    return ProcessNextResponse {
                        status: "no_more_tickets".to_string(),
                        message: "All tickets have been processed".to_string(),
                        ticket: None,
                    };
                }
            }
        };
        let ticket_id = ticket.ticket_id;

        info!("Processing ticket: {}", ticket.title);
        self.timeline.create_entry(&ticket);
        self.timeline.with_entry(ticket_id, |entry| {
            entry.push_step(format!("SLA check started for Ticket {}", ticket_id));
        });

        let sla_result = match self.sla.check(&ticket).await {
            Ok(result) => result,
            Err(e) => {
                warn!("SLA check failed for ticket {}: {}", ticket_id, e);
                SlaResult::not_covered("SLA check unavailable")
            }
        };

        if !sla_result.covered {
            info!("Ticket not covered by SLA: {}", sla_result.explanation);
            self.timeline.with_entry(ticket_id, |entry| {
                entry.push_step(format!(
                    "SLA check failed for Ticket {}: {}",
                    ticket_id, sla_result.explanation
                ));
                entry.set_status("sla_failed");
            });
            self.advance_cursor();

            return ProcessNextResponse {
                status: "sla_failed".to_string(),
                message: format!("Ticket {} not covered by SLA", ticket_id),
                ticket: None,
            };
        }

        info!("Ticket covered by SLA: {}", sla_result.explanation);
        self.timeline.with_entry(ticket_id, |entry| {
            entry.push_step(format!("SLA check passed for Ticket {}", ticket_id));
            entry.push_step(format!("Answer lookup started for Ticket {}", ticket_id));
        });

        let lookup_result = match self.lookup.lookup(&ticket.text(), self.retrieval_k).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Answer lookup failed for ticket {}: {}", ticket_id, e);
                crate::collaborators::LookupResult::not_found()
            }
        };

        let mut ticket = ticket;
        ticket.candidate_answer = lookup_result.answer.clone();
        ticket.status = TicketStatus::PendingApproval;

        self.timeline.with_entry(ticket_id, |entry| {
            entry.push_step(format!("Answer lookup completed for Ticket {}", ticket_id));
            entry.push_step(format!(
                "Ticket {} added to human approval queue",
                ticket_id
            ));
            entry.set_status("pending_approval");
            entry.candidate_answer = lookup_result.answer.clone();
        });

        let title = ticket.title.clone();
        let candidate_answer = ticket.candidate_answer.clone();
        self.gate.enqueue(ticket);
        self.advance_cursor();

        ProcessNextResponse {
            status: "success".to_string(),
            message: format!("Ticket {} processed and added to approval queue", ticket_id),
            ticket: Some(ProcessedTicket {
                ticket_id,
                title,
                candidate_answer,
            }),
        }
    }

    /// Resolve a pending approval. Approving terminates the ticket
    /// with its candidate answer; rejecting hands it to the scheduler
    /// for technician assignment.
    pub fn resolve_approval(&self, ticket_id: i64, approved: bool) -> Result<ApproveResponse> {
        let mut ticket = self.gate.take(ticket_id)?;

        if approved {
            info!("Ticket approved with candidate answer: {}", ticket.title);
            ticket.status = TicketStatus::Approved;
            self.timeline.with_entry(ticket_id, |entry| {
                entry.push_step(format!("Ticket {} approved by human", ticket_id));
                entry.set_status("approved");
            });
            if let Err(e) = self.directory.upsert_ticket(ticket_id, None, "Approved") {
                warn!("Failed to record ticket {} approval: {}", ticket_id, e);
            }
        } else {
            info!("Ticket NOT approved, sending to scheduler: {}", ticket.title);
            ticket.status = TicketStatus::QueuedForAssignment;
            self.timeline.with_entry(ticket_id, |entry| {
                entry.push_step(format!("Ticket {} rejected, sent to scheduler", ticket_id));
                entry.set_status("sent_to_scheduler");
            });
            self.scheduler.push(ticket.clone());
        }

        self.broadcast_state();

        Ok(ApproveResponse {
            status: "success".to_string(),
            message: format!(
                "Ticket {} {}",
                ticket_id,
                if approved { "approved" } else { "rejected" }
            ),
        })
    }

    /// Advance the cursor past a decided ticket and push the state
    /// change to observers.
    fn advance_cursor(&self) {
        {
            let mut backlog = self.backlog.lock().unwrap();
            backlog.cursor += 1;
        }
        self.broadcast_state();
    }

    fn broadcast_state(&self) {
        self.notifier
            .broadcast(DeskEvent::timeline_update(self.timeline.snapshot()));
        self.notifier
            .broadcast(DeskEvent::pending_tickets_update(self.gate.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::AssignmentEngine;
    use crate::collaborators::{
        DisabledSlaChecker, DisabledTracker, KeywordClassifier, LookupResult,
    };
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use desk_common::Priority;
    use std::time::Duration;

    struct CoveredSla;

    #[async_trait]
    impl SlaCheck for CoveredSla {
        async fn check(&self, _ticket: &Ticket) -> AnyResult<SlaResult> {
            Ok(SlaResult {
                covered: true,
                explanation: "covered by gold plan".to_string(),
                relevant_section: None,
            })
        }
    }

    struct CannedLookup;

    #[async_trait]
    impl AnswerLookup for CannedLookup {
        async fn lookup(&self, _text: &str, _k: usize) -> AnyResult<LookupResult> {
            Ok(LookupResult {
                status: "found".to_string(),
                answer: Some("restart the vpn client".to_string()),
                sources: vec!["kb/vpn.md".to_string()],
            })
        }
    }

    struct BrokenSla;

    #[async_trait]
    impl SlaCheck for BrokenSla {
        async fn check(&self, _ticket: &Ticket) -> AnyResult<SlaResult> {
            Err(anyhow::anyhow!("sla endpoint unreachable"))
        }
    }

    struct BrokenLookup;

    #[async_trait]
    impl AnswerLookup for BrokenLookup {
        async fn lookup(&self, _text: &str, _k: usize) -> AnyResult<LookupResult> {
            Err(anyhow::anyhow!("retrieval endpoint unreachable"))
        }
    }

    fn build(sla: Arc<dyn SlaCheck>) -> (Coordinator, Arc<PriorityScheduler>) {
        build_with(sla, Arc::new(CannedLookup))
    }

    fn build_with(
        sla: Arc<dyn SlaCheck>,
        lookup: Arc<dyn AnswerLookup>,
    ) -> (Coordinator, Arc<PriorityScheduler>) {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        let timeline = TimelineLog::new();
        let notifier = NotificationHub::new();
        let engine = Arc::new(AssignmentEngine::new(
            dir.clone(),
            Arc::new(KeywordClassifier),
            Arc::new(DisabledTracker),
            timeline.clone(),
            notifier.clone(),
        ));
        let scheduler = Arc::new(PriorityScheduler::new(engine, Duration::from_secs(5)));
        let coordinator = Coordinator::new(
            sla,
            lookup,
            5,
            Arc::new(ApprovalGate::new()),
            scheduler.clone(),
            dir,
            timeline,
            notifier,
        );
        (coordinator, scheduler)
    }

    fn ticket(id: i64) -> Ticket {
        Ticket::new(id, &format!("vpn issue {}", id), "tunnel down", Priority::High)
    }

    #[tokio::test]
    async fn test_process_next_reaches_approval_queue() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        coordinator.ingest(vec![ticket(1)]);

        let response = coordinator.process_next().await;
        assert_eq!(response.status, "success");
        let processed = response.ticket.unwrap();
        assert_eq!(processed.ticket_id, 1);
        assert_eq!(
            processed.candidate_answer.as_deref(),
            Some("restart the vpn client")
        );

        let pending = coordinator.pending_approval();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, TicketStatus::PendingApproval);
        assert_eq!(coordinator.backlog_remaining(), 0);
    }

    #[tokio::test]
    async fn test_sla_failure_terminates_and_advances() {
        let (coordinator, _) = build(Arc::new(DisabledSlaChecker));
        coordinator.ingest(vec![ticket(1), ticket(2)]);

        let response = coordinator.process_next().await;
        assert_eq!(response.status, "sla_failed");
        assert!(response.ticket.is_none());
        assert!(coordinator.pending_approval().is_empty());
        // Cursor moved on to the next ticket.
        assert_eq!(coordinator.backlog_remaining(), 1);

        let entry = &coordinator.timeline().snapshot()[0];
        assert_eq!(entry.status, "sla_failed");
        assert!(entry.steps.iter().any(|s| s.contains("SLA check failed")));
    }

    #[tokio::test]
    async fn test_sla_error_degrades_to_not_covered() {
        // A throwing SLA collaborator must not stall the cursor; the
        // ticket terminates as sla_failed with the defensive default.
        let (coordinator, _) = build(Arc::new(BrokenSla));
        coordinator.ingest(vec![ticket(1), ticket(2)]);

        let response = coordinator.process_next().await;
        assert_eq!(response.status, "sla_failed");
        assert_eq!(coordinator.backlog_remaining(), 1);
        assert!(coordinator.pending_approval().is_empty());

        let entry = &coordinator.timeline().snapshot()[0];
        assert_eq!(entry.status, "sla_failed");
        assert!(entry
            .steps
            .iter()
            .any(|s| s.contains("SLA check unavailable")));
    }

    #[tokio::test]
    async fn test_lookup_error_degrades_to_not_found() {
        // A throwing retrieval collaborator degrades to not_found;
        // the ticket still reaches the approval queue, just without a
        // candidate answer.
        let (coordinator, _) = build_with(Arc::new(CoveredSla), Arc::new(BrokenLookup));
        coordinator.ingest(vec![ticket(1)]);

        let response = coordinator.process_next().await;
        assert_eq!(response.status, "success");
        assert!(response.ticket.unwrap().candidate_answer.is_none());

        let pending = coordinator.pending_approval();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].candidate_answer.is_none());
        assert_eq!(coordinator.backlog_remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_backlog_reports_no_more_tickets() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        let response = coordinator.process_next().await;
        assert_eq!(response.status, "no_more_tickets");
    }

    #[tokio::test]
    async fn test_ingest_sorts_pending_by_ticket_id() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        coordinator.ingest(vec![ticket(5), ticket(2), ticket(9)]);

        let response = coordinator.process_next().await;
        assert_eq!(response.ticket.unwrap().ticket_id, 2);
        let response = coordinator.process_next().await;
        assert_eq!(response.ticket.unwrap().ticket_id, 5);
    }

    #[tokio::test]
    async fn test_approve_is_terminal() {
        let (coordinator, scheduler) = build(Arc::new(CoveredSla));
        coordinator.ingest(vec![ticket(1)]);
        coordinator.process_next().await;

        let response = coordinator.resolve_approval(1, true).unwrap();
        assert_eq!(response.status, "success");
        assert!(coordinator.pending_approval().is_empty());
        // Approval never reaches the scheduler.
        assert_eq!(scheduler.depth(), 0);

        let entry = &coordinator.timeline().snapshot()[0];
        assert_eq!(entry.status, "approved");
    }

    #[tokio::test]
    async fn test_reject_pushes_to_scheduler_once() {
        let (coordinator, scheduler) = build(Arc::new(CoveredSla));
        coordinator.ingest(vec![ticket(1)]);
        coordinator.process_next().await;

        coordinator.resolve_approval(1, false).unwrap();
        assert!(coordinator.pending_approval().is_empty());
        assert_eq!(scheduler.depth(), 1);

        let entry = &coordinator.timeline().snapshot()[0];
        assert_eq!(entry.status, "sent_to_scheduler");
    }

    #[tokio::test]
    async fn test_resolve_unknown_ticket_is_error() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        assert!(coordinator.resolve_approval(42, true).is_err());
    }

    #[tokio::test]
    async fn test_timeline_snapshot_newest_first() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        coordinator.ingest(vec![ticket(1), ticket(2)]);
        coordinator.process_next().await;
        coordinator.process_next().await;

        let snapshot = coordinator.timeline().snapshot();
        assert_eq!(snapshot[0].ticket_id, 2);
        assert_eq!(snapshot[1].ticket_id, 1);
    }

    #[tokio::test]
    async fn test_ingest_file_roundtrip() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        std::fs::write(
            &path,
            r#"[{"ticket_id": 3, "title": "vpn down", "priority": "high"},
               {"ticket_id": 1, "title": "printer jam"}]"#,
        )
        .unwrap();

        assert_eq!(coordinator.ingest_file(&path).unwrap(), 2);
        assert_eq!(coordinator.backlog_remaining(), 2);

        let response = coordinator.process_next().await;
        assert_eq!(response.ticket.unwrap().ticket_id, 1);
    }

    #[tokio::test]
    async fn test_ingest_file_missing_is_error() {
        let (coordinator, _) = build(Arc::new(CoveredSla));
        assert!(coordinator.ingest_file("/nonexistent/tickets.json").is_err());
    }
}
