//! Technician assignment engine.
//!
//! Binds a dequeued ticket to exactly one technician:
//! classify -> load roster -> filter by specialization + cap ->
//! pick least loaded -> optimistic increment -> persist or roll back
//! -> best-effort external sync -> timeline step.
//!
//! "No capacity" and "no specialization match" both come back as
//! `None` so the scheduler's requeue logic stays uniform.

use desk_common::events::DeskEvent;
use desk_common::technician::TechnicianSummary;
use desk_common::ticket::normalize_category;
use desk_common::{Technician, Ticket};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::collaborators::{Classifier, IssueTracker};
use crate::coordinator::TimelineLog;
use crate::directory::TechnicianDirectory;
use crate::notify::NotificationHub;

/// Assignment engine with constructor-injected collaborators.
pub struct AssignmentEngine {
    directory: Arc<TechnicianDirectory>,
    classifier: Arc<dyn Classifier>,
    tracker: Arc<dyn IssueTracker>,
    timeline: TimelineLog,
    notifier: NotificationHub,
    /// Serializes the load-increment-persist window so concurrent
    /// attempts cannot double-count one technician.
    reserve_lock: Mutex<()>,
}

impl AssignmentEngine {
    pub fn new(
        directory: Arc<TechnicianDirectory>,
        classifier: Arc<dyn Classifier>,
        tracker: Arc<dyn IssueTracker>,
        timeline: TimelineLog,
        notifier: NotificationHub,
    ) -> Self {
        Self {
            directory,
            classifier,
            tracker,
            timeline,
            notifier,
            reserve_lock: Mutex::new(()),
        }
    }

    /// Assign `ticket` to a technician. Returns `None` when no
    /// technician is eligible or persistence fails; the caller must
    /// requeue. On success the ticket carries the technician id and,
    /// if external sync succeeded, the external issue key.
    pub async fn assign(&self, ticket: &mut Ticket) -> Option<Technician> {
        let category = self.classify(ticket).await;
        ticket.category = Some(category.clone());

        let mut assigned = self.reserve(&category)?;

        // Local state is now authoritative; everything past this
        // point is best-effort and must not undo the assignment.
        info!(
            "Ticket '{}' assigned to: {} ({})",
            ticket.title, assigned.name, assigned.specialization
        );
        ticket.assigned_technician_id = Some(assigned.technician_id);
        ticket.status = desk_common::TicketStatus::Assigned;

        if let Err(e) =
            self.directory
                .upsert_ticket(ticket.ticket_id, Some(assigned.technician_id), "Assigned")
        {
            warn!("Failed to record ticket {} assignment: {}", ticket.ticket_id, e);
        }

        self.sync_external(ticket, &mut assigned).await;
        self.record_timeline(ticket, &assigned);

        self.notifier
            .broadcast(DeskEvent::ticket_update("assigned", ticket.clone()));
        self.notifier
            .broadcast(DeskEvent::timeline_update(self.timeline.snapshot()));

        Some(assigned)
    }

    /// Classify the ticket, defaulting to the catch-all category on
    /// collaborator failure or an out-of-set label.
    async fn classify(&self, ticket: &Ticket) -> String {
        let raw = match self.classifier.classify(ticket).await {
            Ok(label) => label,
            Err(e) => {
                warn!("Classifier failed for ticket {}: {}", ticket.ticket_id, e);
                String::new()
            }
        };
        normalize_category(&raw).to_string()
    }

    /// Pick the least-loaded eligible technician and persist the
    /// incremented counters, rolling back on persist failure.
    fn reserve(&self, category: &str) -> Option<Technician> {
        let _guard = self.reserve_lock.lock().unwrap();

        let roster = match self.directory.load_active() {
            Ok(roster) => roster,
            Err(e) => {
                warn!("Failed to load technician roster: {}", e);
                return None;
            }
        };

        // Roster is name-ordered, so min_by_key keeps the first
        // minimum and ties break deterministically.
        let mut chosen = roster
            .into_iter()
            .filter(|t| t.eligible_for(category))
            .min_by_key(|t| t.pending_ticket_count)?;

        chosen.tickets_assigned += 1;
        chosen.pending_ticket_count += 1;

        match self.directory.update_counts(
            chosen.technician_id,
            chosen.tickets_assigned,
            chosen.pending_ticket_count,
        ) {
            Ok(()) => Some(chosen),
            Err(e) => {
                warn!(
                    "Persist failed for technician {}, rolling back: {}",
                    chosen.technician_id, e
                );
                None
            }
        }
    }

    /// Ensure an external issue exists and push the assignee. Missing
    /// key or account id is logged and skipped; sync never fails the
    /// assignment.
    async fn sync_external(&self, ticket: &mut Ticket, assigned: &mut Technician) {
        if ticket.external_issue_key.is_none() {
            match self.tracker.create_issue(ticket).await {
                Ok(key) => ticket.external_issue_key = Some(key),
                Err(e) => warn!(
                    "External issue creation failed for ticket {}: {}",
                    ticket.ticket_id, e
                ),
            }
        }

        match (&ticket.external_issue_key, &assigned.external_account_id) {
            (Some(key), Some(account_id)) => {
                match self.tracker.assign_issue(key, account_id).await {
                    Ok(true) => {}
                    Ok(false) => warn!("External assignment rejected for issue {}", key),
                    Err(e) => warn!("External assignment failed for issue {}: {}", key, e),
                }
            }
            _ => {
                info!("Skipped external assignment, missing issue key or technician account id");
            }
        }
    }

    fn record_timeline(&self, ticket: &Ticket, assigned: &Technician) {
        self.timeline.with_entry(ticket.ticket_id, |entry| {
            entry.push_step(format!(
                "Ticket {} assigned to {} ({})",
                ticket.ticket_id, assigned.name, assigned.specialization
            ));
            entry.set_status("assigned");
            entry.assigned_technician = Some(TechnicianSummary::from(assigned));
            if let Some(key) = &ticket.external_issue_key {
                entry.external_issue_key = Some(key.clone());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DisabledTracker, KeywordClassifier};
    use desk_common::Priority;

    fn network_tech(id: i64, name: &str, pending: i64) -> Technician {
        Technician {
            technician_id: id,
            name: name.to_string(),
            email: format!("{}@msp.example", name.to_lowercase()),
            specialization: "Network & Connectivity Support, VPN & Remote Access Support"
                .to_string(),
            active_status: true,
            tickets_assigned: 0,
            pending_ticket_count: pending,
            external_account_id: None,
        }
    }

    fn engine_with(directory: Arc<TechnicianDirectory>) -> (AssignmentEngine, TimelineLog) {
        let timeline = TimelineLog::new();
        let engine = AssignmentEngine::new(
            directory,
            Arc::new(KeywordClassifier),
            Arc::new(DisabledTracker),
            timeline.clone(),
            NotificationHub::new(),
        );
        (engine, timeline)
    }

    fn vpn_ticket(id: i64) -> Ticket {
        Ticket::new(id, "VPN down", "cannot reach the vpn gateway", Priority::High)
    }

    #[tokio::test]
    async fn test_assign_picks_least_loaded() {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        dir.insert_technician(&network_tech(1, "Alpha", 3)).unwrap();
        dir.insert_technician(&network_tech(2, "Beta", 5)).unwrap();
        let (engine, timeline) = engine_with(dir.clone());

        let mut ticket = vpn_ticket(1);
        timeline.create_entry(&ticket);
        let assigned = engine.assign(&mut ticket).await.unwrap();

        assert_eq!(assigned.technician_id, 1);
        assert_eq!(assigned.pending_ticket_count, 4);
        assert_eq!(ticket.assigned_technician_id, Some(1));

        // Persisted counters match
        let stored = dir.get(1).unwrap().unwrap();
        assert_eq!(stored.pending_ticket_count, 4);
        assert_eq!(stored.tickets_assigned, 1);
    }

    #[tokio::test]
    async fn test_assign_none_when_no_specialist() {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        let mut t = network_tech(1, "Alpha", 0);
        t.specialization = "Printer & Peripheral Support".to_string();
        dir.insert_technician(&t).unwrap();
        let (engine, timeline) = engine_with(dir);

        let mut ticket = vpn_ticket(2);
        timeline.create_entry(&ticket);
        assert!(engine.assign(&mut ticket).await.is_none());
        assert!(ticket.assigned_technician_id.is_none());
    }

    #[tokio::test]
    async fn test_assign_none_when_all_at_cap() {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        dir.insert_technician(&network_tech(1, "Alpha", 150)).unwrap();
        let (engine, timeline) = engine_with(dir);

        let mut ticket = vpn_ticket(3);
        timeline.create_entry(&ticket);
        assert!(engine.assign(&mut ticket).await.is_none());
    }

    #[tokio::test]
    async fn test_persist_failure_rolls_back() {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        dir.insert_technician(&network_tech(1, "Alpha", 3)).unwrap();
        dir.break_updates();
        let (engine, timeline) = engine_with(dir.clone());

        let mut ticket = vpn_ticket(4);
        timeline.create_entry(&ticket);
        assert!(engine.assign(&mut ticket).await.is_none());

        // Counters unchanged after the failed persist
        let stored = dir.get(1).unwrap().unwrap();
        assert_eq!(stored.pending_ticket_count, 3);
        assert_eq!(stored.tickets_assigned, 0);
    }

    #[tokio::test]
    async fn test_timeline_step_recorded_on_success() {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        dir.insert_technician(&network_tech(1, "Alpha", 0)).unwrap();
        let (engine, timeline) = engine_with(dir);

        let mut ticket = vpn_ticket(5);
        timeline.create_entry(&ticket);
        engine.assign(&mut ticket).await.unwrap();

        let snapshot = timeline.snapshot();
        let entry = snapshot.iter().find(|e| e.ticket_id == 5).unwrap();
        assert_eq!(entry.status, "assigned");
        assert!(entry.steps.iter().any(|s| s.contains("assigned to Alpha")));
        assert_eq!(entry.assigned_technician.as_ref().unwrap().name, "Alpha");
    }
}
