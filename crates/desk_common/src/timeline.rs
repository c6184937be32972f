//! Per-ticket timeline audit records.
//!
//! One entry per ticket, created when the coordinator picks it up.
//! `steps` is append-only; entries are never deleted for the process
//! lifetime. Owned by the coordinator, read by the notification hub
//! and the status API.

use crate::technician::TechnicianSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of one ticket's trip through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub ticket_id: i64,
    pub title: String,
    /// Ordered, append-only audit strings
    pub steps: Vec<String>,
    /// Mirrors the ticket's coarse stage
    pub status: String,
    #[serde(default)]
    pub candidate_answer: Option<String>,
    #[serde(default)]
    pub assigned_technician: Option<TechnicianSummary>,
    #[serde(default)]
    pub external_issue_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TimelineEntry {
    pub fn new(ticket_id: i64, title: &str) -> Self {
        Self {
            ticket_id,
            title: title.to_string(),
            steps: Vec::new(),
            status: "processing".to_string(),
            candidate_answer: None,
            assigned_technician: None,
            external_issue_key: None,
            created_at: Utc::now(),
        }
    }

    /// Append an audit step. Steps are never removed.
    pub fn push_step(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_accumulate_in_order() {
        let mut entry = TimelineEntry::new(7, "VPN down");
        entry.push_step("SLA check started for Ticket 7");
        entry.push_step("SLA check passed for Ticket 7");
        assert_eq!(entry.steps.len(), 2);
        assert!(entry.steps[0].contains("started"));
        assert!(entry.steps[1].contains("passed"));
    }
}
