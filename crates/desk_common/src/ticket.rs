//! Ticket types for the helpdesk pipeline.
//!
//! Every ingested ticket moves strictly forward through the stages:
//! SLA check, answer lookup, human approval, priority scheduling,
//! technician assignment. Only the approval gate can route a ticket
//! back into the scheduler (on rejection).

use serde::{Deserialize, Serialize};

/// The fixed category set a ticket can be classified into.
pub const CATEGORIES: [&str; 12] = [
    "Network & Connectivity Support",
    "Email & Collaboration Tools Support",
    "Hardware Maintenance & Repair",
    "Software Installation & Configuration",
    "Security & Malware Response",
    "Access Control & Permissions",
    "VPN & Remote Access Support",
    "Printer & Peripheral Support",
    "Account & Password Management",
    "Application Performance Troubleshooting",
    "New User Onboarding",
    "General IT Consultation",
];

/// Catch-all category used when classification returns anything
/// outside the fixed set.
pub const DEFAULT_CATEGORY: &str = "General IT Consultation";

/// Returns `label` if it is one of the fixed categories, otherwise
/// the catch-all.
pub fn normalize_category(label: &str) -> &'static str {
    CATEGORIES
        .iter()
        .find(|c| **c == label.trim())
        .copied()
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Ticket priority, which selects the scheduler lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    /// Default when the ingested priority is absent or unrecognized
    #[default]
    Low,
}

impl Priority {
    /// Parse an ingested priority string, defaulting to Low.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            _ => Priority::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket status in the pipeline.
///
/// A ticket is in exactly one of these at any time. `SlaRejected`,
/// `Approved`, and `Assigned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Ingested, not yet picked up by the coordinator
    #[default]
    Unprocessed,
    /// SLA check failed, terminal
    SlaRejected,
    /// Waiting in the approval gate for a human decision
    PendingApproval,
    /// Rejected by a human, waiting in a scheduler lane
    QueuedForAssignment,
    /// Bound to a technician, terminal
    Assigned,
    /// Approved by a human with the candidate answer, terminal
    Approved,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unprocessed => "unprocessed",
            Self::SlaRejected => "sla_rejected",
            Self::PendingApproval => "pending_approval",
            Self::QueuedForAssignment => "queued_for_assignment",
            Self::Assigned => "assigned",
            Self::Approved => "approved",
        };
        f.write_str(s)
    }
}

/// A helpdesk ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Stable id assigned at ingestion
    pub ticket_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    /// Set during classification, one of [`CATEGORIES`]
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: TicketStatus,
    /// Answer produced by the retrieval collaborator, if any
    #[serde(default)]
    pub candidate_answer: Option<String>,
    #[serde(default)]
    pub assigned_technician_id: Option<i64>,
    /// Key in the external ticketing system, set once synchronized
    #[serde(default)]
    pub external_issue_key: Option<String>,
}

impl Ticket {
    pub fn new(ticket_id: i64, title: &str, description: &str, priority: Priority) -> Self {
        Self {
            ticket_id,
            title: title.to_string(),
            description: description.to_string(),
            priority,
            category: None,
            status: TicketStatus::Unprocessed,
            candidate_answer: None,
            assigned_technician_id: None,
            external_issue_key: None,
        }
    }

    /// Title and description joined, the text fed to classification
    /// and retrieval.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_defaults_to_low() {
        assert_eq!(Priority::parse("high"), Priority::High);
        assert_eq!(Priority::parse("  Medium "), Priority::Medium);
        assert_eq!(Priority::parse("urgent"), Priority::Low);
        assert_eq!(Priority::parse(""), Priority::Low);
    }

    #[test]
    fn test_normalize_category_catch_all() {
        assert_eq!(
            normalize_category("VPN & Remote Access Support"),
            "VPN & Remote Access Support"
        );
        assert_eq!(normalize_category("Quantum Support"), DEFAULT_CATEGORY);
        assert_eq!(normalize_category(""), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let s = serde_json::to_string(&TicketStatus::PendingApproval).unwrap();
        assert_eq!(s, "\"pending_approval\"");
    }
}
