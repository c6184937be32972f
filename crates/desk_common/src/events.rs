//! Broadcast event payloads pushed to connected observers.
//!
//! Fire-and-forget: delivery failure to one observer never affects
//! others or the pipeline.

use crate::ticket::Ticket;
use crate::timeline::TimelineEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event kind tag carried on every broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskEventType {
    TimelineUpdate,
    PendingTicketsUpdate,
    TicketUpdate,
}

impl DeskEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimelineUpdate => "timeline_update",
            Self::PendingTicketsUpdate => "pending_tickets_update",
            Self::TicketUpdate => "ticket_update",
        }
    }
}

/// A broadcast message with payload and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskEvent {
    pub event_type: DeskEventType,
    pub payload: DeskEventPayload,
    pub timestamp: DateTime<Utc>,
}

/// Typed payloads for each event kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeskEventPayload {
    Timeline { timeline: Vec<TimelineEntry> },
    PendingTickets { pending_tickets: Vec<Ticket> },
    Ticket { update_type: String, ticket: Ticket },
}

impl DeskEvent {
    pub fn timeline_update(timeline: Vec<TimelineEntry>) -> Self {
        Self {
            event_type: DeskEventType::TimelineUpdate,
            payload: DeskEventPayload::Timeline { timeline },
            timestamp: Utc::now(),
        }
    }

    pub fn pending_tickets_update(pending_tickets: Vec<Ticket>) -> Self {
        Self {
            event_type: DeskEventType::PendingTicketsUpdate,
            payload: DeskEventPayload::PendingTickets { pending_tickets },
            timestamp: Utc::now(),
        }
    }

    pub fn ticket_update(update_type: &str, ticket: Ticket) -> Self {
        Self {
            event_type: DeskEventType::TicketUpdate,
            payload: DeskEventPayload::Ticket {
                update_type: update_type.to_string(),
                ticket,
            },
            timestamp: Utc::now(),
        }
    }
}
