//! Human approval gate.
//!
//! Single FIFO queue of tickets awaiting a binary decision. Priority
//! is irrelevant here: a ticket only arrives after clearing SLA and
//! retrieval. Two access patterns share one mutex-guarded deque:
//! resolve-by-id (API callers, decisions may arrive out of order) and
//! head-pop (a sequential interactive worker).

use desk_common::{DeskError, Ticket};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;

/// Queue of tickets pending a human decision.
pub struct ApprovalGate {
    queue: Mutex<VecDeque<Ticket>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a ticket to the tail.
    pub fn enqueue(&self, ticket: Ticket) {
        let mut queue = self.queue.lock().unwrap();
        info!("Ticket added to approval queue: {}", ticket.title);
        queue.push_back(ticket);
    }

    /// Remove a ticket by id from anywhere in the queue. Not finding
    /// it is a caller error, not a system fault.
    pub fn take(&self, ticket_id: i64) -> Result<Ticket, DeskError> {
        let mut queue = self.queue.lock().unwrap();
        match queue.iter().position(|t| t.ticket_id == ticket_id) {
            Some(index) => Ok(queue.remove(index).expect("index in bounds")),
            None => Err(DeskError::TicketNotFound(ticket_id)),
        }
    }

    /// Pop the head of the queue, for a sequential decision worker.
    pub fn pop_next(&self) -> Option<Ticket> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Snapshot of the pending tickets in queue order.
    pub fn snapshot(&self) -> Vec<Ticket> {
        self.queue.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}
