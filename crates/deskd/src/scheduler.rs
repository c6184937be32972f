//! Weighted round-robin priority scheduler.
//!
//! Three FIFO lanes (high, medium, low) with per-epoch credits of
//! 5/3/1. Each tick scans lanes in fixed order and processes at most
//! one ticket: the first lane that is non-empty and still has credit
//! gets a dequeue, its credit drops by one whether or not assignment
//! succeeds, and a failed assignment sends the ticket back to the
//! tail of the same lane. Credits reset to full weights only once all
//! three counters hit zero, which bounds unfairness to 5:3:1 within
//! any epoch of nine dequeues.
//!
//! The lane mutex is never held across the assignment call; a slow
//! external sync must not block pushers.

use desk_common::{Priority, Ticket};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::assignment::AssignmentEngine;

/// Per-epoch dequeue credits.
pub const WEIGHT_HIGH: u32 = 5;
pub const WEIGHT_MEDIUM: u32 = 3;
pub const WEIGHT_LOW: u32 = 1;

struct LaneState {
    high: VecDeque<Ticket>,
    medium: VecDeque<Ticket>,
    low: VecDeque<Ticket>,
    high_credits: u32,
    medium_credits: u32,
    low_credits: u32,
}

impl LaneState {
    fn new() -> Self {
        Self {
            high: VecDeque::new(),
            medium: VecDeque::new(),
            low: VecDeque::new(),
            high_credits: WEIGHT_HIGH,
            medium_credits: WEIGHT_MEDIUM,
            low_credits: WEIGHT_LOW,
        }
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut VecDeque<Ticket> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        }
    }

    /// First lane in {high, medium, low} order that is non-empty and
    /// has remaining credit; pops one ticket and spends the credit.
    fn take_next(&mut self) -> Option<(Priority, Ticket)> {
        if !self.high.is_empty() && self.high_credits > 0 {
            self.high_credits -= 1;
            return self.high.pop_front().map(|t| (Priority::High, t));
        }
        if !self.medium.is_empty() && self.medium_credits > 0 {
            self.medium_credits -= 1;
            return self.medium.pop_front().map(|t| (Priority::Medium, t));
        }
        if !self.low.is_empty() && self.low_credits > 0 {
            self.low_credits -= 1;
            return self.low.pop_front().map(|t| (Priority::Low, t));
        }
        None
    }

    fn maybe_reset_epoch(&mut self) {
        if self.high_credits == 0 && self.medium_credits == 0 && self.low_credits == 0 {
            self.high_credits = WEIGHT_HIGH;
            self.medium_credits = WEIGHT_MEDIUM;
            self.low_credits = WEIGHT_LOW;
            debug!("Scheduler epoch reset");
        }
    }
}

/// Lane depths and remaining credits, for the queues endpoint.
#[derive(Debug, Clone, Copy)]
pub struct LaneStats {
    pub high_depth: usize,
    pub medium_depth: usize,
    pub low_depth: usize,
    pub high_credits: u32,
    pub medium_credits: u32,
    pub low_credits: u32,
}

/// Priority scheduler driving the assignment engine.
pub struct PriorityScheduler {
    lanes: Mutex<LaneState>,
    engine: Arc<AssignmentEngine>,
    assign_timeout: Duration,
}

impl PriorityScheduler {
    pub fn new(engine: Arc<AssignmentEngine>, assign_timeout: Duration) -> Self {
        Self {
            lanes: Mutex::new(LaneState::new()),
            engine,
            assign_timeout,
        }
    }

    /// Insert a ticket at the tail of its priority lane.
    pub fn push(&self, ticket: Ticket) {
        let mut lanes = self.lanes.lock().unwrap();
        info!(
            "Ticket pushed to {} queue: {}",
            ticket.priority.as_str().to_uppercase(),
            ticket.title
        );
        lanes.lane_mut(ticket.priority).push_back(ticket);
    }

    /// One scheduling step: dequeue at most one ticket, attempt
    /// assignment, requeue on failure, and roll the epoch when every
    /// credit is spent. Returns the assigned ticket id, if any.
    pub async fn tick(&self) -> Option<i64> {
        let popped = self.lanes.lock().unwrap().take_next();

        let assigned_id = match popped {
            Some((priority, mut ticket)) => {
                let outcome =
                    tokio::time::timeout(self.assign_timeout, self.engine.assign(&mut ticket))
                        .await;

                match outcome {
                    Ok(Some(_)) => Some(ticket.ticket_id),
                    Ok(None) => {
                        info!(
                            "No technician free for ticket '{}', pushing back to queue",
                            ticket.title
                        );
                        self.requeue(priority, ticket);
                        None
                    }
                    Err(_) => {
                        warn!(
                            "Assignment timed out for ticket '{}', pushing back to queue",
                            ticket.title
                        );
                        self.requeue(priority, ticket);
                        None
                    }
                }
            }
            None => None,
        };

        self.lanes.lock().unwrap().maybe_reset_epoch();
        assigned_id
    }

    /// Failed tickets go to the tail of their own lane: zero loss at
    /// the cost of possible reordering behind later arrivals.
    fn requeue(&self, priority: Priority, ticket: Ticket) {
        self.lanes.lock().unwrap().lane_mut(priority).push_back(ticket);
    }

    pub fn stats(&self) -> LaneStats {
        let lanes = self.lanes.lock().unwrap();
        LaneStats {
            high_depth: lanes.high.len(),
            medium_depth: lanes.medium.len(),
            low_depth: lanes.low.len(),
            high_credits: lanes.high_credits,
            medium_credits: lanes.medium_credits,
            low_credits: lanes.low_credits,
        }
    }

    pub fn depth(&self) -> usize {
        let lanes = self.lanes.lock().unwrap();
        lanes.high.len() + lanes.medium.len() + lanes.low.len()
    }

    /// Background scheduling loop. One tick per interval; a single
    /// ticket's failure never stops the loop.
    pub async fn run(self: Arc<Self>, tick_interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(tick_interval);
        // A slow assignment must not trigger a burst of catch-up
        // ticks afterwards; skip missed ticks and keep the cadence.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        info!("Scheduler loop stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Classifier, DisabledTracker, KeywordClassifier};
    use crate::coordinator::TimelineLog;
    use crate::directory::TechnicianDirectory;
    use crate::notify::NotificationHub;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use desk_common::Technician;

    /// Records classify call times; the first call stalls for `stall`.
    struct StallingClassifier {
        calls: Mutex<Vec<tokio::time::Instant>>,
        stall: Duration,
    }

    #[async_trait]
    impl Classifier for StallingClassifier {
        async fn classify(&self, _ticket: &Ticket) -> AnyResult<String> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(tokio::time::Instant::now());
                calls.len() == 1
            };
            if first {
                tokio::time::sleep(self.stall).await;
            }
            Ok("Network & Connectivity Support".to_string())
        }
    }

    /// Classifier that never finishes for one specific ticket.
    struct SluggishClassifier {
        slow_ticket: i64,
    }

    #[async_trait]
    impl Classifier for SluggishClassifier {
        async fn classify(&self, ticket: &Ticket) -> AnyResult<String> {
            if ticket.ticket_id == self.slow_ticket {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok("VPN & Remote Access Support".to_string())
        }
    }

    fn generalist(id: i64, name: &str) -> Technician {
        Technician {
            technician_id: id,
            name: name.to_string(),
            email: format!("{}@msp.example", name.to_lowercase()),
            specialization: desk_common::ticket::CATEGORIES.join(", "),
            active_status: true,
            tickets_assigned: 0,
            pending_ticket_count: 0,
            external_account_id: None,
        }
    }

    fn scheduler_with_roster(roster: &[Technician]) -> (Arc<PriorityScheduler>, TimelineLog) {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        for tech in roster {
            dir.insert_technician(tech).unwrap();
        }
        let timeline = TimelineLog::new();
        let engine = Arc::new(AssignmentEngine::new(
            dir,
            Arc::new(KeywordClassifier),
            Arc::new(DisabledTracker),
            timeline.clone(),
            NotificationHub::new(),
        ));
        (
            Arc::new(PriorityScheduler::new(engine, Duration::from_secs(5))),
            timeline,
        )
    }

    fn ticket(id: i64, priority: Priority) -> Ticket {
        Ticket::new(
            id,
            &format!("vpn ticket {}", id),
            "vpn tunnel drops",
            priority,
        )
    }

    #[tokio::test]
    async fn test_epoch_follows_weights() {
        let (scheduler, timeline) = scheduler_with_roster(&[generalist(1, "Ada")]);
        for id in 1..=6 {
            let t = ticket(id, Priority::High);
            timeline.create_entry(&t);
            scheduler.push(t);
        }
        for id in 7..=10 {
            let t = ticket(id, Priority::Medium);
            timeline.create_entry(&t);
            scheduler.push(t);
        }
        for id in 11..=12 {
            let t = ticket(id, Priority::Low);
            timeline.create_entry(&t);
            scheduler.push(t);
        }

        let mut order = Vec::new();
        for _ in 0..9 {
            if let Some(id) = scheduler.tick().await {
                order.push(id);
            }
        }

        // First epoch: 5 high, 3 medium, 1 low.
        assert_eq!(order, vec![1, 2, 3, 4, 5, 7, 8, 9, 11]);

        // Epoch reset: high gets served again before remaining medium.
        assert_eq!(scheduler.tick().await, Some(6));
    }

    #[tokio::test]
    async fn test_empty_lane_credit_lingers() {
        // With no high tickets, high credits stay at 5 and the epoch
        // never resets; medium drains its 3 credits and then stalls
        // until new high arrivals spend the lingering credits.
        let (scheduler, timeline) = scheduler_with_roster(&[generalist(1, "Ada")]);
        for id in 1..=5 {
            let t = ticket(id, Priority::Medium);
            timeline.create_entry(&t);
            scheduler.push(t);
        }

        let mut assigned = 0;
        for _ in 0..6 {
            if scheduler.tick().await.is_some() {
                assigned += 1;
            }
        }
        assert_eq!(assigned, 3);
        assert_eq!(scheduler.depth(), 2);

        let stats = scheduler.stats();
        assert_eq!(stats.high_credits, WEIGHT_HIGH);
        assert_eq!(stats.medium_credits, 0);
    }

    #[tokio::test]
    async fn test_requeue_on_failure_keeps_ticket() {
        // Empty roster: every assignment fails, ticket must survive
        // at the tail of its lane and the credit is still spent.
        let (scheduler, timeline) = scheduler_with_roster(&[]);
        let t = ticket(1, Priority::High);
        timeline.create_entry(&t);
        scheduler.push(t);

        assert_eq!(scheduler.tick().await, None);
        assert_eq!(scheduler.depth(), 1);
        assert_eq!(scheduler.stats().high_credits, WEIGHT_HIGH - 1);
    }

    #[tokio::test]
    async fn test_failed_attempts_exhaust_epoch_and_reset() {
        let (scheduler, timeline) = scheduler_with_roster(&[]);
        for id in 1..=2 {
            let t = ticket(id, Priority::High);
            timeline.create_entry(&t);
            scheduler.push(t);
        }
        for id in 3..=4 {
            let t = ticket(id, Priority::Medium);
            timeline.create_entry(&t);
            scheduler.push(t);
        }
        let t = ticket(5, Priority::Low);
        timeline.create_entry(&t);
        scheduler.push(t);

        // 9 failed dequeues spend every credit; nothing is lost.
        for _ in 0..9 {
            assert_eq!(scheduler.tick().await, None);
        }
        assert_eq!(scheduler.depth(), 5);

        let stats = scheduler.stats();
        assert_eq!(stats.high_credits, WEIGHT_HIGH);
        assert_eq!(stats.medium_credits, WEIGHT_MEDIUM);
        assert_eq!(stats.low_credits, WEIGHT_LOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assignment_timeout_requeues_at_tail() {
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        dir.insert_technician(&generalist(1, "Ada")).unwrap();
        let timeline = TimelineLog::new();
        let engine = Arc::new(AssignmentEngine::new(
            dir,
            Arc::new(SluggishClassifier { slow_ticket: 1 }),
            Arc::new(DisabledTracker),
            timeline.clone(),
            NotificationHub::new(),
        ));
        let scheduler = PriorityScheduler::new(engine, Duration::from_millis(50));

        let t1 = ticket(1, Priority::High);
        let t2 = ticket(2, Priority::High);
        timeline.create_entry(&t1);
        timeline.create_entry(&t2);
        scheduler.push(t1);
        scheduler.push(t2);

        // First tick hits the hung assignment: timeout, requeue, and
        // the credit is still spent.
        assert_eq!(scheduler.tick().await, None);
        assert_eq!(scheduler.depth(), 2);
        assert_eq!(scheduler.stats().high_credits, WEIGHT_HIGH - 1);

        // Ticket 1 went to the tail: ticket 2 is now ahead of it.
        assert_eq!(scheduler.tick().await, Some(2));
        assert_eq!(scheduler.depth(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_keeps_cadence() {
        // A 350ms assignment against a 100ms loop interval must not
        // produce a burst of back-to-back catch-up ticks afterwards.
        let dir = Arc::new(TechnicianDirectory::open_in_memory().unwrap());
        let classifier = Arc::new(StallingClassifier {
            calls: Mutex::new(Vec::new()),
            stall: Duration::from_millis(350),
        });
        let timeline = TimelineLog::new();
        let engine = Arc::new(AssignmentEngine::new(
            dir,
            classifier.clone(),
            Arc::new(DisabledTracker),
            timeline.clone(),
            NotificationHub::new(),
        ));
        let scheduler = Arc::new(PriorityScheduler::new(engine, Duration::from_secs(5)));

        // Empty roster: the ticket is requeued every tick, so each
        // tick produces exactly one classify call.
        let t = ticket(1, Priority::High);
        timeline.create_entry(&t);
        scheduler.push(t);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(scheduler.clone().run(Duration::from_millis(100), stop_rx));
        tokio::time::sleep(Duration::from_millis(800)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        let calls = classifier.calls.lock().unwrap();
        assert!(calls.len() >= 3, "expected several ticks, got {}", calls.len());
        for pair in calls.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(100),
                "catch-up burst detected: {:?} between ticks",
                gap
            );
        }
    }

    #[tokio::test]
    async fn test_push_default_lane_is_low() {
        let (scheduler, _) = scheduler_with_roster(&[]);
        scheduler.push(ticket(1, Priority::Low));
        assert_eq!(scheduler.stats().low_depth, 1);
    }
}
