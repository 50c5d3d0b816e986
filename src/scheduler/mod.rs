//! Deadline-slack ordered multiplexer for events and requests.
//!
//! Every message has a remaining slack: events are always due (slack 0),
//! requests are due once their client's wait budget runs out and keep
//! going negative afterwards. The scheduler always releases the message
//! with the least slack; equal slack is released in arrival order.

use crate::event::Event;
use crate::request::Request;
use std::cmp::Ordering;
use std::time::{Duration, Instant};


/// A message received by the hub, tagged with its arrival time
#[derive(Clone, Debug)]
pub enum Message {
    Event {
        event: Event,
        arrival: Instant,
    },
    Request {
        client_id: u32,
        request: Request,
        arrival: Instant,
        /// Wait budget of the client at enqueue time (or after a rebudget)
        max_wait: Duration,
    },
}

impl Message {
    pub fn event(event: Event) -> Self {
        Message::Event {
            event,
            arrival: Instant::now(),
        }
    }

    pub fn request(client_id: u32, request: Request, max_wait: Duration) -> Self {
        Message::Request {
            client_id,
            request,
            arrival: Instant::now(),
            max_wait,
        }
    }

    /// Seconds left before this message is overdue.
    ///
    /// Always 0 for events; `max_wait - (now - arrival)` for requests,
    /// negative once the budget is exceeded.
    pub fn remaining_slack(&self, now: Instant) -> f64 {
        match self {
            Message::Event { .. } => 0.0,
            Message::Request {
                arrival, max_wait, ..
            } => max_wait.as_secs_f64() - now.saturating_duration_since(*arrival).as_secs_f64(),
        }
    }

    /// Client owning the message
    pub fn client_id(&self) -> u32 {
        match self {
            Message::Event { event, .. } => event.client_id,
            Message::Request { client_id, .. } => *client_id,
        }
    }

    pub fn arrival(&self) -> Instant {
        match self {
            Message::Event { arrival, .. } | Message::Request { arrival, .. } => *arrival,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Message::Event { .. })
    }
}

/// A message waiting in the scheduler, carrying an arbitrary ticket the
/// caller uses to route the outcome (e.g. the origin connection).
#[derive(Debug)]
pub struct Scheduled<T> {
    /// Hub-wide arrival sequence
    pub seq: u64,
    pub message: Message,
    pub ticket: T,
}

/// Pending messages ordered by remaining slack, then by arrival sequence.
///
/// Slack depends on the current time, so the order is evaluated at
/// selection time rather than maintained in a heap.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Enqueues a message and returns its arrival sequence number.
    pub fn enqueue(&mut self, message: Message, ticket: T) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Scheduled {
            seq,
            message,
            ticket,
        });
        seq
    }

    /// Removes and returns the message with the least remaining slack at
    /// `now`. Ties go to the earliest arrival.
    pub fn select_next(&mut self, now: Instant) -> Option<Scheduled<T>> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| compare(a, b, now))
            .map(|(i, _)| i)?;

        Some(self.pending.swap_remove(index))
    }

    /// Applies a new wait budget to the pending requests of `client_id`.
    /// Returns how many requests were re-budgeted.
    pub fn rebudget(&mut self, client_id: u32, budget: Duration) -> usize {
        let mut updated = 0;
        for scheduled in &mut self.pending {
            if let Message::Request {
                client_id: owner,
                max_wait,
                ..
            } = &mut scheduled.message
            {
                if *owner == client_id {
                    *max_wait = budget;
                    updated += 1;
                }
            }
        }
        updated
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn compare<T>(a: &Scheduled<T>, b: &Scheduled<T>, now: Instant) -> Ordering {
    a.message
        .remaining_slack(now)
        .total_cmp(&b.message.remaining_slack(now))
        .then(a.seq.cmp(&b.seq))
}
