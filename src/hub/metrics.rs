use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Sliding window used for the event rate
const RATE_WINDOW_MS: i64 = 5000;

/// Tracks hub intake and dispatch counters
#[derive(Clone, Debug)]
pub struct HubMetrics {
    events_received: Arc<AtomicU64>,
    events_logged: Arc<AtomicU64>,
    events_rejected: Arc<AtomicU64>,
    requests_handled: Arc<AtomicU64>,
    malformed_messages: Arc<AtomicU64>,
    commands_applied: Arc<AtomicU64>,

    /// Event timestamps for rate calculation (sliding 5-second window)
    event_timestamps: Arc<RwLock<VecDeque<i64>>>,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self {
            events_received: Arc::new(AtomicU64::new(0)),
            events_logged: Arc::new(AtomicU64::new(0)),
            events_rejected: Arc::new(AtomicU64::new(0)),
            requests_handled: Arc::new(AtomicU64::new(0)),
            malformed_messages: Arc::new(AtomicU64::new(0)),
            commands_applied: Arc::new(AtomicU64::new(0)),
            event_timestamps: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Record a dispatched event and whether it made it into the log
    pub fn record_event(&self, logged: bool) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        if logged {
            self.events_logged.fetch_add(1, Ordering::Relaxed);
        }

        let now = Utc::now().timestamp_millis();
        let mut timestamps = self
            .event_timestamps
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        timestamps.push_back(now);

        // Prune old timestamps
        while let Some(&oldest) = timestamps.front() {
            if now - oldest > RATE_WINDOW_MS {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Event from an entity bound to another client
    pub fn record_rejected(&self) {
        self.events_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Events per second over the last 5 seconds
    pub fn event_rate(&self) -> f64 {
        let timestamps = self
            .event_timestamps
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        timestamps.len() as f64 / (RATE_WINDOW_MS as f64 / 1000.0)
    }

    pub fn snapshot(&self, sessions: usize, pending: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_logged: self.events_logged.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            event_rate: self.event_rate(),
            sessions,
            pending,
        }
    }
}

impl Default for HubMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_logged: u64,
    pub events_rejected: u64,
    pub requests_handled: u64,
    pub malformed_messages: u64,
    pub commands_applied: u64,
    pub event_rate: f64,
    pub sessions: usize,
    /// Messages waiting in the scheduler
    pub pending: usize,
}
