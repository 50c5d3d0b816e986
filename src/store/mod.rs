//! Per-client append-only event log and the analytical queries derived
//! from it.

use crate::event::{Event, Reading};
use crate::request::TimeWindow;
use std::collections::{BTreeSet, HashMap};


#[derive(Clone, Debug)]
struct Logged {
    /// Hub arrival sequence; store order is ascending arrival
    arrival: u64,
    event: Event,
}

/// Append-only event log of one client session.
///
/// Events are kept in arrival order. When dispatch tasks race, late
/// appends are placed by their arrival sequence, so iteration order always
/// matches the order in which the hub received the events.
#[derive(Clone, Debug, Default)]
pub struct EventStore {
    events: Vec<Logged>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event after everything already logged.
    pub fn append(&mut self, event: Event) {
        let arrival = self.events.last().map_or(0, |l| l.arrival + 1);
        self.events.push(Logged { arrival, event });
    }

    /// Inserts an event at the position given by its hub arrival sequence.
    pub fn insert_arrived(&mut self, arrival: u64, event: Event) {
        let pos = self.events.partition_point(|l| l.arrival <= arrival);
        self.events.insert(pos, Logged { arrival, event });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|l| &l.event)
    }

    /// Most recently received event (last in arrival order), regardless of
    /// its timestamp.
    pub fn latest_received(&self) -> Option<&Event> {
        self.events.last().map(|l| &l.event)
    }

    /// Returns the entity ids of all logged events ordered by timestamp, then
    /// **clears the log**.
    ///
    /// This is a read-then-clear operation: a second call without new events
    /// in between returns an empty list. Events sharing a timestamp keep
    /// their arrival order.
    pub fn read_logs(&mut self) -> Vec<u32> {
        let mut drained: Vec<Event> = self.events.drain(..).map(|l| l.event).collect();
        drained.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        drained.into_iter().map(|e| e.entity_id).collect()
    }

    /// Events with `start <= timestamp <= end`, in store order.
    pub fn events_in_window(&self, window: TimeWindow) -> Vec<Event> {
        self.iter()
            .filter(|e| window.contains(e.timestamp))
            .cloned()
            .collect()
    }

    /// The latest `n` events by timestamp.
    ///
    /// Events sharing a timestamp are collapsed to the one with the largest
    /// entity id before counting. Fewer than `n` distinct timestamps returns
    /// them all.
    pub fn last_n_events(&self, n: usize) -> Vec<Event> {
        let mut events: Vec<Event> = self.iter().cloned().collect();
        events.sort_by(|a, b| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then(b.entity_id.cmp(&a.entity_id))
        });
        // sorted so the largest entity id leads each timestamp run
        events.dedup_by(|later, first| later.timestamp == first.timestamp);

        let skip = events.len().saturating_sub(n);
        events.split_off(skip)
    }

    /// Entity with the most logged events; ties go to the larger id.
    pub fn most_active_entity(&self) -> Option<u32> {
        let mut counts: HashMap<u32, usize> = HashMap::new();
        for event in self.iter() {
            *counts.entry(event.entity_id).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .max_by(|(id_a, count_a), (id_b, count_b)| count_a.cmp(count_b).then(id_a.cmp(id_b)))
            .map(|(id, _)| id)
    }

    /// Distinct entity ids seen so far
    pub fn entity_ids(&self) -> BTreeSet<u32> {
        self.iter().map(|e| e.entity_id).collect()
    }

    pub fn has_events_from(&self, entity_id: u32) -> bool {
        self.iter().any(|e| e.entity_id == entity_id)
    }

    /// Timestamps of one entity's events, in store order
    pub fn timestamps_of(&self, entity_id: u32) -> Vec<f64> {
        self.iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| e.timestamp)
            .collect()
    }

    /// Values of one entity's events, in store order. Actuator states map to
    /// 1.0 (on) and 0.0 (off).
    pub fn values_of(&self, entity_id: u32) -> Vec<f64> {
        self.iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| match e.payload {
                Reading::Double(v) => v,
                Reading::Bool(true) => 1.0,
                Reading::Bool(false) => 0.0,
            })
            .collect()
    }
}
