//! Per-client session: event log, logging filter, wait budget and the
//! entities registered to the client.

use crate::entity::{Actuator, ActuatorCommand, Entity};
use crate::event::Event;
use crate::filter::Filter;
use crate::predictor::{self, PredictionError};
use crate::request::TimeWindow;
use crate::store::EventStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Wait budget of a fresh session
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(2);

/// Result of a conditional actuator command
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    /// Actuator is not bound to this session's client
    NotRegistered,
    /// Toggle target has never logged an event in this session
    NeverSeen,
    /// Latest logged event missing or not matching the filter
    Unsatisfied,
    /// State changed; the command still has to be delivered
    Applied(ActuatorCommand),
}

impl ControlOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ControlOutcome::Applied(_))
    }
}

/// Serializable view of a session for the inspection API
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub client_id: u32,
    pub max_wait_seconds: f64,
    pub logged_events: usize,
    pub log_filter: Option<Filter>,
    pub entities: BTreeSet<u32>,
    pub registered_entities: BTreeSet<u32>,
}

/// State bound to one client id
#[derive(Debug)]
pub struct Session {
    client_id: u32,
    max_wait: RwLock<Duration>,
    store: RwLock<EventStore>,
    log_filter: RwLock<Option<Filter>>,
    /// Entity ids of every logged event, kept across `read_logs`
    seen: RwLock<BTreeSet<u32>>,
    registered: RwLock<BTreeSet<u32>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(client_id: u32) -> Self {
        Self::with_max_wait(client_id, DEFAULT_MAX_WAIT)
    }

    pub fn with_max_wait(client_id: u32, max_wait: Duration) -> Self {
        Self {
            client_id,
            max_wait: RwLock::new(max_wait),
            store: RwLock::new(EventStore::new()),
            log_filter: RwLock::new(None),
            seen: RwLock::new(BTreeSet::new()),
            registered: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }

    /// Appends the event, subject to the active logging filter.
    /// Returns whether the event was logged.
    pub fn log_event(&self, event: Event) -> bool {
        if !self.passes_log_filter(&event) {
            return false;
        }
        write(&self.seen).insert(event.entity_id);
        write(&self.store).append(event);
        true
    }

    /// Like `log_event`, placing the event by its hub arrival sequence.
    pub fn log_arrived(&self, arrival: u64, event: Event) -> bool {
        if !self.passes_log_filter(&event) {
            debug!(
                client_id = self.client_id,
                entity_id = event.entity_id,
                "Event rejected by logging filter"
            );
            return false;
        }
        write(&self.seen).insert(event.entity_id);
        write(&self.store).insert_arrived(arrival, event);
        true
    }

    fn passes_log_filter(&self, event: &Event) -> bool {
        read(&self.log_filter)
            .as_ref()
            .map_or(true, |filter| filter.satisfies(event))
    }

    /// Installs the filter future events must satisfy to be logged.
    pub fn log_if(&self, filter: Filter) {
        info!(client_id = self.client_id, "Logging filter installed");
        *write(&self.log_filter) = Some(filter);
    }

    pub fn log_filter(&self) -> Option<Filter> {
        read(&self.log_filter).clone()
    }

    /// Entity ids of all logged events by ascending timestamp; clears the log.
    pub fn read_logs(&self) -> Vec<u32> {
        write(&self.store).read_logs()
    }

    pub fn events_in_time_window(&self, window: TimeWindow) -> Vec<Event> {
        read(&self.store).events_in_window(window)
    }

    pub fn last_n_events(&self, n: usize) -> Vec<Event> {
        read(&self.store).last_n_events(n)
    }

    pub fn most_active_entity(&self) -> Option<u32> {
        read(&self.store).most_active_entity()
    }

    /// Distinct entity ids seen so far
    pub fn get_all_entities(&self) -> BTreeSet<u32> {
        read(&self.seen).clone()
    }

    pub fn logged_events(&self) -> usize {
        read(&self.store).len()
    }

    /// Sets the actuator on when the latest logged event satisfies `filter`.
    pub fn set_actuator_state_if(&self, filter: &Filter, actuator: &Actuator) -> ControlOutcome {
        if actuator.client_id() != Some(self.client_id) {
            return ControlOutcome::NotRegistered;
        }
        if !self.latest_satisfies(filter) {
            return ControlOutcome::Unsatisfied;
        }

        actuator.update_state(true);
        info!(
            client_id = self.client_id,
            actuator_id = actuator.id(),
            "Actuator set on"
        );
        ControlOutcome::Applied(ActuatorCommand::set_state(self.client_id, true))
    }

    /// Flips the actuator when it has logged before and the latest logged
    /// event satisfies `filter`.
    pub fn toggle_actuator_state_if(&self, filter: &Filter, actuator: &Actuator) -> ControlOutcome {
        if actuator.client_id() != Some(self.client_id) {
            return ControlOutcome::NotRegistered;
        }
        {
            let store = read(&self.store);
            if !store.has_events_from(actuator.id()) {
                return ControlOutcome::NeverSeen;
            }
            if !store.latest_received().is_some_and(|e| filter.satisfies(e)) {
                return ControlOutcome::Unsatisfied;
            }
        }

        let state = actuator.toggle_state();
        info!(
            client_id = self.client_id,
            actuator_id = actuator.id(),
            state = state,
            "Actuator toggled"
        );
        ControlOutcome::Applied(ActuatorCommand::toggle_state(self.client_id, state))
    }

    fn latest_satisfies(&self, filter: &Filter) -> bool {
        read(&self.store)
            .latest_received()
            .is_some_and(|e| filter.satisfies(e))
    }

    pub fn update_max_wait_time(&self, max_wait: Duration) {
        *write(&self.max_wait) = max_wait;
        info!(
            client_id = self.client_id,
            max_wait_seconds = max_wait.as_secs_f64(),
            "Wait budget updated"
        );
    }

    pub fn max_wait_time(&self) -> Duration {
        *read(&self.max_wait)
    }

    /// Forecasts the next `n` timestamps of an entity. Unseen entities
    /// yield an empty forecast.
    pub fn predict_next_timestamps(&self, entity_id: u32, n: usize) -> Result<Vec<f64>, PredictionError> {
        let history = read(&self.store).timestamps_of(entity_id);
        if history.is_empty() {
            return Ok(Vec::new());
        }
        predictor::predict(entity_id, n, &history)
    }

    /// Forecasts the next `n` values of an entity (actuator states as 1/0).
    pub fn predict_next_values(&self, entity_id: u32, n: usize) -> Result<Vec<f64>, PredictionError> {
        let history = read(&self.store).values_of(entity_id);
        if history.is_empty() {
            return Ok(Vec::new());
        }
        predictor::predict(entity_id, n, &history)
    }

    /// Registers the entity for this client. Fails when it is bound to
    /// another client.
    pub fn add_entity(&self, entity: &dyn Entity) -> bool {
        if !entity.register_for_client(self.client_id) {
            return false;
        }
        write(&self.registered).insert(entity.id());
        true
    }

    pub fn registered_entities(&self) -> BTreeSet<u32> {
        read(&self.registered).clone()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            client_id: self.client_id,
            max_wait_seconds: self.max_wait_time().as_secs_f64(),
            logged_events: self.logged_events(),
            log_filter: self.log_filter(),
            entities: self.get_all_entities(),
            registered_entities: self.registered_entities(),
        }
    }
}
