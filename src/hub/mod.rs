//! Hub: session and entity registries plus message dispatch.

mod metrics;

pub use metrics::{HubMetrics, MetricsSnapshot};

use crate::config::HubConfig;
use crate::control::ControlNotifier;
use crate::entity::{Actuator, ActuatorDescriptor, Entity, Sensor};
use crate::event::Event;
use crate::predictor::PredictionError;
use crate::request::{Command, Request, Response};
use crate::scheduler::{Message, Scheduled, Scheduler};
use crate::session::{ControlOutcome, Session, DEFAULT_MAX_WAIT};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Where a request's response goes; events carry no reply
pub type Reply = Option<oneshot::Sender<Response>>;

/// Shared hub state
pub struct Hub {
    sessions: DashMap<u32, Arc<Session>>,
    actuators: DashMap<u32, Arc<Actuator>>,
    sensors: DashMap<u32, Arc<Sensor>>,
    scheduler: Mutex<Scheduler<Reply>>,
    notifier: ControlNotifier,
    default_max_wait: Duration,
    metrics: HubMetrics,
}

impl Hub {
    pub fn new(default_max_wait: Duration, notifier: ControlNotifier) -> Self {
        Self {
            sessions: DashMap::new(),
            actuators: DashMap::new(),
            sensors: DashMap::new(),
            scheduler: Mutex::new(Scheduler::new()),
            notifier,
            default_max_wait,
            metrics: HubMetrics::new(),
        }
    }

    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(
            config.session.default_max_wait(),
            ControlNotifier::new(config.control.connect_timeout()),
        )
    }

    /// Session of `client_id`, created on first sight
    pub fn session(&self, client_id: u32) -> Arc<Session> {
        self.sessions
            .entry(client_id)
            .or_insert_with(|| {
                info!(client_id = client_id, "Session created");
                Arc::new(Session::with_max_wait(client_id, self.default_max_wait))
            })
            .clone()
    }

    pub fn get_session(&self, client_id: u32) -> Option<Arc<Session>> {
        self.sessions.get(&client_id).map(|s| s.clone())
    }

    /// Client ids of all sessions, ascending
    pub fn client_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.sessions.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.sessions.len(), self.pending())
    }

    fn scheduler(&self) -> MutexGuard<'_, Scheduler<Reply>> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tags an event with its arrival time and enqueues it.
    pub fn admit_event(&self, event: Event) -> u64 {
        self.session(event.client_id);
        self.admit(Message::event(event), None)
    }

    /// Tags a request with its arrival time and the client's current wait
    /// budget, then enqueues it.
    pub fn admit_request(&self, client_id: u32, request: Request, reply: Reply) -> u64 {
        self.admit(self.request_message(client_id, request), reply)
    }

    /// Tags a request with the current time and the client's wait budget.
    pub fn request_message(&self, client_id: u32, request: Request) -> Message {
        let max_wait = self.session(client_id).max_wait_time();
        Message::request(client_id, request, max_wait)
    }

    pub fn admit(&self, message: Message, reply: Reply) -> u64 {
        let seq = self.scheduler().enqueue(message, reply);
        debug!(seq = seq, "Message enqueued");
        seq
    }

    pub fn pending(&self) -> usize {
        self.scheduler().len()
    }

    /// Releases the message with the least remaining slack
    pub fn next_ready(&self) -> Option<Scheduled<Reply>> {
        self.scheduler().select_next(Instant::now())
    }

    /// Runs a selected message to completion.
    pub fn dispatch(&self, scheduled: Scheduled<Reply>) {
        let Scheduled {
            seq,
            message,
            ticket,
        } = scheduled;

        match message {
            Message::Event { event, .. } => {
                self.handle_event(seq, event);
            }
            Message::Request {
                client_id, request, ..
            } => {
                let response = self.handle_request(client_id, &request);
                if let Some(reply) = ticket {
                    if reply.send(response).is_err() {
                        debug!(client_id = client_id, "Requester went away before the response");
                    }
                }
            }
        }
    }

    /// Registers the producing entity and logs the event into its client's
    /// session. Returns whether the event was logged.
    pub fn handle_event(&self, seq: u64, event: Event) -> bool {
        if let Err(e) = event.validate() {
            warn!(entity_id = event.entity_id, error = %e, "Invalid event dropped");
            self.metrics.record_malformed();
            return false;
        }

        let session = self.session(event.client_id);
        let registered = match event.as_bool() {
            Some(state) => {
                let actuator = self
                    .actuators
                    .entry(event.entity_id)
                    .or_insert_with(|| {
                        Arc::new(Actuator::new(event.entity_id, event.entity_type.clone(), state))
                    })
                    .clone();
                let ok = session.add_entity(actuator.as_ref());
                if ok {
                    actuator.update_state(state);
                }
                ok
            }
            None => {
                let sensor = self
                    .sensors
                    .entry(event.entity_id)
                    .or_insert_with(|| {
                        Arc::new(Sensor::new(event.entity_id, event.entity_type.clone()))
                    })
                    .clone();
                session.add_entity(sensor.as_ref())
            }
        };

        if !registered {
            warn!(
                client_id = event.client_id,
                entity_id = event.entity_id,
                "Entity is bound to another client, event dropped"
            );
            self.metrics.record_rejected();
            return false;
        }

        let logged = session.log_arrived(seq, event);
        self.metrics.record_event(logged);
        logged
    }

    /// Runs one request against the client's session.
    pub fn handle_request(&self, client_id: u32, request: &Request) -> Response {
        self.metrics.record_request();

        let command = match request.command() {
            Ok(command) => command,
            Err(e) => {
                warn!(client_id = client_id, error = %e, "Undecodable request");
                self.metrics.record_malformed();
                return Response::empty();
            }
        };

        let session = self.session(client_id);
        debug!(client_id = client_id, command = ?request.request_command, "Handling request");

        match command {
            Command::UpdateMaxWaitTime(budget) => {
                session.update_max_wait_time(budget);
                let updated = self.scheduler().rebudget(client_id, budget);
                debug!(client_id = client_id, pending = updated, "Pending requests re-budgeted");
                Response::Flag(true)
            }
            Command::GetAllEntities => {
                Response::Ids(session.get_all_entities().into_iter().collect())
            }
            Command::GetEventsInWindow(window) => {
                Response::Events(session.events_in_time_window(window))
            }
            Command::GetLatestEvents(n) => Response::Events(session.last_n_events(n)),
            Command::GetMostActiveEntity => match session.most_active_entity() {
                Some(id) => Response::Id(id),
                None => Response::empty(),
            },
            Command::NotifyIf(filter) => {
                session.log_if(filter);
                Response::Flag(true)
            }
            Command::SetActuatorState(target) => {
                let actuator = self.resolve_actuator(&target.actuator);
                let outcome = session.set_actuator_state_if(&target.filter, &actuator);
                self.deliver(&actuator, outcome)
            }
            Command::ToggleActuatorState(target) => {
                let actuator = self.resolve_actuator(&target.actuator);
                let outcome = session.toggle_actuator_state_if(&target.filter, &actuator);
                self.deliver(&actuator, outcome)
            }
            Command::PredictNextTimestamps(target) => {
                forecast(client_id, session.predict_next_timestamps(target.entity_id, target.n))
            }
            Command::PredictNextValues(target) => {
                forecast(client_id, session.predict_next_values(target.entity_id, target.n))
            }
        }
    }

    /// Registry actuator for a request descriptor.
    ///
    /// An actuator already known to the hub keeps its binding and state;
    /// the descriptor only fills in what the registry lacks.
    pub fn resolve_actuator(&self, descriptor: &ActuatorDescriptor) -> Arc<Actuator> {
        let actuator = self
            .actuators
            .entry(descriptor.id)
            .or_insert_with(|| Arc::new(Actuator::from_descriptor(descriptor)))
            .clone();

        if actuator.client_id().is_none() {
            if let Some(client_id) = descriptor.bound_client() {
                actuator.register_for_client(client_id);
            }
        }
        actuator.adopt_control_endpoint(descriptor.control_endpoint());
        actuator
    }

    pub fn actuator(&self, id: u32) -> Option<Arc<Actuator>> {
        self.actuators.get(&id).map(|a| a.clone())
    }

    pub fn sensor(&self, id: u32) -> Option<Arc<Sensor>> {
        self.sensors.get(&id).map(|s| s.clone())
    }

    fn deliver(&self, actuator: &Actuator, outcome: ControlOutcome) -> Response {
        match outcome {
            ControlOutcome::NotRegistered => Response::empty(),
            ControlOutcome::NeverSeen | ControlOutcome::Unsatisfied => Response::Flag(false),
            ControlOutcome::Applied(command) => {
                self.metrics.record_command();
                self.notifier
                    .notify(actuator.control_endpoint(), actuator.id(), command);
                Response::Flag(true)
            }
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAIT, ControlNotifier::default())
    }
}

fn forecast(client_id: u32, result: Result<Vec<f64>, PredictionError>) -> Response {
    match result {
        Ok(values) if values.is_empty() => Response::empty(),
        Ok(values) => Response::Numbers(values),
        Err(e) => {
            warn!(client_id = client_id, error = %e, "Prediction rejected");
            Response::empty()
        }
    }
}
