//! Sensors and actuators as seen by the hub.
//!
//! Every entity guards its mutable parts (client binding, endpoints and,
//! for actuators, the switch state) with its own mutex, so registration
//! and control of one entity never serialize unrelated entities.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};


/// Common view over sensors and actuators
pub trait Entity: Send + Sync {
    fn id(&self) -> u32;

    /// Client this entity is bound to, `None` while unregistered
    fn client_id(&self) -> Option<u32>;

    fn entity_type(&self) -> &str;

    fn is_actuator(&self) -> bool;

    /// Binds the entity to `client_id`.
    ///
    /// Succeeds when the entity is unregistered or already bound to the same
    /// client; fails (binding unchanged) when bound to a different client.
    fn register_for_client(&self, client_id: u32) -> bool;

    /// Sets or updates the address the entity pushes events to.
    fn set_endpoint(&self, endpoint: SocketAddr);

    fn endpoint(&self) -> Option<SocketAddr>;
}

#[derive(Debug, Default)]
struct Binding {
    client_id: Option<u32>,
    endpoint: Option<SocketAddr>,
}

impl Binding {
    fn register(&mut self, client_id: u32) -> bool {
        match self.client_id {
            None => {
                self.client_id = Some(client_id);
                true
            }
            Some(current) => current == client_id,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sensor producing numeric readings
#[derive(Debug)]
pub struct Sensor {
    id: u32,
    entity_type: String,
    binding: Mutex<Binding>,
}

impl Sensor {
    pub fn new(id: u32, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            binding: Mutex::new(Binding::default()),
        }
    }

    /// Sensor already bound to `client_id`
    pub fn registered(id: u32, client_id: u32, entity_type: impl Into<String>) -> Self {
        let sensor = Self::new(id, entity_type);
        lock(&sensor.binding).client_id = Some(client_id);
        sensor
    }
}

impl Entity for Sensor {
    fn id(&self) -> u32 {
        self.id
    }

    fn client_id(&self) -> Option<u32> {
        lock(&self.binding).client_id
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn is_actuator(&self) -> bool {
        false
    }

    fn register_for_client(&self, client_id: u32) -> bool {
        lock(&self.binding).register(client_id)
    }

    fn set_endpoint(&self, endpoint: SocketAddr) {
        lock(&self.binding).endpoint = Some(endpoint);
    }

    fn endpoint(&self) -> Option<SocketAddr> {
        lock(&self.binding).endpoint
    }
}

#[derive(Debug)]
struct ActuatorState {
    binding: Binding,
    state: bool,
    control: Option<SocketAddr>,
}

/// Actuator with a switchable boolean state and a control endpoint the hub
/// sends commands to
#[derive(Debug)]
pub struct Actuator {
    id: u32,
    entity_type: String,
    inner: Mutex<ActuatorState>,
}

impl Actuator {
    pub fn new(id: u32, entity_type: impl Into<String>, initial_state: bool) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            inner: Mutex::new(ActuatorState {
                binding: Binding::default(),
                state: initial_state,
                control: None,
            }),
        }
    }

    /// Actuator already bound to `client_id`
    pub fn registered(
        id: u32,
        client_id: u32,
        entity_type: impl Into<String>,
        initial_state: bool,
    ) -> Self {
        let actuator = Self::new(id, entity_type, initial_state);
        lock(&actuator.inner).binding.client_id = Some(client_id);
        actuator
    }

    /// Builds an actuator from the descriptor carried in a control request.
    pub fn from_descriptor(descriptor: &ActuatorDescriptor) -> Self {
        let actuator = Self::new(descriptor.id, descriptor.entity_type.clone(), descriptor.state);
        {
            let mut inner = lock(&actuator.inner);
            inner.binding.client_id = descriptor.bound_client();
            inner.control = descriptor.control_endpoint();
        }
        actuator
    }

    pub fn state(&self) -> bool {
        lock(&self.inner).state
    }

    pub fn update_state(&self, state: bool) {
        lock(&self.inner).state = state;
    }

    /// Flips the state and returns the new value.
    pub fn toggle_state(&self) -> bool {
        let mut inner = lock(&self.inner);
        inner.state = !inner.state;
        inner.state
    }

    /// Address the hub sends `ActuatorCommand`s to
    pub fn control_endpoint(&self) -> Option<SocketAddr> {
        lock(&self.inner).control
    }

    pub fn set_control_endpoint(&self, endpoint: SocketAddr) {
        lock(&self.inner).control = Some(endpoint);
    }

    /// Adopts the control endpoint if none is known yet.
    pub fn adopt_control_endpoint(&self, endpoint: Option<SocketAddr>) {
        let mut inner = lock(&self.inner);
        if inner.control.is_none() {
            inner.control = endpoint;
        }
    }

    /// Applies a command received from the hub.
    pub fn apply_command(&self, command: &ActuatorCommand) {
        let mut inner = lock(&self.inner);
        match command.command {
            CommandKind::SetState => inner.state = command.state,
            CommandKind::ToggleState => inner.state = !inner.state,
        }
    }
}

impl Entity for Actuator {
    fn id(&self) -> u32 {
        self.id
    }

    fn client_id(&self) -> Option<u32> {
        lock(&self.inner).binding.client_id
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn is_actuator(&self) -> bool {
        true
    }

    fn register_for_client(&self, client_id: u32) -> bool {
        lock(&self.inner).binding.register(client_id)
    }

    fn set_endpoint(&self, endpoint: SocketAddr) {
        lock(&self.inner).binding.endpoint = Some(endpoint);
    }

    fn endpoint(&self) -> Option<SocketAddr> {
        lock(&self.inner).binding.endpoint
    }
}

/// Actuator as described inside a control request.
///
/// `clientId` is `-1` (or absent) for an unregistered actuator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorDescriptor {
    pub id: u32,
    #[serde(default = "unregistered")]
    pub client_id: i64,
    pub entity_type: String,
    #[serde(default)]
    pub state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn unregistered() -> i64 {
    -1
}

impl ActuatorDescriptor {
    pub fn bound_client(&self) -> Option<u32> {
        u32::try_from(self.client_id).ok()
    }

    /// Control endpoint, when both host and port parse as a socket address
    pub fn control_endpoint(&self) -> Option<SocketAddr> {
        let host = self.host.as_deref()?;
        let port = self.port?;
        format!("{}:{}", host, port).parse().ok()
    }
}

/// Command the hub sends to an actuator's control endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    SetState,
    ToggleState,
}

/// One control message, written as a single JSON line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorCommand {
    pub client_id: u32,
    /// Unix epoch milliseconds (hub time)
    pub timestamp: i64,
    pub command: CommandKind,
    pub state: bool,
}

impl ActuatorCommand {
    pub fn set_state(client_id: u32, state: bool) -> Self {
        Self {
            client_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            command: CommandKind::SetState,
            state,
        }
    }

    pub fn toggle_state(client_id: u32, new_state: bool) -> Self {
        Self {
            client_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            command: CommandKind::ToggleState,
            state: new_state,
        }
    }
}
