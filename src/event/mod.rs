use serde::{Deserialize, Serialize};

mod validation;
#[cfg(test)]
mod tests;

pub use validation::{validate, ValidationError};

/// Event represents an immutable reading pushed by a sensor or actuator.
///
/// Events carry exactly one payload variant. Equality deliberately ignores
/// the payload: two events are the same event when they share timestamp,
/// entity type, entity id and client id.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Producer time, caller-defined unit (seconds or milliseconds)
    /// Must be non-negative and finite
    pub timestamp: f64,

    /// Client the producing entity is registered to
    pub client_id: u32,

    /// Producing entity
    pub entity_id: u32,

    /// Entity type label (e.g., "TempSensor", "Switch")
    pub entity_type: String,

    /// Sensor reading or actuator state
    pub payload: Reading,
}

/// Payload of an event: a numeric sensor reading or a boolean actuator state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Reading {
    Double(f64),
    Bool(bool),
}

impl Event {
    /// Builds a sensor event carrying a numeric reading.
    pub fn sensor(
        timestamp: f64,
        client_id: u32,
        entity_id: u32,
        entity_type: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            timestamp,
            client_id,
            entity_id,
            entity_type: entity_type.into(),
            payload: Reading::Double(value),
        }
    }

    /// Builds an actuator event carrying a boolean state.
    pub fn actuator(
        timestamp: f64,
        client_id: u32,
        entity_id: u32,
        entity_type: impl Into<String>,
        state: bool,
    ) -> Self {
        Self {
            timestamp,
            client_id,
            entity_id,
            entity_type: entity_type.into(),
            payload: Reading::Bool(state),
        }
    }

    /// Numeric reading, if this event came from a sensor.
    pub fn as_double(&self) -> Option<f64> {
        match self.payload {
            Reading::Double(v) => Some(v),
            Reading::Bool(_) => None,
        }
    }

    /// Boolean state, if this event came from an actuator.
    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Reading::Bool(b) => Some(b),
            Reading::Double(_) => None,
        }
    }

    pub fn is_actuator_event(&self) -> bool {
        matches!(self.payload, Reading::Bool(_))
    }

    /// Checks the envelope invariants (timestamp, entity type).
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.entity_type == other.entity_type
            && self.entity_id == other.entity_id
            && self.client_id == other.client_id
    }
}
