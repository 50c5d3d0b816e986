use crate::entity::ActuatorDescriptor;
use crate::filter::Filter;
use crate::predictor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;


/// Request category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    Config,
    Analysis,
    Control,
    Predict,
}

/// Request command, scoped within a `RequestType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestCommand {
    UpdateMaxWaitTime,
    GetAllEntities,
    GetEventsInWindow,
    GetLatestEvents,
    GetMostActiveEntity,
    NotifyIf,
    SetActuatorState,
    ToggleActuatorState,
    PredictNextNTimestamps,
    PredictNextNValues,
}

impl RequestCommand {
    /// The request type this command belongs to
    pub fn request_type(self) -> RequestType {
        match self {
            RequestCommand::UpdateMaxWaitTime => RequestType::Config,
            RequestCommand::GetAllEntities
            | RequestCommand::GetEventsInWindow
            | RequestCommand::GetLatestEvents
            | RequestCommand::GetMostActiveEntity => RequestType::Analysis,
            RequestCommand::NotifyIf
            | RequestCommand::SetActuatorState
            | RequestCommand::ToggleActuatorState => RequestType::Control,
            RequestCommand::PredictNextNTimestamps | RequestCommand::PredictNextNValues => {
                RequestType::Predict
            }
        }
    }
}

/// Client request as received by the hub
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Client time at which the request was issued
    pub timestamp: f64,
    pub request_type: RequestType,
    pub request_command: RequestCommand,
    /// Command-specific payload
    #[serde(default)]
    pub request_data: Value,
}

/// Inclusive time window over event timestamps
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start_time: f64,
    pub end_time: f64,
}

impl TimeWindow {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        self.start_time <= timestamp && timestamp <= self.end_time
    }
}

/// Payload of the actuator control commands
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlTarget {
    pub filter: Filter,
    pub actuator: ActuatorDescriptor,
}

/// Payload of the prediction commands
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictTarget {
    pub entity_id: u32,
    pub n: usize,
}

/// A request decoded into its typed operation
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    UpdateMaxWaitTime(Duration),
    GetAllEntities,
    GetEventsInWindow(TimeWindow),
    GetLatestEvents(usize),
    GetMostActiveEntity,
    NotifyIf(Filter),
    SetActuatorState(ControlTarget),
    ToggleActuatorState(ControlTarget),
    PredictNextTimestamps(PredictTarget),
    PredictNextValues(PredictTarget),
}

/// Errors decoding a request into a `Command`
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Command does not belong to the declared request type
    TypeMismatch {
        request_type: RequestType,
        command: RequestCommand,
    },
    /// requestData could not be parsed for this command
    InvalidData {
        command: RequestCommand,
        reason: String,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::TypeMismatch {
                request_type,
                command,
            } => write!(
                f,
                "command {:?} does not belong to request type {:?}",
                command, request_type
            ),
            CommandError::InvalidData { command, reason } => {
                write!(f, "invalid requestData for {:?}: {}", command, reason)
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl Request {
    pub fn new(request_type: RequestType, request_command: RequestCommand, request_data: Value) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis() as f64,
            request_type,
            request_command,
            request_data,
        }
    }

    /// Decodes the request into its typed operation.
    ///
    /// Payload formats:
    /// - UPDATE_MAX_WAIT_TIME: non-negative number of seconds, representable
    ///   as a `Duration`
    /// - GET_EVENTS_IN_WINDOW: `{"startTime": .., "endTime": ..}`
    /// - GET_LATEST_EVENTS: event count
    /// - NOTIFY_IF: filter
    /// - SET/TOGGLE_ACTUATOR_STATE: `{"filter": .., "actuator": ..}`
    /// - PREDICT_*: `{"entityId": .., "n": ..}` with `n <= predictor::MAX_STEPS`
    /// - remaining commands ignore the payload
    pub fn command(&self) -> Result<Command, CommandError> {
        let command = self.request_command;
        if command.request_type() != self.request_type {
            return Err(CommandError::TypeMismatch {
                request_type: self.request_type,
                command,
            });
        }

        let parsed = match command {
            RequestCommand::UpdateMaxWaitTime => {
                let seconds: f64 = self.data()?;
                let budget = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    CommandError::InvalidData {
                        command,
                        reason: format!("wait budget must be a non-negative number of seconds, got {}", seconds),
                    }
                })?;
                Command::UpdateMaxWaitTime(budget)
            }
            RequestCommand::GetAllEntities => Command::GetAllEntities,
            RequestCommand::GetEventsInWindow => Command::GetEventsInWindow(self.data()?),
            RequestCommand::GetLatestEvents => Command::GetLatestEvents(self.data()?),
            RequestCommand::GetMostActiveEntity => Command::GetMostActiveEntity,
            RequestCommand::NotifyIf => Command::NotifyIf(self.data()?),
            RequestCommand::SetActuatorState => Command::SetActuatorState(self.data()?),
            RequestCommand::ToggleActuatorState => Command::ToggleActuatorState(self.data()?),
            RequestCommand::PredictNextNTimestamps => {
                Command::PredictNextTimestamps(self.predict_target()?)
            }
            RequestCommand::PredictNextNValues => Command::PredictNextValues(self.predict_target()?),
        };

        Ok(parsed)
    }

    fn predict_target(&self) -> Result<PredictTarget, CommandError> {
        let target: PredictTarget = self.data()?;
        if target.n > predictor::MAX_STEPS {
            return Err(CommandError::InvalidData {
                command: self.request_command,
                reason: format!(
                    "cannot forecast {} steps, at most {} allowed",
                    target.n,
                    predictor::MAX_STEPS
                ),
            });
        }
        Ok(target)
    }

    fn data<T: serde::de::DeserializeOwned>(&self) -> Result<T, CommandError> {
        T::deserialize(&self.request_data).map_err(|e| CommandError::InvalidData {
            command: self.request_command,
            reason: e.to_string(),
        })
    }
}

/// Response written back to the requesting connection.
///
/// Serialized as a bare JSON value. Not-found and not-registered outcomes
/// are the empty list `[]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Flag(bool),
    Id(u32),
    Ids(Vec<u32>),
    Events(Vec<crate::event::Event>),
    Numbers(Vec<f64>),
}

impl Response {
    pub fn empty() -> Self {
        Response::Ids(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Response::Ids(ids) => ids.is_empty(),
            Response::Events(events) => events.is_empty(),
            Response::Numbers(values) => values.is_empty(),
            Response::Flag(_) | Response::Id(_) => false,
        }
    }
}
