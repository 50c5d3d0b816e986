use crate::event::{Event, ValidationError};
use crate::request::{CommandError, Request, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Acknowledgment written back for an accepted event
pub const ACK: &[u8] = b"1";

/// One inbound message line, tagged by `kind`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Envelope {
    Event(Event),
    Request(RequestEnvelope),
}

/// A request together with the client it is issued for
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub client_id: u32,
    #[serde(flatten)]
    pub request: Request,
}

/// Reasons a message line is rejected
#[derive(Debug)]
pub enum DecodeError {
    Empty,
    Json(serde_json::Error),
    InvalidEvent(ValidationError),
    InvalidRequest(CommandError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => write!(f, "empty message"),
            DecodeError::Json(e) => write!(f, "malformed message: {}", e),
            DecodeError::InvalidEvent(e) => write!(f, "invalid event: {}", e),
            DecodeError::InvalidRequest(e) => write!(f, "invalid request: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes and validates one message line.
pub fn decode_line(line: &str) -> Result<Envelope, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }

    let envelope: Envelope = serde_json::from_str(line).map_err(DecodeError::Json)?;
    match &envelope {
        Envelope::Event(event) => event.validate().map_err(DecodeError::InvalidEvent)?,
        Envelope::Request(env) => {
            env.request.command().map_err(DecodeError::InvalidRequest)?;
        }
    }

    Ok(envelope)
}

/// Encodes an envelope as a single line (used by clients and tests)
pub fn encode_envelope(envelope: &Envelope) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(envelope)?;
    line.push(b'\n');
    Ok(line)
}

/// Encodes a response as a single line
pub fn encode_response(response: &Response) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Reading;
    use crate::request::{RequestCommand, RequestType};
    use serde_json::json;

    #[test]
    fn test_decode_event() {
        let line = json!({
            "kind": "event",
            "timestamp": 12.5,
            "clientId": 1,
            "entityId": 4,
            "entityType": "TempSensor",
            "payload": {"kind": "double", "value": 21.5}
        })
        .to_string();

        match decode_line(&line).unwrap() {
            Envelope::Event(event) => {
                assert_eq!(event.entity_id, 4);
                assert_eq!(event.payload, Reading::Double(21.5));
            }
            other => panic!("Expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_request() {
        let line = json!({
            "kind": "request",
            "clientId": 3,
            "timestamp": 1.0,
            "requestType": "ANALYSIS",
            "requestCommand": "GET_LATEST_EVENTS",
            "requestData": 2
        })
        .to_string();

        match decode_line(&line).unwrap() {
            Envelope::Request(env) => {
                assert_eq!(env.client_id, 3);
                assert_eq!(env.request.request_command, RequestCommand::GetLatestEvents);
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_line("   \n"), Err(DecodeError::Empty)));
        assert!(matches!(decode_line("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode_line(r#"{"kind":"heartbeat"}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_event() {
        let line = json!({
            "kind": "event",
            "timestamp": -3.0,
            "clientId": 1,
            "entityId": 4,
            "entityType": "TempSensor",
            "payload": {"kind": "double", "value": 1.0}
        })
        .to_string();
        assert!(matches!(decode_line(&line), Err(DecodeError::InvalidEvent(_))));
    }

    #[test]
    fn test_decode_rejects_mismatched_request() {
        let line = json!({
            "kind": "request",
            "clientId": 3,
            "timestamp": 1.0,
            "requestType": "CONFIG",
            "requestCommand": "GET_ALL_ENTITIES"
        })
        .to_string();
        assert!(matches!(decode_line(&line), Err(DecodeError::InvalidRequest(_))));
    }

    #[test]
    fn test_encoded_envelope_decodes() {
        let envelope = Envelope::Request(RequestEnvelope {
            client_id: 2,
            request: Request::new(
                RequestType::Control,
                RequestCommand::NotifyIf,
                json!({"kind": "bool", "operator": "EQUALS", "value": true}),
            ),
        });
        let line = encode_envelope(&envelope).unwrap();
        assert_eq!(line.last(), Some(&b'\n'));

        let decoded = decode_line(std::str::from_utf8(&line).unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_encode_response_line() {
        assert_eq!(encode_response(&Response::empty()).unwrap(), b"[]\n");
        assert_eq!(encode_response(&Response::Id(7)).unwrap(), b"7\n");
    }
}
