use super::*;
use serde_json::json;

#[test]
fn test_valid_sensor_event_passes_validation() {
    let event = Event::sensor(1707668400.0, 0, 1, "TempSensor", 23.5);

    assert!(event.validate().is_ok());
    assert_eq!(event.as_double(), Some(23.5));
    assert_eq!(event.as_bool(), None);
    assert!(!event.is_actuator_event());
}

#[test]
fn test_valid_actuator_event_passes_validation() {
    let event = Event::actuator(0.0, 3, 7, "Switch", true);

    assert!(event.validate().is_ok());
    assert_eq!(event.as_bool(), Some(true));
    assert_eq!(event.as_double(), None);
    assert!(event.is_actuator_event());
}

#[test]
fn test_negative_timestamp_fails() {
    let event = Event::sensor(-1.0, 0, 1, "TempSensor", 1.0);
    assert_eq!(
        event.validate().unwrap_err(),
        ValidationError::NegativeTimestamp(-1.0)
    );
}

#[test]
fn test_non_finite_timestamp_fails() {
    let event = Event::sensor(f64::NAN, 0, 1, "TempSensor", 1.0);
    assert_eq!(event.validate().unwrap_err(), ValidationError::NonFiniteTimestamp);

    let event = Event::sensor(f64::INFINITY, 0, 1, "TempSensor", 1.0);
    assert_eq!(event.validate().unwrap_err(), ValidationError::NonFiniteTimestamp);
}

#[test]
fn test_missing_entity_type_fails() {
    let event = Event::actuator(1.0, 0, 1, "", false);
    assert_eq!(event.validate().unwrap_err(), ValidationError::MissingEntityType);

    let event = Event::actuator(1.0, 0, 1, "   ", false);
    assert_eq!(event.validate().unwrap_err(), ValidationError::MissingEntityType);
}

#[test]
fn test_equality_ignores_payload() {
    let a = Event::sensor(5.0, 1, 2, "TempSensor", 10.0);
    let b = Event::sensor(5.0, 1, 2, "TempSensor", 99.0);
    assert_eq!(a, b);

    let c = Event::sensor(5.0, 1, 3, "TempSensor", 10.0);
    assert_ne!(a, c);

    let d = Event::sensor(5.0, 2, 2, "TempSensor", 10.0);
    assert_ne!(a, d);

    let e = Event::sensor(5.0, 1, 2, "PressureSensor", 10.0);
    assert_ne!(a, e);
}

#[test]
fn test_event_wire_shape() {
    let event = Event::sensor(12.5, 4, 9, "TempSensor", 21.0);
    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(
        value,
        json!({
            "timestamp": 12.5,
            "clientId": 4,
            "entityId": 9,
            "entityType": "TempSensor",
            "payload": {"kind": "double", "value": 21.0}
        })
    );
}

#[test]
fn test_actuator_event_deserializes() {
    let event: Event = serde_json::from_value(json!({
        "timestamp": 3.0,
        "clientId": 1,
        "entityId": 2,
        "entityType": "Switch",
        "payload": {"kind": "bool", "value": false}
    }))
    .unwrap();

    assert_eq!(event.payload, Reading::Bool(false));
    assert_eq!(event.client_id, 1);
}

#[test]
fn test_unknown_payload_kind_rejected() {
    let result: Result<Event, _> = serde_json::from_value(json!({
        "timestamp": 3.0,
        "clientId": 1,
        "entityId": 2,
        "entityType": "Switch",
        "payload": {"kind": "string", "value": "on"}
    }));
    assert!(result.is_err());
}

#[test]
fn test_negative_client_id_rejected() {
    let result: Result<Event, _> = serde_json::from_value(json!({
        "timestamp": 3.0,
        "clientId": -1,
        "entityId": 2,
        "entityType": "Switch",
        "payload": {"kind": "bool", "value": true}
    }));
    assert!(result.is_err());
}
