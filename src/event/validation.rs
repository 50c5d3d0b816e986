use super::Event;
use std::fmt;

/// Validation errors for Event
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingEntityType,
    InvalidEntityType(String),
    NegativeTimestamp(f64),
    NonFiniteTimestamp,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingEntityType => write!(f, "entityType is required"),
            ValidationError::InvalidEntityType(t) => {
                write!(f, "invalid entityType '{}': must not contain control characters", t)
            }
            ValidationError::NegativeTimestamp(ts) => {
                write!(f, "timestamp must be non-negative, got {}", ts)
            }
            ValidationError::NonFiniteTimestamp => write!(f, "timestamp must be finite"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates an Event before it is admitted to the hub.
///
/// Validation rules:
/// - Timestamp: finite and non-negative
/// - Entity type: non-empty, no control characters
pub fn validate(event: &Event) -> Result<(), ValidationError> {
    if !event.timestamp.is_finite() {
        return Err(ValidationError::NonFiniteTimestamp);
    }
    if event.timestamp < 0.0 {
        return Err(ValidationError::NegativeTimestamp(event.timestamp));
    }

    if event.entity_type.trim().is_empty() {
        return Err(ValidationError::MissingEntityType);
    }
    if !is_valid_entity_type(&event.entity_type) {
        return Err(ValidationError::InvalidEntityType(event.entity_type.clone()));
    }

    Ok(())
}

fn is_valid_entity_type(entity_type: &str) -> bool {
    !entity_type.chars().any(|c| c.is_control())
}
