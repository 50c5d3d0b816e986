//! Composable predicates over events.
//!
//! A filter is a tree: boolean and double leaves compare one event field
//! against a literal, and a composite node is the AND of its children.
//! Filters drive selective logging (`Session::log_if`) and conditional
//! actuator control.

use crate::event::{Event, Reading};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// Operators for boolean (actuator) leaves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoolOperator {
    Equals,
    NotEquals,
}

/// Operators for double (sensor value / timestamp) leaves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoubleOperator {
    Equals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
}

impl DoubleOperator {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            DoubleOperator::Equals => lhs == rhs,
            DoubleOperator::GreaterThan => lhs > rhs,
            DoubleOperator::LessThan => lhs < rhs,
            DoubleOperator::GreaterThanOrEquals => lhs >= rhs,
            DoubleOperator::LessThanOrEquals => lhs <= rhs,
        }
    }
}

/// Event field a double leaf reads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DoubleField {
    Value,
    Timestamp,
}

impl FromStr for DoubleField {
    type Err = FilterError;

    /// Field names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "value" => Ok(DoubleField::Value),
            "timestamp" => Ok(DoubleField::Timestamp),
            _ => Err(FilterError::InvalidField(s.to_string())),
        }
    }
}

impl TryFrom<String> for DoubleField {
    type Error = FilterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Filter construction errors
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Double leaf field must be "value" or "timestamp"
    InvalidField(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::InvalidField(field) => {
                write!(f, "invalid filter field '{}': must be value or timestamp", field)
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Leaf comparing an actuator event's state with a boolean literal.
///
/// A leaf decoded without an operator never matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoolFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<BoolOperator>,
    pub value: bool,
}

impl BoolFilter {
    pub fn new(operator: BoolOperator, value: bool) -> Self {
        Self {
            operator: Some(operator),
            value,
        }
    }

    fn satisfies(&self, event: &Event) -> bool {
        let Some(operator) = self.operator else {
            return false;
        };
        let Reading::Bool(state) = event.payload else {
            return false;
        };
        match operator {
            BoolOperator::Equals => state == self.value,
            BoolOperator::NotEquals => state != self.value,
        }
    }
}

/// Leaf comparing an event's numeric value or timestamp with a literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoubleFilter {
    pub field: DoubleField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<DoubleOperator>,
    pub value: f64,
}

impl DoubleFilter {
    /// Builds a double leaf.
    ///
    /// Fails with `FilterError::InvalidField` unless `field` is "value" or
    /// "timestamp" (any case).
    pub fn new(field: &str, operator: DoubleOperator, value: f64) -> Result<Self, FilterError> {
        Ok(Self {
            field: field.parse()?,
            operator: Some(operator),
            value,
        })
    }

    fn satisfies(&self, event: &Event) -> bool {
        let Some(operator) = self.operator else {
            return false;
        };
        let lhs = match self.field {
            DoubleField::Timestamp => event.timestamp,
            DoubleField::Value => match event.payload {
                Reading::Double(v) => v,
                Reading::Bool(_) => return false,
            },
        };
        operator.apply(lhs, self.value)
    }
}

/// Predicate over a single event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Filter {
    Bool(BoolFilter),
    Double(DoubleFilter),
    /// Conjunction of the child filters, in order
    All { filters: Vec<Filter> },
}

impl Filter {
    pub fn boolean(operator: BoolOperator, value: bool) -> Self {
        Filter::Bool(BoolFilter::new(operator, value))
    }

    pub fn double(field: &str, operator: DoubleOperator, value: f64) -> Result<Self, FilterError> {
        DoubleFilter::new(field, operator, value).map(Filter::Double)
    }

    /// Composite filter matching iff every child matches. An empty list
    /// matches every event.
    pub fn all(filters: Vec<Filter>) -> Self {
        Filter::All { filters }
    }

    /// Returns true if the event satisfies the filter.
    pub fn satisfies(&self, event: &Event) -> bool {
        match self {
            Filter::Bool(leaf) => leaf.satisfies(event),
            Filter::Double(leaf) => leaf.satisfies(event),
            Filter::All { filters } => filters.iter().all(|f| f.satisfies(event)),
        }
    }

    /// Returns true only if every event in the slice satisfies the filter.
    pub fn satisfies_all(&self, events: &[Event]) -> bool {
        events.iter().all(|e| self.satisfies(e))
    }

    /// Returns a copy of the event if it satisfies the filter.
    pub fn sift(&self, event: &Event) -> Option<Event> {
        self.satisfies(event).then(|| event.clone())
    }

    /// Keeps the satisfying events, preserving order. The returned
    /// references point at the input events, not at copies.
    pub fn sift_all<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        events.iter().filter(|e| self.satisfies(e)).collect()
    }
}
