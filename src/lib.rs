// Event and request model
pub mod event;
pub mod request;

// Filter engine
pub mod filter;

// Sensors and actuators
pub mod entity;

// Per-client event log and analytical queries
pub mod store;

// Deadline-slack scheduler
pub mod scheduler;

// Value/timestamp forecasting
pub mod predictor;

// Client sessions
pub mod session;

// Session/entity registries and dispatch
pub mod hub;

// Actuator command delivery
pub mod control;

// TCP intake server and wire codec
pub mod server;

// HTTP inspection API
pub mod api;

// Configuration
pub mod config;
