use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

/// TCP intake server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// How long a connection may take to deliver its message line
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Capacity of the connection -> scheduler channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Dispatch tasks allowed to run at once
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent_dispatches: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:4578".to_string()
}

fn default_read_timeout_ms() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_max_concurrent_dispatches() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            read_timeout_ms: default_read_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            max_concurrent_dispatches: default_max_concurrent_dispatches(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// HTTP inspection API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_bind_addr")]
    pub bind_addr: String,
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind_addr: default_api_bind_addr(),
        }
    }
}

/// Defaults applied to new client sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_wait_seconds")]
    pub default_max_wait_seconds: f64,
}

fn default_max_wait_seconds() -> f64 {
    2.0
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl SessionConfig {
    /// Wait budget of new sessions; invalid values fall back to 2s
    pub fn default_max_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_max_wait_seconds)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_max_wait_seconds()))
    }
}

/// Actuator control channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ControlConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl HubConfig {
    /// Overrides bind addresses from `IOTHUB_BIND_ADDR` / `IOTHUB_API_ADDR`.
    pub fn apply_env(mut self) -> Self {
        if let Ok(addr) = std::env::var("IOTHUB_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(addr) = std::env::var("IOTHUB_API_ADDR") {
            self.api.bind_addr = addr;
        }
        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<HubConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: HubConfig = toml::from_str(&contents)?;
    Ok(config)
}
