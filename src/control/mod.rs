use crate::entity::ActuatorCommand;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Delivers actuator commands to their control endpoints
#[derive(Clone, Debug)]
pub struct ControlNotifier {
    connect_timeout: Duration,
}

impl ControlNotifier {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Send one command as a JSON line over a fresh connection
    pub async fn send(&self, endpoint: SocketAddr, command: &ActuatorCommand) -> Result<()> {
        let mut line = serde_json::to_vec(command).context("Failed to serialize actuator command")?;
        line.push(b'\n');

        debug!(
            endpoint = %endpoint,
            command = ?command.command,
            state = command.state,
            "Sending actuator command"
        );

        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint))
            .await
            .context(format!("Timed out connecting to actuator at {}", endpoint))?
            .context(format!("Failed to connect to actuator at {}", endpoint))?;

        stream
            .write_all(&line)
            .await
            .context("Failed to write actuator command")?;
        stream.shutdown().await.context("Failed to close actuator connection")?;

        Ok(())
    }

    /// Fire-and-forget delivery; failures are logged and dropped.
    pub fn notify(&self, endpoint: Option<SocketAddr>, actuator_id: u32, command: ActuatorCommand) {
        let Some(endpoint) = endpoint else {
            warn!(actuator_id = actuator_id, "Actuator has no control endpoint, command dropped");
            return;
        };

        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(endpoint, &command).await {
                warn!(
                    actuator_id = actuator_id,
                    endpoint = %endpoint,
                    error = %e,
                    "Failed to notify actuator"
                );
            }
        });
    }
}

impl Default for ControlNotifier {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}
