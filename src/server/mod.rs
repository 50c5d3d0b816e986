//! TCP intake: one message line per connection.
//!
//! Connection tasks decode a line and hand the tagged message to a single
//! scheduler task. The scheduler task releases messages by least slack onto
//! per-client dispatch lanes, bounded overall by a semaphore.

pub mod codec;

use crate::config::ServerConfig;
use crate::hub::{Hub, Reply};
use crate::scheduler::{Message, Scheduled};
use anyhow::{anyhow, Context, Result};
use codec::{Envelope, RequestEnvelope};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// A decoded message on its way to the scheduler task
#[derive(Debug)]
pub struct Inbound {
    pub message: Message,
    pub reply: Reply,
}

/// Accepts connections until the listener fails.
pub async fn serve(hub: Arc<Hub>, listener: TcpListener, config: ServerConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    tokio::spawn(run_scheduler(
        Arc::clone(&hub),
        rx,
        config.max_concurrent_dispatches,
    ));

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Intake server listening");
    }

    let read_timeout = config.read_timeout();
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let hub = Arc::clone(&hub);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(hub, stream, peer, tx, read_timeout).await {
                debug!(peer = %peer, error = %e, "Connection ended with error");
            }
        });
    }
}

/// Dispatches handed to a client's lane, each holding its permit
type LaneItem = (Scheduled<Reply>, OwnedSemaphorePermit);

/// Enqueues inbound messages and dispatches the least-slack message
/// whenever a dispatch permit is free.
///
/// Messages of one client run in release order on that client's lane;
/// different clients dispatch concurrently.
pub async fn run_scheduler(
    hub: Arc<Hub>,
    mut inbound: mpsc::Receiver<Inbound>,
    max_concurrent_dispatches: usize,
) {
    let permits = Arc::new(Semaphore::new(max_concurrent_dispatches.max(1)));
    let mut lanes: HashMap<u32, mpsc::UnboundedSender<LaneItem>> = HashMap::new();
    let mut open = true;

    loop {
        tokio::select! {
            received = inbound.recv(), if open => match received {
                Some(Inbound { message, reply }) => {
                    hub.admit(message, reply);
                }
                None => open = false,
            },

            permit = Arc::clone(&permits).acquire_owned(), if hub.pending() > 0 => {
                let Ok(permit) = permit else { break };
                if let Some(scheduled) = hub.next_ready() {
                    let client_id = scheduled.message.client_id();
                    let lane = lanes
                        .entry(client_id)
                        .or_insert_with(|| spawn_lane(Arc::clone(&hub), client_id));
                    if let Err(mpsc::error::SendError(item)) = lane.send((scheduled, permit)) {
                        warn!(client_id = client_id, "Dispatch lane stopped, restarting");
                        *lane = spawn_lane(Arc::clone(&hub), client_id);
                        if lane.send(item).is_err() {
                            warn!(client_id = client_id, "Message dropped, dispatch lane unavailable");
                        }
                    }
                }
            }

            else => break,
        }
    }

    debug!("Scheduler stopped");
}

/// Runs one client's dispatches one at a time, in the order received.
fn spawn_lane(hub: Arc<Hub>, client_id: u32) -> mpsc::UnboundedSender<LaneItem> {
    let (tx, mut rx) = mpsc::unbounded_channel::<LaneItem>();
    tokio::spawn(async move {
        while let Some((scheduled, permit)) = rx.recv().await {
            hub.dispatch(scheduled);
            drop(permit);
        }
        debug!(client_id = client_id, "Dispatch lane closed");
    });
    tx
}

async fn handle_connection(
    hub: Arc<Hub>,
    stream: TcpStream,
    peer: SocketAddr,
    inbound: mpsc::Sender<Inbound>,
    read_timeout: Duration,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let read = tokio::time::timeout(read_timeout, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for message")?
        .context("Failed to read message")?;
    if read == 0 {
        return Ok(());
    }

    let envelope = match codec::decode_line(&line) {
        Ok(envelope) => envelope,
        Err(e) => {
            hub.metrics().record_malformed();
            warn!(peer = %peer, error = %e, "Malformed message, closing connection");
            return Ok(());
        }
    };

    match envelope {
        Envelope::Event(event) => {
            debug!(peer = %peer, entity_id = event.entity_id, "Event received");
            inbound
                .send(Inbound {
                    message: Message::event(event),
                    reply: None,
                })
                .await
                .map_err(|_| anyhow!("Scheduler is not running"))?;

            // acked on intake even if dispatch drops it for an entity bound elsewhere
            write_half
                .write_all(codec::ACK)
                .await
                .context("Failed to write acknowledgment")?;
        }
        Envelope::Request(RequestEnvelope { client_id, request }) => {
            debug!(
                peer = %peer,
                client_id = client_id,
                command = ?request.request_command,
                "Request received"
            );
            let (tx, rx) = oneshot::channel();
            inbound
                .send(Inbound {
                    message: hub.request_message(client_id, request),
                    reply: Some(tx),
                })
                .await
                .map_err(|_| anyhow!("Scheduler is not running"))?;

            let response = rx.await.context("Request dropped before dispatch")?;
            let line = codec::encode_response(&response).context("Failed to encode response")?;
            write_half
                .write_all(&line)
                .await
                .context("Failed to write response")?;
        }
    }

    if let Err(e) = write_half.shutdown().await {
        debug!(peer = %peer, error = %e, "Failed to close connection");
    }
    Ok(())
}
