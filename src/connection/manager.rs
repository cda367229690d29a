//! Push channel connection with automatic reconnection

use agent_shared::codec::{CodecError, FrameDecoder};
use agent_shared::PushMessage;
use anyhow::{anyhow, Context, Result};
use bytes::BytesMut;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Events emitted by the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connected to the controller relay
    Connected { addr: String },
    /// Connection lost; a reconnect follows
    Disconnected { reason: String },
    /// Connect attempt failed; retried after the backoff delay
    ConnectionFailed { reason: String },
    /// Command data fields from the controller
    Command(HashMap<String, String>),
    /// New channel token for this agent
    TokenRefreshed(String),
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Controller relay address
    pub controller_addr: String,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            controller_addr: "127.0.0.1:9100".into(),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Keeps the push channel open and turns its frames into events
pub struct ConnectionManager {
    event_rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop
    pub fn new(config: ConnectionConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);

        tokio::spawn(connection_loop(config, event_tx));

        Self { event_rx }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }
}

/// Delay after `current`, doubled and capped
fn next_delay(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current.saturating_mul(2), max)
}

/// Main connection loop with reconnection logic. Ends when the event receiver is dropped.
async fn connection_loop(config: ConnectionConfig, event_tx: mpsc::Sender<ConnectionEvent>) {
    let mut reconnect_delay = config.reconnect_delay;

    while !event_tx.is_closed() {
        let connected = timeout(config.connect_timeout, TcpStream::connect(&config.controller_addr))
            .await
            .map_err(|_| anyhow!("Connect timed out after {:?}", config.connect_timeout))
            .and_then(|r| r.with_context(|| format!("Connect to {} failed", config.controller_addr)));

        let event = match connected {
            Ok(stream) => {
                reconnect_delay = config.reconnect_delay;
                info!("[PUSH] Connected to {}", config.controller_addr);

                let _ = event_tx
                    .send(ConnectionEvent::Connected {
                        addr: config.controller_addr.clone(),
                    })
                    .await;

                let reason = match handle_connection(stream, &event_tx).await {
                    Ok(()) => return,
                    Err(e) => format!("{:#}", e),
                };
                warn!("[PUSH] Disconnected: {}", reason);
                ConnectionEvent::Disconnected { reason }
            }
            Err(e) => {
                debug!("[PUSH] {:#}", e);
                ConnectionEvent::ConnectionFailed {
                    reason: format!("{:#}", e),
                }
            }
        };

        if event_tx.send(event).await.is_err() {
            break;
        }

        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = next_delay(reconnect_delay, config.max_reconnect_delay);
    }

    info!("[PUSH] Connection loop stopped");
}

/// Read frames until the connection drops. `Ok(())` means the event receiver is gone.
async fn handle_connection(
    mut stream: TcpStream,
    event_tx: &mpsc::Sender<ConnectionEvent>,
) -> Result<()> {
    let mut decoder = FrameDecoder::new();
    let mut read_buf = BytesMut::with_capacity(4096);

    loop {
        read_buf.clear();
        let n = stream.read_buf(&mut read_buf).await.context("Read error")?;
        if n == 0 {
            return Err(anyhow!("Controller closed connection"));
        }
        decoder.extend(&read_buf);

        // Process all complete frames
        loop {
            let event = match decoder.decode_next() {
                Ok(Some(PushMessage::Command { data })) => ConnectionEvent::Command(data),
                Ok(Some(PushMessage::Token { token })) => ConnectionEvent::TokenRefreshed(token),
                Ok(None) => break,
                Err(CodecError::Json(e)) => {
                    warn!("[PUSH] Skipping malformed frame: {}", e);
                    continue;
                }
                Err(e) => return Err(e).context("Framing lost"),
            };

            if event_tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}
