//! Registration lifecycle
//!
//! Keeps the collector's record of this device's channel token fresh. Runs as
//! its own task: every token (initial or refreshed) starts a new registration
//! from attempt 0, and a failed attempt is retried with exponential backoff
//! until the retry budget is spent.

use crate::config::RegistrationConfig;
use agent_shared::state_machine::{
    RegistrationEvent, RegistrationState, RegistrationStateMachine, TransitionResult,
};
use agent_shared::RegistrationRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Sends a registration request to the collector
#[async_trait]
pub trait RegistrationClient: Send + Sync {
    async fn register(&self, request: &RegistrationRequest) -> Result<()>;
}

/// Registration over HTTP POST
pub struct HttpRegistrar {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpRegistrar {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RegistrationClient for HttpRegistrar {
    async fn register(&self, request: &RegistrationRequest) -> Result<()> {
        self.client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .context("Registration rejected")?;
        Ok(())
    }
}

/// Handle to the running registration task
#[derive(Clone)]
pub struct RegistrationHandle {
    token_tx: mpsc::UnboundedSender<String>,
    state_rx: watch::Receiver<RegistrationState>,
}

impl RegistrationHandle {
    /// Register with a new channel token, superseding any attempt or backoff in progress
    pub fn refresh_token(&self, token: impl Into<String>) {
        if self.token_tx.send(token.into()).is_err() {
            error!("[REG] Registration task is not running");
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> RegistrationState {
        self.state_rx.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state_rx.clone()
    }
}

/// Spawn the registration task
pub fn spawn(
    device_id: impl Into<String>,
    config: &RegistrationConfig,
    client: Arc<dyn RegistrationClient>,
) -> (RegistrationHandle, JoinHandle<()>) {
    let fsm = RegistrationStateMachine::new(device_id, config.base_delay(), config.max_retries);
    let (token_tx, token_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(fsm.state().clone());

    let task = tokio::spawn(registration_loop(fsm, client, token_rx, state_tx));

    (RegistrationHandle { token_tx, state_rx }, task)
}

async fn registration_loop(
    mut fsm: RegistrationStateMachine,
    client: Arc<dyn RegistrationClient>,
    mut token_rx: mpsc::UnboundedReceiver<String>,
    state_tx: watch::Sender<RegistrationState>,
) {
    let mut next_token: Option<String> = None;
    let mut tokens_open = true;

    loop {
        let token = match next_token.take() {
            Some(token) => token,
            None => match token_rx.recv().await {
                Some(token) => token,
                None => break,
            },
        };

        fsm.process_event(RegistrationEvent::TokenReceived(token));
        state_tx.send_replace(fsm.state().clone());
        info!("[REG] Registering device {}", fsm.state().device_id);

        'attempts: loop {
            let request = RegistrationRequest {
                device_id: fsm.state().device_id.clone(),
                token: fsm.token().unwrap_or_default().to_string(),
            };

            let register = client.register(&request);
            tokio::pin!(register);
            let outcome = loop {
                tokio::select! {
                    result = &mut register => break result,
                    newer = token_rx.recv(), if tokens_open => match newer {
                        Some(token) => {
                            info!("[REG] Token refreshed during registration, restarting");
                            next_token = Some(token);
                            break 'attempts;
                        }
                        None => tokens_open = false,
                    },
                }
            };

            let event = match outcome {
                Ok(()) => RegistrationEvent::Succeeded,
                Err(e) => RegistrationEvent::Failed(format!("{:#}", e)),
            };

            let result = fsm.process_event(event);
            state_tx.send_replace(fsm.state().clone());

            match result {
                TransitionResult::Registered => {
                    info!("[REG] Token registered");
                    break 'attempts;
                }
                TransitionResult::Retry { attempt, delay } => {
                    warn!(
                        "[REG] Registration failed ({}), retrying in {:?} (attempt {})",
                        fsm.state().last_error.as_deref().unwrap_or("unknown"),
                        delay,
                        attempt
                    );
                    let backoff = tokio::time::sleep(delay);
                    tokio::pin!(backoff);
                    loop {
                        tokio::select! {
                            _ = &mut backoff => break,
                            newer = token_rx.recv(), if tokens_open => match newer {
                                Some(token) => {
                                    info!("[REG] Token refreshed during backoff, restarting");
                                    next_token = Some(token);
                                    break 'attempts;
                                }
                                None => tokens_open = false,
                            },
                        }
                    }
                }
                TransitionResult::GaveUp { attempts } => {
                    error!(
                        "[REG] Registration failed permanently after {} attempts: {}",
                        attempts,
                        fsm.state().last_error.as_deref().unwrap_or("unknown")
                    );
                    break 'attempts;
                }
                TransitionResult::Register | TransitionResult::Ignored => break 'attempts,
            }
        }
    }

    info!("[REG] Registration task stopped");
}
