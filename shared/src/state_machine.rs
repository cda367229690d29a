//! Registration State Machine
//!
//! Tracks the agent's registration of its channel token with the collector
//! and decides when to retry.
//!
//! ```text
//! Idle --token--> Registering --ok--> Registered
//!                  |    ^
//!                  fail |retry (attempt <= max)
//!                  v    |
//!                  Registering --fail, attempt > max--> Failed
//! ```
//!
//! A new token restarts from attempt 0 in every phase.

use std::time::Duration;

/// Registration lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPhase {
    Idle,
    Registering,
    Registered,
    /// Retries exhausted for the current token
    Failed,
}

/// Events that drive the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// Channel token fetched at start or refreshed by the transport
    TokenReceived(String),
    /// Collector accepted the registration
    Succeeded,
    /// Registration request failed
    Failed(String),
}

/// Result of processing an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Send a registration request now
    Register,
    /// Registration succeeded
    Registered,
    /// Send the request again after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Retries exhausted
    GaveUp { attempts: u32 },
    /// Event does not apply to the current phase
    Ignored,
}

/// Snapshot of the registration state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationState {
    pub device_id: String,
    pub channel_token: Option<String>,
    /// Failed attempts for the current token
    pub attempt: u32,
    pub last_error: Option<String>,
    pub phase: RegistrationPhase,
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exp)
}

/// The registration state machine
#[derive(Debug)]
pub struct RegistrationStateMachine {
    state: RegistrationState,
    base_delay: Duration,
    max_retries: u32,
}

impl RegistrationStateMachine {
    /// Create a new state machine in Idle state
    pub fn new(device_id: impl Into<String>, base_delay: Duration, max_retries: u32) -> Self {
        Self {
            state: RegistrationState {
                device_id: device_id.into(),
                channel_token: None,
                attempt: 0,
                last_error: None,
                phase: RegistrationPhase::Idle,
            },
            base_delay,
            max_retries,
        }
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn phase(&self) -> RegistrationPhase {
        self.state.phase
    }

    /// Token to register with, if one has been received
    pub fn token(&self) -> Option<&str> {
        self.state.channel_token.as_deref()
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: RegistrationEvent) -> TransitionResult {
        match (self.state.phase, event) {
            // A new token supersedes whatever is in progress
            (_, RegistrationEvent::TokenReceived(token)) => {
                self.state.channel_token = Some(token);
                self.state.attempt = 0;
                self.state.last_error = None;
                self.state.phase = RegistrationPhase::Registering;
                TransitionResult::Register
            }

            (RegistrationPhase::Registering, RegistrationEvent::Succeeded) => {
                self.state.attempt = 0;
                self.state.last_error = None;
                self.state.phase = RegistrationPhase::Registered;
                TransitionResult::Registered
            }

            (RegistrationPhase::Registering, RegistrationEvent::Failed(reason)) => {
                self.state.attempt += 1;
                self.state.last_error = Some(reason);

                if self.state.attempt <= self.max_retries {
                    TransitionResult::Retry {
                        attempt: self.state.attempt,
                        delay: retry_delay(self.base_delay, self.state.attempt),
                    }
                } else {
                    self.state.phase = RegistrationPhase::Failed;
                    TransitionResult::GaveUp {
                        attempts: self.state.attempt,
                    }
                }
            }

            _ => TransitionResult::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fsm() -> RegistrationStateMachine {
        RegistrationStateMachine::new("dev-1", Duration::from_secs(5), 3)
    }

    #[test]
    fn test_initial_state() {
        let fsm = fsm();
        assert_eq!(fsm.phase(), RegistrationPhase::Idle);
        assert_eq!(fsm.token(), None);
        assert_eq!(fsm.state().attempt, 0);
    }

    #[test]
    fn test_retry_delay_sequence() {
        let mut fsm = fsm();
        fsm.process_event(RegistrationEvent::TokenReceived("tok".into()));

        let mut delays = Vec::new();
        for _ in 0..3 {
            match fsm.process_event(RegistrationEvent::Failed("503".into())) {
                TransitionResult::Retry { delay, .. } => delays.push(delay.as_secs()),
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert_eq!(delays, vec![5, 10, 20]);

        // 4th failure is terminal
        let result = fsm.process_event(RegistrationEvent::Failed("503".into()));
        assert_eq!(result, TransitionResult::GaveUp { attempts: 4 });
        assert_eq!(fsm.phase(), RegistrationPhase::Failed);
    }

    #[test]
    fn test_success_resets_attempt() {
        let mut fsm = fsm();
        fsm.process_event(RegistrationEvent::TokenReceived("tok".into()));
        fsm.process_event(RegistrationEvent::Failed("timeout".into()));
        assert_eq!(fsm.state().attempt, 1);

        let result = fsm.process_event(RegistrationEvent::Succeeded);
        assert_eq!(result, TransitionResult::Registered);
        assert_eq!(fsm.state().attempt, 0);
        assert_eq!(fsm.state().last_error, None);
        assert_eq!(fsm.phase(), RegistrationPhase::Registered);
    }

    #[test]
    fn test_new_token_supersedes_backoff() {
        let mut fsm = fsm();
        fsm.process_event(RegistrationEvent::TokenReceived("old".into()));
        fsm.process_event(RegistrationEvent::Failed("down".into()));
        fsm.process_event(RegistrationEvent::Failed("down".into()));

        let result = fsm.process_event(RegistrationEvent::TokenReceived("new".into()));
        assert_eq!(result, TransitionResult::Register);
        assert_eq!(fsm.token(), Some("new"));
        assert_eq!(fsm.state().attempt, 0);
    }

    #[test]
    fn test_new_token_restarts_after_failure() {
        let mut fsm = RegistrationStateMachine::new("dev-1", Duration::from_secs(5), 0);
        fsm.process_event(RegistrationEvent::TokenReceived("a".into()));
        let result = fsm.process_event(RegistrationEvent::Failed("down".into()));
        assert_eq!(result, TransitionResult::GaveUp { attempts: 1 });

        let result = fsm.process_event(RegistrationEvent::TokenReceived("b".into()));
        assert_eq!(result, TransitionResult::Register);
        assert_eq!(fsm.phase(), RegistrationPhase::Registering);
    }

    #[test]
    fn test_stray_events_ignored() {
        let mut fsm = fsm();
        assert_eq!(
            fsm.process_event(RegistrationEvent::Succeeded),
            TransitionResult::Ignored
        );
        assert_eq!(
            fsm.process_event(RegistrationEvent::Failed("x".into())),
            TransitionResult::Ignored
        );
        assert_eq!(fsm.phase(), RegistrationPhase::Idle);
    }
}
