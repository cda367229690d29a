//! Command router - validates and dispatches incoming commands

use super::handlers::{self, CommandResult, HandlerContext};
use super::registry::{ActionRegistry, Shape};
use agent_shared::{Command, ProtocolError};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A command that reached its handler
#[derive(Debug)]
pub struct Dispatch {
    /// Canonical action name
    pub action: &'static str,
    pub shape: Shape,
    pub result: CommandResult,
}

/// Routes controller messages to action handlers
pub struct CommandRouter {
    registry: ActionRegistry,
    ctx: HandlerContext,
}

impl CommandRouter {
    pub fn new(ctx: HandlerContext) -> Self {
        let registry = ActionRegistry::new();
        info!("[ROUTER] {} actions registered", registry.descriptors().count());
        Self { registry, ctx }
    }

    /// Parse, validate and dispatch one message.
    ///
    /// Protocol errors are returned before any handler runs. Background
    /// work started by the handler is left running.
    pub async fn route(&self, msg: &HashMap<String, String>) -> Result<Dispatch, ProtocolError> {
        let command = Command::from_message(msg)?;

        let descriptor = self
            .registry
            .lookup(&command.action)
            .ok_or_else(|| ProtocolError::UnknownAction(command.action.clone()))?;

        if let Some(missing) = descriptor
            .required_params
            .iter()
            .find(|p| command.param(p).is_none())
        {
            return Err(ProtocolError::MissingParameter {
                action: descriptor.name.to_string(),
                param: missing.to_string(),
            });
        }

        debug!(
            "[ROUTER] Dispatching {} ({:?}) for {}",
            descriptor.name, descriptor.shape, self.ctx.device_id
        );
        let result = handlers::dispatch(&self.ctx, descriptor.action, &command).await;

        Ok(Dispatch {
            action: descriptor.name,
            shape: descriptor.shape,
            result,
        })
    }

    /// Route a message from the push channel. Never fails.
    pub async fn handle_message(&self, msg: &HashMap<String, String>) {
        match self.route(msg).await {
            Ok(dispatch) => match &dispatch.result {
                CommandResult::Completed { message } => {
                    info!("[ROUTER] {} completed: {}", dispatch.action, message)
                }
                CommandResult::Failed { message } => {
                    warn!("[ROUTER] {} failed: {}", dispatch.action, message)
                }
                CommandResult::Rejected { message } => {
                    warn!("[ROUTER] {} rejected: {}", dispatch.action, message)
                }
                CommandResult::Ignored { message } => {
                    info!("[ROUTER] {} ignored: {}", dispatch.action, message)
                }
                CommandResult::Pending(_) => {
                    info!("[ROUTER] {} accepted, reporting asynchronously", dispatch.action)
                }
            },
            Err(e) => warn!("[ROUTER] Dropping command: {}", e),
        }
    }
}
