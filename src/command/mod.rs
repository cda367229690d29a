//! Command routing for the device agent
//!
//! This module handles:
//! - Parsing controller messages into commands
//! - Looking actions up in the registry and checking required parameters
//! - Dispatching to the handler for each action

pub mod handlers;
pub mod registry;
mod router;

pub use handlers::{CommandResult, HandlerContext};
pub use registry::{Action, ActionDescriptor, ActionRegistry, Shape};
pub use router::{CommandRouter, Dispatch};
