//! Identity registration with the collector
//!
//! The one place where failures are retried proactively: an unregistered
//! device cannot be reached by the controller.

mod lifecycle;

pub use lifecycle::{spawn, HttpRegistrar, RegistrationClient, RegistrationHandle};
