//! Push channel to the controller
//!
//! This module handles:
//! - A persistent TCP connection to the controller relay with automatic reconnection
//! - Decoding inbound frames into command and token events

mod manager;

pub use manager::{ConnectionConfig, ConnectionEvent, ConnectionManager};
