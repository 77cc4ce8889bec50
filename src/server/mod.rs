//! Relay server.
//!
//! The server is a long-running process that:
//! - Holds the completion API client, built once at startup
//! - Listens for WebSocket connections
//! - Greets each client and relays its messages to the completion API

pub mod llm;
pub mod relay;

#[cfg(test)]
pub mod testing;

pub use relay::{Relay, RelayServer};
