//! Client module for the wsrelay CLI.
//!
//! The client is a short-lived process that:
//! - Gates entry behind a masked password prompt
//! - Opens one WebSocket connection to the server
//! - Sends each terminal line and prints each reply

pub mod auth;
pub mod session;

pub use auth::{authenticate, AuthError};
pub use session::{connect, run_session, spawn_stdin_reader};
