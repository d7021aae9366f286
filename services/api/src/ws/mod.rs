//! WebSocket Bridge
//!
//! This module contains the real-time side of the service. It is structured
//! into submodules:
//!
//! - `protocol`: JSON envelopes spoken by the telephony provider and the assistant.
//! - `session`: The per-call state machine (pacing queue, transcoding, lifecycle).
//! - `upstream`: Establishing and reading the assistant's media socket.
//! - `bridge`: Upgrade handlers and the task that drives a session.

mod bridge;
pub mod protocol;
pub mod session;
mod upstream;

pub use bridge::{direct_ws_handler, token_ws_handler};
