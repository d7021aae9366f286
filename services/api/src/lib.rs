//! Call Bridge API Library Crate
//!
//! This library contains the web service that bridges telephony media streams
//! to a voice assistant: configuration, shared state, HTTP handlers, the
//! WebSocket bridge and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
