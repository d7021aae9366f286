//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the token registry and the provisioning client.

use crate::config::Config;
use callbridge_core::{provision::UpstreamProvisioner, registry::TokenRegistry};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<TokenRegistry>,
    pub provisioner: Arc<dyn UpstreamProvisioner>,
}

impl AppState {
    pub fn new(config: Config, provisioner: Arc<dyn UpstreamProvisioner>) -> Self {
        Self {
            registry: Arc::new(TokenRegistry::new(config.token_ttl)),
            config: Arc::new(config),
            provisioner,
        }
    }
}
