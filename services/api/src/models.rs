//! HTTP payloads
//!
//! Response bodies for the discovery, provisioning and webhook endpoints,
//! annotated for OpenAPI generation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Chunk size the telephony provider is asked to use for media frames.
pub const STREAM_CHUNK_SIZE: u32 = 1000;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Tells the telephony provider where to open its media stream.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct WsEntryResponse {
    #[schema(example = "Stream")]
    pub action: String,
    #[schema(example = "wss://bridge.example.com/frejun?fmt=json&mode=bridge&vapiSr=16000&frejunSr=8000&frejunFmt=pcm")]
    pub ws_url: String,
    #[schema(example = 1000)]
    pub chunk_size: u32,
}

impl WsEntryResponse {
    pub fn stream(ws_url: String) -> Self {
        Self {
            action: "Stream".to_string(),
            ws_url,
            chunk_size: STREAM_CHUNK_SIZE,
        }
    }
}

/// A one-time bridge URL bound to a provisioned assistant call.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StreamEndpointResponse {
    #[schema(example = "wss://bridge.example.com/ws/5f0c8e6b2a8d4c0f9e1b7a3d6c2e4f10")]
    pub url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
