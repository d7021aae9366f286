//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST endpoints, both WebSocket bridge entry points, and the
//! OpenAPI documentation.

use crate::{
    handlers,
    models::{ErrorResponse, HealthResponse, StreamEndpointResponse, WebhookAck, WsEntryResponse},
    state::AppState,
    ws::{direct_ws_handler, token_ws_handler},
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::ws_entry,
        handlers::stream_endpoint,
        handlers::webhook,
    ),
    components(
        schemas(HealthResponse, WsEntryResponse, StreamEndpointResponse, WebhookAck, ErrorResponse)
    ),
    tags(
        (name = "Call Bridge API", description = "Telephony to voice assistant media bridge")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/health", get(handlers::health))
        .route("/ws-entry", get(handlers::ws_entry).post(handlers::ws_entry))
        .route("/exotel/stream-endpoint", post(handlers::stream_endpoint))
        .route("/webhook", post(handlers::webhook))
        .route("/frejun", get(direct_ws_handler))
        .route("/ws/{token}", get(token_ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
