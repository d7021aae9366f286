//! Axum Handlers for the HTTP API
//!
//! Health, stream discovery, token provisioning and the provider webhook.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use callbridge_core::{
    format::SessionConfig,
    provision::ProvisionError,
    webhook::{self, SIGNATURE_HEADER},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, warn};

use crate::{
    models::{
        ErrorResponse, HealthResponse, StreamEndpointResponse, WebhookAck, WsEntryResponse,
    },
    state::AppState,
};

pub enum ApiError {
    Unauthorized(String),
    Upstream(ProvisionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Upstream(err) => {
                error!("Upstream provisioning failed: {}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        message: err.to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Host to advertise in `wss://` URLs.
fn public_host(state: &AppState, headers: &HeaderMap) -> String {
    state
        .config
        .public_host
        .clone()
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "localhost".to_string())
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Tell the telephony provider where to open its media stream.
///
/// Format parameters in the query string are negotiated and echoed back in
/// canonical form on the returned `ws_url`.
#[utoipa::path(
    get,
    path = "/ws-entry",
    responses((status = 200, description = "Stream instructions", body = WsEntryResponse)),
    params(
        ("fmt" = Option<String>, Query, description = "json or bin"),
        ("mode" = Option<String>, Query, description = "bridge, echo, tone or passiveListen"),
        ("vapiSr" = Option<u32>, Query, description = "Assistant sample rate in Hz"),
        ("frejunSr" = Option<u32>, Query, description = "Caller sample rate in Hz"),
        ("frejunFmt" = Option<String>, Query, description = "pcm or mulaw")
    )
)]
pub async fn ws_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<WsEntryResponse> {
    let config = SessionConfig::negotiate(&params);
    let host = public_host(&state, &headers);
    Json(WsEntryResponse::stream(format!(
        "wss://{}/frejun?{}",
        host,
        config.to_query()
    )))
}

/// Provision an assistant call ahead of time and hand out a one-time bridge URL.
#[utoipa::path(
    post,
    path = "/exotel/stream-endpoint",
    responses(
        (status = 200, description = "Bridge URL for the provisioned call", body = StreamEndpointResponse),
        (status = 502, description = "Control API failed or timed out", body = ErrorResponse)
    )
)]
pub async fn stream_endpoint(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<StreamEndpointResponse>, ApiError> {
    let config = SessionConfig::negotiate(&params);
    let deadline = state.config.provision_timeout;

    let upstream_url = tokio::time::timeout(
        deadline,
        state.provisioner.provision(
            &state.config.vapi_assistant_id,
            config.assistant_sample_rate_hz,
        ),
    )
    .await
    .map_err(|_| ApiError::Upstream(ProvisionError::Timeout(deadline)))?
    .map_err(ApiError::Upstream)?;

    let token = state.registry.issue(upstream_url);
    info!(pending = state.registry.len(), "Issued bridge token.");

    let host = public_host(&state, &headers);
    Ok(Json(StreamEndpointResponse {
        url: format!("wss://{}/ws/{}", host, token),
    }))
}

/// Receive provider callbacks, verifying the HMAC signature when a secret is set.
#[utoipa::path(
    post,
    path = "/webhook",
    request_body(content = String, description = "Raw JSON event", content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 401, description = "Signature missing or invalid", body = ErrorResponse)
    ),
    params(
        ("x-vapi-signature" = Option<String>, Header, description = "Hex HMAC-SHA256 of the body")
    )
)]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    webhook::verify_signature(state.config.webhook_secret.as_deref(), &body, signature)
        .map_err(|e| {
            warn!(error = %e, "Rejected webhook.");
            ApiError::Unauthorized(e.to_string())
        })?;

    info!(bytes = body.len(), "Webhook received.");
    Ok(Json(WebhookAck { received: true }))
}
