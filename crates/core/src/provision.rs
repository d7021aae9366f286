//! Creates assistant calls through the provider's control API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_PROVISION_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an upstream media session could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("control API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("control API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("control API response has no websocketCallUrl")]
    MissingAddress,
    #[error("upstream connection failed: {0}")]
    Connect(String),
    #[error("provisioning did not finish within {0:?}")]
    Timeout(Duration),
}

/// Something that can turn an assistant id into a media WebSocket address.
#[async_trait]
pub trait UpstreamProvisioner: Send + Sync {
    /// Creates a call for `assistant_id` whose audio is PCM16 at `sample_rate_hz`
    /// and returns the media WebSocket URL for it.
    async fn provision(
        &self,
        assistant_id: &str,
        sample_rate_hz: u32,
    ) -> Result<String, ProvisionError>;
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateCallRequest<'a> {
    assistant_id: &'a str,
    transport: TransportRequest,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TransportRequest {
    provider: &'static str,
    audio_format: AudioFormat,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AudioFormat {
    format: &'static str,
    container: &'static str,
    sample_rate: u32,
}

#[derive(Deserialize, Debug)]
struct CreateCallResponse {
    transport: Option<TransportResponse>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TransportResponse {
    websocket_call_url: Option<String>,
}

/// [`UpstreamProvisioner`] backed by the Vapi `POST /call` endpoint.
pub struct VapiProvisioner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VapiProvisioner {
    /// Creates a provisioner talking to `base_url` (e.g. `https://api.vapi.ai`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl UpstreamProvisioner for VapiProvisioner {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn provision(
        &self,
        assistant_id: &str,
        sample_rate_hz: u32,
    ) -> Result<String, ProvisionError> {
        let body = CreateCallRequest {
            assistant_id,
            transport: TransportRequest {
                provider: "vapi.websocket",
                audio_format: AudioFormat {
                    format: "pcm_s16le",
                    container: "raw",
                    sample_rate: sample_rate_hz,
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/call", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreateCallResponse = response.json().await?;
        let url = created
            .transport
            .and_then(|t| t.websocket_call_url)
            .filter(|url| !url.is_empty())
            .ok_or(ProvisionError::MissingAddress)?;

        info!("Provisioned upstream media session.");
        Ok(url)
    }
}
