//! The assistant side of the bridge: establishing the media WebSocket and
//! classifying what arrives on it.

use super::protocol::{self, AssistantControl};
use crate::state::AppState;
use bytes::Bytes;
use callbridge_core::{
    format::{OperatingMode, SessionConfig},
    provision::ProvisionError,
};
use futures_util::{
    Sink, SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config,
    tungstenite::{self, protocol::Message as WsMessage},
};
use tracing::{debug, info};

pub type AssistantSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type AssistantSink = SplitSink<AssistantSocket, WsMessage>;
pub type AssistantStream = SplitStream<AssistantSocket>;

/// Where the upstream media address comes from.
#[derive(Debug)]
pub enum UpstreamSource {
    /// Call the control API during the upgrade (direct variant).
    Provision,
    /// Use an address provisioned earlier and claimed by token.
    Address(String),
}

/// Something received on the assistant leg.
#[derive(Debug)]
pub enum AssistantEvent {
    Audio(Bytes),
    /// JSON control or transcript messages. Logged, not relayed.
    Control(String),
    Closed,
    Error(tungstenite::Error),
    /// Ping, pong and raw frames.
    Ignored,
}

/// Resolves and connects the assistant leg for a session, or returns `None`
/// for modes that have no assistant. Bounded by the configured provisioning
/// timeout.
pub async fn establish(
    state: &Arc<AppState>,
    config: &SessionConfig,
    source: UpstreamSource,
) -> Result<Option<AssistantSocket>, ProvisionError> {
    if config.mode != OperatingMode::Bridge {
        return Ok(None);
    }

    let deadline = state.config.provision_timeout;
    let attempt = async move {
        let url = match source {
            UpstreamSource::Provision => {
                state
                    .provisioner
                    .provision(
                        &state.config.vapi_assistant_id,
                        config.assistant_sample_rate_hz,
                    )
                    .await?
            }
            UpstreamSource::Address(url) => url,
        };
        connect(&url).await.map(Some)
    };

    tokio::time::timeout(deadline, attempt)
        .await
        .map_err(|_| ProvisionError::Timeout(deadline))?
}

/// Opens the media WebSocket at `url`.
pub async fn connect(url: &str) -> Result<AssistantSocket, ProvisionError> {
    let (socket, _) = connect_async_with_config(url, None, true)
        .await
        .map_err(|e| ProvisionError::Connect(e.to_string()))?;
    info!("Connected to assistant media socket.");
    Ok(socket)
}

/// Waits for the next assistant event. Never resolves when there is no
/// assistant leg, which lets it sit in a `select!` unconditionally.
pub async fn next_event(stream: &mut Option<AssistantStream>) -> AssistantEvent {
    let Some(stream) = stream.as_mut() else {
        return std::future::pending().await;
    };
    match stream.next().await {
        Some(Ok(WsMessage::Binary(data))) => AssistantEvent::Audio(data),
        Some(Ok(WsMessage::Text(text))) => AssistantEvent::Control(text.as_str().to_owned()),
        Some(Ok(WsMessage::Close(frame))) => {
            debug!(?frame, "Assistant sent close frame.");
            AssistantEvent::Closed
        }
        Some(Ok(_)) => AssistantEvent::Ignored,
        Some(Err(e)) => AssistantEvent::Error(e),
        None => AssistantEvent::Closed,
    }
}

/// Sends converted caller audio upstream, giving up on the frame after
/// `deadline`. Returns whether the frame was delivered. A missing leg is not
/// an error.
pub async fn send_audio(
    sink: &mut Option<AssistantSink>,
    audio: Bytes,
    deadline: Duration,
) -> Result<bool, tungstenite::Error> {
    match sink.as_mut() {
        Some(sink) => send_within(sink, WsMessage::Binary(audio), deadline).await,
        None => Ok(true),
    }
}

/// Sends `message` unless the sink stays busy for longer than `deadline`,
/// in which case the message is abandoned and `Ok(false)` returned.
async fn send_within<S>(
    sink: &mut S,
    message: WsMessage,
    deadline: Duration,
) -> Result<bool, S::Error>
where
    S: Sink<WsMessage> + Unpin,
{
    match tokio::time::timeout(deadline, sink.send(message)).await {
        Ok(sent) => sent.map(|()| true),
        Err(_) => Ok(false),
    }
}

/// Asks the assistant to end the call.
pub async fn hangup(sink: &mut AssistantSink) -> Result<(), tungstenite::Error> {
    let text = protocol::encode_control(&AssistantControl::Hangup);
    sink.send(WsMessage::Text(text.into())).await
}
