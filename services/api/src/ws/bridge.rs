//! WebSocket entry points and the task that drives one bridge session.

use super::{
    protocol::{self, TelephonyInput},
    session::{BridgeSession, CloseReason},
    upstream::{self, AssistantEvent, AssistantSink, UpstreamSource},
};
use crate::state::AppState;
use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::Response,
};
use bytes::Bytes;
use callbridge_core::{
    format::{FramingStyle, OperatingMode, SessionConfig},
    pacer::TICK_INTERVAL,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::{collections::HashMap, sync::Arc};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

type TelephonySink = SplitSink<WebSocket, Message>;

/// Direct variant: negotiates the format from the query string and
/// provisions the assistant call during the upgrade.
pub async fn direct_ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let config = SessionConfig::negotiate(&params);
    ws.on_upgrade(move |socket| run_session(socket, state, config, UpstreamSource::Provision))
}

/// Token variant: claims an upstream address provisioned earlier through
/// `/exotel/stream-endpoint`. Unknown or reused tokens are closed at once.
pub async fn token_ws_handler(
    ws: WebSocketUpgrade,
    Path(token): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let pending = state.registry.consume(&token);
    let config = SessionConfig {
        mode: OperatingMode::Bridge,
        ..SessionConfig::negotiate(&params)
    };

    ws.on_upgrade(move |socket| async move {
        match pending {
            Some(pending) => {
                run_session(
                    socket,
                    state,
                    config,
                    UpstreamSource::Address(pending.upstream_url),
                )
                .await
            }
            None => {
                warn!("Rejecting bridge connection with unknown or used token.");
                reject(socket, close_code::POLICY, "unknown token").await;
            }
        }
    })
}

/// Closes a socket that never became a session.
async fn reject(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Runs one session from provisioning to close.
#[instrument(
    name = "bridge_session",
    skip_all,
    fields(session_id, mode = %config.mode, framing = ?config.framing_style)
)]
async fn run_session(
    socket: WebSocket,
    state: Arc<AppState>,
    config: SessionConfig,
    source: UpstreamSource,
) {
    let mut session = BridgeSession::new(config, state.config.max_queue_frames);
    tracing::Span::current().record("session_id", tracing::field::display(session.id()));
    info!("Telephony leg connected.");

    let assistant = match upstream::establish(&state, &config, source).await {
        Ok(assistant) => assistant,
        Err(e) => {
            error!(error = %e, "Could not establish assistant leg.");
            session.fail_provisioning();
            reject(socket, close_code::ERROR, "upstream unavailable").await;
            return;
        }
    };
    session.activate();

    let (mut telephony_tx, mut telephony_rx) = socket.split();
    let (mut assistant_tx, mut assistant_rx) = match assistant {
        Some(socket) => {
            let (tx, rx) = socket.split();
            (Some(tx), Some(rx))
        }
        None => (None, None),
    };

    let mut ticker = time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Session active.");

    let reason = loop {
        tokio::select! {
            incoming = telephony_rx.next() => {
                let audio = match incoming {
                    Some(Ok(Message::Text(text))) => match protocol::decode_text(&text) {
                        Ok(TelephonyInput::Audio(audio)) => audio,
                        Ok(TelephonyInput::Stop) => {
                            info!("Telephony sent stop.");
                            break CloseReason::Stop;
                        }
                        Ok(TelephonyInput::Ignored) => continue,
                        Err(e) => {
                            session.on_malformed_frame();
                            warn!(error = %e, "Ignoring malformed telephony frame.");
                            continue;
                        }
                    },
                    Some(Ok(Message::Binary(audio))) => audio,
                    Some(Ok(Message::Close(_))) | None => break CloseReason::TelephonyClosed,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "Telephony socket error.");
                        break CloseReason::TelephonyError;
                    }
                };
                if let Some(upstream_audio) = session.on_caller_audio(&audio) {
                    // A stalled assistant may hold the loop for at most one tick.
                    match upstream::send_audio(&mut assistant_tx, upstream_audio, TICK_INTERVAL).await {
                        Ok(delivered) => {
                            if !delivered {
                                warn!("Assistant not accepting audio, dropped caller frame.");
                            }
                            session.on_upstream_forwarded(delivered);
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to forward audio upstream.");
                            break CloseReason::AssistantError;
                        }
                    }
                }
            },
            event = upstream::next_event(&mut assistant_rx) => {
                match event {
                    AssistantEvent::Audio(pcm) => session.on_assistant_audio(&pcm),
                    AssistantEvent::Control(text) => debug!(message = %text, "Assistant control message."),
                    AssistantEvent::Ignored => {}
                    AssistantEvent::Closed => break CloseReason::AssistantClosed,
                    AssistantEvent::Error(e) => {
                        warn!(error = %e, "Assistant socket error.");
                        break CloseReason::AssistantError;
                    }
                }
            },
            _ = ticker.tick() => {
                if let Some(frame) = session.on_tick() {
                    if let Err(e) = send_frame(&mut telephony_tx, config.framing_style, frame).await {
                        warn!(error = %e, "Failed to deliver frame to telephony.");
                        break CloseReason::TelephonyError;
                    }
                }
            },
        }
    };

    if session.begin_close(reason) {
        info!(%reason, "Closing both legs.");
        close_legs(reason, &mut telephony_tx, assistant_tx.as_mut()).await;
    }
    session.finish_close();
}

/// Wraps a frame per the negotiated framing and sends it to the caller.
async fn send_frame(
    sink: &mut TelephonySink,
    framing: FramingStyle,
    frame: Bytes,
) -> Result<(), axum::Error> {
    let message = match framing {
        FramingStyle::JsonBase64 => Message::Text(protocol::encode_media(&frame).into()),
        FramingStyle::Binary => Message::Binary(frame),
    };
    sink.send(message).await
}

/// Shuts both legs down. Errors are expected here since one leg is usually
/// already gone, so they are only logged.
async fn close_legs(
    reason: CloseReason,
    telephony: &mut TelephonySink,
    assistant: Option<&mut AssistantSink>,
) {
    if let Some(assistant) = assistant {
        if reason == CloseReason::Stop {
            if let Err(e) = upstream::hangup(assistant).await {
                debug!(error = %e, "Could not send hangup upstream.");
            }
        }
        if let Err(e) = assistant.close().await {
            debug!(error = %e, "Assistant leg close failed.");
        }
    }

    let code = match reason {
        CloseReason::Stop | CloseReason::TelephonyClosed | CloseReason::AssistantClosed => {
            close_code::NORMAL
        }
        _ => close_code::ERROR,
    };
    let frame = CloseFrame {
        code,
        reason: reason.to_string().into(),
    };
    if let Err(e) = telephony.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Telephony leg close failed.");
    }
}
