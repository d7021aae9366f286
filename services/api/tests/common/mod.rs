//! Test harness: the router on an ephemeral port, a mocked control API and a
//! fake assistant media socket.

#![allow(dead_code)]

use async_trait::async_trait;
use callbridge_api::{config::Config, router::create_router, state::AppState};
use callbridge_core::provision::{ProvisionError, UpstreamProvisioner};
use futures_util::{SinkExt, StreamExt};
use mockall::mock;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config, tungstenite::protocol::Message,
};
use tracing::Level;

pub type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const WAIT: Duration = Duration::from_secs(3);

/// Scheduling allowance on top of tick-based latency bounds.
pub const TIMING_SLACK: Duration = Duration::from_millis(10);

mock! {
    pub Provisioner {}

    #[async_trait]
    impl UpstreamProvisioner for Provisioner {
        async fn provision(&self, assistant_id: &str, sample_rate_hz: u32) -> Result<String, ProvisionError>;
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        vapi_api_key: "test-key".to_string(),
        vapi_assistant_id: "asst-test".to_string(),
        vapi_base_url: "http://127.0.0.1:9".to_string(),
        public_host: None,
        webhook_secret: None,
        provision_timeout: Duration::from_secs(2),
        token_ttl: Duration::from_secs(60),
        max_queue_frames: 250,
        log_level: Level::INFO,
    }
}

/// A provisioner that hands out `url` for every call.
pub fn provisioner_for(url: &str) -> MockProvisioner {
    let url = url.to_string();
    let mut provisioner = MockProvisioner::new();
    provisioner
        .expect_provision()
        .returning(move |_, _| Ok(url.clone()));
    provisioner
}

/// A provisioner that must never be called.
pub fn unused_provisioner() -> MockProvisioner {
    let mut provisioner = MockProvisioner::new();
    provisioner.expect_provision().never();
    provisioner
}

/// Serves the application router on an ephemeral port.
pub async fn spawn_app(config: Config, provisioner: MockProvisioner) -> SocketAddr {
    let state = Arc::new(AppState::new(config, Arc::new(provisioner)));
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A one-connection assistant media server. Everything it receives is
/// reported on `received`; anything pushed to `outbound` is sent to the bridge.
pub struct FakeAssistant {
    pub url: String,
    pub received: mpsc::UnboundedReceiver<Message>,
    pub outbound: mpsc::UnboundedSender<Message>,
}

impl FakeAssistant {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            stream.set_nodelay(true).unwrap();
            let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = socket.split();
            loop {
                tokio::select! {
                    incoming = source.next() => match incoming {
                        Some(Ok(message)) => {
                            let closing = message.is_close();
                            let _ = received_tx.send(message);
                            if closing {
                                break;
                            }
                        }
                        _ => break,
                    },
                    Some(message) = outbound_rx.recv() => {
                        if sink.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            received,
            outbound,
        }
    }

    /// Next message from the bridge, skipping pings.
    pub async fn next(&mut self) -> Message {
        loop {
            let message = timeout(WAIT, self.received.recv())
                .await
                .expect("assistant timed out waiting for a message")
                .expect("assistant connection ended");
            if !message.is_ping() && !message.is_pong() {
                return message;
            }
        }
    }
}

/// Opens a telephony client with Nagle disabled, so small frames leave
/// immediately and latency assertions measure the bridge alone.
pub async fn connect(addr: SocketAddr, path_and_query: &str) -> Client {
    let (client, _) =
        connect_async_with_config(format!("ws://{addr}{path_and_query}"), None, true)
            .await
            .unwrap();
    client
}

/// Next data or close frame on the telephony client, skipping pings.
pub async fn next_message(client: &mut Client) -> Message {
    loop {
        let message = timeout(WAIT, client.next())
            .await
            .expect("telephony timed out waiting for a message")
            .expect("telephony stream ended")
            .unwrap();
        if !message.is_ping() && !message.is_pong() {
            return message;
        }
    }
}

pub fn pcm_constant(value: i16, samples: usize) -> Vec<u8> {
    (0..samples).flat_map(|_| value.to_le_bytes()).collect()
}

pub fn samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
