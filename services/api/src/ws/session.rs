//! The per-call state machine behind a bridge connection.
//!
//! `BridgeSession` does no I/O. The socket driver in `bridge` feeds it
//! events from the two legs and the tick timer, and performs whatever sends
//! the returned values call for. Keeping the transitions here makes the
//! lifecycle rules checkable without opening sockets.

use bytes::Bytes;
use callbridge_core::{
    chunker,
    format::{OperatingMode, SessionConfig},
    pacer::PacedQueue,
    tone::{DEFAULT_TONE_HZ, ToneGenerator},
    transcode::Transcoder,
};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the upstream media address and connection.
    Provisioning,
    /// Audio flows in both directions and the tick is running.
    Active,
    /// Both legs are being shut down.
    Closing,
    /// Terminal. Only counters remain.
    Closed,
}

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The telephony provider sent a `stop` event.
    Stop,
    TelephonyClosed,
    TelephonyError,
    AssistantClosed,
    AssistantError,
    ProvisionFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::Stop => "stop event",
            CloseReason::TelephonyClosed => "telephony leg closed",
            CloseReason::TelephonyError => "telephony leg error",
            CloseReason::AssistantClosed => "assistant leg closed",
            CloseReason::AssistantError => "assistant leg error",
            CloseReason::ProvisionFailed => "provisioning failed",
        };
        f.write_str(text)
    }
}

/// Frame counters, kept for the closing log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionCounters {
    pub caller_frames_received: u64,
    pub upstream_frames_sent: u64,
    /// Caller frames abandoned because the assistant socket would not take them in time.
    pub upstream_frames_dropped: u64,
    pub assistant_frames_received: u64,
    pub caller_frames_sent: u64,
    pub frames_dropped: u64,
    pub malformed_frames: u64,
}

pub struct BridgeSession {
    id: Uuid,
    config: SessionConfig,
    state: SessionState,
    transcoder: Transcoder,
    queue: PacedQueue,
    tone: Option<ToneGenerator>,
    /// Odd byte left over from an assistant frame that split a sample.
    pending_byte: Option<u8>,
    close_reason: Option<CloseReason>,
    counters: SessionCounters,
}

impl BridgeSession {
    pub fn new(config: SessionConfig, queue_capacity: usize) -> Self {
        let tone = (config.mode == OperatingMode::Tone)
            .then(|| ToneGenerator::new(DEFAULT_TONE_HZ, config.caller_sample_rate_hz));
        Self {
            id: Uuid::new_v4(),
            config,
            state: SessionState::Provisioning,
            transcoder: Transcoder::new(&config),
            queue: PacedQueue::new(queue_capacity),
            tone,
            pending_byte: None,
            close_reason: None,
            counters: SessionCounters::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn counters(&self) -> SessionCounters {
        SessionCounters {
            frames_dropped: self.queue.dropped(),
            ..self.counters
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    /// `Provisioning -> Active`. Returns `false` from any other state.
    pub fn activate(&mut self) -> bool {
        if self.state != SessionState::Provisioning {
            return false;
        }
        self.state = SessionState::Active;
        true
    }

    /// `Provisioning -> Closed`, skipping `Closing` since no leg was bridged.
    pub fn fail_provisioning(&mut self) {
        if self.state == SessionState::Provisioning {
            self.close_reason = Some(CloseReason::ProvisionFailed);
            self.state = SessionState::Closed;
        }
    }

    /// Handles one frame of caller audio.
    ///
    /// In bridge mode the return value is the frame converted to the
    /// assistant's format, to be forwarded immediately. Other modes consume
    /// the audio themselves and return `None`.
    pub fn on_caller_audio(&mut self, payload: &[u8]) -> Option<Bytes> {
        if self.state != SessionState::Active {
            return None;
        }
        self.counters.caller_frames_received += 1;

        match self.config.mode {
            OperatingMode::Bridge => {
                let upstream = self.transcoder.caller_to_assistant(payload);
                if upstream.is_empty() {
                    return None;
                }
                Some(upstream.into())
            }
            OperatingMode::Echo => {
                let frame_size = self.config.caller_frame_bytes();
                for frame in chunker::chunk_bytes(Bytes::copy_from_slice(payload), frame_size) {
                    self.enqueue(frame);
                }
                None
            }
            OperatingMode::Tone | OperatingMode::PassiveListen => None,
        }
    }

    /// Records the outcome of forwarding a frame returned by
    /// [`on_caller_audio`](Self::on_caller_audio).
    pub fn on_upstream_forwarded(&mut self, delivered: bool) {
        if delivered {
            self.counters.upstream_frames_sent += 1;
        } else {
            self.counters.upstream_frames_dropped += 1;
        }
    }

    /// Converts a chunk of assistant PCM16 and queues it for paced delivery.
    pub fn on_assistant_audio(&mut self, pcm: &[u8]) {
        if self.state != SessionState::Active {
            return;
        }
        self.counters.assistant_frames_received += 1;

        let mut joined;
        let mut pcm = pcm;
        if let Some(byte) = self.pending_byte.take() {
            joined = Vec::with_capacity(pcm.len() + 1);
            joined.push(byte);
            joined.extend_from_slice(pcm);
            pcm = &joined;
        }
        if pcm.len() % 2 == 1 {
            self.pending_byte = pcm.last().copied();
            pcm = &pcm[..pcm.len() - 1];
        }

        let caller_audio = self.transcoder.assistant_to_caller(pcm);
        let frame_size = self.config.caller_frame_bytes();
        for frame in chunker::chunk_bytes(caller_audio.into(), frame_size) {
            self.enqueue(frame);
        }
    }

    /// Records a telephony frame that could not be decoded.
    pub fn on_malformed_frame(&mut self) {
        self.counters.malformed_frames += 1;
    }

    /// Returns the frame to send to the caller on this tick, if any.
    pub fn on_tick(&mut self) -> Option<Bytes> {
        if self.state != SessionState::Active {
            return None;
        }
        if self.queue.is_empty() {
            if let Some(tone) = self.tone.as_mut() {
                let samples = self.config.caller_sample_rate_hz
                    * callbridge_core::format::FRAME_DURATION_MS
                    / 1000;
                let pcm = tone.next_pcm(samples as usize);
                self.queue
                    .push(self.transcoder.encode_for_caller(&pcm).into());
            }
        }

        let frame = self.queue.pop()?;
        self.counters.caller_frames_sent += 1;
        Some(frame)
    }

    /// Enters `Closing`. Returns `true` only for the first trigger; later
    /// triggers are no-ops so the legs are closed exactly once.
    pub fn begin_close(&mut self, reason: CloseReason) -> bool {
        match self.state {
            SessionState::Provisioning | SessionState::Active => {
                debug!(%reason, "Session closing.");
                self.state = SessionState::Closing;
                self.close_reason = Some(reason);
                self.queue.clear();
                true
            }
            SessionState::Closing | SessionState::Closed => false,
        }
    }

    /// `Closing -> Closed`. Logs the final counters.
    pub fn finish_close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        let counters = self.counters();
        info!(
            reason = ?self.close_reason,
            caller_in = counters.caller_frames_received,
            upstream_out = counters.upstream_frames_sent,
            upstream_dropped = counters.upstream_frames_dropped,
            assistant_in = counters.assistant_frames_received,
            caller_out = counters.caller_frames_sent,
            dropped = counters.frames_dropped,
            malformed = counters.malformed_frames,
            "Session closed."
        );
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closing | SessionState::Closed)
    }

    fn enqueue(&mut self, frame: Bytes) {
        if self.queue.push(frame) {
            warn!(
                capacity = self.queue.capacity(),
                dropped = self.queue.dropped(),
                "Outbound queue full, dropped oldest frame."
            );
        }
    }
}
