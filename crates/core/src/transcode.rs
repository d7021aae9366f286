//! Direction-aware audio conversion between the caller and assistant formats.

use crate::codec;
use crate::format::{CallerCodec, SessionConfig};

/// Converts audio between the caller's negotiated format and the
/// assistant's PCM16 format.
#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    caller_codec: CallerCodec,
    caller_hz: u32,
    assistant_hz: u32,
}

impl Transcoder {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            caller_codec: config.caller_codec,
            caller_hz: config.caller_sample_rate_hz,
            assistant_hz: config.assistant_sample_rate_hz,
        }
    }

    /// Caller payload (PCM16 or μ-law) to assistant PCM16.
    pub fn caller_to_assistant(&self, payload: &[u8]) -> Vec<u8> {
        let decoded;
        let linear = match self.caller_codec {
            CallerCodec::Linear16 => payload,
            CallerCodec::MuLaw => {
                decoded = codec::decode_mulaw(payload);
                decoded.as_slice()
            }
        };
        codec::resample(linear, self.caller_hz, self.assistant_hz)
    }

    /// Assistant PCM16 to the caller's rate and codec.
    pub fn assistant_to_caller(&self, pcm: &[u8]) -> Vec<u8> {
        let resampled = codec::resample(pcm, self.assistant_hz, self.caller_hz);
        self.encode_for_caller(&resampled)
    }

    /// Encodes PCM16 already at the caller's rate into the caller codec.
    pub fn encode_for_caller(&self, pcm: &[u8]) -> Vec<u8> {
        match self.caller_codec {
            CallerCodec::Linear16 => pcm.to_vec(),
            CallerCodec::MuLaw => codec::encode_mulaw(pcm),
        }
    }
}
