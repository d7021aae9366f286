//! Defines the JSON message formats spoken on both legs of the bridge.

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Events received from the telephony provider in JSON framing.
#[derive(Deserialize, Debug)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelephonyEvent {
    /// A chunk of caller audio.
    Media {
        #[serde(default)]
        sequence_number: Option<serde_json::Value>,
        #[serde(default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    /// The caller hung up or the provider ended the stream.
    Stop,
    /// `connected`, `start`, `mark`, `dtmf` and anything else we do not act on.
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct MediaPayload {
    #[serde(default)]
    pub payload: String,
}

/// Media frame sent to the telephony provider in JSON framing.
#[derive(Serialize, Debug)]
struct OutboundMedia {
    event: &'static str,
    media: MediaPayload,
}

/// Control messages sent to the assistant's media socket.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantControl {
    Hangup,
}

/// What a decoded telephony text frame asks the session to do.
#[derive(Debug, PartialEq)]
pub enum TelephonyInput {
    Audio(Bytes),
    Stop,
    Ignored,
}

/// A telephony frame that could not be understood. Never fatal to a session.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Parses one JSON-framed telephony message.
pub fn decode_text(text: &str) -> Result<TelephonyInput, FrameError> {
    match serde_json::from_str::<TelephonyEvent>(text)? {
        TelephonyEvent::Media {
            sequence_number,
            stream_sid,
            media,
        } => {
            let audio = base64::engine::general_purpose::STANDARD.decode(media.payload.trim())?;
            trace!(?sequence_number, ?stream_sid, bytes = audio.len(), "media event");
            Ok(TelephonyInput::Audio(audio.into()))
        }
        TelephonyEvent::Stop => Ok(TelephonyInput::Stop),
        TelephonyEvent::Other => Ok(TelephonyInput::Ignored),
    }
}

/// Wraps a frame in the outbound JSON media envelope.
pub fn encode_media(frame: &[u8]) -> String {
    let envelope = OutboundMedia {
        event: "media",
        media: MediaPayload {
            payload: base64::engine::general_purpose::STANDARD.encode(frame),
        },
    };
    // Serializing a struct of strings cannot fail.
    serde_json::to_string(&envelope).unwrap_or_default()
}

pub fn encode_control(control: &AssistantControl) -> String {
    serde_json::to_string(control).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_decode_media_event() {
        let payload = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
        let text = json!({
            "event": "media",
            "sequence_number": 7,
            "stream_sid": "abc",
            "media": { "chunk": 0, "timestamp": 0, "payload": payload }
        })
        .to_string();
        assert_eq!(
            decode_text(&text).unwrap(),
            TelephonyInput::Audio(Bytes::from_static(&[1, 2, 3, 4]))
        );
    }

    #[test]
    fn test_decode_minimal_media_event() {
        let text = r#"{"event":"media","media":{"payload":"AAA="}}"#;
        assert_eq!(
            decode_text(text).unwrap(),
            TelephonyInput::Audio(Bytes::from_static(&[0, 0]))
        );
    }

    #[test]
    fn test_decode_control_events() {
        assert_eq!(decode_text(r#"{"event":"stop"}"#).unwrap(), TelephonyInput::Stop);
        assert_eq!(
            decode_text(r#"{"event":"stop","stop":{"reason":"hangup"}}"#).unwrap(),
            TelephonyInput::Stop
        );
        assert_eq!(
            decode_text(r#"{"event":"start","start":{"stream_sid":"x"}}"#).unwrap(),
            TelephonyInput::Ignored
        );
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(decode_text("not json"), Err(FrameError::Json(_))));
        assert!(matches!(decode_text(r#"{"media":{}}"#), Err(FrameError::Json(_))));
        assert!(matches!(
            decode_text(r#"{"event":"media","media":{"payload":"@@@"}}"#),
            Err(FrameError::Base64(_))
        ));
    }

    #[test]
    fn test_encode_media_envelope() {
        let text = encode_media(&[0, 0, 255, 127]);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "event": "media", "media": { "payload": "AAD/fw==" } }));
    }

    #[test]
    fn test_encode_hangup() {
        assert_eq!(encode_control(&AssistantControl::Hangup), r#"{"type":"hangup"}"#);
    }
}
