//! Per-connection audio format negotiation.
//!
//! The telephony provider tells us how it wants audio framed through the
//! query string of the upgrade request. Negotiation never fails: anything
//! missing or malformed falls back to its default so that a healthy call is
//! never rejected over a formatting hint.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_CALLER_SAMPLE_RATE_HZ: u32 = 8000;
pub const DEFAULT_ASSISTANT_SAMPLE_RATE_HZ: u32 = 16000;
pub const MIN_SAMPLE_RATE_HZ: u32 = 4000;
pub const MAX_SAMPLE_RATE_HZ: u32 = 48000;

/// Duration of one telephony frame.
pub const FRAME_DURATION_MS: u32 = 20;

/// How audio is carried on the telephony socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FramingStyle {
    /// `{"event":"media","media":{"payload":"<base64>"}}` text frames.
    #[default]
    JsonBase64,
    /// Raw audio bytes in binary frames.
    Binary,
}

/// Audio encoding used by the caller leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CallerCodec {
    /// 16-bit little-endian linear PCM.
    #[default]
    Linear16,
    /// 8-bit μ-law.
    MuLaw,
}

impl CallerCodec {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            CallerCodec::Linear16 => 2,
            CallerCodec::MuLaw => 1,
        }
    }
}

/// What the session does with caller audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperatingMode {
    /// Relay to and from the voice assistant.
    #[default]
    Bridge,
    /// Send caller audio straight back to the caller.
    Echo,
    /// Play a test tone to the caller.
    Tone,
    /// Accept caller audio and send nothing.
    PassiveListen,
}

/// Immutable audio settings for one bridge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub framing_style: FramingStyle,
    pub caller_sample_rate_hz: u32,
    pub assistant_sample_rate_hz: u32,
    pub caller_codec: CallerCodec,
    pub mode: OperatingMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            framing_style: FramingStyle::default(),
            caller_sample_rate_hz: DEFAULT_CALLER_SAMPLE_RATE_HZ,
            assistant_sample_rate_hz: DEFAULT_ASSISTANT_SAMPLE_RATE_HZ,
            caller_codec: CallerCodec::default(),
            mode: OperatingMode::default(),
        }
    }
}

impl SessionConfig {
    /// Resolves a config from upgrade query parameters.
    ///
    /// Recognized keys are `fmt`, `mode`, `vapiSr`, `frejunSr` and `frejunFmt`.
    /// Unknown keys are ignored.
    pub fn negotiate(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let param = |key: &str| params.get(key).map(|v| v.trim());

        let framing_style = match param("fmt") {
            Some(v) if v.eq_ignore_ascii_case("bin") => FramingStyle::Binary,
            Some(v) if v.eq_ignore_ascii_case("json") => FramingStyle::JsonBase64,
            _ => defaults.framing_style,
        };

        let mode = match param("mode") {
            Some("bridge") => OperatingMode::Bridge,
            Some("echo") => OperatingMode::Echo,
            Some("tone") => OperatingMode::Tone,
            Some("passiveListen") => OperatingMode::PassiveListen,
            _ => defaults.mode,
        };

        let caller_codec = match param("frejunFmt") {
            Some(v) if v.eq_ignore_ascii_case("mulaw") => CallerCodec::MuLaw,
            Some(v) if v.eq_ignore_ascii_case("pcm") => CallerCodec::Linear16,
            _ => defaults.caller_codec,
        };

        Self {
            framing_style,
            caller_sample_rate_hz: param("frejunSr")
                .and_then(parse_rate)
                .unwrap_or(defaults.caller_sample_rate_hz),
            assistant_sample_rate_hz: param("vapiSr")
                .and_then(parse_rate)
                .unwrap_or(defaults.assistant_sample_rate_hz),
            caller_codec,
            mode,
        }
    }

    /// Bytes in one caller frame at the negotiated rate and codec.
    pub fn caller_frame_bytes(&self) -> usize {
        let samples = self.caller_sample_rate_hz * FRAME_DURATION_MS / 1000;
        samples as usize * self.caller_codec.bytes_per_sample()
    }

    /// Renders the config back into the query string accepted by `negotiate`.
    pub fn to_query(&self) -> String {
        format!(
            "fmt={}&mode={}&vapiSr={}&frejunSr={}&frejunFmt={}",
            match self.framing_style {
                FramingStyle::JsonBase64 => "json",
                FramingStyle::Binary => "bin",
            },
            self.mode,
            self.assistant_sample_rate_hz,
            self.caller_sample_rate_hz,
            match self.caller_codec {
                CallerCodec::Linear16 => "pcm",
                CallerCodec::MuLaw => "mulaw",
            },
        )
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Bridge => write!(f, "bridge"),
            OperatingMode::Echo => write!(f, "echo"),
            OperatingMode::Tone => write!(f, "tone"),
            OperatingMode::PassiveListen => write!(f, "passiveListen"),
        }
    }
}

fn parse_rate(value: &str) -> Option<u32> {
    value
        .parse::<u32>()
        .ok()
        .filter(|hz| (MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_no_params() {
        let config = SessionConfig::negotiate(&HashMap::new());
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.framing_style, FramingStyle::JsonBase64);
        assert_eq!(config.caller_sample_rate_hz, 8000);
        assert_eq!(config.assistant_sample_rate_hz, 16000);
        assert_eq!(config.caller_codec, CallerCodec::Linear16);
        assert_eq!(config.mode, OperatingMode::Bridge);
    }

    #[test]
    fn test_all_params_honored() {
        let config = SessionConfig::negotiate(&params(&[
            ("fmt", "bin"),
            ("mode", "passiveListen"),
            ("vapiSr", "24000"),
            ("frejunSr", "16000"),
            ("frejunFmt", "mulaw"),
        ]));
        assert_eq!(config.framing_style, FramingStyle::Binary);
        assert_eq!(config.mode, OperatingMode::PassiveListen);
        assert_eq!(config.assistant_sample_rate_hz, 24000);
        assert_eq!(config.caller_sample_rate_hz, 16000);
        assert_eq!(config.caller_codec, CallerCodec::MuLaw);
    }

    #[test]
    fn test_malformed_params_fall_back_individually() {
        let config = SessionConfig::negotiate(&params(&[
            ("fmt", "xml"),
            ("mode", "karaoke"),
            ("vapiSr", "-1"),
            ("frejunSr", "999999"),
            ("frejunFmt", "opus"),
        ]));
        assert_eq!(config, SessionConfig::default());

        let config = SessionConfig::negotiate(&params(&[("vapiSr", "abc"), ("fmt", "BIN")]));
        assert_eq!(config.assistant_sample_rate_hz, 16000);
        assert_eq!(config.framing_style, FramingStyle::Binary);
    }

    #[test]
    fn test_caller_frame_bytes() {
        let mut config = SessionConfig::default();
        assert_eq!(config.caller_frame_bytes(), 320);
        config.caller_codec = CallerCodec::MuLaw;
        assert_eq!(config.caller_frame_bytes(), 160);
        config.caller_sample_rate_hz = 16000;
        assert_eq!(config.caller_frame_bytes(), 320);
    }

    #[test]
    fn test_query_renders_back_to_same_config() {
        let config = SessionConfig {
            framing_style: FramingStyle::Binary,
            caller_sample_rate_hz: 16000,
            assistant_sample_rate_hz: 24000,
            caller_codec: CallerCodec::MuLaw,
            mode: OperatingMode::Tone,
        };
        let query = config.to_query();
        assert_eq!(
            query,
            "fmt=bin&mode=tone&vapiSr=24000&frejunSr=16000&frejunFmt=mulaw"
        );

        let parsed: HashMap<String, String> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(SessionConfig::negotiate(&parsed), config);
    }
}
