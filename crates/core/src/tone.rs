//! Synthetic sine source used by the `tone` operating mode.

use crate::codec;
use std::f64::consts::TAU;

pub const DEFAULT_TONE_HZ: f64 = 440.0;
const AMPLITUDE: f64 = 8000.0;

/// Continuous sine generator. Phase carries over between frames so
/// consecutive frames join without clicks.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    frequency_hz: f64,
    sample_rate_hz: u32,
    position: u64,
}

impl ToneGenerator {
    pub fn new(frequency_hz: f64, sample_rate_hz: u32) -> Self {
        Self {
            frequency_hz,
            sample_rate_hz: sample_rate_hz.max(1),
            position: 0,
        }
    }

    /// Next `samples` samples as PCM16 bytes.
    pub fn next_pcm(&mut self, samples: usize) -> Vec<u8> {
        let rate = self.sample_rate_hz as f64;
        let out: Vec<i16> = (0..samples as u64)
            .map(|i| {
                let t = (self.position + i) as f64 / rate;
                (AMPLITUDE * (TAU * self.frequency_hz * t).sin()).round() as i16
            })
            .collect();
        self.position += samples as u64;
        codec::samples_to_bytes(&out)
    }
}
