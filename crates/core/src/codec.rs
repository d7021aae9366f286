//! PCM16 and μ-law conversions plus simple sample-rate conversion.
//!
//! Every function here works on raw little-endian byte buffers as they come
//! off the wire. A trailing odd byte is never an error: it is dropped, the
//! same way `chunks_exact(2)` drops an incomplete sample.

/// Largest magnitude μ-law can represent before clipping.
const MULAW_CLIP: i32 = 32635;
/// Bias added before segment lookup.
const MULAW_BIAS: i32 = 0x84;

/// Interprets a byte buffer as little-endian i16 samples.
pub fn pcm_samples(pcm: &[u8]) -> impl Iterator<Item = i16> + '_ {
    pcm.chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
}

/// Serializes i16 samples back into little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect()
}

fn clamp_i16(value: f64) -> i16 {
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Multiplies the sample count by `factor` using linear interpolation.
///
/// Each sample `a` is emitted followed by `factor - 1` points between `a` and
/// its successor `b`. The last sample is its own successor. With `factor == 2`
/// the inserted point is `round((a + b) / 2)`.
pub fn upsample_linear(pcm: &[u8], factor: usize) -> Vec<u8> {
    let samples: Vec<i16> = pcm_samples(pcm).collect();
    if factor <= 1 {
        return samples_to_bytes(&samples);
    }

    let mut out = Vec::with_capacity(samples.len() * factor);
    for (i, &a) in samples.iter().enumerate() {
        let b = samples.get(i + 1).copied().unwrap_or(a);
        out.push(a);
        for k in 1..factor {
            let t = k as f64 / factor as f64;
            out.push(clamp_i16(a as f64 + (b as f64 - a as f64) * t));
        }
    }
    samples_to_bytes(&out)
}

/// Divides the sample count by `factor`, averaging each complete group.
///
/// Samples that do not fill a whole group at the end are dropped.
pub fn downsample_average(pcm: &[u8], factor: usize) -> Vec<u8> {
    let samples: Vec<i16> = pcm_samples(pcm).collect();
    if factor <= 1 {
        return samples_to_bytes(&samples);
    }

    let out: Vec<i16> = samples
        .chunks_exact(factor)
        .map(|group| {
            let sum: i64 = group.iter().map(|&s| s as i64).sum();
            clamp_i16(sum as f64 / factor as f64)
        })
        .collect();
    samples_to_bytes(&out)
}

/// Linear interpolation for ratios that are not whole numbers (e.g. 16k -> 24k).
fn resample_fractional(pcm: &[u8], from_hz: u32, to_hz: u32) -> Vec<u8> {
    let samples: Vec<i16> = pcm_samples(pcm).collect();
    if samples.is_empty() {
        return Vec::new();
    }

    let out_len = samples.len() * to_hz as usize / from_hz as usize;
    let step = from_hz as f64 / to_hz as f64;
    let last = samples.len() - 1;

    let out: Vec<i16> = (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[(idx + 1).min(last)] as f64;
            clamp_i16(a + (b - a) * frac)
        })
        .collect();
    samples_to_bytes(&out)
}

/// Converts PCM16 audio between two sample rates.
///
/// Whole-number ratios use [`upsample_linear`] or [`downsample_average`];
/// anything else falls back to fractional linear interpolation.
pub fn resample(pcm: &[u8], from_hz: u32, to_hz: u32) -> Vec<u8> {
    if from_hz == 0 || to_hz == 0 || from_hz == to_hz {
        return pcm[..pcm.len() - pcm.len() % 2].to_vec();
    }
    if to_hz % from_hz == 0 {
        upsample_linear(pcm, (to_hz / from_hz) as usize)
    } else if from_hz % to_hz == 0 {
        downsample_average(pcm, (from_hz / to_hz) as usize)
    } else {
        resample_fractional(pcm, from_hz, to_hz)
    }
}

/// Compresses one linear sample into a μ-law code.
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut magnitude = sample as i32;
    let sign = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0x00
    };

    magnitude = magnitude.min(MULAW_CLIP) + MULAW_BIAS;

    // Segment is the position of the highest set bit above bit 7.
    let exponent = 31 - (((magnitude >> 7) as u32) | 1).leading_zeros() as i32;
    let mantissa = (magnitude >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Expands a μ-law code to the reconstruction level of its bucket.
pub fn mulaw_to_linear(code: u8) -> i16 {
    let code = !code;
    let sign = code & 0x80;
    let exponent = ((code >> 4) & 0x07) as i32;
    let mantissa = (code & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Quantization step of the segment a μ-law code belongs to.
pub fn mulaw_step(code: u8) -> i32 {
    let exponent = ((!code >> 4) & 0x07) as i32;
    8 << exponent
}

/// Encodes a PCM16 buffer into μ-law, one byte per sample.
pub fn encode_mulaw(pcm: &[u8]) -> Vec<u8> {
    pcm_samples(pcm).map(linear_to_mulaw).collect()
}

/// Decodes μ-law bytes into a PCM16 buffer.
pub fn decode_mulaw(codes: &[u8]) -> Vec<u8> {
    codes
        .iter()
        .flat_map(|&code| mulaw_to_linear(code).to_le_bytes())
        .collect()
}
