use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use newhealth_core::{AssistantError, AssistantResult};

/// Sample rate the live endpoint expects for captured microphone audio.
pub const INPUT_SAMPLE_RATE_HZ: u32 = 16_000;
/// Sample rate of the audio the live endpoint streams back.
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;
/// Capture frame size, in samples per channel.
pub const CAPTURE_FRAME_SAMPLES: usize = 4_096;

/// MIME type advertised on outbound microphone chunks.
pub const PCM_INPUT_MIME: &str = "audio/pcm;rate=16000";

/// Base64-encodes raw bytes for transport inside a JSON blob.
pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes a base64 payload received on the wire.
pub fn decode_bytes(data: &str) -> AssistantResult<Vec<u8>> {
    BASE64
        .decode(data)
        .map_err(|e| AssistantError::Audio(format!("invalid base64 audio payload: {e}")))
}

/// Converts float samples in [-1.0, 1.0) to interleaved little-endian PCM16.
///
/// Values are scaled by 32768 and saturate at the i16 range, so out-of-range
/// input clips rather than wrapping.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let quantized = (sample * 32_768.0) as i16;
        out.extend_from_slice(&quantized.to_le_bytes());
    }
    out
}

/// Decodes interleaved little-endian PCM16 into per-channel float samples
/// scaled into [-1.0, 1.0).
///
/// The byte length must be an exact multiple of one interleaved frame
/// (2 bytes per sample per channel). A trailing partial frame means the
/// producer violated the protocol and is reported as an error rather than
/// silently truncated.
pub fn decode_pcm16(bytes: &[u8], channels: usize) -> AssistantResult<Vec<Vec<f32>>> {
    if channels == 0 {
        return Err(AssistantError::Audio("channel count must be non-zero".to_string()));
    }
    let frame_bytes = 2 * channels;
    if bytes.len() % frame_bytes != 0 {
        return Err(AssistantError::Audio(format!(
            "pcm16 payload of {} bytes is not a whole number of {}-channel frames",
            bytes.len(),
            channels
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for frame in bytes.chunks_exact(frame_bytes) {
        for (channel, sample_bytes) in frame.chunks_exact(2).enumerate() {
            let raw = i16::from_le_bytes([sample_bytes[0], sample_bytes[1]]);
            out[channel].push(f32::from(raw) / 32_768.0);
        }
    }
    Ok(out)
}

/// Playback duration of `sample_count` samples at `rate_hz`.
pub fn duration_secs(sample_count: usize, rate_hz: u32) -> f64 {
    sample_count as f64 / f64::from(rate_hz)
}
