//! Inbound telephony audio handling.
//!
//! Media streams carry headerless 8 kHz samples. Transcription services want
//! a real container, so the accumulated bytes are decoded to 16-bit PCM and
//! wrapped in a mono WAV file before upload.

use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Encoding of raw bytes received from the media stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InboundEncoding {
    /// G.711 μ-law, one byte per sample.
    #[default]
    Mulaw,
    /// Signed 16-bit little-endian PCM.
    Pcm16,
}

const MULAW_BIAS: i32 = 0x84;

/// Expands one G.711 μ-law byte into a linear 16-bit sample.
pub fn mulaw_to_pcm16(byte: u8) -> i16 {
    let u = !byte;
    let sign = u & 0x80;
    let exponent = (u >> 4) & 0x07;
    let mantissa = i32::from(u & 0x0F);
    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
    let sample = if sign != 0 { -magnitude } else { magnitude };
    // Largest magnitude is 32124, always in range.
    sample as i16
}

fn decode_samples(audio: &[u8], encoding: InboundEncoding) -> Vec<i16> {
    match encoding {
        InboundEncoding::Mulaw => audio.iter().copied().map(mulaw_to_pcm16).collect(),
        InboundEncoding::Pcm16 => audio
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    }
}

/// Wraps raw stream audio in a mono 16-bit WAV container.
pub fn wav_container(
    audio: &[u8],
    encoding: InboundEncoding,
    sample_rate: u32,
) -> Result<Vec<u8>, VoiceError> {
    if sample_rate == 0 {
        return Err(VoiceError::Config("sample_rate must be positive".to_string()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in decode_samples(audio, encoding) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
