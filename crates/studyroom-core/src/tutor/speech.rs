//! Audio helpers for Gemini text-to-speech output.
//!
//! The API returns raw PCM (16-bit little-endian, mono) as base64. We wrap it
//! in a RIFF/WAV header so any player can open it.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::TutorError;

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
/// Rates outside `1..=MAX_SAMPLE_RATE` in a mime type are ignored.
pub const MAX_SAMPLE_RATE: u32 = 384_000;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

pub fn decode_base64(data: &str) -> Result<Vec<u8>, TutorError> {
    let pcm = STANDARD
        .decode(data.trim())
        .map_err(|e| TutorError::InvalidAudio(e.to_string()))?;
    if pcm.is_empty() {
        return Err(TutorError::InvalidAudio("empty audio payload".into()));
    }
    Ok(pcm)
}

/// Extract `rate=NNNN` from a mime type like `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .filter_map(|rate| rate.parse().ok())
        .find(|rate| (1..=MAX_SAMPLE_RATE).contains(rate))
}

/// Prepend a 44-byte WAV header to mono 16-bit PCM.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate.saturating_mul(u32::from(block_align));
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX - 36);

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&data_len.saturating_add(36).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_describes_payload() {
        let pcm = [0u8, 1, 2, 3, 4, 5];
        let wav = pcm_to_wav(&pcm, DEFAULT_SAMPLE_RATE);
        assert_eq!(wav.len(), 44 + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 6);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 6);
        assert_eq!(&wav[44..], &pcm);
    }

    #[test]
    fn parses_rate_from_mime() {
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=24000"), Some(24_000));
        assert_eq!(sample_rate_from_mime("audio/L16; rate=16000"), Some(16_000));
        assert_eq!(sample_rate_from_mime("audio/wav"), None);
    }

    #[test]
    fn ignores_absurd_rates() {
        assert_eq!(sample_rate_from_mime("audio/L16;rate=4294967295"), None);
        assert_eq!(sample_rate_from_mime("audio/L16;rate=0"), None);
        assert_eq!(sample_rate_from_mime("audio/L16;rate=99999999999"), None);

        let wav = pcm_to_wav(&[0, 0], u32::MAX);
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), u32::MAX);
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(decode_base64("***"), Err(TutorError::InvalidAudio(_))));
        assert!(matches!(decode_base64(""), Err(TutorError::InvalidAudio(_))));
        assert_eq!(decode_base64("AAEC").unwrap(), vec![0, 1, 2]);
    }
}
