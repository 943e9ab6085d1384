//! Media decoding into mono PCM
//!
//! Jobs never decode directly; they call an injected [`AudioDecoder`] so hosts
//! can supply their own facility. [`SymphoniaDecoder`] is the default.

use seqsync_analysis::PcmBuffer;
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Errors that can occur while decoding media
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Media contained no audio samples")]
    Empty,
}

/// Raw media bytes plus their MIME type
///
/// The bytes are shared, so cloning an input or decoding it does not copy
/// the file.
#[derive(Debug, Clone)]
pub struct MediaInput {
    pub bytes: Arc<[u8]>,
    pub mime_type: Option<String>,
}

impl MediaInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: Some(mime_type.into()),
        }
    }

    /// Read a file, guessing its MIME type from the extension
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes: Arc<[u8]> = std::fs::read(path)?.into();
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
            .map(str::to_string);
        Ok(Self { bytes, mime_type })
    }

    /// Whether the input is a video container (only its audio track is analyzed)
    pub fn is_video(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("video/"))
    }
}

/// MIME type for common audio and video file extensions
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "wav" | "wave" => "audio/wav",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}

/// Options passed to a decoder for one job
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DecodeOptions {
    /// Stop after this many seconds of audio
    pub max_duration_secs: Option<f64>,
}

/// Decoding capability supplied by the host
///
/// Implementations must be stateless between calls; several jobs may decode
/// at the same time.
pub trait AudioDecoder: Send + Sync {
    /// Decode media into the samples of its first channel
    fn decode(&self, media: &MediaInput, options: &DecodeOptions) -> Result<PcmBuffer, DecodeError>;
}

/// Decoder backed by Symphonia
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, media: &MediaInput, options: &DecodeOptions) -> Result<PcmBuffer, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(Arc::clone(&media.bytes))), Default::default());

        // Create hint from the MIME type
        let mut hint = Hint::new();
        if let Some(ref mime) = media.mime_type {
            hint.mime_type(mime);
        }

        // Probe the format
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| DecodeError::Decode("Unknown sample rate".into()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let max_samples = options
            .max_duration_secs
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| (secs * sample_rate as f64) as usize);

        // Decode the first channel only
        let mut samples: Vec<f32> = Vec::new();

        loop {
            if max_samples.is_some_and(|max| samples.len() >= max) {
                break;
            }

            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(DecodeError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(symphonia::core::errors::Error::DecodeError(e)) => {
                    tracing::debug!("skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(DecodeError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count().max(1);
            let frames = decoded.frames();

            let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend(sample_buf.samples().iter().step_by(channels).copied());
        }

        if let Some(max) = max_samples {
            samples.truncate(max);
        }

        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }

        tracing::info!(
            samples = samples.len(),
            sample_rate,
            duration_secs = samples.len() as f64 / sample_rate as f64,
            "decoded audio"
        );

        PcmBuffer::new(samples, sample_rate).map_err(|e| DecodeError::Decode(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 16-bit PCM WAV file with the given channels of interleaved samples
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, interleaved: &[f32]) -> Vec<u8> {
        let data_len = (interleaved.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);

        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for &s in interleaved {
            let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_decode_wav_first_channel() {
        // Left channel 0.5, right channel -0.5
        let interleaved: Vec<f32> = (0..8000).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let media = MediaInput::new(wav_bytes(8000, 2, &interleaved), "audio/wav");

        let buffer = SymphoniaDecoder::new()
            .decode(&media, &DecodeOptions::default())
            .unwrap();

        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.len(), 4000);
        assert!(buffer.samples().iter().all(|&s| (s - 0.5).abs() < 0.01));
    }

    #[test]
    fn test_decode_respects_max_duration() {
        let samples = vec![0.25f32; 8000 * 3];
        let media = MediaInput::new(wav_bytes(8000, 1, &samples), "audio/wav");
        let options = DecodeOptions {
            max_duration_secs: Some(1.0),
        };

        let buffer = SymphoniaDecoder::new().decode(&media, &options).unwrap();
        assert_eq!(buffer.len(), 8000);
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let media = MediaInput::new(vec![0x42; 512], "audio/wav");
        let result = SymphoniaDecoder::new().decode(&media, &DecodeOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_shares_input_bytes() {
        let samples = vec![0.25f32; 800];
        let media = MediaInput::new(wav_bytes(8000, 1, &samples), "audio/wav");
        let copy = media.clone();
        assert!(Arc::ptr_eq(&media.bytes, &copy.bytes));

        SymphoniaDecoder::new()
            .decode(&media, &DecodeOptions::default())
            .unwrap();
        // The decoder's reader has been dropped, leaving the two inputs as sole owners
        assert_eq!(Arc::strong_count(&media.bytes), 2);
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_for_extension("WAV"), Some("audio/wav"));
        assert_eq!(mime_for_extension("mp4"), Some("video/mp4"));
        assert_eq!(mime_for_extension("txt"), None);

        let video = MediaInput::new(Vec::new(), "video/mp4");
        assert!(video.is_video());
        let audio = MediaInput::new(Vec::new(), "audio/mpeg");
        assert!(!audio.is_video());
    }
}
