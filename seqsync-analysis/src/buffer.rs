//! Immutable mono PCM buffer shared by every analysis stage

use std::sync::Arc;
use thiserror::Error;

/// Errors raised when constructing analysis inputs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

/// Mono PCM samples plus their sample rate
///
/// Samples live behind an `Arc` so a job can hand the same buffer to several
/// passes without copying. The buffer is never mutated after construction.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Create a buffer from decoded mono samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate);
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Raw samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert a sample offset to seconds
    pub fn time_at(&self, sample: usize) -> f64 {
        sample as f64 / self.sample_rate as f64
    }

    /// A copy limited to the first `max_secs` seconds (or the whole buffer if shorter)
    pub fn truncated(&self, max_secs: f64) -> Self {
        if !max_secs.is_finite() || max_secs < 0.0 {
            return self.clone();
        }
        let limit = (max_secs * self.sample_rate as f64) as usize;
        if limit >= self.samples.len() {
            return self.clone();
        }
        Self {
            samples: self.samples[..limit].into(),
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert_eq!(
            PcmBuffer::new(vec![0.0; 10], 0).unwrap_err(),
            AnalysisError::InvalidSampleRate
        );
    }

    #[test]
    fn test_duration() {
        let buffer = PcmBuffer::new(vec![0.0; 22050], 44100).unwrap();
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
        assert!((buffer.time_at(4410) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_truncated() {
        let buffer = PcmBuffer::new(vec![0.5; 1000], 100).unwrap();
        let short = buffer.truncated(2.0);
        assert_eq!(short.len(), 200);
        assert_eq!(short.sample_rate(), 100);

        // Longer than the buffer keeps everything
        assert_eq!(buffer.truncated(60.0).len(), 1000);
    }
}
