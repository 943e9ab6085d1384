//! Onset detection with per-onset waveform snippets
//!
//! Works on overlapping mean-square energy frames. A frame becomes an onset
//! when it is a strict local maximum, clearly louder than the frames just
//! before it, and far enough from the previous onset.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::buffer::PcmBuffer;
use crate::energy::{EnergyAggregator, EnergyFrames, EnergyPoint};
use crate::waveform::{render_snippet, SnippetConfig};

/// Onset detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetConfig {
    pub frame_size: usize,
    pub hop_size: usize,
    /// Number of preceding frames averaged for the adaptive threshold
    pub lookback: usize,
    /// A peak must exceed the local average by this factor
    pub threshold_ratio: f32,
    /// Minimum distance in samples between accepted onsets (exclusive)
    pub refractory_samples: usize,
    pub snippet: SnippetConfig,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512,
            lookback: 10,
            threshold_ratio: 1.35,
            refractory_samples: 8192,
            snippet: SnippetConfig::default(),
        }
    }
}

/// A detected onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvent {
    /// Onset time in seconds
    pub time: f64,
    /// Peak amplitude snippet, every value in [0, 1]
    pub waveform: Vec<f32>,
}

/// An accepted onset before its snippet is rendered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnsetCandidate {
    pub index: usize,
    pub time: f64,
    pub sample_position: usize,
    pub energy: f32,
}

/// Streaming peak picker over energy frames
///
/// A frame can only be judged once its right neighbour is known, so each
/// `push` evaluates the previously pushed frame.
#[derive(Debug)]
pub struct OnsetTracker {
    config: OnsetConfig,
    /// Energies strictly before `current`, newest last
    preceding: VecDeque<f32>,
    current: Option<EnergyPoint>,
    last_onset: Option<usize>,
}

impl OnsetTracker {
    pub fn new(config: OnsetConfig) -> Self {
        let lookback = config.lookback.max(1);
        Self {
            config: OnsetConfig { lookback, ..config },
            preceding: VecDeque::with_capacity(lookback),
            current: None,
            last_onset: None,
        }
    }

    /// Feed the next energy frame, returning an onset if the previous frame qualifies
    pub fn push(&mut self, next: EnergyPoint) -> Option<OnsetCandidate> {
        let mut accepted = None;

        if let Some(current) = self.current.take() {
            if let Some(&left) = self.preceding.back() {
                if current.energy > left && current.energy > next.energy {
                    accepted = self.accept(current);
                }
            }

            self.preceding.push_back(current.energy);
            if self.preceding.len() > self.config.lookback {
                self.preceding.pop_front();
            }
        }

        self.current = Some(next);
        accepted
    }

    fn accept(&mut self, peak: EnergyPoint) -> Option<OnsetCandidate> {
        let average = self.local_average(peak.energy);
        if peak.energy <= average * self.config.threshold_ratio {
            return None;
        }

        let position = peak.sample_position(self.config.hop_size);
        let clear_of_last = self
            .last_onset
            .map_or(true, |last| position.saturating_sub(last) > self.config.refractory_samples);
        if !clear_of_last {
            return None;
        }

        self.last_onset = Some(position);
        Some(OnsetCandidate {
            index: peak.index,
            time: peak.time,
            sample_position: position,
            energy: peak.energy,
        })
    }

    /// Mean of the preceding window, or `fallback` when nothing precedes
    fn local_average(&self, fallback: f32) -> f32 {
        if self.preceding.is_empty() {
            return fallback;
        }
        self.preceding.iter().sum::<f32>() / self.preceding.len() as f32
    }

    /// Clear all state so the tracker can be reused on another buffer
    pub fn reset(&mut self) {
        self.preceding.clear();
        self.current = None;
        self.last_onset = None;
    }
}

/// Batch onset detector
pub struct OnsetDetector {
    config: OnsetConfig,
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::new(OnsetConfig::default())
    }
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OnsetConfig {
        &self.config
    }

    /// Energy frames for this detector's frame and hop size
    pub fn frames<'a>(&self, buffer: &'a PcmBuffer) -> EnergyFrames<'a> {
        EnergyFrames::new(
            buffer,
            self.config.frame_size,
            self.config.hop_size,
            EnergyAggregator::MeanSquare,
        )
    }

    pub fn tracker(&self) -> OnsetTracker {
        OnsetTracker::new(self.config)
    }

    /// Render the snippet for an accepted candidate
    pub fn event_for(&self, buffer: &PcmBuffer, candidate: &OnsetCandidate) -> OnsetEvent {
        OnsetEvent {
            time: candidate.time,
            waveform: render_snippet(buffer, candidate.sample_position, &self.config.snippet),
        }
    }

    /// Detect every onset in the buffer, ordered by time
    pub fn detect(&self, buffer: &PcmBuffer) -> Vec<OnsetEvent> {
        let mut tracker = self.tracker();
        let onsets: Vec<OnsetEvent> = self
            .frames(buffer)
            .filter_map(|point| tracker.push(point))
            .map(|candidate| self.event_for(buffer, &candidate))
            .collect();

        tracing::debug!(onsets = onsets.len(), "onset detection finished");
        onsets
    }
}

/// Detect onsets with the default configuration
pub fn detect_onsets(buffer: &PcmBuffer) -> Vec<OnsetEvent> {
    OnsetDetector::default().detect(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    /// Exponentially decaying bursts starting at the given sample offsets
    fn bursts(len: usize, starts: &[usize], amplitude: f32) -> PcmBuffer {
        let mut samples = vec![0.0f32; len];
        for &start in starts {
            for n in 0..4096 {
                if let Some(s) = samples.get_mut(start + n) {
                    let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
                    *s = sign * amplitude * (-(n as f32) / 300.0).exp();
                }
            }
        }
        PcmBuffer::new(samples, SAMPLE_RATE).unwrap()
    }

    fn point(index: usize, energy: f32) -> EnergyPoint {
        EnergyPoint {
            index,
            time: index as f64 * 512.0 / SAMPLE_RATE as f64,
            energy,
        }
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let buffer = PcmBuffer::new(vec![0.0; SAMPLE_RATE as usize * 3], SAMPLE_RATE).unwrap();
        assert!(detect_onsets(&buffer).is_empty());
    }

    #[test]
    fn test_short_buffer_has_no_onsets() {
        let buffer = PcmBuffer::new(vec![0.5; 100], SAMPLE_RATE).unwrap();
        assert!(detect_onsets(&buffer).is_empty());
    }

    #[test]
    fn test_bursts_detected_at_frame_boundaries() {
        let starts = [22050, 44100, 66150, 88200];
        let buffer = bursts(SAMPLE_RATE as usize * 3, &starts, 0.9);
        let onsets = detect_onsets(&buffer);

        assert_eq!(onsets.len(), starts.len());
        for (onset, &start) in onsets.iter().zip(&starts) {
            let expected = (start / 512 * 512) as f64 / SAMPLE_RATE as f64;
            assert!((onset.time - expected).abs() < 1e-9);
            assert_eq!(onset.waveform.len(), 64);
        }
    }

    #[test]
    fn test_refractory_spacing() {
        // Bursts every 0.1s are closer than the 8192 sample refractory period
        let starts: Vec<usize> = (0..20).map(|i| 22050 + i * 4410).collect();
        let buffer = bursts(SAMPLE_RATE as usize * 4, &starts, 0.9);
        let onsets = detect_onsets(&buffer);

        assert!(!onsets.is_empty());
        assert!(onsets.len() < starts.len());
        let min_gap = 8192.0 / SAMPLE_RATE as f64;
        for pair in onsets.windows(2) {
            assert!(pair[1].time - pair[0].time >= min_gap);
        }
    }

    #[test]
    fn test_waveform_bounded_for_loud_input() {
        let buffer = bursts(SAMPLE_RATE as usize * 2, &[22050, 66150], 4.0);
        let onsets = detect_onsets(&buffer);

        assert!(!onsets.is_empty());
        for onset in &onsets {
            assert!(onset.waveform.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_plateau_is_not_a_peak() {
        let mut tracker = OnsetTracker::new(OnsetConfig::default());
        let energies = [0.0, 0.5, 0.5, 0.0];
        let found: Vec<_> = energies
            .iter()
            .enumerate()
            .filter_map(|(i, &e)| tracker.push(point(i, e)))
            .collect();
        assert!(found.is_empty());
    }

    #[test]
    fn test_threshold_against_local_average() {
        let mut tracker = OnsetTracker::new(OnsetConfig::default());
        // Steady level of 1.0 then a bump to 1.3, below 1.35x the average
        let mut energies = vec![1.0f32; 12];
        energies.extend([1.3, 1.0]);
        for (i, &e) in energies.iter().enumerate() {
            assert!(tracker.push(point(i, e)).is_none());
        }

        tracker.reset();
        let mut energies = vec![1.0f32; 12];
        energies.extend([1.4, 1.0]);
        let found: Vec<_> = energies
            .iter()
            .enumerate()
            .filter_map(|(i, &e)| tracker.push(point(i, e)))
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 12);
        assert_eq!(found[0].sample_position, 12 * 512);
    }

    #[test]
    fn test_first_frame_never_a_candidate() {
        let mut tracker = OnsetTracker::new(OnsetConfig::default());
        assert!(tracker.push(point(0, 1.0)).is_none());
        assert!(tracker.push(point(1, 0.0)).is_none());
    }

    #[test]
    fn test_onset_event_json_shape() {
        let event = OnsetEvent {
            time: 1.5,
            waveform: vec![0.0, 0.5],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["time"], 1.5);
        assert_eq!(json["waveform"][1], 0.5);
    }
}
