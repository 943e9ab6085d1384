//! Frame energy analysis
//!
//! Slides a fixed window over a [`PcmBuffer`] and reduces each window to a
//! single loudness value. Both detection paths build on this: the tempo path
//! uses non-overlapping blocks with mean-absolute energy, the onset path uses
//! overlapping frames with mean-square energy.

use crate::buffer::PcmBuffer;

/// How samples in a frame are reduced to one energy value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyAggregator {
    /// Mean of squared samples (no square root)
    #[default]
    MeanSquare,
    /// Mean of absolute sample values
    MeanAbsolute,
}

impl EnergyAggregator {
    /// Reduce a frame of samples to its energy
    pub fn apply(self, frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum: f32 = match self {
            EnergyAggregator::MeanSquare => frame.iter().map(|s| s * s).sum(),
            EnergyAggregator::MeanAbsolute => frame.iter().map(|s| s.abs()).sum(),
        };
        sum / frame.len() as f32
    }
}

/// Energy of one analysis frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyPoint {
    /// Frame number
    pub index: usize,
    /// Frame start in seconds
    pub time: f64,
    /// Aggregated energy (never negative)
    pub energy: f32,
}

impl EnergyPoint {
    /// First sample of this frame for a given hop size
    pub fn sample_position(&self, hop_size: usize) -> usize {
        self.index * hop_size
    }
}

/// Iterator over the energy frames of a buffer
///
/// The final partial frame is dropped rather than zero-padded.
pub struct EnergyFrames<'a> {
    buffer: &'a PcmBuffer,
    frame_size: usize,
    hop_size: usize,
    aggregator: EnergyAggregator,
    next_index: usize,
    total: usize,
}

impl<'a> EnergyFrames<'a> {
    pub fn new(
        buffer: &'a PcmBuffer,
        frame_size: usize,
        hop_size: usize,
        aggregator: EnergyAggregator,
    ) -> Self {
        let total = frame_count(buffer.len(), frame_size, hop_size);
        Self {
            buffer,
            frame_size,
            hop_size,
            aggregator,
            next_index: 0,
            total,
        }
    }

    /// Total number of frames this iterator produces
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for EnergyFrames<'_> {
    type Item = EnergyPoint;

    fn next(&mut self) -> Option<EnergyPoint> {
        if self.next_index >= self.total {
            return None;
        }
        let index = self.next_index;
        let start = index * self.hop_size;
        let frame = &self.buffer.samples()[start..start + self.frame_size];
        self.next_index += 1;

        Some(EnergyPoint {
            index,
            time: self.buffer.time_at(start),
            energy: self.aggregator.apply(frame),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EnergyFrames<'_> {}

/// Number of complete frames that fit in `len` samples
pub fn frame_count(len: usize, frame_size: usize, hop_size: usize) -> usize {
    if frame_size == 0 || hop_size == 0 || len < frame_size {
        return 0;
    }
    (len - frame_size) / hop_size + 1
}

/// Compute the energy of every complete frame in the buffer
pub fn compute_energy_frames(
    buffer: &PcmBuffer,
    frame_size: usize,
    hop_size: usize,
    aggregator: EnergyAggregator,
) -> Vec<EnergyPoint> {
    EnergyFrames::new(buffer, frame_size, hop_size, aggregator).collect()
}
