//! Coarse energy peak picking for tempo estimation

use crate::buffer::PcmBuffer;
use crate::energy::{compute_energy_frames, EnergyAggregator, EnergyPoint};

/// A selected energy block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Time of the loudest sample in the block, in seconds
    pub time: f64,
    /// Mean absolute energy of the block
    pub energy: f32,
}

/// Parameters for the block-based peak picker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPickerConfig {
    /// Block length in seconds, converted to samples per buffer
    pub block_secs: f64,
    /// Blocks at or below this energy are treated as silence
    pub min_energy: f32,
    /// Share of the loudest surviving blocks that are kept (0, 1]
    pub keep_fraction: f32,
}

impl Default for PeakPickerConfig {
    fn default() -> Self {
        Self {
            block_secs: 0.5,
            min_energy: 0.005,
            keep_fraction: 0.5,
        }
    }
}

impl PeakPickerConfig {
    /// Block size in samples at the given sample rate (at least one sample)
    pub fn block_size(&self, sample_rate: u32) -> usize {
        ((self.block_secs * sample_rate as f64) as usize).max(1)
    }
}

/// Pick the strongest non-overlapping energy blocks of a buffer
///
/// Returned peaks are ordered by time. Ranking by energy is only used as a
/// filter to thin out weak secondary peaks.
pub fn pick_energy_peaks(
    buffer: &PcmBuffer,
    block_size: usize,
    min_energy: f32,
    keep_fraction: f32,
) -> Vec<Peak> {
    let blocks = compute_energy_frames(buffer, block_size, block_size, EnergyAggregator::MeanAbsolute);
    select_peaks(buffer, &blocks, block_size, min_energy, keep_fraction)
}

/// Filter already-computed block energies of `buffer` down to peaks
///
/// Blocks are ranked by their mean energy, but each kept peak is placed on
/// the loudest sample inside its block so intervals are not quantized to
/// the block length.
pub fn select_peaks(
    buffer: &PcmBuffer,
    blocks: &[EnergyPoint],
    block_size: usize,
    min_energy: f32,
    keep_fraction: f32,
) -> Vec<Peak> {
    let mut survivors: Vec<&EnergyPoint> = blocks.iter().filter(|p| p.energy > min_energy).collect();

    if survivors.is_empty() {
        return Vec::new();
    }

    let keep_fraction = if keep_fraction.is_finite() {
        keep_fraction.clamp(f32::MIN_POSITIVE, 1.0)
    } else {
        1.0
    };
    let keep = ((survivors.len() as f32 * keep_fraction).ceil() as usize).clamp(1, survivors.len());

    // Stable sort keeps time order among equal energies
    survivors.sort_by(|a, b| b.energy.total_cmp(&a.energy));
    survivors.truncate(keep);
    survivors.sort_by_key(|p| p.index);

    survivors
        .into_iter()
        .map(|block| {
            let start = block.sample_position(block_size);
            let end = start.saturating_add(block_size).min(buffer.len());
            let offset = buffer.samples().get(start..end).map_or(0, loudest_offset);
            Peak {
                time: buffer.time_at(start + offset),
                energy: block.energy,
            }
        })
        .collect()
}

/// Offset of the first sample with the largest magnitude
fn loudest_offset(samples: &[f32]) -> usize {
    let mut best = 0;
    let mut loudest = 0.0f32;
    for (i, s) in samples.iter().enumerate() {
        if s.abs() > loudest {
            loudest = s.abs();
            best = i;
        }
    }
    best
}
