//! Bucketing onsets onto a fixed pad grid
//!
//! A sequence is laid out as `total_bars * pads_per_bar` equally sized pads.
//! Each pad records which onsets start inside it.

use seqsync_analysis::{GridMapper, MusicalPosition, OnsetEvent, TimeSignature};
use serde::{Deserialize, Serialize};

/// Grid a job's onsets are placed on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PadGridSpec {
    pub bpm: f64,
    pub time_signature: TimeSignature,
    pub total_bars: u32,
    pub pads_per_bar: u32,
}

impl PadGridSpec {
    /// Largest grid that is laid out
    pub const MAX_PADS: u64 = 65_536;

    pub fn is_valid(&self) -> bool {
        self.bpm.is_finite()
            && self.bpm > 0.0
            && self.total_bars > 0
            && self.pads_per_bar > 0
            && self.total_bars as u64 * self.pads_per_bar as u64 <= Self::MAX_PADS
    }

    /// Number of pads, zero for an invalid grid
    pub fn total_pads(&self) -> usize {
        if !self.is_valid() {
            return 0;
        }
        self.total_bars as usize * self.pads_per_bar as usize
    }

    pub fn mapper(&self) -> GridMapper {
        GridMapper::from_time_signature(self.bpm, self.time_signature)
    }

    /// Seconds covered by one pad
    pub fn pad_duration(&self) -> f64 {
        if self.pads_per_bar == 0 {
            return 0.0;
        }
        self.mapper().bar_duration() / self.pads_per_bar as f64
    }

    /// Pad containing `time`, if it falls inside the grid
    pub fn pad_at(&self, time: f64) -> Option<usize> {
        if !self.is_valid() || !time.is_finite() || time < 0.0 {
            return None;
        }
        let duration = self.pad_duration();
        if duration <= 0.0 {
            return None;
        }
        let index = (time / duration).floor() as usize;
        (index < self.total_pads()).then_some(index)
    }
}

/// One pad and the onsets that fall into it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadSlot {
    pub index: usize,
    /// One-based bar number
    pub bar: u32,
    /// One-based pad number within the bar
    pub step: u32,
    pub start_secs: f64,
    /// Grid position of the pad's start
    pub position: MusicalPosition,
    /// Indices into the onset list
    pub onsets: Vec<usize>,
}

/// Lay out every pad of the grid and assign onsets to them
///
/// Onsets past the final pad are left unassigned. An invalid grid has no pads.
pub fn bucket_onsets(spec: &PadGridSpec, onsets: &[OnsetEvent]) -> Vec<PadSlot> {
    if !spec.is_valid() {
        return Vec::new();
    }

    let mapper = spec.mapper();
    let duration = spec.pad_duration();
    let pads_per_bar = spec.pads_per_bar as usize;

    let mut pads: Vec<PadSlot> = (0..spec.total_pads())
        .map(|index| {
            let start_secs = index as f64 * duration;
            PadSlot {
                index,
                bar: (index / pads_per_bar + 1) as u32,
                step: (index % pads_per_bar + 1) as u32,
                start_secs,
                position: mapper.position_at(start_secs),
                onsets: Vec::new(),
            }
        })
        .collect();

    for (onset_index, onset) in onsets.iter().enumerate() {
        if let Some(pad) = spec.pad_at(onset.time) {
            pads[pad].onsets.push(onset_index);
        }
    }

    pads
}
