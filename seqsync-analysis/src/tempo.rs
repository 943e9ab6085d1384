//! Tempo estimation by inter-peak interval voting
//!
//! Every interval between adjacent peaks is converted to a tempo and folded
//! by octaves into a canonical band, so quarter, eighth and half-note readings
//! of the same rhythm vote for the same bucket.

use crate::peaks::Peak;
use serde::Serialize;

/// Lower edge of the folding band (inclusive)
pub const FOLD_MIN_BPM: f64 = 70.0;
/// Upper edge of the folding band (exclusive)
pub const FOLD_MAX_BPM: f64 = 140.0;
/// Two tempos closer than this share a bucket
pub const BUCKET_TOLERANCE_BPM: f64 = 10.0;

/// Final tempo estimate; a BPM of zero means the tempo could not be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TempoEstimate {
    pub bpm: u32,
}

impl TempoEstimate {
    pub const INDETERMINATE: TempoEstimate = TempoEstimate { bpm: 0 };

    pub fn is_indeterminate(&self) -> bool {
        self.bpm == 0
    }
}

/// A group of folded tempos within the tolerance window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoBucket {
    /// Folded tempo of the first interval that opened the bucket
    pub tempo: f64,
    pub count: u32,
}

/// Fold a tempo by octaves into `[FOLD_MIN_BPM, FOLD_MAX_BPM)`
///
/// Returns `None` for non-positive or non-finite input.
pub fn fold_tempo(bpm: f64) -> Option<f64> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return None;
    }
    let mut tempo = bpm;
    while tempo < FOLD_MIN_BPM {
        tempo *= 2.0;
    }
    while tempo >= FOLD_MAX_BPM {
        tempo /= 2.0;
    }
    Some(tempo)
}

/// Ordered bucket accumulator
///
/// Buckets are scanned in insertion order and the first one within tolerance
/// takes the vote, so the outcome only depends on the order of the intervals.
#[derive(Debug, Default)]
pub struct TempoVoter {
    buckets: Vec<TempoBucket>,
}

impl TempoVoter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vote for the tempo implied by an interval in milliseconds
    ///
    /// Non-positive intervals are ignored.
    pub fn add_interval_ms(&mut self, interval_ms: f64) {
        if interval_ms.is_nan() || interval_ms <= 0.0 {
            return;
        }
        let Some(tempo) = fold_tempo(60_000.0 / interval_ms) else {
            return;
        };

        match self
            .buckets
            .iter_mut()
            .find(|b| (b.tempo - tempo).abs() < BUCKET_TOLERANCE_BPM)
        {
            Some(bucket) => bucket.count += 1,
            None => self.buckets.push(TempoBucket { tempo, count: 1 }),
        }
    }

    /// Buckets in insertion order
    pub fn buckets(&self) -> &[TempoBucket] {
        &self.buckets
    }

    /// Buckets ordered by count, ties keeping insertion order
    pub fn ranked(&self) -> Vec<TempoBucket> {
        let mut ranked = self.buckets.clone();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }

    /// Bucket with the most votes, first-encountered on ties
    pub fn winner(&self) -> Option<TempoBucket> {
        self.ranked().into_iter().next()
    }

    pub fn estimate(&self) -> TempoEstimate {
        match self.winner() {
            Some(bucket) => TempoEstimate {
                bpm: bucket.tempo.round() as u32,
            },
            None => TempoEstimate::INDETERMINATE,
        }
    }
}

/// Estimate tempo from time-ordered peaks
pub fn estimate_tempo(peaks: &[Peak]) -> TempoEstimate {
    let intervals: Vec<f64> = peaks
        .windows(2)
        .map(|w| (w[1].time - w[0].time) * 1000.0)
        .collect();
    estimate_from_intervals(&intervals)
}

/// Estimate tempo from inter-peak intervals in milliseconds
pub fn estimate_from_intervals(intervals_ms: &[f64]) -> TempoEstimate {
    let mut voter = TempoVoter::new();
    for &interval in intervals_ms {
        voter.add_interval_ms(interval);
    }

    let estimate = voter.estimate();
    tracing::debug!(
        intervals = intervals_ms.len(),
        buckets = voter.buckets().len(),
        bpm = estimate.bpm,
        "tempo vote finished"
    );
    estimate
}
