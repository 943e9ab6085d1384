//! Audio analysis for SEQsync
//!
//! Provides frame energy analysis, coarse peak picking and tempo voting,
//! onset detection with waveform snippets, and musical grid mapping.
//! Everything here is pure: no I/O, no threads, no panics on degenerate input.

mod buffer;
mod energy;
mod grid;
mod onset;
mod peaks;
mod tempo;
mod waveform;

pub use buffer::{AnalysisError, PcmBuffer};
pub use energy::{compute_energy_frames, frame_count, EnergyAggregator, EnergyFrames, EnergyPoint};
pub use grid::{
    sixteenth_at_time, sixteenth_index_of, time_of_sixteenth, time_per_sixteenth, to_musical_position,
    GridMapper, MusicalPosition, TimeSignature, DEFAULT_SUBDIVISIONS,
};
pub use onset::{detect_onsets, OnsetCandidate, OnsetConfig, OnsetDetector, OnsetEvent, OnsetTracker};
pub use peaks::{pick_energy_peaks, select_peaks, Peak, PeakPickerConfig};
pub use tempo::{
    estimate_from_intervals, estimate_tempo, fold_tempo, TempoBucket, TempoEstimate, TempoVoter,
    BUCKET_TOLERANCE_BPM, FOLD_MAX_BPM, FOLD_MIN_BPM,
};
pub use waveform::{render_snippet, SnippetConfig, SNIPPET_CEILING, SNIPPET_POINTS, SNIPPET_WINDOW};
