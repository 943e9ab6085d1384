//! Musical grid mapping between wall-clock time and bar/beat/sub-beat positions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of grid steps per beat (sixteenth notes in 4/4)
pub const DEFAULT_SUBDIVISIONS: i32 = 4;

/// One-based position on the musical grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MusicalPosition {
    pub bar: u32,
    pub beat: u32,
    pub subbeat: u32,
}

impl MusicalPosition {
    /// First sub-beat of the first bar
    pub const START: MusicalPosition = MusicalPosition {
        bar: 1,
        beat: 1,
        subbeat: 1,
    };
}

impl Default for MusicalPosition {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for MusicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.bar, self.beat, self.subbeat)
    }
}

/// Time signature such as 4/4 or 3/4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats_per_bar: u32,
    pub beat_unit: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats_per_bar: 4,
            beat_unit: 4,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.beat_unit)
    }
}

impl FromStr for TimeSignature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (top, bottom) = s
            .split_once('/')
            .ok_or_else(|| format!("Time signature must look like 4/4, got {s:?}"))?;
        let beats_per_bar: u32 = top
            .trim()
            .parse()
            .map_err(|_| format!("Invalid beats per bar in {s:?}"))?;
        let beat_unit: u32 = bottom
            .trim()
            .parse()
            .map_err(|_| format!("Invalid beat unit in {s:?}"))?;
        if beats_per_bar == 0 || beat_unit == 0 {
            return Err(format!("Time signature parts must be positive, got {s:?}"));
        }
        Ok(Self {
            beats_per_bar,
            beat_unit,
        })
    }
}

/// Map a global sixteenth index to a bar/beat/sub-beat position
///
/// Degenerate input falls back to [`MusicalPosition::START`].
pub fn to_musical_position(
    global_sixteenth: i64,
    bpm: f64,
    beats_per_bar: i32,
    subdivisions_per_beat: i32,
) -> MusicalPosition {
    if !bpm.is_finite() || bpm <= 0.0 || beats_per_bar <= 0 || subdivisions_per_beat <= 0 || global_sixteenth < 0 {
        return MusicalPosition::START;
    }

    let subdivisions = subdivisions_per_beat as i64;
    let sixteenths_per_bar = beats_per_bar as i64 * subdivisions;
    let into_bar = global_sixteenth % sixteenths_per_bar;

    // Bars past u32::MAX have no representable position
    let Ok(bar) = u32::try_from(global_sixteenth / sixteenths_per_bar + 1) else {
        return MusicalPosition::START;
    };

    // Both are bounded by the positive i32 meter arguments
    MusicalPosition {
        bar,
        beat: (into_bar / subdivisions + 1) as u32,
        subbeat: (into_bar % subdivisions + 1) as u32,
    }
}

/// Recover the global sixteenth index of a position
///
/// Returns `None` for positions that do not fit the given meter.
pub fn sixteenth_index_of(
    position: MusicalPosition,
    beats_per_bar: i32,
    subdivisions_per_beat: i32,
) -> Option<i64> {
    if beats_per_bar <= 0 || subdivisions_per_beat <= 0 {
        return None;
    }
    if position.bar == 0
        || position.beat == 0
        || position.subbeat == 0
        || position.beat as i64 > beats_per_bar as i64
        || position.subbeat as i64 > subdivisions_per_beat as i64
    {
        return None;
    }

    let subdivisions = subdivisions_per_beat as i64;
    Some(
        (position.bar as i64 - 1) * beats_per_bar as i64 * subdivisions
            + (position.beat as i64 - 1) * subdivisions
            + (position.subbeat as i64 - 1),
    )
}

/// Seconds per grid step, or `None` for a non-positive tempo
pub fn time_per_sixteenth(bpm: f64, subdivisions_per_beat: i32) -> Option<f64> {
    if !bpm.is_finite() || bpm <= 0.0 || subdivisions_per_beat <= 0 {
        return None;
    }
    Some((60.0 / bpm) / subdivisions_per_beat as f64)
}

/// Grid step containing `time` (negative or degenerate input maps to 0)
pub fn sixteenth_at_time(time: f64, bpm: f64, subdivisions_per_beat: i32) -> i64 {
    match time_per_sixteenth(bpm, subdivisions_per_beat) {
        Some(step) if time.is_finite() && time > 0.0 => (time / step).floor() as i64,
        _ => 0,
    }
}

/// Start time of a grid step in seconds
pub fn time_of_sixteenth(global_sixteenth: i64, bpm: f64, subdivisions_per_beat: i32) -> f64 {
    match time_per_sixteenth(bpm, subdivisions_per_beat) {
        Some(step) if global_sixteenth > 0 => global_sixteenth as f64 * step,
        _ => 0.0,
    }
}

/// Grid parameters bundled for repeated conversions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMapper {
    pub bpm: f64,
    pub beats_per_bar: i32,
    pub subdivisions_per_beat: i32,
}

impl GridMapper {
    pub fn new(bpm: f64, beats_per_bar: i32) -> Self {
        Self::with_subdivisions(bpm, beats_per_bar, DEFAULT_SUBDIVISIONS)
    }

    pub fn with_subdivisions(bpm: f64, beats_per_bar: i32, subdivisions_per_beat: i32) -> Self {
        Self {
            bpm,
            beats_per_bar,
            subdivisions_per_beat,
        }
    }

    pub fn from_time_signature(bpm: f64, signature: TimeSignature) -> Self {
        Self::new(bpm, signature.beats_per_bar.min(i32::MAX as u32) as i32)
    }

    /// Whether conversions produce meaningful positions
    pub fn is_valid(&self) -> bool {
        self.bpm.is_finite() && self.bpm > 0.0 && self.beats_per_bar > 0 && self.subdivisions_per_beat > 0
    }

    pub fn position_of(&self, global_sixteenth: i64) -> MusicalPosition {
        to_musical_position(global_sixteenth, self.bpm, self.beats_per_bar, self.subdivisions_per_beat)
    }

    pub fn index_of(&self, position: MusicalPosition) -> Option<i64> {
        sixteenth_index_of(position, self.beats_per_bar, self.subdivisions_per_beat)
    }

    pub fn sixteenth_at(&self, time: f64) -> i64 {
        sixteenth_at_time(time, self.bpm, self.subdivisions_per_beat)
    }

    pub fn time_of(&self, global_sixteenth: i64) -> f64 {
        time_of_sixteenth(global_sixteenth, self.bpm, self.subdivisions_per_beat)
    }

    /// Musical position of a wall-clock time
    pub fn position_at(&self, time: f64) -> MusicalPosition {
        self.position_of(self.sixteenth_at(time))
    }

    /// Seconds per beat, zero when the tempo is invalid
    pub fn beat_duration(&self) -> f64 {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            60.0 / self.bpm
        } else {
            0.0
        }
    }

    /// Seconds per bar, zero when the grid is invalid
    pub fn bar_duration(&self) -> f64 {
        if self.beats_per_bar > 0 {
            self.beat_duration() * self.beats_per_bar as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_20_in_four_four() {
        let position = to_musical_position(20, 120.0, 4, 4);
        assert_eq!(
            position,
            MusicalPosition {
                bar: 2,
                beat: 2,
                subbeat: 1
            }
        );
    }

    #[test]
    fn test_degenerate_inputs_fall_back() {
        assert_eq!(to_musical_position(20, 0.0, 4, 4), MusicalPosition::START);
        assert_eq!(to_musical_position(20, -120.0, 4, 4), MusicalPosition::START);
        assert_eq!(to_musical_position(20, f64::NAN, 4, 4), MusicalPosition::START);
        assert_eq!(to_musical_position(20, 120.0, 0, 4), MusicalPosition::START);
        assert_eq!(to_musical_position(20, 120.0, 4, 0), MusicalPosition::START);
        assert_eq!(to_musical_position(-1, 120.0, 4, 4), MusicalPosition::START);
    }

    #[test]
    fn test_huge_index_does_not_wrap() {
        assert_eq!(to_musical_position(i64::MAX, 120.0, 4, 4), MusicalPosition::START);

        // The last representable bar still maps exactly
        let last_bar_start = (u32::MAX as i64 - 1) * 16;
        let position = to_musical_position(last_bar_start + 5, 120.0, 4, 4);
        assert_eq!(position, MusicalPosition { bar: u32::MAX, beat: 2, subbeat: 2 });

        assert_eq!(to_musical_position(u32::MAX as i64 * 16, 120.0, 4, 4), MusicalPosition::START);
    }

    #[test]
    fn test_round_trip() {
        for (beats_per_bar, subdivisions) in [(4, 4), (3, 4), (7, 2), (6, 3)] {
            for index in 0..500 {
                let position = to_musical_position(index, 96.0, beats_per_bar, subdivisions);
                assert_eq!(sixteenth_index_of(position, beats_per_bar, subdivisions), Some(index));
            }
        }
    }

    #[test]
    fn test_index_of_rejects_out_of_meter() {
        let position = MusicalPosition {
            bar: 1,
            beat: 5,
            subbeat: 1,
        };
        assert_eq!(sixteenth_index_of(position, 4, 4), None);
        assert_eq!(sixteenth_index_of(MusicalPosition::START, 0, 4), None);
    }

    #[test]
    fn test_time_conversions() {
        // 120 BPM: 0.5s per beat, 0.125s per sixteenth
        assert_eq!(time_per_sixteenth(120.0, 4), Some(0.125));
        assert_eq!(sixteenth_at_time(2.5, 120.0, 4), 20);
        assert_eq!(sixteenth_at_time(2.51, 120.0, 4), 20);
        assert_eq!(sixteenth_at_time(-1.0, 120.0, 4), 0);
        assert_eq!(sixteenth_at_time(2.5, 0.0, 4), 0);
        assert!((time_of_sixteenth(20, 120.0, 4) - 2.5).abs() < 1e-12);
        assert_eq!(time_per_sixteenth(0.0, 4), None);
    }

    #[test]
    fn test_mapper_position_at_time() {
        let mapper = GridMapper::new(120.0, 4);
        assert!(mapper.is_valid());
        assert_eq!(mapper.position_at(2.5).to_string(), "2.2.1");
        assert_eq!(mapper.position_at(0.0), MusicalPosition::START);
        assert!((mapper.bar_duration() - 2.0).abs() < 1e-12);
        assert!((mapper.beat_duration() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_time_signature_parse() {
        let sig: TimeSignature = "3/4".parse().unwrap();
        assert_eq!(sig.beats_per_bar, 3);
        assert_eq!(sig.beat_unit, 4);
        assert_eq!(sig.to_string(), "3/4");
        assert!(" 6 / 8 ".parse::<TimeSignature>().is_ok());
        assert!("4".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("x/4".parse::<TimeSignature>().is_err());

        let mapper = GridMapper::from_time_signature(100.0, sig);
        assert_eq!(mapper.beats_per_bar, 3);
        assert_eq!(mapper.subdivisions_per_beat, DEFAULT_SUBDIVISIONS);
    }
}
