//! Values handed back to the caller when a job finishes

use crate::pads::PadSlot;
use seqsync_analysis::{OnsetEvent, TempoEstimate};
use serde::Serialize;

/// Outcome of a tempo job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TempoResult {
    /// Zero when the tempo could not be determined
    pub bpm: u32,
}

impl TempoResult {
    pub fn is_indeterminate(&self) -> bool {
        self.bpm == 0
    }
}

impl From<TempoEstimate> for TempoResult {
    fn from(estimate: TempoEstimate) -> Self {
        Self { bpm: estimate.bpm }
    }
}

/// Outcome of an onset job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnsetResult {
    pub onsets: Vec<OnsetEvent>,
    /// Present when the request carried a pad grid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pads: Option<Vec<PadSlot>>,
}

/// Result of any job kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Tempo(TempoResult),
    Onsets(OnsetResult),
}

impl AnalysisResult {
    pub fn as_tempo(&self) -> Option<&TempoResult> {
        match self {
            AnalysisResult::Tempo(t) => Some(t),
            AnalysisResult::Onsets(_) => None,
        }
    }

    pub fn as_onsets(&self) -> Option<&OnsetResult> {
        match self {
            AnalysisResult::Onsets(o) => Some(o),
            AnalysisResult::Tempo(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_json() {
        let result = AnalysisResult::Tempo(TempoResult { bpm: 120 });
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"bpm":120}"#);
    }

    #[test]
    fn test_onset_json_without_pads() {
        let result = AnalysisResult::Onsets(OnsetResult {
            onsets: vec![OnsetEvent {
                time: 0.5,
                waveform: vec![1.0],
            }],
            pads: None,
        });
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"onsets":[{"time":0.5,"waveform":[1.0]}]}"#
        );
    }

    #[test]
    fn test_indeterminate() {
        let result: TempoResult = TempoEstimate::INDETERMINATE.into();
        assert!(result.is_indeterminate());
        assert!(AnalysisResult::Tempo(result).as_onsets().is_none());
    }
}
