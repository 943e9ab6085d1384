//! Analysis jobs for SEQsync - decoding, background execution, and results

mod config;
mod decoder;
mod error;
mod job;
mod pads;
mod result;

pub use config::AnalysisConfig;
pub use decoder::{
    mime_for_extension, AudioDecoder, DecodeError, DecodeOptions, MediaInput, SymphoniaDecoder,
};
pub use error::{FailureKind, JobError};
pub use job::{AnalysisJobController, JobEvent, JobHandle, JobKind, JobOutcome, JobRequest};
pub use pads::{bucket_onsets, PadGridSpec, PadSlot};
pub use result::{AnalysisResult, OnsetResult, TempoResult};
