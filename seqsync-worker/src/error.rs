use crate::decoder::DecodeError;
use serde::Serialize;
use thiserror::Error;

/// Category of a failed job, kept separate from the human-readable message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The media could not be read or decoded
    Decode,
    /// A fault inside the analysis itself
    Internal,
}

/// Failures that end a job with an error event
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Could not decode media: {0}")]
    Decode(#[from] DecodeError),
    #[error("Analysis failed: {0}")]
    InternalFault(String),
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Decode(_) => FailureKind::Decode,
            JobError::InternalFault(_) => FailureKind::Internal,
        }
    }

    /// Build an internal fault from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unexpected panic".to_string()
        };
        JobError::InternalFault(message)
    }
}
