//! Background analysis jobs with progress reporting and cancellation
//!
//! Each job runs on its own thread and owns its decoded buffer. The caller
//! only sees [`JobEvent`]s arriving on a channel: progress, partial onsets,
//! and exactly one terminal event.

use crate::config::AnalysisConfig;
use crate::decoder::{AudioDecoder, DecodeOptions, MediaInput, SymphoniaDecoder};
use crate::error::{FailureKind, JobError};
use crate::pads::{bucket_onsets, PadGridSpec};
use crate::result::{AnalysisResult, OnsetResult, TempoResult};
use crossbeam_channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use seqsync_analysis::{
    estimate_tempo, select_peaks, EnergyAggregator, EnergyFrames, OnsetDetector, OnsetEvent,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Which analysis a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Block peaks and interval voting
    Tempo,
    /// Onsets with waveform snippets
    Onsets,
}

/// Everything a job needs to run
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub media: MediaInput,
    pub kind: JobKind,
    /// Pad grid for onset bucketing (ignored by tempo jobs)
    pub grid: Option<PadGridSpec>,
}

impl JobRequest {
    pub fn tempo(media: MediaInput) -> Self {
        Self {
            media,
            kind: JobKind::Tempo,
            grid: None,
        }
    }

    pub fn onsets(media: MediaInput) -> Self {
        Self {
            media,
            kind: JobKind::Onsets,
            grid: None,
        }
    }

    pub fn with_grid(mut self, grid: PadGridSpec) -> Self {
        self.grid = Some(grid);
        self
    }
}

/// Events sent from a running job
///
/// Serializes without a tag: `{"progress":42.0}`,
/// `{"kind":"decode","message":"..."}`, an onset or result object, or `null`
/// for cancellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobEvent {
    /// Share of the work done, strictly increasing within a job
    Progress {
        #[serde(rename = "progress")]
        percent: f32,
    },
    /// An onset accepted while the job is still running
    Onset(OnsetEvent),
    /// Final result
    Completed(AnalysisResult),
    /// The job failed; no result follows
    Failed { kind: FailureKind, message: String },
    /// The job stopped on request and discarded its partial results
    Cancelled,
}

impl JobEvent {
    /// Whether this is the last event of a job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::Completed(_) | JobEvent::Failed { .. } | JobEvent::Cancelled
        )
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(AnalysisResult),
    Failed { kind: FailureKind, message: String },
    Cancelled,
}

#[derive(Debug)]
struct EmitterState {
    cancelled: bool,
    finished: bool,
    last_percent: f32,
}

/// Job side of the event channel
///
/// Sends happen under the same lock that `cancel` takes, so once `cancel`
/// returns nothing but the cancellation acknowledgement can follow.
#[derive(Debug)]
struct Emitter {
    tx: Sender<JobEvent>,
    state: Mutex<EmitterState>,
}

impl Emitter {
    fn new(tx: Sender<JobEvent>) -> Self {
        Self {
            tx,
            state: Mutex::new(EmitterState {
                cancelled: false,
                finished: false,
                last_percent: 0.0,
            }),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.finished || state.cancelled {
            return false;
        }
        state.cancelled = true;
        true
    }

    fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    fn progress(&self, percent: f32) {
        let mut state = self.state.lock();
        if state.cancelled || state.finished {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent > state.last_percent {
            state.last_percent = percent;
            let _ = self.tx.send(JobEvent::Progress { percent });
        }
    }

    fn onset(&self, event: OnsetEvent) {
        let state = self.state.lock();
        if state.cancelled || state.finished {
            return;
        }
        let _ = self.tx.send(JobEvent::Onset(event));
    }

    /// Send the terminal event; a pending cancellation wins over any result
    fn finish(&self, outcome: Result<Option<AnalysisResult>, JobError>) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;

        let event = if state.cancelled {
            JobEvent::Cancelled
        } else {
            match outcome {
                Ok(Some(result)) => JobEvent::Completed(result),
                Ok(None) => JobEvent::Cancelled,
                Err(e) => JobEvent::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            }
        };
        let _ = self.tx.send(event);
    }
}

/// Whole-number progress for `done` of `total` steps
fn percent_of(done: usize, total: usize) -> f32 {
    if total == 0 {
        return 100.0;
    }
    ((done as f64 / total as f64) * 100.0).floor() as f32
}

/// Caller side of a running job
pub struct JobHandle {
    id: u64,
    events: Receiver<JobEvent>,
    emitter: Arc<Emitter>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Event stream of this job
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Request cancellation
    ///
    /// Safe to call repeatedly or after the job has finished. Once this
    /// returns, no further progress, onset or result event is sent.
    pub fn cancel(&self) {
        if self.emitter.cancel() {
            tracing::debug!(job = self.id, "cancellation requested");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.emitter.is_finished()
    }

    /// Block until the job ends, discarding intermediate events
    pub fn wait(mut self) -> JobOutcome {
        let mut outcome = JobOutcome::Failed {
            kind: FailureKind::Internal,
            message: "job ended without a result".to_string(),
        };
        for event in self.events.iter() {
            match event {
                JobEvent::Completed(result) => {
                    outcome = JobOutcome::Completed(result);
                    break;
                }
                JobEvent::Failed { kind, message } => {
                    outcome = JobOutcome::Failed { kind, message };
                    break;
                }
                JobEvent::Cancelled => {
                    outcome = JobOutcome::Cancelled;
                    break;
                }
                JobEvent::Progress { .. } | JobEvent::Onset(_) => {}
            }
        }

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        outcome
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts analysis jobs on background threads
pub struct AnalysisJobController {
    decoder: Arc<dyn AudioDecoder>,
    config: AnalysisConfig,
    next_id: AtomicU64,
    step_pause: Option<Duration>,
}

impl Default for AnalysisJobController {
    fn default() -> Self {
        Self::new(Arc::new(SymphoniaDecoder::new()))
    }
}

impl AnalysisJobController {
    /// Create a controller around a host-supplied decoder
    pub fn new(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self::with_config(decoder, AnalysisConfig::default())
    }

    pub fn with_config(decoder: Arc<dyn AudioDecoder>, config: AnalysisConfig) -> Self {
        Self {
            decoder,
            config,
            next_id: AtomicU64::new(1),
            step_pause: None,
        }
    }

    /// Sleep between frames, so tests can observe a job mid-flight
    #[cfg(test)]
    pub(crate) fn with_step_pause(mut self, pause: Duration) -> Self {
        self.step_pause = Some(pause);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Start a job and return its handle immediately
    pub fn start(&self, request: JobRequest) -> JobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = crossbeam_channel::unbounded();
        let emitter = Arc::new(Emitter::new(tx));

        let worker = JobWorker {
            id,
            decoder: Arc::clone(&self.decoder),
            config: self.config.clone(),
            step_pause: self.step_pause,
            emitter: Arc::clone(&emitter),
        };

        tracing::info!(job = id, kind = ?request.kind, bytes = request.media.bytes.len(), "starting analysis job");

        let thread = thread::Builder::new()
            .name(format!("seqsync-job-{id}"))
            .spawn(move || worker.run(request));

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                emitter.finish(Err(JobError::InternalFault(format!(
                    "could not spawn worker thread: {e}"
                ))));
                None
            }
        };

        JobHandle {
            id,
            events: rx,
            emitter,
            thread,
        }
    }

    /// Run a job to completion on a worker thread, blocking the caller
    pub fn run(&self, request: JobRequest) -> JobOutcome {
        self.start(request).wait()
    }
}

/// State moved onto the worker thread
struct JobWorker {
    id: u64,
    decoder: Arc<dyn AudioDecoder>,
    config: AnalysisConfig,
    step_pause: Option<Duration>,
    emitter: Arc<Emitter>,
}

impl JobWorker {
    fn run(self, request: JobRequest) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&request)))
            .unwrap_or_else(|payload| Err(JobError::from_panic(payload)));

        match &outcome {
            Ok(Some(_)) => tracing::info!(job = self.id, "analysis job completed"),
            Ok(None) => tracing::info!(job = self.id, "analysis job cancelled"),
            Err(e) => tracing::warn!(job = self.id, "analysis job failed: {}", e),
        }

        self.emitter.finish(outcome);
    }

    /// Returns `Ok(None)` when cancelled; the buffer is dropped on return
    fn execute(&self, request: &JobRequest) -> Result<Option<AnalysisResult>, JobError> {
        if self.emitter.is_cancelled() {
            return Ok(None);
        }

        match request.kind {
            JobKind::Tempo => self.tempo(&request.media),
            JobKind::Onsets => self.onsets(&request.media, request.grid.as_ref()),
        }
    }

    fn pause(&self) {
        if let Some(pause) = self.step_pause {
            thread::sleep(pause);
        }
    }

    fn tempo(&self, media: &MediaInput) -> Result<Option<AnalysisResult>, JobError> {
        let options = DecodeOptions {
            max_duration_secs: Some(self.config.tempo_max_duration_secs),
        };
        let buffer = self.decoder.decode(media, &options)?;
        if self.emitter.is_cancelled() {
            return Ok(None);
        }

        let picker = &self.config.tempo;
        let block_size = picker.block_size(buffer.sample_rate());
        let frames = EnergyFrames::new(&buffer, block_size, block_size, EnergyAggregator::MeanAbsolute);
        let total = frames.total();

        let mut blocks = Vec::with_capacity(total);
        for (done, block) in frames.enumerate() {
            if self.emitter.is_cancelled() {
                return Ok(None);
            }
            blocks.push(block);
            self.emitter.progress(percent_of(done + 1, total));
            self.pause();
        }

        let peaks = select_peaks(&buffer, &blocks, block_size, picker.min_energy, picker.keep_fraction);
        let estimate = estimate_tempo(&peaks);
        tracing::debug!(
            job = self.id,
            blocks = total,
            peaks = peaks.len(),
            bpm = estimate.bpm,
            "tempo estimated"
        );

        self.emitter.progress(100.0);
        Ok(Some(AnalysisResult::Tempo(TempoResult::from(estimate))))
    }

    fn onsets(
        &self,
        media: &MediaInput,
        grid: Option<&PadGridSpec>,
    ) -> Result<Option<AnalysisResult>, JobError> {
        let buffer = self.decoder.decode(media, &DecodeOptions::default())?;
        if self.emitter.is_cancelled() {
            return Ok(None);
        }

        let detector = OnsetDetector::new(self.config.onset);
        let mut tracker = detector.tracker();
        let frames = detector.frames(&buffer);
        let total = frames.total();

        let mut onsets = Vec::new();
        for (done, point) in frames.enumerate() {
            if self.emitter.is_cancelled() {
                return Ok(None);
            }
            if let Some(candidate) = tracker.push(point) {
                let event = detector.event_for(&buffer, &candidate);
                self.emitter.onset(event.clone());
                onsets.push(event);
            }
            self.emitter.progress(percent_of(done + 1, total));
            self.pause();
        }

        let pads = grid.map(|spec| bucket_onsets(spec, &onsets));
        tracing::debug!(job = self.id, frames = total, onsets = onsets.len(), "onsets detected");

        self.emitter.progress(100.0);
        Ok(Some(AnalysisResult::Onsets(OnsetResult { onsets, pads })))
    }
}
