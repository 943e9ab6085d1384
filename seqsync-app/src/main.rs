//! SEQsync - tempo and onset analysis
//!
//! Runs one analysis job on a media file and prints the result as JSON.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Mode};
use seqsync_worker::{
    AnalysisConfig, AnalysisJobController, JobEvent, JobRequest, MediaInput, PadGridSpec,
    SymphoniaDecoder,
};
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load_from(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => AnalysisConfig::load(),
    };
    if let Some(secs) = cli.max_duration {
        if !(secs.is_finite() && secs > 0.0) {
            anyhow::bail!("--max-duration must be a positive number of seconds");
        }
        config.tempo_max_duration_secs = secs;
    }

    let media = MediaInput::from_path(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    tracing::info!(
        "Input: {} ({})",
        cli.input.display(),
        media.mime_type.as_deref().unwrap_or("unknown type")
    );

    let request = match cli.mode {
        Mode::Tempo => JobRequest::tempo(media),
        Mode::Onsets => {
            let request = JobRequest::onsets(media);
            match pad_grid(&cli)? {
                Some(grid) => request.with_grid(grid),
                None => request,
            }
        }
    };

    let controller = AnalysisJobController::with_config(Arc::new(SymphoniaDecoder::new()), config);
    let handle = controller.start(request);

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")?
            .progress_chars("=>-"),
    );

    let mut onsets = 0usize;
    let result = loop {
        let Ok(event) = handle.events().recv() else {
            pb.abandon();
            anyhow::bail!("Analysis stopped without a result");
        };
        match event {
            JobEvent::Progress { percent } => pb.set_position(percent as u64),
            JobEvent::Onset(onset) => {
                onsets += 1;
                pb.set_message(format!("{onsets} onsets, last at {:.2}s", onset.time));
            }
            JobEvent::Completed(result) => {
                pb.finish_and_clear();
                break result;
            }
            JobEvent::Failed { kind, message } => {
                pb.abandon();
                anyhow::bail!("Analysis failed ({kind:?}): {message}");
            }
            JobEvent::Cancelled => {
                pb.abandon();
                anyhow::bail!("Analysis cancelled");
            }
        }
    };

    let json = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{json}");

    Ok(())
}

/// Pad grid from the command line, present only when a tempo is given
fn pad_grid(cli: &Cli) -> Result<Option<PadGridSpec>> {
    let Some(bpm) = cli.bpm else {
        return Ok(None);
    };

    let grid = PadGridSpec {
        bpm,
        time_signature: cli.time_signature,
        total_bars: cli.bars,
        pads_per_bar: cli.pads_per_bar,
    };
    if !grid.is_valid() {
        anyhow::bail!(
            "Pad grid needs a positive tempo, bar count and pads per bar, with at most {} pads",
            PadGridSpec::MAX_PADS
        );
    }
    Ok(Some(grid))
}
