use clap::{Parser, ValueEnum};
use seqsync_analysis::TimeSignature;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "seqsync", about = "Tempo and onset analysis for audio and video files")]
pub struct Cli {
    /// Input media file (WAV, MP3, FLAC, OGG, AAC, MP4/MOV)
    pub input: PathBuf,

    /// Analysis to run
    #[arg(short, long, value_enum, default_value_t = Mode::Tempo)]
    pub mode: Mode,

    /// Tempo of the pad grid; enables pad bucketing in onset mode
    #[arg(long)]
    pub bpm: Option<f64>,

    /// Time signature of the pad grid, e.g. 4/4 or 7/8
    #[arg(long, default_value = "4/4")]
    pub time_signature: TimeSignature,

    /// Number of bars in the pad grid
    #[arg(long, default_value_t = 4)]
    pub bars: u32,

    /// Pads per bar in the pad grid
    #[arg(long, default_value_t = 16)]
    pub pads_per_bar: u32,

    /// Seconds of audio decoded for tempo detection (overrides config)
    #[arg(long)]
    pub max_duration: Option<f64>,

    /// Analysis config file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Tempo,
    Onsets,
}
