//! Analysis settings persistence for SEQsync
//!
//! Stores tunable detection parameters in a simple key=value file.

use seqsync_analysis::{OnsetConfig, PeakPickerConfig};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Tunable analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Tempo jobs only decode this many seconds
    pub tempo_max_duration_secs: f64,
    pub tempo: PeakPickerConfig,
    pub onset: OnsetConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tempo_max_duration_secs: 60.0,
            tempo: PeakPickerConfig::default(),
            onset: OnsetConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("seqsync")
            .join("analysis.txt")
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("ignoring config line without '=': {}", line);
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "tempo_max_duration_secs" => set(&mut config.tempo_max_duration_secs, key, value),
                "tempo_block_secs" => set(&mut config.tempo.block_secs, key, value),
                "tempo_min_energy" => set(&mut config.tempo.min_energy, key, value),
                "tempo_keep_fraction" => set(&mut config.tempo.keep_fraction, key, value),
                "onset_frame_size" => set(&mut config.onset.frame_size, key, value),
                "onset_hop_size" => set(&mut config.onset.hop_size, key, value),
                "onset_threshold_ratio" => set(&mut config.onset.threshold_ratio, key, value),
                "onset_refractory_samples" => set(&mut config.onset.refractory_samples, key, value),
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let lines = [
            "# SEQsync analysis configuration".to_string(),
            format!("tempo_max_duration_secs={}", self.tempo_max_duration_secs),
            format!("tempo_block_secs={}", self.tempo.block_secs),
            format!("tempo_min_energy={}", self.tempo.min_energy),
            format!("tempo_keep_fraction={}", self.tempo.keep_fraction),
            format!("onset_frame_size={}", self.onset.frame_size),
            format!("onset_hop_size={}", self.onset.hop_size),
            format!("onset_threshold_ratio={}", self.onset.threshold_ratio),
            format!("onset_refractory_samples={}", self.onset.refractory_samples),
        ];
        lines.join("\n")
    }
}

/// Overwrite `slot` with a parsed value, keeping the old one on bad input
fn set<T: FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::warn!("ignoring invalid value for {}: {:?}", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(AnalysisConfig::parse(""), AnalysisConfig::default());
    }

    #[test]
    fn test_parse_values() {
        let content = "tempo_keep_fraction=0.75\nonset_hop_size=256\ntempo_max_duration_secs=30";
        let config = AnalysisConfig::parse(content);
        assert_eq!(config.tempo.keep_fraction, 0.75);
        assert_eq!(config.onset.hop_size, 256);
        assert_eq!(config.tempo_max_duration_secs, 30.0);
        assert_eq!(config.onset.frame_size, 1024);
    }

    #[test]
    fn test_parse_with_comments_and_garbage() {
        let content = "# Comment\nonset_threshold_ratio=1.5\nnot a setting\nonset_frame_size=big\nunknown=1";
        let config = AnalysisConfig::parse(content);
        assert_eq!(config.onset.threshold_ratio, 1.5);
        assert_eq!(config.onset.frame_size, 1024);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut config = AnalysisConfig::default();
        config.tempo.block_secs = 0.25;
        config.onset.refractory_samples = 4096;

        let parsed = AnalysisConfig::parse(&config.serialize());
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("seqsync-config-test-{}", std::process::id()))
            .join("analysis.txt");
        let mut config = AnalysisConfig::default();
        config.tempo.min_energy = 0.02;

        config.save_to(&path).unwrap();
        let loaded = AnalysisConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
