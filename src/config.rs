//! Compiler configuration loaded from ~/.mcc/config.yaml.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dsl::EvalOptions;
use crate::music::DEFAULT_BPM;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Where exported MIDI files and scores are written.
    pub output_dir: PathBuf,
    /// Tempo for pieces that don't carry one.
    pub bpm: f64,
    /// Stream exported music to a live MIDI output port.
    pub playback: bool,
    /// Preferred MIDI output port (substring match). None = first available.
    pub midi_port: Option<String>,
    /// Fill `note`/`chord` arrays declared without an initializer.
    pub populate_array_defaults: bool,
    /// Iterations after which a `while` loop is reported as runaway.
    pub max_loop_iterations: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            bpm: DEFAULT_BPM,
            playback: false,
            midi_port: None,
            populate_array_defaults: true,
            max_loop_iterations: 100_000,
        }
    }
}

impl CompilerConfig {
    /// Standard config location.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::home_dir()?.join(".mcc").join("config.yaml"))
    }

    /// Load config from the standard path.
    /// Returns None if the file doesn't exist or doesn't parse.
    pub fn load() -> Option<Self> {
        let content = std::fs::read_to_string(Self::default_path()?).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    /// Load config from an explicit path. Unlike [`CompilerConfig::load`],
    /// a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Evaluator settings carried by this config.
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            populate_array_defaults: self.populate_array_defaults,
            max_loop_iterations: self.max_loop_iterations,
        }
    }

    /// Save config, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(io::Error::other)?;
        std::fs::write(path, yaml)
    }
}
