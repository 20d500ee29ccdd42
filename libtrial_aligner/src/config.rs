use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::ConfigError;
use super::matcher::MatchParams;

/// Structure representing the application configuration. Contains pathing and matching parameters
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub serial_path: PathBuf,
    pub behavior_path: PathBuf,
    pub output_path: PathBuf,
    pub run_info_path: Option<PathBuf>,
    pub frame_rate: f64,
    pub trigger_column: String,
    pub bitcode_column: String,
    pub min_run: usize,
    pub safety_frames: usize,
    pub boundary_check_min_bitcodes: usize,
    pub zero_bitcode_stimulus_types: Vec<String>,
    pub shared_stimulus_order: bool,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid, matching parameters take the rig defaults
    fn default() -> Self {
        Self {
            serial_path: PathBuf::from("None"),
            behavior_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            run_info_path: None,
            frame_rate: DEFAULT_FRAME_RATE,
            trigger_column: String::from(DEFAULT_TRIGGER_COLUMN),
            bitcode_column: String::from(DEFAULT_BITCODE_COLUMN),
            min_run: DEFAULT_MIN_RUN,
            safety_frames: DEFAULT_SAFETY_FRAMES,
            boundary_check_min_bitcodes: DEFAULT_BOUNDARY_CHECK_MIN_BITCODES,
            zero_bitcode_stimulus_types: vec![String::from(DEFAULT_ZERO_BITCODE_STIMULUS)],
            shared_stimulus_order: false,
            n_threads: 1,
        }
    }
}

/// The subset of the acquisition run metadata the aligner needs
#[derive(Debug, Clone, Deserialize)]
struct RunInfo {
    frame_rate: f64,
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Frame rate of the acquisition, taken from the run metadata if given, otherwise from the config
    pub fn get_frame_rate(&self) -> Result<f64, ConfigError> {
        let rate = match &self.run_info_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::BadFilePath(path.clone()));
                }
                let json_str = std::fs::read_to_string(path)?;
                serde_json::from_str::<RunInfo>(&json_str)?.frame_rate
            }
            None => self.frame_rate,
        };
        if rate > 0.0 {
            Ok(rate)
        } else {
            Err(ConfigError::BadFrameRate(rate))
        }
    }

    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            min_run: self.min_run,
            safety_frames: self.safety_frames,
            boundary_check_min_bitcodes: self.boundary_check_min_bitcodes,
        }
    }

    /// Check if the first trial's stimulus type can legitimately display bitcode 0
    pub fn first_bitcode_can_be_zero(&self, stimulus_type: &str) -> bool {
        self.zero_bitcode_stimulus_types
            .iter()
            .any(|kind| stimulus_type.contains(kind.as_str()))
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    /// Check the matching and worker parameters before any file is touched
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_run < 1 {
            return Err(ConfigError::BadMinRun(self.min_run));
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        Ok(())
    }
}
