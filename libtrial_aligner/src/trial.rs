use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::BehaviorLogError;

/// A single trial as described by the behavior-log parser.
///
/// The id is the key the trial was stored under and is not part of the descriptor content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDescriptor {
    #[serde(skip)]
    pub trial_id: u32,
    pub all_bitcodes: Vec<i64>,
    #[serde(alias = "stim_on_times")]
    pub stim_on_time_ms: f64,
    #[serde(alias = "stim_off_times")]
    pub stim_off_time_ms: f64,
    #[serde(alias = "iti_duration")]
    pub iti_duration_ms: f64,
    #[serde(default)]
    pub start_time_ms: f64,
    #[serde(default)]
    pub end_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_idx: Option<usize>,
    #[serde(alias = "stimuli")]
    pub stimulus_metadata: serde_json::Value,
}

impl TrialDescriptor {
    pub fn stim_duration_ms(&self) -> f64 {
        self.stim_off_time_ms - self.stim_on_time_ms
    }

    /// The stimulus `type` entry of the metadata, empty if absent
    pub fn stimulus_type(&self) -> &str {
        self.stimulus_metadata
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("")
    }

    /// Stable content hash of the descriptor.
    ///
    /// The descriptor is serialized with sorted keys, so the hash only depends on content.
    pub fn content_hash(&self) -> Result<String, serde_json::Error> {
        // Value maps are ordered, which sorts the keys at every nesting level
        let canonical = serde_json::to_string(&serde_json::to_value(self)?)?;
        Ok(sha256_hex(canonical.as_bytes()))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// The parsed trials of one behavior recording, ordered by trial id
#[derive(Debug, Clone, Default)]
pub struct BehaviorLog {
    pub path: PathBuf,
    trials: BTreeMap<u32, TrialDescriptor>,
}

impl BehaviorLog {
    /// Read a parsed behavior log (JSON object of trial id to descriptor)
    pub fn read(path: &Path) -> Result<Self, BehaviorLogError> {
        if !path.exists() {
            return Err(BehaviorLogError::BadFilePath(path.to_path_buf()));
        }
        let json_str = std::fs::read_to_string(path)?;
        let trials: BTreeMap<u32, TrialDescriptor> = serde_json::from_str(&json_str)?;
        Ok(Self::new(path, trials))
    }

    pub fn new(path: &Path, mut trials: BTreeMap<u32, TrialDescriptor>) -> Self {
        for (id, trial) in trials.iter_mut() {
            trial.trial_id = *id;
        }
        Self {
            path: path.to_path_buf(),
            trials,
        }
    }

    /// Trials in ascending id order
    pub fn trials(&self) -> impl Iterator<Item = &TrialDescriptor> {
        self.trials.values()
    }
}
