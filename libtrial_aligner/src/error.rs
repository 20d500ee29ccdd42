use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum SerialLogError {
    #[error("Could not open serial log because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Serial log failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Serial log {0:?} has no header row")]
    EmptyFile(PathBuf),
    #[error("Serial log {path:?} is missing the column {column}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("Serial log {path:?} has a malformed value {value:?} at line {line}")]
    BadValue {
        path: PathBuf,
        line: usize,
        value: String,
    },
}

#[derive(Debug, Error)]
pub enum BehaviorLogError {
    #[error("Could not open behavior log because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Behavior log failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Behavior log failed to parse JSON: {0}")]
    ParsingError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("Trial {trial_id} has no bitcodes to match")]
    NoBitcodes { trial_id: u32 },
    #[error("BitcodeNotFound -- trial: {trial_id} bitcode: {bitcode} searched from frame: {cursor}")]
    BitcodeNotFound {
        trial_id: u32,
        bitcode: i64,
        cursor: usize,
    },
}

#[derive(Debug, Error)]
pub enum AlignerError {
    #[error("NoFrameTriggersFound -- serial log {0:?} contains no frame-trigger rising edges")]
    NoFrameTriggersFound(PathBuf),
    #[error("Serial log {0:?} has no frame with a nonzero bitcode to start alignment from")]
    NoStimulusOnset(PathBuf),
    #[error("Aligner failed due to serial log error: {0}")]
    SerialError(#[from] SerialLogError),
    #[error("Aligner failed due to behavior log error: {0}")]
    BehaviorError(#[from] BehaviorLogError),
    #[error("Aligner failed to hash a trial descriptor: {0}")]
    HashError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FilePairError {
    #[error("File pairing failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Could not find directory {0:?}")]
    BadDirectory(PathBuf),
    #[error("No serial logs were found in {0:?}")]
    NoSerialFiles(PathBuf),
    #[error("No parsed behavior logs were found in {0:?}")]
    NoBehaviorFiles(PathBuf),
    #[error("TrialDescriptorMismatch -- found {n_behavior} behavior logs and {n_serial} serial logs; set shared_stimulus_order if one behavior log covers every serial log")]
    TrialDescriptorMismatch { n_behavior: usize, n_serial: usize },
    #[error("Trial {trial_id} of shared behavior log {path:?} has no block_idx; every trial of a shared stimulus order must name its serial log")]
    UntaggedSharedTrial { path: PathBuf, trial_id: u32 },
    #[error("Trial {trial_id} of shared behavior log {path:?} names block {block_idx} but only {n_serial} serial logs were found")]
    SharedTrialBlockOutOfRange {
        path: PathBuf,
        trial_id: u32,
        block_idx: usize,
        n_serial: usize,
    },
    #[error("File pairing failed due to behavior log error: {0}")]
    BehaviorError(#[from] BehaviorLogError),
}

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("RunAssembler failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RunAssembler failed to serialize the run table: {0}")]
    ParsingError(#[from] serde_json::Error),
    #[error("Output directory {0:?} does not exist")]
    BadOutputPath(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config failed to parse run metadata: {0}")]
    RunInfoError(#[from] serde_json::Error),
    #[error("Frame rate must be positive, found {0}")]
    BadFrameRate(f64),
    #[error("min_run must be at least 1, found {0}")]
    BadMinRun(usize),
    #[error("n_threads must be at least 1, found {0}")]
    BadThreadCount(i32),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Aligner error: {0}")]
    AlignerError(#[from] AlignerError),
    #[error("Processor failed due to file pairing error: {0}")]
    FilePairError(#[from] FilePairError),
    #[error("Processor failed due to RunAssembler error: {0}")]
    AssemblerError(#[from] AssemblerError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed because an alignment worker panicked")]
    WorkerPanic,
}
