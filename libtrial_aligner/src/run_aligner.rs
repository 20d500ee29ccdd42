use serde::Serialize;

use super::config::Config;
use super::error::{AlignerError, MatchError};
use super::file_pairs::FilePair;
use super::frame_decoder::FrameTriggerDecoder;
use super::frame_modes::FrameModeTable;
use super::matcher::{match_trial, BoundaryResolution, Cursor, MatchParams};
use super::serial_log::SerialLog;
use super::trial::{BehaviorLog, TrialDescriptor};

/// The frames at which one trial's stimulus turned on and off
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub trial_id: u32,
    pub trial_hash: String,
    pub stim_on_frame: usize,
    pub stim_off_frame: usize,
    pub source_trial: TrialDescriptor,
}

/// A trial which could not be aligned, with enough context to reproduce the search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialFailure {
    pub block_idx: usize,
    pub trial_id: u32,
    pub trial_hash: String,
    pub bitcode: Option<i64>,
    pub cursor: Option<usize>,
    pub reason: String,
}

impl TrialFailure {
    fn new(block_idx: usize, trial_id: u32, trial_hash: String, error: &MatchError) -> Self {
        let (bitcode, cursor) = match error {
            MatchError::BitcodeNotFound {
                bitcode, cursor, ..
            } => (Some(*bitcode), Some(*cursor)),
            MatchError::NoBitcodes { .. } => (None, None),
        };
        Self {
            block_idx,
            trial_id,
            trial_hash,
            bitcode,
            cursor,
            reason: error.to_string(),
        }
    }
}

/// Everything aligned from one behavior-log/serial-log pair
#[derive(Debug, Clone, PartialEq)]
pub struct FileAlignment {
    pub pair: FilePair,
    pub n_requested: usize,
    pub records: Vec<AlignmentRecord>,
    pub failures: Vec<TrialFailure>,
}

/// RunAligner drives the matcher across every trial of one file pair.
///
/// Trials are taken in ascending id order and the cursor returned by each match is threaded
/// into the next trial. A trial whose bitcodes cannot be found is recorded as a failure and the
/// cursor is left where it was, so the remaining trials are still aligned.
#[derive(Debug)]
pub struct RunAligner<'a> {
    table: &'a FrameModeTable,
    params: MatchParams,
    frame_rate: f64,
}

impl<'a> RunAligner<'a> {
    pub fn new(table: &'a FrameModeTable, params: MatchParams, frame_rate: f64) -> Self {
        Self {
            table,
            params,
            frame_rate,
        }
    }

    /// Align the given trials, starting the search at `start`
    pub fn align<'t>(
        &self,
        trials: impl IntoIterator<Item = &'t TrialDescriptor>,
        start: Cursor,
        block_idx: usize,
    ) -> Result<(Vec<AlignmentRecord>, Vec<TrialFailure>), AlignerError> {
        let mut records: Vec<AlignmentRecord> = Vec::new();
        let mut failures: Vec<TrialFailure> = Vec::new();
        let mut cursor = start;

        for trial in trials {
            let trial_hash = trial.content_hash()?;
            match match_trial(
                self.table,
                trial.trial_id,
                &trial.all_bitcodes,
                cursor,
                &self.params,
            ) {
                Ok(found) => {
                    for m in found
                        .matches
                        .iter()
                        .filter(|m| m.resolution == BoundaryResolution::Ambiguous)
                    {
                        spdlog::warn!(
                            "AmbiguousBoundaryMatch -- trial: {} bitcode: {} frame: {}",
                            trial.trial_id,
                            m.bitcode,
                            m.frame
                        );
                    }
                    spdlog::info!(
                        "Trial {} -- stim on frame: {} stim off frame: {} elapsed: {:.3} s",
                        trial.trial_id,
                        found.stim_on_frame,
                        found.stim_off_frame,
                        (found.stim_off_frame - found.stim_on_frame) as f64 / self.frame_rate
                    );
                    cursor = Cursor::after_trial(
                        found.stim_off_frame,
                        trial.iti_duration_ms,
                        self.frame_rate,
                        self.params.safety_frames,
                    );
                    records.push(AlignmentRecord {
                        trial_id: trial.trial_id,
                        trial_hash,
                        stim_on_frame: found.stim_on_frame,
                        stim_off_frame: found.stim_off_frame,
                        source_trial: trial.clone(),
                    });
                }
                Err(e) => {
                    spdlog::error!(
                        "{e} -- skipping trial, cursor stays at frame {}",
                        cursor.search_from
                    );
                    failures.push(TrialFailure::new(block_idx, trial.trial_id, trial_hash, &e));
                }
            }
        }
        Ok((records, failures))
    }
}

/// Align one behavior-log/serial-log pair
pub fn align_file_pair(
    pair: &FilePair,
    config: &Config,
    frame_rate: f64,
) -> Result<FileAlignment, AlignerError> {
    let serial = SerialLog::read(
        &pair.serial_path,
        &config.trigger_column,
        &config.bitcode_column,
    )?;
    spdlog::info!(
        "Read serial log {} ({})",
        pair.serial_path.to_string_lossy(),
        human_bytes::human_bytes(serial.size_bytes as f64)
    );

    let decoder = FrameTriggerDecoder::new(&serial.samples);
    if decoder.n_frames() == 0 {
        return Err(AlignerError::NoFrameTriggersFound(pair.serial_path.clone()));
    }
    spdlog::info!(
        "Found {} frame-triggers, {} samples per frame.",
        decoder.n_frames(),
        decoder.samples_per_frame().unwrap_or(0)
    );
    let dropped = decoder.suspect_dropped_triggers();
    if !dropped.is_empty() {
        spdlog::warn!(
            "Serial log {} may have dropped frame-triggers after frames {:?}",
            pair.serial_path.to_string_lossy(),
            dropped
        );
    }
    let table = FrameModeTable::new(decoder.frames());

    let behavior = BehaviorLog::read(&pair.behavior_path)?;
    let trials: Vec<&TrialDescriptor> = behavior
        .trials()
        .filter(|t| pair.owns_trial(t))
        .collect();
    let Some(first) = trials.first() else {
        spdlog::warn!(
            "No trials to align for {}",
            pair.behavior_path.to_string_lossy()
        );
        return Ok(FileAlignment {
            pair: pair.clone(),
            n_requested: 0,
            records: vec![],
            failures: vec![],
        });
    };

    let zero_allowed = config.first_bitcode_can_be_zero(first.stimulus_type());
    let start_frame = table
        .first_stimulus_frame(zero_allowed)
        .ok_or_else(|| AlignerError::NoStimulusOnset(pair.serial_path.clone()))?;

    let aligner = RunAligner::new(&table, config.match_params(), frame_rate);
    let (records, failures) =
        aligner.align(trials.iter().copied(), Cursor::start(start_frame), pair.block_idx)?;
    spdlog::info!(
        "Aligned {} of {} trials from {}",
        records.len(),
        trials.len(),
        pair.behavior_path.to_string_lossy()
    );

    Ok(FileAlignment {
        pair: pair.clone(),
        n_requested: trials.len(),
        records,
        failures,
    })
}
