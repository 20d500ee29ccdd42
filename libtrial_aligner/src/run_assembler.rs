use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::AssemblerError;
use super::run_aligner::{AlignmentRecord, FileAlignment, TrialFailure};
use super::trial::sha256_hex;

/// One trial of the run artifact, as consumed by epoch extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunTrial {
    pub trial_hash: String,
    pub block_idx: usize,
    pub ntiffs_per_auxfile: usize,
    pub behavior_data_path: PathBuf,
    pub serial_data_path: PathBuf,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub stim_dur_ms: f64,
    pub iti_dur_ms: f64,
    pub stimuli: serde_json::Value,
    pub frame_stim_on: usize,
    pub frame_stim_off: usize,
    pub trial_in_run: usize,
}

/// The merged, renumbered trials of a whole acquisition run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunAlignmentTable {
    pub n_trials_requested: usize,
    pub n_trials_aligned: usize,
    pub failed_trials: Vec<TrialFailure>,
    pub trials: BTreeMap<String, RunTrial>,
}

#[derive(Debug, Serialize)]
struct RunArtifact<'a> {
    run_hash: &'a str,
    #[serde(flatten)]
    table: &'a RunAlignmentTable,
}

impl RunAlignmentTable {
    /// Content hash over the serialized table
    pub fn content_hash(&self) -> Result<String, AssemblerError> {
        let canonical = serde_json::to_string(&serde_json::to_value(self)?)?;
        Ok(sha256_hex(canonical.as_bytes()))
    }

    /// Trials in run order
    pub fn ordered_trials(&self) -> impl Iterator<Item = &RunTrial> {
        // Keys are zero-padded, so map order is run order
        self.trials.values()
    }
}

/// RunAssembler merges the alignments of every file pair in a run.
///
/// Files are separate recordings within the run, so trials are ordered by file and then by
/// onset frame before being numbered 1..N.
#[derive(Debug, Default)]
pub struct RunAssembler {
    alignments: Vec<FileAlignment>,
}

impl RunAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alignment: FileAlignment) {
        self.alignments.push(alignment);
    }

    pub fn extend(&mut self, alignments: impl IntoIterator<Item = FileAlignment>) {
        self.alignments.extend(alignments);
    }

    pub fn assemble(&self) -> RunAlignmentTable {
        let mut ordered: Vec<(&FileAlignment, &AlignmentRecord)> = self
            .alignments
            .iter()
            .flat_map(|a| a.records.iter().map(move |r| (a, r)))
            .collect();
        ordered.sort_by(|(fa, ra), (fb, rb)| {
            fa.pair
                .block_idx
                .cmp(&fb.pair.block_idx)
                .then(ra.stim_on_frame.cmp(&rb.stim_on_frame))
                .then(ra.trial_hash.cmp(&rb.trial_hash))
        });

        let trials: BTreeMap<String, RunTrial> = ordered
            .into_iter()
            .enumerate()
            .map(|(idx, (file, record))| {
                let trial_in_run = idx + 1;
                let source = &record.source_trial;
                (
                    format!("trial{trial_in_run:0>5}"),
                    RunTrial {
                        trial_hash: record.trial_hash.clone(),
                        block_idx: file.pair.block_idx,
                        ntiffs_per_auxfile: file.pair.ntiffs_per_auxfile,
                        behavior_data_path: file.pair.behavior_path.clone(),
                        serial_data_path: file.pair.serial_path.clone(),
                        start_time_ms: source.start_time_ms,
                        end_time_ms: source.end_time_ms,
                        stim_dur_ms: source.stim_duration_ms(),
                        iti_dur_ms: source.iti_duration_ms,
                        stimuli: source.stimulus_metadata.clone(),
                        frame_stim_on: record.stim_on_frame,
                        frame_stim_off: record.stim_off_frame,
                        trial_in_run,
                    },
                )
            })
            .collect();

        let mut failed_trials: Vec<TrialFailure> = self
            .alignments
            .iter()
            .flat_map(|a| a.failures.iter().cloned())
            .collect();
        failed_trials.sort_by(|a, b| {
            a.block_idx
                .cmp(&b.block_idx)
                .then(a.trial_id.cmp(&b.trial_id))
        });

        RunAlignmentTable {
            n_trials_requested: self.alignments.iter().map(|a| a.n_requested).sum(),
            n_trials_aligned: trials.len(),
            failed_trials,
            trials,
        }
    }
}

/// Write the run table into `output_dir` as `trials_<hash>.json`.
///
/// Earlier artifacts that do not carry the new hash are moved to `output_dir/old` rather than
/// deleted. Returns the path of the written artifact.
pub fn write_run_table(
    table: &RunAlignmentTable,
    output_dir: &Path,
) -> Result<PathBuf, AssemblerError> {
    if !output_dir.is_dir() {
        return Err(AssemblerError::BadOutputPath(output_dir.to_path_buf()));
    }
    let run_hash = table.content_hash()?;
    let short_hash = &run_hash[..ARTIFACT_HASH_LENGTH];
    let file_name = format!("{ARTIFACT_PREFIX}{short_hash}{ARTIFACT_EXTENSION}");

    archive_stale_artifacts(output_dir, &file_name)?;

    let artifact = RunArtifact {
        run_hash: &run_hash,
        table,
    };
    let artifact_path = output_dir.join(&file_name);
    std::fs::write(&artifact_path, serde_json::to_string_pretty(&artifact)?)?;
    spdlog::info!(
        "Wrote {} of {} trials to {}",
        table.n_trials_aligned,
        table.n_trials_requested,
        artifact_path.to_string_lossy()
    );
    Ok(artifact_path)
}

/// Move every run artifact other than `keep` into the archive directory
fn archive_stale_artifacts(output_dir: &Path, keep: &str) -> Result<(), AssemblerError> {
    let archive_dir = output_dir.join(ARCHIVE_DIR_NAME);
    for item in output_dir.read_dir()? {
        let item_path = item?.path();
        if !item_path.is_file() {
            continue;
        }
        let name = match item_path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        if name.starts_with(ARTIFACT_PREFIX) && name.ends_with(ARTIFACT_EXTENSION) && name != keep
        {
            std::fs::create_dir_all(&archive_dir)?;
            std::fs::rename(&item_path, archive_dir.join(&name))?;
            spdlog::info!(
                "Archived stale artifact {} to {}",
                name,
                archive_dir.to_string_lossy()
            );
        }
    }
    Ok(())
}
