use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use super::config::Config;
use super::error::ProcessorError;
use super::file_pairs::{find_file_pairs, FilePair};
use super::run_aligner::{align_file_pair, FileAlignment};
use super::run_assembler::{write_run_table, RunAlignmentTable, RunAssembler};
use super::worker_status::{WorkerStage, WorkerStatus};

pub type WorkerHandle = JoinHandle<Result<Vec<FileAlignment>, ProcessorError>>;

/// Align a subset of the file pairs of a run.
///
/// File pairs are independent, so any number of subsets may be aligned concurrently. A
/// file-level failure stops the worker and is returned to the caller.
pub fn process_subset(
    config: Config,
    frame_rate: f64,
    subset: Vec<FilePair>,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<Vec<FileAlignment>, ProcessorError> {
    let mut alignments = Vec::with_capacity(subset.len());
    let n_pairs = subset.len() as f32;
    for (count, pair) in subset.iter().enumerate() {
        tx.send(WorkerStatus::new(
            count as f32 / n_pairs,
            pair.block_idx,
            worker_id,
            WorkerStage::Aligning,
        ))?;
        spdlog::info!(
            "Processing block {} -- behavior: {} serial: {}",
            pair.block_idx,
            pair.behavior_path.to_string_lossy(),
            pair.serial_path.to_string_lossy()
        );
        match align_file_pair(pair, &config, frame_rate) {
            Ok(alignment) => alignments.push(alignment),
            Err(e) => {
                spdlog::error!("Alignment of block {} failed: {e}", pair.block_idx);
                tx.send(WorkerStatus::new(
                    count as f32 / n_pairs,
                    pair.block_idx,
                    worker_id,
                    WorkerStage::Failed,
                ))?;
                return Err(e.into());
            }
        }
    }
    tx.send(WorkerStatus::new(
        1.0,
        subset.last().map_or(0, |p| p.block_idx),
        worker_id,
        WorkerStage::Done,
    ))?;
    Ok(alignments)
}

/// Divide the file pairs into a set of subsets (per thread/worker)
pub fn create_subsets(config: &Config, pairs: Vec<FilePair>) -> Vec<Vec<FilePair>> {
    let mut subsets: Vec<Vec<FilePair>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, pair) in pairs.into_iter().enumerate() {
        subsets[idx % n_subsets].push(pair)
    }

    subsets
}

/// Spawn one worker per non-empty subset. Worker ids index the returned handles.
pub fn spawn_workers(
    config: &Config,
    frame_rate: f64,
    pairs: Vec<FilePair>,
    tx: &Sender<WorkerStatus>,
) -> Vec<WorkerHandle> {
    create_subsets(config, pairs)
        .into_iter()
        // Dont make empty workers
        .filter(|subset| !subset.is_empty())
        .enumerate()
        .map(|(worker_id, subset)| {
            let conf = config.clone();
            let tx = tx.clone();
            std::thread::spawn(move || process_subset(conf, frame_rate, subset, tx, worker_id))
        })
        .collect()
}

/// Wait for every worker and gather their alignments
pub fn join_workers(workers: Vec<WorkerHandle>) -> Result<Vec<FileAlignment>, ProcessorError> {
    let mut alignments = Vec::new();
    for worker in workers {
        match worker.join() {
            Ok(result) => alignments.extend(result?),
            Err(_) => return Err(ProcessorError::WorkerPanic),
        }
    }
    Ok(alignments)
}

/// Merge the alignments of every file pair and write the run artifact
pub fn assemble_run(
    config: &Config,
    alignments: Vec<FileAlignment>,
) -> Result<(RunAlignmentTable, PathBuf), ProcessorError> {
    let mut assembler = RunAssembler::new();
    assembler.extend(alignments);
    let table = assembler.assemble();
    if !table.failed_trials.is_empty() {
        let failed: Vec<String> = table
            .failed_trials
            .iter()
            .map(|f| format!("{}:{}", f.block_idx, f.trial_id))
            .collect();
        spdlog::warn!(
            "{} trials could not be aligned (block:trial): {}",
            failed.len(),
            failed.join(", ")
        );
    }
    let path = write_run_table(&table, &config.output_path)?;
    Ok((table, path))
}

/// Align a whole run on the calling thread and write the artifact.
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<PathBuf, ProcessorError> {
    config.validate()?;
    let frame_rate = config.get_frame_rate()?;
    let pairs = find_file_pairs(&config)?;
    let alignments = process_subset(config.clone(), frame_rate, pairs, tx, worker_id)?;
    let (_, path) = assemble_run(&config, alignments)?;
    Ok(path)
}
