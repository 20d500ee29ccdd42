//! # trial_aligner
//!
//! trial_aligner recovers, for every trial of a two-photon imaging run, the frame indices at
//! which the stimulus turned on and off. It combines two logs with no shared clock: the
//! parsed behavior log of the stimulus-presentation computer, which lists the bitcodes each
//! trial displayed, and the serial log of the acquisition rig, which samples the microscope
//! frame trigger and the displayed bitcode at ~1 kHz.
//!
//! ## Installation
//!
//! The only method of install is from source. To build and install the CLI use
//! `cargo install --path ./trial_aligner_cli` from the top level repository. To use the CLI see
//! the `trial_aligner_cli` README.
//!
//! ## How alignment works
//!
//! 1. The serial log is split into frames at every rising edge of the frame trigger.
//! 2. Each frame is reduced to the mode of the bitcodes sampled during it.
//! 3. For every trial, in trial order, each of its bitcodes is searched for in the per-frame
//!    modes. A bitcode is accepted where it is displayed for at least `min_run` consecutive
//!    frames. Transitions landing between two sampled frames are resolved toward the frame
//!    starting the longer run.
//! 4. Between trials the search skips most of the inter-trial interval, so the tail of one
//!    trial can never be mistaken for the start of the next.
//! 5. The trials of every file pair in the run are merged, ordered, numbered 1..N, and written
//!    to a single artifact named after the hash of its contents.
//!
//! A trial whose bitcodes cannot be found is reported and skipped; it does not discard the
//! rest of the recording. Failures of a whole file (no frame triggers, unequal numbers of
//! behavior and serial logs) abort the run.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! serial_path: /data/CE074/20180215/FOV2/blobs_run1/raw/paradigm_files
//! behavior_path: /data/CE074/20180215/FOV2/blobs_run1/paradigm/files
//! output_path: /data/CE074/20180215/FOV2/blobs_run1/paradigm
//! run_info_path: null
//! frame_rate: 44.68
//! trigger_column: frame_trigger
//! bitcode_column: pixel_clock
//! min_run: 4
//! safety_frames: 3
//! boundary_check_min_bitcodes: 3
//! zero_bitcode_stimulus_types:
//! - grating
//! shared_stimulus_order: false
//! n_threads: 1
//! ```
//!
//! - `serial_path`: directory containing the serial logs (`*serial*.txt`)
//! - `behavior_path`: directory containing the parsed behavior logs (`parsed_*.json`)
//! - `output_path`: directory to which the run artifact is written
//! - `run_info_path`: optional run metadata JSON; its `frame_rate` overrides `frame_rate`
//! - `min_run`: number of consecutive frames a bitcode must be displayed to be accepted (at least 1)
//! - `safety_frames`: frames left unskipped at the end of each inter-trial interval
//! - `boundary_check_min_bitcodes`: trials with fewer distinct bitcodes are matched without
//!   looking at the frame before each candidate
//! - `zero_bitcode_stimulus_types`: stimulus types for which bitcode 0 is a real stimulus
//! - `shared_stimulus_order`: a single behavior log describes every serial log of the run; each
//!   of its trials must name its serial log through `block_idx`
//! - `n_threads`: number of worker threads the file pairs are divided amongst
//!
//! ## Output
//!
//! The artifact `trials_<hash>.json` is written to the output directory. Older artifacts are
//! moved to `old/` in the output directory.
//!
//! ```text
//! run_hash, n_trials_requested, n_trials_aligned
//! failed_trials - block_idx, trial_id, trial_hash, bitcode, cursor, reason
//! trials
//! |---- trial#####
//! |    |---- trial_hash, block_idx, ntiffs_per_auxfile, behavior_data_path, serial_data_path
//! |    |---- start_time_ms, end_time_ms, stim_dur_ms, iti_dur_ms, stimuli
//! |    |---- frame_stim_on, frame_stim_off, trial_in_run
//! ```
pub mod config;
pub mod constants;
pub mod error;
pub mod file_pairs;
pub mod frame_decoder;
pub mod frame_modes;
pub mod matcher;
pub mod process;
pub mod run_aligner;
pub mod run_assembler;
pub mod serial_log;
pub mod trial;
pub mod worker_status;
