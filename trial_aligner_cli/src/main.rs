use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use libtrial_aligner::config::Config;
use libtrial_aligner::file_pairs::find_file_pairs;
use libtrial_aligner::process::{assemble_run, join_workers, spawn_workers};
use libtrial_aligner::worker_status::{WorkerStage, WorkerStatus};

const LOG_FILE: &str = "./trial_aligner.log";

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Library diagnostics (per-trial frames, failures) go to a log file
fn init_library_log() {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from(LOG_FILE))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .expect("Could not create the log file sink!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()
            .expect("Could not create the library logger!"),
    );
    spdlog::set_default_logger(logger);
}

fn bar_style(stage: WorkerStage) -> ProgressStyle {
    let template = match stage {
        WorkerStage::Waiting | WorkerStage::Aligning => "{prefix} [{bar:40.cyan/blue}] {msg}",
        WorkerStage::Done => "{prefix} [{bar:40.green/blue}] {msg}",
        WorkerStage::Failed => "{prefix} [{bar:40.red/blue}] {msg}",
    };
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn main() {
    // Create a cli
    let matches = Command::new("trial_aligner_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");
    init_library_log();

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Serial Path: {}", config.serial_path.to_string_lossy());
    log::info!("Behavior Path: {}", config.behavior_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "Min Run: {} Safety Frames: {} Shared Stimulus Order: {}",
        config.min_run,
        config.safety_frames,
        config.shared_stimulus_order
    );
    if let Err(e) = config.validate() {
        log::error!("{e}");
        return;
    }

    let frame_rate = match config.get_frame_rate() {
        Ok(rate) => rate,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Frame Rate: {frame_rate} Hz");

    let pairs = match find_file_pairs(&config) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Aligning {} file pairs...", pairs.len());

    // Spawn the workers and give each a progress bar
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let workers = spawn_workers(&config, frame_rate, pairs, &tx);
    drop(tx);
    let bars: Vec<ProgressBar> = (0..workers.len())
        .map(|id| {
            let pb = pb_manager.add(ProgressBar::new(100));
            pb.set_style(bar_style(WorkerStage::Waiting));
            pb.set_prefix(format!("Worker {id}"));
            pb
        })
        .collect();

    // The channel closes once every worker has hung up
    for status in rx.iter() {
        if let Some(pb) = bars.get(status.worker_id) {
            pb.set_style(bar_style(status.stage));
            pb.set_position((status.progress * 100.0) as u64);
            pb.set_message(format!("block {}", status.block_idx));
        }
    }
    for pb in bars.iter() {
        pb.finish();
    }

    let alignments = match join_workers(workers) {
        Ok(a) => a,
        Err(e) => {
            log::error!("Alignment failed with error: {e}");
            log::error!("See {LOG_FILE} for details.");
            return;
        }
    };

    match assemble_run(&config, alignments) {
        Ok((table, path)) => {
            log::info!(
                "Aligned {} of {} trials.",
                table.n_trials_aligned,
                table.n_trials_requested
            );
            for failure in table.failed_trials.iter() {
                log::warn!(
                    "Trial {} of block {} was not aligned: {}",
                    failure.trial_id,
                    failure.block_idx,
                    failure.reason
                );
            }
            log::info!("Trial alignment written to {}", path.to_string_lossy());
        }
        Err(e) => log::error!("Writing the run alignment failed with error: {e}"),
    }

    log::info!("Done.");
}
