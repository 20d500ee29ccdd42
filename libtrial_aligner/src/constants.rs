/// Minimum number of consecutive frames sharing a mode before a bitcode is accepted
pub const DEFAULT_MIN_RUN: usize = 4;
/// Frames subtracted from the ITI skip so the next trial's onset is never overshot
pub const DEFAULT_SAFETY_FRAMES: usize = 3;
/// Trials with fewer distinct bitcodes than this skip the pre-frame boundary check
pub const DEFAULT_BOUNDARY_CHECK_MIN_BITCODES: usize = 3;
/// Scan rate of the acquisition rig used when no run metadata is given (Hz)
pub const DEFAULT_FRAME_RATE: f64 = 44.68;

pub const DEFAULT_TRIGGER_COLUMN: &str = "frame_trigger";
pub const DEFAULT_BITCODE_COLUMN: &str = "pixel_clock";
pub const DEFAULT_ZERO_BITCODE_STIMULUS: &str = "grating";

// File naming of the acquisition rig and the behavior parser
pub const SERIAL_FILE_PATTERN: &str = "serial";
pub const SERIAL_FILE_EXTENSION: &str = ".txt";
pub const BEHAVIOR_FILE_PATTERN: &str = "parsed_";
pub const BEHAVIOR_FILE_EXTENSION: &str = ".json";

// Run artifact naming
pub const ARTIFACT_PREFIX: &str = "trials_";
pub const ARTIFACT_EXTENSION: &str = ".json";
pub const ARCHIVE_DIR_NAME: &str = "old";
/// Number of hex characters of the run hash carried in the artifact file name
pub const ARTIFACT_HASH_LENGTH: usize = 6;

/// A frame spacing this many times the modal spacing is reported as a dropped trigger
pub const DROPPED_TRIGGER_FACTOR: usize = 2;
