// The acquisition rig samples its digital inputs at ~1 kHz and writes them as a
// tab-separated table. The header names carry stray leading whitespace
// (e.g. " frame_trigger"), so columns are matched after trimming.
use std::path::{Path, PathBuf};

use super::error::SerialLogError;

const COLUMN_SEPARATOR: char = '\t';

/// One hardware sample tick of the serial log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSample {
    pub frame_trigger_level: i64,
    pub bitcode_value: i64,
}

impl SerialSample {
    pub fn new(frame_trigger_level: i64, bitcode_value: i64) -> Self {
        Self {
            frame_trigger_level,
            bitcode_value,
        }
    }
}

/// The ordered samples of a single serial log file
#[derive(Debug, Clone)]
pub struct SerialLog {
    pub path: PathBuf,
    pub samples: Vec<SerialSample>,
    pub size_bytes: u64,
}

impl SerialLog {
    /// Read a serial log, pulling the trigger and bitcode columns by name
    pub fn read(
        path: &Path,
        trigger_column: &str,
        bitcode_column: &str,
    ) -> Result<Self, SerialLogError> {
        if !path.exists() {
            return Err(SerialLogError::BadFilePath(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let size_bytes = path.metadata()?.len();
        let samples = Self::parse(path, &contents, trigger_column, bitcode_column)?;
        Ok(Self {
            path: path.to_path_buf(),
            samples,
            size_bytes,
        })
    }

    fn parse(
        path: &Path,
        contents: &str,
        trigger_column: &str,
        bitcode_column: &str,
    ) -> Result<Vec<SerialSample>, SerialLogError> {
        let mut lines = contents.lines();
        let header: Vec<&str> = match lines.next() {
            Some(line) => line.split(COLUMN_SEPARATOR).map(str::trim).collect(),
            None => return Err(SerialLogError::EmptyFile(path.to_path_buf())),
        };
        let find_column = |name: &str| {
            header
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| SerialLogError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                })
        };
        let trigger_idx = find_column(trigger_column)?;
        let bitcode_idx = find_column(bitcode_column)?;

        let mut samples = Vec::new();
        // Line numbers are 1-based and the header is line 1
        for (row, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split(COLUMN_SEPARATOR).collect();
            let parse_cell = |idx: usize| -> Result<i64, SerialLogError> {
                let cell = entries.get(idx).map(|c| c.trim()).unwrap_or("");
                parse_value(cell).ok_or_else(|| SerialLogError::BadValue {
                    path: path.to_path_buf(),
                    line: row + 2,
                    value: cell.to_string(),
                })
            };
            samples.push(SerialSample::new(
                parse_cell(trigger_idx)?,
                parse_cell(bitcode_idx)?,
            ));
        }
        Ok(samples)
    }
}

/// Cells are integers, but some firmware revisions write them as floats ("1.0")
fn parse_value(cell: &str) -> Option<i64> {
    if let Ok(value) = cell.parse::<i64>() {
        return Some(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value.round() as i64),
        _ => None,
    }
}
