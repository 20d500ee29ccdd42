use std::path::{Path, PathBuf};

use super::config::Config;
use super::constants::*;
use super::error::FilePairError;
use super::trial::{BehaviorLog, TrialDescriptor};

/// A serial log and the behavior log describing the trials it recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    /// Position of the serial log (acquisition file) within the run, 0-indexed
    pub block_idx: usize,
    pub serial_path: PathBuf,
    pub behavior_path: PathBuf,
    /// Number of acquisition files described by this pair's behavior log
    pub ntiffs_per_auxfile: usize,
    /// The behavior log is shared with the other serial logs of the run
    pub shared: bool,
}

impl FilePair {
    /// Check if a trial should be searched for in this pair's serial log.
    ///
    /// A shared behavior log describes every block of the run, so each of its trials is only
    /// searched for in the block it names.
    pub fn owns_trial(&self, trial: &TrialDescriptor) -> bool {
        !self.shared || trial.block_idx == Some(self.block_idx)
    }
}

/// Find the serial/behavior log pairs of a run.
///
/// Both lists are sorted naturally (File2 before File10) and paired by position. Unless the
/// config declares a shared stimulus order, the counts must agree.
pub fn find_file_pairs(config: &Config) -> Result<Vec<FilePair>, FilePairError> {
    let serial_files = get_file_list(
        &config.serial_path,
        SERIAL_FILE_PATTERN,
        SERIAL_FILE_EXTENSION,
    )?;
    if serial_files.is_empty() {
        return Err(FilePairError::NoSerialFiles(config.serial_path.clone()));
    }
    let behavior_files = get_file_list(
        &config.behavior_path,
        BEHAVIOR_FILE_PATTERN,
        BEHAVIOR_FILE_EXTENSION,
    )?;
    if behavior_files.is_empty() {
        return Err(FilePairError::NoBehaviorFiles(config.behavior_path.clone()));
    }
    spdlog::info!(
        "Found {} behavior logs and {} serial logs.",
        behavior_files.len(),
        serial_files.len()
    );

    let n_serial = serial_files.len();
    if config.shared_stimulus_order {
        if behavior_files.len() != 1 {
            return Err(FilePairError::TrialDescriptorMismatch {
                n_behavior: behavior_files.len(),
                n_serial,
            });
        }
        let behavior_path = &behavior_files[0];
        check_shared_blocks(behavior_path, n_serial)?;
        Ok(serial_files
            .into_iter()
            .enumerate()
            .map(|(block_idx, serial_path)| FilePair {
                block_idx,
                serial_path,
                behavior_path: behavior_path.clone(),
                ntiffs_per_auxfile: n_serial,
                shared: true,
            })
            .collect())
    } else {
        if behavior_files.len() != n_serial {
            return Err(FilePairError::TrialDescriptorMismatch {
                n_behavior: behavior_files.len(),
                n_serial,
            });
        }
        Ok(serial_files
            .into_iter()
            .zip(behavior_files)
            .enumerate()
            .map(|(block_idx, (serial_path, behavior_path))| FilePair {
                block_idx,
                serial_path,
                behavior_path,
                ntiffs_per_auxfile: 1,
                shared: false,
            })
            .collect())
    }
}

/// Every trial of a shared behavior log must name one of the run's serial logs, otherwise it
/// would be requested once per serial log.
fn check_shared_blocks(behavior_path: &Path, n_serial: usize) -> Result<(), FilePairError> {
    let behavior = BehaviorLog::read(behavior_path)?;
    for trial in behavior.trials() {
        match trial.block_idx {
            None => {
                return Err(FilePairError::UntaggedSharedTrial {
                    path: behavior_path.to_path_buf(),
                    trial_id: trial.trial_id,
                });
            }
            Some(block_idx) if block_idx >= n_serial => {
                return Err(FilePairError::SharedTrialBlockOutOfRange {
                    path: behavior_path.to_path_buf(),
                    trial_id: trial.trial_id,
                    block_idx,
                    n_serial,
                });
            }
            Some(_) => (),
        }
    }
    Ok(())
}

/// List the files in a directory whose name contains `pattern` and ends with `extension`
fn get_file_list(
    parent_path: &Path,
    pattern: &str,
    extension: &str,
) -> Result<Vec<PathBuf>, FilePairError> {
    if !parent_path.is_dir() {
        return Err(FilePairError::BadDirectory(parent_path.to_path_buf()));
    }
    let mut file_list: Vec<PathBuf> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        let name = match item_path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        if item_path.is_file() && name.contains(pattern) && name.ends_with(extension) {
            file_list.push(item_path);
        }
    }
    file_list.sort_by_cached_key(|p| natural_key(&p.to_string_lossy()));
    Ok(file_list)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u64),
    Text(String),
}

/// Split a name into text and number chunks so that embedded numbers compare by value
fn natural_key(name: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::new();
    let mut rest = name;
    while let Some(first) = rest.chars().next() {
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        chunks.push(match chunk.parse::<u64>() {
            Ok(n) if is_digit => NaturalChunk::Number(n),
            _ => NaturalChunk::Text(chunk.to_string()),
        });
        rest = tail;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::trial;
    use std::collections::BTreeMap;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "").unwrap();
    }

    fn config_for(dir: &Path) -> Config {
        Config {
            serial_path: dir.join("raw"),
            behavior_path: dir.join("files"),
            ..Default::default()
        }
    }

    fn write_shared_log(dir: &Path, blocks: &[Option<usize>]) {
        let trials: BTreeMap<String, _> = blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| {
                let mut t = trial(&[1, 2, 3], 200.0);
                t.block_idx = *block;
                ((idx + 1).to_string(), t)
            })
            .collect();
        std::fs::write(
            dir.join("parsed_1.json"),
            serde_json::to_string(&trials).unwrap(),
        )
        .unwrap();
    }

    fn shared_config(dir: &Path) -> Config {
        let config = Config {
            shared_stimulus_order: true,
            ..config_for(dir)
        };
        std::fs::create_dir_all(&config.serial_path).unwrap();
        std::fs::create_dir_all(&config.behavior_path).unwrap();
        touch(&config.serial_path, "serial_1.txt");
        touch(&config.serial_path, "serial_2.txt");
        config
    }

    #[test]
    fn test_natural_order() {
        let mut names = vec!["File10", "File2", "File1"];
        names.sort_by_key(|n| natural_key(n));
        assert_eq!(names, vec!["File1", "File2", "File10"]);
    }

    #[test]
    fn test_one_to_one_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        std::fs::create_dir_all(&config.serial_path).unwrap();
        std::fs::create_dir_all(&config.behavior_path).unwrap();
        for i in [1, 2, 10] {
            touch(&config.serial_path, &format!("serial_data_File{i:03}.txt"));
            touch(&config.behavior_path, &format!("parsed_trials_{i}.json"));
        }
        touch(&config.serial_path, "notes.txt");
        touch(&config.behavior_path, "stimorder.json");

        let pairs = find_file_pairs(&config).unwrap();
        assert_eq!(pairs.len(), 3);
        assert!(pairs[2].serial_path.ends_with("serial_data_File010.txt"));
        assert!(pairs[2].behavior_path.ends_with("parsed_trials_10.json"));
        assert_eq!(pairs[1].block_idx, 1);
        assert!(pairs.iter().all(|p| p.ntiffs_per_auxfile == 1 && !p.shared));
    }

    #[test]
    fn test_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        std::fs::create_dir_all(&config.serial_path).unwrap();
        std::fs::create_dir_all(&config.behavior_path).unwrap();
        touch(&config.serial_path, "serial_1.txt");
        touch(&config.serial_path, "serial_2.txt");
        write_shared_log(&config.behavior_path, &[Some(0), Some(1), Some(0)]);

        match find_file_pairs(&config) {
            Err(FilePairError::TrialDescriptorMismatch {
                n_behavior,
                n_serial,
            }) => assert_eq!((n_behavior, n_serial), (1, 2)),
            other => panic!("expected TrialDescriptorMismatch, got {other:?}"),
        }

        let shared = Config {
            shared_stimulus_order: true,
            ..config
        };
        let pairs = find_file_pairs(&shared).unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.shared && p.ntiffs_per_auxfile == 2));
        assert_eq!(pairs[0].behavior_path, pairs[1].behavior_path);
    }

    #[test]
    fn test_shared_log_requires_block_per_trial() {
        let dir = tempfile::tempdir().unwrap();
        let config = shared_config(dir.path());

        // Trial 2 would otherwise be searched for in both serial logs
        write_shared_log(&config.behavior_path, &[Some(0), None, Some(1)]);
        match find_file_pairs(&config) {
            Err(FilePairError::UntaggedSharedTrial { trial_id, .. }) => assert_eq!(trial_id, 2),
            other => panic!("expected UntaggedSharedTrial, got {other:?}"),
        }

        write_shared_log(&config.behavior_path, &[Some(0), Some(2)]);
        match find_file_pairs(&config) {
            Err(FilePairError::SharedTrialBlockOutOfRange {
                trial_id,
                block_idx,
                n_serial,
                ..
            }) => assert_eq!((trial_id, block_idx, n_serial), (2, 2, 2)),
            other => panic!("expected SharedTrialBlockOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_shared_pair_owns_only_its_block() {
        let pair = FilePair {
            block_idx: 1,
            serial_path: PathBuf::from("serial_2.txt"),
            behavior_path: PathBuf::from("parsed_1.json"),
            ntiffs_per_auxfile: 2,
            shared: true,
        };
        let mut t = trial(&[1, 2, 3], 200.0);
        assert!(!pair.owns_trial(&t));
        t.block_idx = Some(0);
        assert!(!pair.owns_trial(&t));
        t.block_idx = Some(1);
        assert!(pair.owns_trial(&t));

        let own = FilePair {
            shared: false,
            ..pair
        };
        t.block_idx = None;
        assert!(own.owns_trial(&t));
    }
}
