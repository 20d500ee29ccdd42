//! Frame-accurate matching of a trial's bitcodes against the per-frame mode stream.
//!
//! For each bitcode of a trial, in order, the matcher scans forward from a cursor and accepts
//! the first frame at which the bitcode is displayed for at least `min_run` consecutive frames.
//! A transition can land on either side of a sampled frame, so the frame just before each
//! candidate is also checked; if it starts a longer qualifying run it is taken instead.
//! Trials with few distinct bitcodes (a static image plus an ITI marker) have no earlier
//! transition to confuse with and skip that check.
//!
//! Matching is a pure function of the table, the bitcodes and a [`Cursor`]. The cursor
//! returned for a trial is threaded into the next one, which keeps every match strictly after
//! the previous one.
use super::constants::*;
use super::error::MatchError;
use super::frame_modes::FrameModeTable;

/// Tunable gates of the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchParams {
    pub min_run: usize,
    pub safety_frames: usize,
    /// Trials with at least this many distinct bitcodes use the pre-frame boundary check
    pub boundary_check_min_bitcodes: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            min_run: DEFAULT_MIN_RUN,
            safety_frames: DEFAULT_SAFETY_FRAMES,
            boundary_check_min_bitcodes: DEFAULT_BOUNDARY_CHECK_MIN_BITCODES,
        }
    }
}

/// Position of the scan in the frame stream.
///
/// `search_from` is the first candidate frame. `floor` is the lowest frame that may still be
/// claimed through the pre-frame check; everything below it belongs to earlier matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub search_from: usize,
    pub floor: usize,
}

impl Cursor {
    /// Cursor for the first trial of a file
    pub fn start(search_from: usize) -> Self {
        Self {
            search_from,
            floor: 0,
        }
    }

    /// Cursor directly after a matched frame
    pub fn after_frame(frame: usize) -> Self {
        Self {
            search_from: frame + 1,
            floor: frame + 1,
        }
    }

    /// Cursor for the next trial, skipping most of the previous trial's ITI.
    ///
    /// The skip is `round(iti_s * frame_rate) - safety_frames` frames past the previous trial's
    /// last matched frame, and at least one frame.
    pub fn after_trial(
        stim_off_frame: usize,
        iti_duration_ms: f64,
        frame_rate: f64,
        safety_frames: usize,
    ) -> Self {
        let iti_frames = (iti_duration_ms / 1000.0 * frame_rate).round().max(0.0) as usize;
        let skip = iti_frames.saturating_sub(safety_frames).max(1);
        Self {
            search_from: stim_off_frame + skip,
            floor: stim_off_frame + 1,
        }
    }
}

/// How a transition landing between two sampled frames was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryResolution {
    /// Accepted at the scanned frame
    AtFrame,
    /// The preceding frame started a longer qualifying run and was accepted instead
    PreFrame,
    /// Both frames qualified with equal runs; the scanned frame was kept.
    ///
    /// Runs are counted forward over whole frames, so with a gate of at least one frame the
    /// preceding run is always longer or disqualified and this is never produced.
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitcodeMatch {
    pub bitcode: i64,
    pub frame: usize,
    pub resolution: BoundaryResolution,
}

/// The result of matching every bitcode of one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialMatch {
    pub matches: Vec<BitcodeMatch>,
    pub stim_on_frame: usize,
    pub stim_off_frame: usize,
    pub end_cursor: Cursor,
}

/// Match the bitcodes of one trial, in order, starting at `cursor`
pub fn match_trial(
    table: &FrameModeTable,
    trial_id: u32,
    bitcodes: &[i64],
    cursor: Cursor,
    params: &MatchParams,
) -> Result<TrialMatch, MatchError> {
    let n_distinct = {
        let mut unique = bitcodes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        unique.len()
    };
    let check_boundary = n_distinct >= params.boundary_check_min_bitcodes;
    // A zero gate would accept frames that do not display the bitcode at all
    let min_run = params.min_run.max(1);

    let mut matches: Vec<BitcodeMatch> = Vec::with_capacity(bitcodes.len());
    let mut current = cursor;
    for bitcode in bitcodes {
        let found = scan_for_bitcode(table, *bitcode, current, min_run, check_boundary)
            .ok_or(MatchError::BitcodeNotFound {
                trial_id,
                bitcode: *bitcode,
                cursor: current.search_from,
            })?;
        current = Cursor::after_frame(found.frame);
        matches.push(found);
    }

    match (matches.first(), matches.last()) {
        (Some(first), Some(last)) => Ok(TrialMatch {
            stim_on_frame: first.frame,
            stim_off_frame: last.frame,
            end_cursor: current,
            matches,
        }),
        _ => Err(MatchError::NoBitcodes { trial_id }),
    }
}

/// Scan forward for the first reliable display of a bitcode
fn scan_for_bitcode(
    table: &FrameModeTable,
    bitcode: i64,
    cursor: Cursor,
    min_run: usize,
    check_boundary: bool,
) -> Option<BitcodeMatch> {
    for frame in cursor.search_from..table.len() {
        let run = table.consecutive_run(frame, bitcode);
        let accept = |frame, resolution| {
            Some(BitcodeMatch {
                bitcode,
                frame,
                resolution,
            })
        };

        if !check_boundary {
            if run >= min_run {
                return accept(frame, BoundaryResolution::AtFrame);
            }
            continue;
        }

        let run_pre = if frame > cursor.floor {
            table.consecutive_run(frame - 1, bitcode)
        } else {
            0
        };
        if run_pre >= min_run && run_pre > run {
            return accept(frame - 1, BoundaryResolution::PreFrame);
        } else if run_pre >= min_run && run_pre == run {
            return accept(frame, BoundaryResolution::Ambiguous);
        } else if run >= min_run {
            return accept(frame, BoundaryResolution::AtFrame);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_decoder::FrameTriggerDecoder;
    use crate::serial_log::SerialSample;
    use proptest::prelude::*;

    fn params(min_run: usize) -> MatchParams {
        MatchParams {
            min_run,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_single_bitcode() {
        // Rising edges at 0, 100, 200; bitcode 7 in frames 0-1, then 0
        let samples: Vec<SerialSample> = (0..300)
            .map(|i| {
                let trigger = if i % 100 < 50 { 1 } else { 0 };
                SerialSample::new(trigger, if i < 200 { 7 } else { 0 })
            })
            .collect();
        let decoder = FrameTriggerDecoder::new(&samples);
        assert_eq!(decoder.n_frames(), 3);
        let table = FrameModeTable::new(decoder.frames());

        let result = match_trial(&table, 1, &[7], Cursor::start(0), &params(2)).unwrap();
        assert_eq!(result.stim_on_frame, 0);
        assert_eq!(result.stim_off_frame, 0);
        assert_eq!(result.end_cursor, Cursor::after_frame(0));
    }

    #[test]
    fn test_bitcodes_advance_monotonically() {
        let table = FrameModeTable::from_modes(vec![
            0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 1, 1, 1, 1, 3, 3, 3, 3, 0,
        ]);
        // The second 1 must come after the 2, not be re-matched at frame 2
        let result = match_trial(&table, 1, &[1, 2, 1, 3], Cursor::start(2), &params(4)).unwrap();
        let frames: Vec<usize> = result.matches.iter().map(|m| m.frame).collect();
        assert_eq!(frames, vec![2, 6, 10, 14]);
        assert_eq!(result.stim_on_frame, 2);
        assert_eq!(result.stim_off_frame, 14);
    }

    #[test]
    fn test_boundary_prefers_longer_run() {
        // The stimulus truly starts at frame 4, but jitter flips frame 3 early
        let modes = vec![0, 0, 0, 9, 9, 9, 9, 9, 9, 10, 10, 10, 10, 11, 11, 11, 11, 0];
        let table = FrameModeTable::from_modes(modes);
        let cursor = Cursor::start(4);

        let result = match_trial(&table, 1, &[9, 10, 11], cursor, &params(4)).unwrap();
        assert_eq!(result.matches[0].frame, 3);
        assert_eq!(result.matches[0].resolution, BoundaryResolution::PreFrame);
        assert_eq!(result.matches[1].frame, 9);
        assert_eq!(result.matches[1].resolution, BoundaryResolution::AtFrame);
        assert_eq!(result.stim_off_frame, 13);
        assert!(result
            .matches
            .iter()
            .all(|m| m.resolution != BoundaryResolution::Ambiguous));

        // A static image plus ITI marker never looks behind the cursor
        let simple = match_trial(&table, 1, &[9, 10], cursor, &params(4)).unwrap();
        assert_eq!(simple.stim_on_frame, 4);
    }

    #[test]
    fn test_boundary_threshold_is_configurable() {
        let table = FrameModeTable::from_modes(vec![0, 0, 9, 9, 9, 9, 9, 10, 10, 10, 10, 0]);
        let two_bitcode_check = MatchParams {
            min_run: 4,
            boundary_check_min_bitcodes: 2,
            ..Default::default()
        };
        let result = match_trial(&table, 1, &[9, 10], Cursor::start(3), &two_bitcode_check).unwrap();
        assert_eq!(result.stim_on_frame, 2);
    }

    #[test]
    fn test_pre_frame_never_claims_previous_match() {
        // Bitcode 5 repeats back to back; the second 5 cannot reuse frames of the first
        let table = FrameModeTable::from_modes(vec![5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6]);
        let always_check = MatchParams {
            min_run: 4,
            boundary_check_min_bitcodes: 1,
            ..Default::default()
        };
        let result = match_trial(&table, 1, &[5, 5, 6], Cursor::start(0), &always_check).unwrap();
        let frames: Vec<usize> = result.matches.iter().map(|m| m.frame).collect();
        assert_eq!(frames, vec![0, 1, 10]);
    }

    #[test]
    fn test_bitcode_not_found() {
        let table = FrameModeTable::from_modes(vec![0, 1, 1, 1, 1, 0, 0]);
        let result = match_trial(&table, 3, &[1, 2], Cursor::start(1), &params(4));
        assert_eq!(
            result,
            Err(MatchError::BitcodeNotFound {
                trial_id: 3,
                bitcode: 2,
                cursor: 2
            })
        );
        assert_eq!(
            match_trial(&table, 4, &[], Cursor::start(0), &params(4)),
            Err(MatchError::NoBitcodes { trial_id: 4 })
        );
    }

    #[test]
    fn test_zero_min_run_still_requires_the_bitcode() {
        let table = FrameModeTable::from_modes(vec![0, 0, 0, 9, 9, 9, 9, 0]);
        let no_gate = params(0);
        let result = match_trial(&table, 1, &[9, 9, 5], Cursor::start(0), &no_gate);
        assert_eq!(
            result,
            Err(MatchError::BitcodeNotFound {
                trial_id: 1,
                bitcode: 5,
                cursor: 5
            })
        );

        let found = match_trial(&table, 1, &[9, 9], Cursor::start(0), &no_gate).unwrap();
        let frames: Vec<usize> = found.matches.iter().map(|m| m.frame).collect();
        assert_eq!(frames, vec![3, 4]);
    }

    #[test]
    fn test_skip_margin() {
        let cursor = Cursor::after_trial(100, 4000.0, 44.68, 3);
        // round(4.0 * 44.68) = 179
        assert_eq!(cursor.search_from, 100 + 179 - 3);
        assert_eq!(cursor.floor, 101);

        // Short ITIs still move past the last matched frame
        let short = Cursor::after_trial(100, 0.0, 44.68, 3);
        assert_eq!(short.search_from, 101);
    }

    proptest! {
        #[test]
        fn run_length_gate(min_run in 2_usize..8, run_len in 1_usize..10, lead in 1_usize..6) {
            let mut modes = vec![0; lead];
            modes.extend(std::iter::repeat(5).take(run_len));
            modes.extend(std::iter::repeat(0).take(3));
            let table = FrameModeTable::from_modes(modes);

            let result = match_trial(&table, 1, &[5], Cursor::start(0), &params(min_run));
            if run_len >= min_run {
                prop_assert_eq!(result.map(|m| m.stim_on_frame), Ok(lead));
            } else {
                let is_not_found = matches!(result, Err(MatchError::BitcodeNotFound { .. }));
                prop_assert!(is_not_found);
            }
        }

        #[test]
        fn boundary_never_ties(
            runs in proptest::collection::vec((0_i64..4, 1_usize..6), 1..30),
            bitcodes in proptest::collection::vec(1_i64..4, 1..5),
            min_run in 0_usize..5,
        ) {
            let modes: Vec<i64> = runs
                .iter()
                .flat_map(|(code, len)| std::iter::repeat(*code).take(*len))
                .collect();
            let table = FrameModeTable::from_modes(modes);
            let always_check = MatchParams {
                min_run,
                boundary_check_min_bitcodes: 1,
                ..Default::default()
            };
            let result = match_trial(&table, 1, &bitcodes, Cursor::start(0), &always_check);
            if let Ok(result) = result {
                for m in result.matches.iter() {
                    prop_assert_ne!(m.resolution, BoundaryResolution::Ambiguous);
                    // Every accepted frame displays its bitcode
                    prop_assert!(table.consecutive_run(m.frame, m.bitcode) >= 1);
                }
            }
        }

        #[test]
        fn matches_never_move_backwards(
            runs in proptest::collection::vec((1_i64..6, 1_usize..8), 1..30),
            start in 0_usize..10,
        ) {
            let modes: Vec<i64> = runs
                .iter()
                .flat_map(|(code, len)| std::iter::repeat(*code).take(*len))
                .collect();
            let table = FrameModeTable::from_modes(modes);
            let cursor = Cursor { search_from: start, floor: start };
            if let Ok(result) = match_trial(&table, 1, &[1, 2, 3], cursor, &params(2)) {
                prop_assert!(result.stim_on_frame >= start);
                prop_assert!(result.stim_on_frame <= result.stim_off_frame);
                for pair in result.matches.windows(2) {
                    prop_assert!(pair[0].frame < pair[1].frame);
                }
                prop_assert!(result.end_cursor.search_from > result.stim_off_frame);
            }
        }
    }
}
