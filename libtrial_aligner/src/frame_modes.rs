use fxhash::FxHashMap;

use super::frame_decoder::FrameRecord;

/// FrameModeTable reduces every frame to its most frequently sampled bitcode.
///
/// The bitcode readout jitters around stimulus transitions, so the mode is taken as
/// the frame's representative value. The table also caches, for every frame, how many
/// consecutive frames starting there share its mode, which is the reliability gate
/// used by the matcher. Built once per serial log and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameModeTable {
    modes: Vec<i64>,
    run_lengths: Vec<usize>,
}

impl FrameModeTable {
    pub fn new(frames: &[FrameRecord]) -> Self {
        Self::from_modes(frames.iter().map(|f| mode(&f.bitcode_samples)).collect())
    }

    /// Build the table directly from per-frame modes
    pub fn from_modes(modes: Vec<i64>) -> Self {
        let mut run_lengths = vec![0; modes.len()];
        for frame in (0..modes.len()).rev() {
            run_lengths[frame] = match modes.get(frame + 1) {
                Some(next) if *next == modes[frame] => run_lengths[frame + 1] + 1,
                _ => 1,
            };
        }
        Self { modes, run_lengths }
    }

    /// Number of frames in the table
    pub(crate) fn len(&self) -> usize {
        self.modes.len()
    }

    /// Number of consecutive frames, starting at `frame`, whose mode is `bitcode`.
    ///
    /// Zero if the frame does not display the bitcode or is past the end of the table.
    pub fn consecutive_run(&self, frame: usize, bitcode: i64) -> usize {
        match self.modes.get(frame) {
            Some(m) if *m == bitcode => self.run_lengths[frame],
            _ => 0,
        }
    }

    /// The frame at which the first trial's search starts.
    ///
    /// Bitcode 0 also means "no stimulus yet", so unless the first stimulus can display
    /// a 0 the second frame with a nonzero mode is used instead of the first.
    pub fn first_stimulus_frame(&self, first_bitcode_can_be_zero: bool) -> Option<usize> {
        let skip = if first_bitcode_can_be_zero { 0 } else { 1 };
        self.modes
            .iter()
            .enumerate()
            .filter(|(_, m)| **m != 0)
            .map(|(frame, _)| frame)
            .nth(skip)
    }
}

/// Most frequent value, ties broken by the value encountered first
fn mode(samples: &[i64]) -> i64 {
    let mut counts: FxHashMap<i64, (usize, usize)> = FxHashMap::default();
    for (order, value) in samples.iter().enumerate() {
        counts.entry(*value).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(value, _)| value)
        .unwrap_or(0) // frames always hold at least their onset sample
}
