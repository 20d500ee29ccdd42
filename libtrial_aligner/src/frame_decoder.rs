use fxhash::FxHashMap;

use super::constants::DROPPED_TRIGGER_FACTOR;
use super::serial_log::SerialSample;

/// The bitcode samples that fell inside one acquired frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub frame_index: usize,
    pub bitcode_samples: Vec<i64>,
}

/// FrameTriggerDecoder splits a serial log into frames using the microscope frame trigger.
///
/// A frame starts on every rising edge of the trigger. The first sample is always taken as
/// a frame start, since the trigger may already be high when the recording starts.
#[derive(Debug, Clone)]
pub struct FrameTriggerDecoder {
    onsets: Vec<usize>,
    frames: Vec<FrameRecord>,
}

impl FrameTriggerDecoder {
    /// Decode the samples of a serial log.
    ///
    /// A log without any rising edge decodes to zero frames.
    pub fn new(samples: &[SerialSample]) -> Self {
        let onsets = find_frame_onsets(samples);
        let frames = group_frames(samples, &onsets);
        Self { onsets, frames }
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// The most common spacing between frame onsets, i.e. the expected samples per frame
    pub fn samples_per_frame(&self) -> Option<usize> {
        let mut counts: FxHashMap<usize, (usize, usize)> = FxHashMap::default();
        for (order, spacing) in self.onsets.windows(2).map(|w| w[1] - w[0]).enumerate() {
            counts.entry(spacing).or_insert((0, order)).0 += 1;
        }
        // Ties go to the spacing seen first
        counts
            .into_iter()
            .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
            .map(|(spacing, _)| spacing)
    }

    /// Frames whose spacing to the next onset suggests one or more missed triggers.
    ///
    /// This is a sanity signal only; alignment proceeds regardless.
    pub fn suspect_dropped_triggers(&self) -> Vec<usize> {
        let Some(expected) = self.samples_per_frame() else {
            return vec![];
        };
        self.onsets
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[1] - w[0] >= expected * DROPPED_TRIGGER_FACTOR)
            .map(|(frame, _)| frame)
            .collect()
    }
}

/// Find the sample index of every frame start
fn find_frame_onsets(samples: &[SerialSample]) -> Vec<usize> {
    let mut onsets: Vec<usize> = samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| {
            w[0].frame_trigger_level.checked_add(1) == Some(w[1].frame_trigger_level)
        })
        .map(|(idx, _)| idx + 1)
        .collect();
    if onsets.is_empty() {
        return onsets;
    }
    onsets.push(0);
    onsets.sort_unstable();
    onsets.dedup();
    onsets
}

/// Group bitcodes by frame. The final frame absorbs every remaining sample.
fn group_frames(samples: &[SerialSample], onsets: &[usize]) -> Vec<FrameRecord> {
    onsets
        .iter()
        .enumerate()
        .map(|(frame_index, &start)| {
            let stop = onsets.get(frame_index + 1).copied().unwrap_or(samples.len());
            FrameRecord {
                frame_index,
                bitcode_samples: samples[start..stop]
                    .iter()
                    .map(|s| s.bitcode_value)
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::samples_from_modes;

    #[test]
    fn test_onsets_on_rising_edges() {
        // Trigger high for the first half of every 100 sample frame
        let samples: Vec<SerialSample> = (0..300)
            .map(|i| SerialSample::new(if i % 100 < 50 { 1 } else { 0 }, 7))
            .collect();
        let decoder = FrameTriggerDecoder::new(&samples);
        assert_eq!(decoder.onsets, vec![0, 100, 200]);
        assert_eq!(decoder.n_frames(), 3);
        assert_eq!(decoder.samples_per_frame(), Some(100));
        assert!(decoder.suspect_dropped_triggers().is_empty());
    }

    #[test]
    fn test_trigger_low_at_start() {
        let levels = [0, 0, 1, 1, 0, 1, 0, 0];
        let samples: Vec<SerialSample> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| SerialSample::new(*l, i as i64))
            .collect();
        let decoder = FrameTriggerDecoder::new(&samples);
        assert_eq!(decoder.onsets, vec![0, 2, 5]);
        assert_eq!(decoder.frames()[0].bitcode_samples, vec![0, 1]);
        assert_eq!(decoder.frames()[1].bitcode_samples, vec![2, 3, 4]);
        // Final frame runs to the end of the log
        assert_eq!(decoder.frames()[2].bitcode_samples, vec![5, 6, 7]);
    }

    #[test]
    fn test_no_rising_edges() {
        let samples = vec![SerialSample::new(1, 3); 50];
        let decoder = FrameTriggerDecoder::new(&samples);
        assert_eq!(decoder.n_frames(), 0);
        assert_eq!(decoder.samples_per_frame(), None);

        assert_eq!(FrameTriggerDecoder::new(&[]).n_frames(), 0);
    }

    #[test]
    fn test_dropped_trigger_is_flagged() {
        let mut samples = samples_from_modes(&[1, 1, 1, 1, 1], 10);
        // Erase the trigger pulse of frame 2 so frames 1 and 2 merge
        for sample in samples.iter_mut().skip(20).take(10) {
            sample.frame_trigger_level = 0;
        }
        let decoder = FrameTriggerDecoder::new(&samples);
        assert_eq!(decoder.onsets, vec![0, 10, 30, 40]);
        assert_eq!(decoder.samples_per_frame(), Some(10));
        assert_eq!(decoder.suspect_dropped_triggers(), vec![1]);
    }

    #[test]
    fn test_extreme_trigger_levels() {
        let levels = [i64::MIN, i64::MAX, i64::MAX - 1, i64::MAX, 0];
        let samples: Vec<SerialSample> = levels.iter().map(|l| SerialSample::new(*l, 1)).collect();
        let decoder = FrameTriggerDecoder::new(&samples);
        assert_eq!(decoder.onsets, vec![0, 3]);
    }
}
