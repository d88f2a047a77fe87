//! Per-block amplitude statistics
//!
//! Turns each captured block into a (peak, RMS) pair, keeps the last
//! `PEAK_HISTORY` pairs in a fixed ring, and exposes their averages for the
//! status line. Everything here is callable from the audio thread: no I/O,
//! no locking and no allocation outside of `format_summary`.
//!
//! # Non-finite input
//! Samples are not sanitized. A NaN sample makes the block RMS NaN, while the
//! peak scan skips it (comparisons against NaN are false). An infinite sample
//! yields an infinite peak and RMS. Averages are recomputed from the window on
//! every read, so a poisoned entry stops affecting them once it is evicted.

use crate::config::constants::{PEAK_HISTORY, THRESH_HIGH, THRESH_LOW, THRESH_MED};
use std::fmt;

/// Amplitude band of a single sample, ordered from quietest to loudest
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AmplitudeClass {
    Quiet,
    Low,
    Medium,
    High,
}

/// Classify a sample by its absolute value.
///
/// Bands are closed on the upper side: `[0, 0.1]` quiet, `(0.1, 0.3]` low,
/// `(0.3, 0.6]` medium, anything louder high. NaN falls through to quiet.
pub fn classify(sample: f32) -> AmplitudeClass {
    let abs_val = sample.abs();
    if abs_val > THRESH_HIGH {
        AmplitudeClass::High
    } else if abs_val > THRESH_MED {
        AmplitudeClass::Medium
    } else if abs_val > THRESH_LOW {
        AmplitudeClass::Low
    } else {
        AmplitudeClass::Quiet
    }
}

/// Peak and RMS of one block
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockStats {
    pub peak: f32,
    pub rms: f32,
}

impl BlockStats {
    /// Measure a block. Returns `None` for an empty block.
    pub fn measure(samples: &[f32]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut peak = 0.0_f32;
        let mut sum_sq = 0.0_f32;
        for &sample in samples {
            let abs_val = sample.abs();
            if abs_val > peak {
                peak = abs_val;
            }
            sum_sq += sample * sample;
        }

        Some(Self {
            peak,
            rms: (sum_sq / samples.len() as f32).sqrt(),
        })
    }
}

/// Fixed-capacity FIFO of block statistics.
/// Once full, every push overwrites the oldest entry.
#[derive(Clone, Debug)]
pub struct RollingHistory {
    entries: [BlockStats; PEAK_HISTORY],
    /// Index of the oldest entry
    head: usize,
    len: usize,
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHistory {
    pub const CAPACITY: usize = PEAK_HISTORY;

    pub fn new() -> Self {
        Self {
            entries: [BlockStats::default(); PEAK_HISTORY],
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, stats: BlockStats) {
        if self.len < Self::CAPACITY {
            self.entries[(self.head + self.len) % Self::CAPACITY] = stats;
            self.len += 1;
        } else {
            self.entries[self.head] = stats;
            self.head = (self.head + 1) % Self::CAPACITY;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &BlockStats> + '_ {
        (0..self.len).map(move |i| &self.entries[(self.head + i) % Self::CAPACITY])
    }

    fn mean_of(&self, field: impl Fn(&BlockStats) -> f32) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        self.iter().map(field).sum::<f32>() / self.len as f32
    }
}

/// Whether any block has been seen yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Warm,
}

/// Averages rendered at the end of each status line
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub peak: f32,
    pub rms: f32,
}

/// One labelled average, rendered as `Label:x.xxx`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SummaryField {
    pub label: &'static str,
    pub value: f32,
}

impl fmt::Display for SummaryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:.3}", self.label, self.value)
    }
}

impl Summary {
    /// Fields in display order, separated by a single space when rendered
    pub fn fields(&self) -> [SummaryField; 2] {
        [
            SummaryField { label: "Peak", value: self.peak },
            SummaryField { label: "RMS", value: self.rms },
        ]
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [peak, rms] = self.fields();
        write!(f, "{} {}", peak, rms)
    }
}

/// Rolling amplitude statistics over the most recent blocks.
///
/// Single writer: `process_block` takes `&mut self`, so sharing an engine
/// between the audio thread and a renderer needs external synchronization.
#[derive(Clone, Debug, Default)]
pub struct StatsEngine {
    history: RollingHistory,
}

impl StatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one block. An empty block is ignored.
    pub fn process_block(&mut self, samples: &[f32]) {
        if let Some(stats) = BlockStats::measure(samples) {
            self.history.push(stats);
        }
    }

    /// Mean block peak over the window, 0.0 before the first block
    pub fn average_peak(&self) -> f32 {
        self.history.mean_of(|s| s.peak)
    }

    /// Mean block RMS over the window, 0.0 before the first block
    pub fn average_rms(&self) -> f32 {
        self.history.mean_of(|s| s.rms)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            peak: self.average_peak(),
            rms: self.average_rms(),
        }
    }

    /// `Peak:x.xxx RMS:x.xxx`, without any color markup
    pub fn format_summary(&self) -> String {
        self.summary().to_string()
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    pub fn state(&self) -> EngineState {
        if self.history.is_empty() {
            EngineState::Empty
        } else {
            EngineState::Warm
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fresh_engine_reports_zero() {
        let engine = StatsEngine::new();
        assert_eq!(engine.average_peak(), 0.0);
        assert_eq!(engine.average_rms(), 0.0);
        assert_eq!(engine.state(), EngineState::Empty);
        assert_eq!(engine.format_summary(), "Peak:0.000 RMS:0.000");
    }

    #[test]
    fn four_sample_block() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[0.5, -0.2, 0.05, -0.9]);

        let expected_rms = ((0.25_f32 + 0.04 + 0.0025 + 0.81) / 4.0).sqrt();
        assert_relative_eq!(engine.average_peak(), 0.9);
        assert_relative_eq!(engine.average_rms(), expected_rms, epsilon = 1e-6);
        assert_eq!(engine.state(), EngineState::Warm);
        assert_eq!(engine.format_summary(), "Peak:0.900 RMS:0.525");

        assert_eq!(classify(0.5), AmplitudeClass::Medium);
        assert_eq!(classify(-0.2), AmplitudeClass::Low);
        assert_eq!(classify(0.05), AmplitudeClass::Quiet);
        assert_eq!(classify(-0.9), AmplitudeClass::High);
    }

    #[test]
    fn peak_is_exact_max_abs() {
        let block = [0.1, -0.75, 0.3, 0.7499];
        let stats = BlockStats::measure(&block).unwrap();
        assert_eq!(stats.peak, 0.75);
    }

    #[test]
    fn rms_zero_only_for_silence() {
        let silent = BlockStats::measure(&[0.0; 64]).unwrap();
        assert_eq!(silent.rms, 0.0);
        assert_eq!(silent.peak, 0.0);

        let mut block = [0.0_f32; 64];
        block[63] = -0.001;
        let nearly = BlockStats::measure(&block).unwrap();
        assert!(nearly.rms > 0.0);
    }

    #[test]
    fn history_length_saturates_at_capacity() {
        let mut engine = StatsEngine::new();
        for n in 1..=25 {
            engine.process_block(&[0.2; 8]);
            assert_eq!(engine.history().len(), n.min(RollingHistory::CAPACITY));
        }
    }

    #[test]
    fn eleventh_block_evicts_the_first() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[1.0; 4]);
        for _ in 0..10 {
            engine.process_block(&[0.5; 4]);
        }
        assert_relative_eq!(engine.average_peak(), 0.5);
        assert_relative_eq!(engine.average_rms(), 0.5);
    }

    #[test]
    fn history_iterates_oldest_first() {
        let mut history = RollingHistory::new();
        for i in 0..13 {
            history.push(BlockStats { peak: i as f32, rms: 0.0 });
        }
        let peaks: Vec<f32> = history.iter().map(|s| s.peak).collect();
        assert_eq!(peaks, (3..13).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[]);
        assert_eq!(engine.state(), EngineState::Empty);

        engine.process_block(&[0.4, -0.4]);
        let before = engine.summary();
        engine.process_block(&[]);
        assert_eq!(engine.summary(), before);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn short_final_block_is_measured_by_its_own_length() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[0.3; 1024]);
        engine.process_block(&[0.6; 3]);
        assert_relative_eq!(engine.average_rms(), 0.45, epsilon = 1e-4);
    }

    #[test]
    fn reads_are_pure() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[0.25, -0.5, 0.125]);
        assert_eq!(engine.average_peak(), engine.average_peak());
        assert_eq!(engine.average_rms(), engine.average_rms());
        assert_eq!(engine.format_summary(), engine.format_summary());
    }

    #[test]
    fn classify_boundaries_fall_in_lower_band() {
        assert_eq!(classify(0.0), AmplitudeClass::Quiet);
        assert_eq!(classify(0.1), AmplitudeClass::Quiet);
        assert_eq!(classify(-0.3), AmplitudeClass::Low);
        assert_eq!(classify(0.6), AmplitudeClass::Medium);
        assert_eq!(classify(0.600_001), AmplitudeClass::High);
        assert_eq!(classify(f32::INFINITY), AmplitudeClass::High);
    }

    #[test]
    fn classify_is_monotonic_in_magnitude() {
        let mut prev = AmplitudeClass::Quiet;
        for step in 0..=1200 {
            let x = step as f32 / 1000.0;
            let class = classify(x);
            assert!(class >= prev, "band dropped at {x}");
            assert_eq!(class, classify(-x));
            prev = class;
        }
        assert_eq!(prev, AmplitudeClass::High);
    }

    #[test]
    fn nan_poisons_rms_until_evicted() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[0.5, f32::NAN]);
        assert!(engine.average_rms().is_nan());
        assert_relative_eq!(engine.average_peak(), 0.5);

        for _ in 0..10 {
            engine.process_block(&[0.2; 4]);
        }
        assert_relative_eq!(engine.average_rms(), 0.2, epsilon = 1e-5);
    }

    #[test]
    fn infinity_saturates_peak_and_rms() {
        let mut engine = StatsEngine::new();
        engine.process_block(&[f32::INFINITY, 0.1]);
        assert_eq!(engine.average_peak(), f32::INFINITY);
        assert_eq!(engine.average_rms(), f32::INFINITY);

        for _ in 0..10 {
            engine.process_block(&[0.4; 4]);
        }
        assert_relative_eq!(engine.average_peak(), 0.4, epsilon = 1e-5);
        assert!(engine.average_rms().is_finite());
    }

    #[test]
    fn summary_uses_three_decimals() {
        let summary = Summary { peak: 0.12345, rms: 1.0 };
        assert_eq!(summary.to_string(), "Peak:0.123 RMS:1.000");
    }
}
