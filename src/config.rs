/// Fixed parameters of the visualizer
pub mod constants {
    /// Requested capture rate (Hz)
    pub const SAMPLE_RATE: u32 = 44100;
    /// Requested frames per callback
    pub const BLOCK_SIZE: usize = 1024;
    /// Upper bound for `--block-size`; the queue preallocates `QUEUE_DEPTH` blocks
    pub const MAX_BLOCK_SIZE: usize = 16384;
    /// Samples rendered at the start of each status line
    pub const DISPLAY_SAMPLES: usize = 20;
    /// Upper bound for `--display` so one status line stays readable
    pub const MAX_DISPLAY_SAMPLES: usize = 64;
    /// Number of (peak, rms) entries kept for the rolling averages
    pub const PEAK_HISTORY: usize = 10;

    /// Amplitude above which a sample counts as low rather than quiet
    pub const THRESH_LOW: f32 = 0.1;
    /// Amplitude above which a sample counts as medium
    pub const THRESH_MED: f32 = 0.3;
    /// Amplitude above which a sample counts as high
    pub const THRESH_HIGH: f32 = 0.6;

    /// Blocks that may wait between the audio callback and the render loop
    pub const QUEUE_DEPTH: usize = 8;
    /// Longest wait for a block before the stop token is checked again (ms)
    pub const POLL_INTERVAL_MS: u64 = 100;
}

use constants::*;

/// Runtime configuration for a capture session
#[derive(Clone, Debug, PartialEq)]
pub struct VisualizerConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    pub display_samples: usize,
    pub device: Option<String>,
    pub color: bool,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            block_size: BLOCK_SIZE,
            display_samples: DISPLAY_SAMPLES,
            device: None,
            color: true,
        }
    }
}

impl VisualizerConfig {
    /// Clamp user-supplied values into the ranges the renderer and queue can handle
    pub fn normalized(mut self) -> Self {
        self.block_size = self.block_size.clamp(1, MAX_BLOCK_SIZE);
        self.display_samples = self.display_samples.min(MAX_DISPLAY_SAMPLES);
        self
    }
}
