//! Microphone capture: device lifecycle and the block hand-off to the render loop

mod device;
pub(crate) mod queue;

pub use device::list_input_devices;
pub use queue::BlockReader;

use crate::config::constants::QUEUE_DEPTH;
use crate::config::VisualizerConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;
use std::io;
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;

/// Audio capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No audio input device found")]
    NoDevice,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0:?}")]
    UnsupportedFormat(SampleFormat),

    #[error("Failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Terminal error: {0}")]
    Terminal(#[from] io::Error),
}

/// Stream errors kept until the terminal is restored and they can be logged
const STREAM_ERROR_DEPTH: usize = 16;

/// An opened input stream plus the reader for the blocks it produces.
///
/// Lifecycle is open, start, [blocks], stop, then drop to close the stream.
pub struct CaptureDriver {
    stream: cpal::Stream,
    reader: BlockReader,
    errors: Receiver<String>,
    device_name: String,
    sample_rate: u32,
    buffer: Option<usize>,
    channels: u16,
}

impl CaptureDriver {
    /// Open the configured device and build a stream for it (not yet running)
    pub fn open(config: &VisualizerConfig) -> Result<Self, CaptureError> {
        let stderr_guard = device::StderrSuppressor::new();

        let device = device::find_input_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let (supported, fell_back) = device::choose_config(&device, config)?;
        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: device::buffer_size_for(supported.buffer_size(), config.block_size),
        };

        let (writer, reader) = queue::block_queue(config.block_size, QUEUE_DEPTH);
        let (error_tx, errors) = mpsc::sync_channel(STREAM_ERROR_DEPTH);
        let stream = device::build_stream(&device, &supported, &stream_config, writer, error_tx)?;

        // stderr is live again from here on, so logging is visible
        drop(stderr_guard);

        log::info!("Device: {}", device_name);
        if fell_back {
            log::warn!(
                "{} Hz not supported by this device, using its default config",
                config.sample_rate
            );
        }
        log::info!(
            "Config: {}Hz, {} channels, {:?}, {:?}",
            stream_config.sample_rate.0,
            stream_config.channels,
            supported.sample_format(),
            stream_config.buffer_size
        );
        let buffer = device::fixed_frames(&stream_config.buffer_size);
        if buffer.is_none() {
            log::info!(
                "Device rejected {}-frame callbacks, block length follows the device",
                config.block_size
            );
        }
        if stream_config.channels > 1 {
            log::info!("Capturing channel 1 of {}", stream_config.channels);
        }

        Ok(Self {
            stream,
            reader,
            errors,
            device_name,
            sample_rate: stream_config.sample_rate.0,
            buffer,
            channels: stream_config.channels,
        })
    }

    pub fn start(&self) -> Result<(), CaptureError> {
        self.stream.play()?;
        Ok(())
    }

    /// Pause the stream. Blocks already queued stay readable.
    pub fn stop(&self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to pause stream: {}", e);
        }
        log::info!(
            "Audio capture stopped ({} blocks dropped)",
            self.reader.dropped()
        );
    }

    pub fn reader(&self) -> &BlockReader {
        &self.reader
    }

    /// Errors reported by the audio library since the last call
    pub fn drain_errors(&self) -> Vec<String> {
        self.errors.try_iter().collect()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per callback, or `None` when the device chooses
    pub fn buffer(&self) -> Option<usize> {
        self.buffer
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
