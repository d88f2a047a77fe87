//! cpal host, device, and stream plumbing

use super::queue::BlockWriter;
use super::CaptureError;
use crate::config::VisualizerConfig;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{
    BufferSize, Device, FromSample, SampleFormat, SizedSample, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use std::sync::mpsc::SyncSender;

/// RAII guard to suppress stderr during ALSA device enumeration.
/// ALSA prints probe failures straight to fd 2, which would land in the
/// middle of the status line. Restores stderr when dropped.
#[cfg(unix)]
pub struct StderrSuppressor {
    saved_fd: i32,
    _dev_null: std::fs::File,
}

#[cfg(unix)]
impl StderrSuppressor {
    pub fn new() -> Option<Self> {
        use std::os::unix::io::AsRawFd;

        let dev_null = std::fs::File::open("/dev/null").ok()?;

        let saved_fd = unsafe { libc::dup(2) };
        if saved_fd < 0 {
            return None;
        }

        if unsafe { libc::dup2(dev_null.as_raw_fd(), 2) } < 0 {
            unsafe {
                libc::close(saved_fd);
            }
            return None;
        }

        Some(Self {
            saved_fd,
            _dev_null: dev_null,
        })
    }
}

#[cfg(unix)]
impl Drop for StderrSuppressor {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved_fd, 2);
            libc::close(self.saved_fd);
        }
    }
}

#[cfg(not(unix))]
pub struct StderrSuppressor;

#[cfg(not(unix))]
impl StderrSuppressor {
    pub fn new() -> Option<Self> {
        None
    }
}

/// Names of every input device on the default host
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let _quiet = StderrSuppressor::new();
    let host = cpal::default_host();
    Ok(host
        .input_devices()?
        .map(|d| d.name().unwrap_or_else(|_| "Unknown".to_string()))
        .collect())
}

/// Default input device, or the one whose name matches `name`
pub fn find_input_device(name: Option<&str>) -> Result<Device, CaptureError> {
    let host = cpal::default_host();
    log::debug!("Host: {:?}", host.id());

    match name {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string())),
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
    }
}

/// Pick the narrowest supported config at the requested rate, preferring f32.
/// Falls back to the device default when the rate is not supported at all;
/// the flag is true in that case.
pub fn choose_config(
    device: &Device,
    config: &VisualizerConfig,
) -> Result<(SupportedStreamConfig, bool), CaptureError> {
    let rate = cpal::SampleRate(config.sample_rate);
    let preferred = device
        .supported_input_configs()
        .map_err(|e| CaptureError::Config(e.to_string()))?
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter(|range| is_supported_format(range.sample_format()))
        .min_by_key(|range| (range.channels(), range.sample_format() != SampleFormat::F32));

    match preferred {
        Some(range) => Ok((range.with_sample_rate(rate), false)),
        None => device
            .default_input_config()
            .map(|default| (default, true))
            .map_err(|e| CaptureError::Config(e.to_string())),
    }
}

fn is_supported_format(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

/// Ask for callbacks of exactly `block_size` frames when the device allows it
pub fn buffer_size_for(supported: &SupportedBufferSize, block_size: usize) -> BufferSize {
    let frames = u32::try_from(block_size).unwrap_or(u32::MAX);
    match supported {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            BufferSize::Fixed(frames)
        }
        _ => BufferSize::Default,
    }
}

/// Frames per callback, when the stream was opened with a fixed size
pub fn fixed_frames(buffer_size: &BufferSize) -> Option<usize> {
    match buffer_size {
        BufferSize::Fixed(frames) => Some(*frames as usize),
        BufferSize::Default => None,
    }
}

/// Build an input stream that feeds `writer`, converting to f32 as needed.
/// Stream errors go to `errors` so they can be logged once the terminal is restored.
pub fn build_stream(
    device: &Device,
    supported: &SupportedStreamConfig,
    stream_config: &StreamConfig,
    writer: BlockWriter,
    errors: SyncSender<String>,
) -> Result<cpal::Stream, CaptureError> {
    match supported.sample_format() {
        SampleFormat::F32 => build_typed::<f32>(device, stream_config, writer, errors),
        SampleFormat::I16 => build_typed::<i16>(device, stream_config, writer, errors),
        SampleFormat::U16 => build_typed::<u16>(device, stream_config, writer, errors),
        other => Err(CaptureError::UnsupportedFormat(other)),
    }
}

fn build_typed<T>(
    device: &Device,
    stream_config: &StreamConfig,
    mut writer: BlockWriter,
    errors: SyncSender<String>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = stream_config.channels as usize;
    let stream = device.build_input_stream(
        stream_config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            writer.push_frames(data, channels);
        },
        move |err| {
            // Full means earlier errors are still unread; those are enough
            let _ = errors.try_send(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}
