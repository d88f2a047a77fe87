//! Bounded hand-off between the audio callback and the render loop
//!
//! The callback side never allocates: it fills buffers taken from a fixed
//! pool and sends them on. The reader returns each buffer to the pool when
//! the `Block` it received is dropped. If the pool is empty because the
//! reader is behind, the incoming audio is dropped and counted.

use cpal::{FromSample, Sample};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

/// Create a queue of `depth` preallocated blocks of `block_size` frames.
pub fn block_queue(block_size: usize, depth: usize) -> (BlockWriter, BlockReader) {
    let block_size = block_size.max(1);
    let depth = depth.max(1);

    let (filled_tx, filled_rx) = mpsc::sync_channel(depth);
    let (free_tx, free_rx) = mpsc::sync_channel(depth);
    for _ in 0..depth {
        // Cannot fail: the channel has room for exactly `depth` buffers
        let _ = free_tx.try_send(Vec::with_capacity(block_size));
    }

    let dropped = Arc::new(AtomicU64::new(0));
    let writer = BlockWriter {
        block_size,
        filled: filled_tx,
        free: free_rx,
        recycle: free_tx.clone(),
        dropped: Arc::clone(&dropped),
    };
    let reader = BlockReader {
        filled: filled_rx,
        recycle: free_tx,
        dropped,
    };
    (writer, reader)
}

/// Audio-thread end of the queue
pub struct BlockWriter {
    block_size: usize,
    filled: SyncSender<Vec<f32>>,
    free: Receiver<Vec<f32>>,
    recycle: SyncSender<Vec<f32>>,
    dropped: Arc<AtomicU64>,
}

impl BlockWriter {
    /// Split interleaved `data` into blocks of at most `block_size` frames,
    /// keeping only the first channel of each frame.
    ///
    /// Returns false once the reader is gone.
    pub fn push_frames<T>(&mut self, data: &[T], channels: usize) -> bool
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let channels = channels.max(1);
        for frames in data.chunks(channels * self.block_size) {
            let mut block = match self.free.try_recv() {
                Ok(block) => block,
                Err(_) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            block.clear();
            block.extend(frames.chunks(channels).map(|frame| f32::from_sample(frame[0])));

            match self.filled.try_send(block) {
                Ok(()) => {}
                Err(TrySendError::Full(block)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    let _ = self.recycle.try_send(block);
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }
}

/// Render-loop end of the queue
pub struct BlockReader {
    filled: Receiver<Vec<f32>>,
    recycle: SyncSender<Vec<f32>>,
    dropped: Arc<AtomicU64>,
}

impl BlockReader {
    /// Wait up to `timeout` for the next block
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Block<'_>, RecvTimeoutError> {
        let samples = self.filled.recv_timeout(timeout)?;
        Ok(Block {
            samples: Some(samples),
            recycle: &self.recycle,
        })
    }

    /// Blocks lost because the reader fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// One received block; its buffer goes back to the pool on drop
pub struct Block<'a> {
    samples: Option<Vec<f32>>,
    recycle: &'a SyncSender<Vec<f32>>,
}

impl Deref for Block<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.samples.as_deref().unwrap_or(&[])
    }
}

impl Drop for Block<'_> {
    fn drop(&mut self) {
        if let Some(samples) = self.samples.take() {
            let _ = self.recycle.try_send(samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(50);

    #[test]
    fn splits_long_callbacks_into_blocks() {
        let (mut writer, reader) = block_queue(4, 4);
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        assert!(writer.push_frames(&data, 1));

        assert_eq!(&*reader.recv_timeout(WAIT).unwrap(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(&*reader.recv_timeout(WAIT).unwrap(), &[4.0, 5.0, 6.0, 7.0]);
        // short tail is delivered as a short block
        assert_eq!(&*reader.recv_timeout(WAIT).unwrap(), &[8.0, 9.0]);
        assert!(matches!(
            reader.recv_timeout(WAIT),
            Err(RecvTimeoutError::Timeout)
        ));
    }

    #[test]
    fn keeps_first_channel_only() {
        let (mut writer, reader) = block_queue(8, 2);
        writer.push_frames(&[0.1_f32, 9.0, 0.2, 9.0, 0.3, 9.0], 2);

        assert_eq!(&*reader.recv_timeout(WAIT).unwrap(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn counts_drops_when_pool_is_exhausted() {
        let (mut writer, reader) = block_queue(2, 2);
        writer.push_frames(&[0.0_f32; 8], 1);

        assert_eq!(reader.dropped(), 2);
        let first = reader.recv_timeout(WAIT).unwrap();
        let second = reader.recv_timeout(WAIT).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn dropped_block_returns_buffer_to_pool() {
        let (mut writer, reader) = block_queue(2, 1);
        writer.push_frames(&[0.5_f32, 0.5], 1);
        drop(reader.recv_timeout(WAIT).unwrap());

        writer.push_frames(&[0.7_f32, 0.7], 1);
        assert_eq!(&*reader.recv_timeout(WAIT).unwrap(), &[0.7, 0.7]);
        assert_eq!(reader.dropped(), 0);
    }

    #[test]
    fn converts_integer_samples() {
        let (mut writer, reader) = block_queue(4, 1);
        writer.push_frames(&[0_i16, i16::MIN], 1);

        assert_eq!(&*reader.recv_timeout(WAIT).unwrap(), &[0.0, -1.0]);
    }

    #[test]
    fn reader_sees_disconnect_after_writer_drops() {
        let (writer, reader) = block_queue(2, 1);
        drop(writer);
        assert!(matches!(
            reader.recv_timeout(WAIT),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn writer_stops_once_reader_is_gone() {
        let (mut writer, reader) = block_queue(2, 2);
        drop(reader);
        assert!(!writer.push_frames(&[0.1_f32, 0.2], 1));
    }
}
