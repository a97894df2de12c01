//! Render session: drives one waveform source through the spectrogram
//! pipeline, one block per step.

mod shared;

use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::{
    canvas::Canvas,
    config::RenderConfig,
    downmix::BlockReader,
    listener::{CompletionListener, ListenerId, ListenerSet},
    mapper::{columns_for_block, PixelMapper, FIRST_MAPPED_ROW},
    scheduler::TimeSliceClient,
    source::{SourceInfo, WaveformSource},
    transform::SpectralTransform,
    Result, SpectrographError,
};

pub use shared::SharedSession;

/// Delay hint returned by every step; rendering is CPU bound and may run
/// again immediately.
pub const STEP_DELAY: Duration = Duration::ZERO;

/// Snapshot of how far a session has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub blocks_processed: u64,
    pub total_blocks: u64,
    pub samples_consumed: u64,
    pub total_samples: u64,
}

impl Progress {
    /// Completed fraction in `[0, 1]`. An empty source counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total_samples == 0 {
            1.0
        } else {
            self.samples_consumed as f64 / self.total_samples as f64
        }
    }
}

/// Single-use incremental spectrogram renderer bound to one source.
///
/// Each [`step`](Self::step) reads and renders exactly one block of
/// `block_size` samples. Once the source is exhausted the session is
/// complete and further steps do nothing.
pub struct RenderSession<S> {
    source: S,
    info: SourceInfo,
    block_size: usize,
    total_blocks: u64,
    cursor: u64,
    blocks_processed: u64,
    complete: bool,
    started: bool,
    reader: BlockReader,
    transform: SpectralTransform,
    mapper: PixelMapper,
    canvas: Canvas,
    listeners: ListenerSet,
}

impl<S: WaveformSource> RenderSession<S> {
    /// Opens `source` and sizes every scratch buffer for blocks of
    /// `2 * block_size_unit` samples. The canvas starts empty (0x0) until
    /// [`set_image_size`](Self::set_image_size) is called.
    pub fn initialize(mut source: S, block_size_unit: usize) -> Result<Self> {
        if block_size_unit == 0 {
            return Err(SpectrographError::Config(
                "block size unit must be at least 1".to_string(),
            ));
        }

        let info = source.open()?;
        if info.channel_count == 0 {
            return Err(SpectrographError::unavailable("source reports zero channels"));
        }

        let block_size = block_size_unit * 2;
        let total_blocks = info.total_samples.div_ceil(block_size as u64);
        let transform = SpectralTransform::new();

        tracing::info!(
            channels = info.channel_count,
            total_samples = info.total_samples,
            block_size,
            total_blocks,
            "initialised render session"
        );

        Ok(Self {
            source,
            info,
            block_size,
            total_blocks,
            cursor: 0,
            blocks_processed: 0,
            complete: false,
            started: false,
            reader: BlockReader::new(info.channel_count, block_size),
            mapper: PixelMapper::new(0, transform.bin_count()),
            transform,
            canvas: Canvas::new(0, 0),
            listeners: ListenerSet::new(),
        })
    }

    /// Initialises a session and sizes its canvas from `config`.
    pub fn from_config(source: S, config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        let mut session = Self::initialize(source, config.block_size_unit)?;
        session.set_image_size(config.image.width, config.image.height)?;
        Ok(session)
    }

    /// Replaces the canvas with a blank `width` x `height` image. Only
    /// allowed before the first step.
    pub fn set_image_size(&mut self, width: u32, height: u32) -> Result<()> {
        if self.started {
            return Err(SpectrographError::InvalidSequencing(
                "image size can only be set before rendering starts",
            ));
        }

        self.canvas = Canvas::new(width, height);
        self.mapper = PixelMapper::new(height, self.transform.bin_count());
        Ok(())
    }

    /// Reads, transforms and draws the next block.
    ///
    /// On error nothing is drawn and the cursor does not move, so the same
    /// block is attempted again on the next call.
    pub fn step(&mut self) -> Result<Duration> {
        if self.complete {
            return Ok(STEP_DELAY);
        }
        self.started = true;

        let remaining = self.info.total_samples - self.cursor;
        if remaining == 0 {
            self.finish();
            return Ok(STEP_DELAY);
        }

        let samples = remaining.min(self.block_size as u64) as usize;
        let cursor = self.cursor;
        let mono = self
            .reader
            .read_block(&mut self.source, cursor, samples)
            .inspect_err(|err| {
                tracing::warn!(cursor, samples, error = %err, "block read failed");
            })?;
        let magnitudes = self.transform.process(mono)?;
        let colours = self.mapper.map_column(magnitudes);

        let columns = columns_for_block(
            samples,
            self.block_size,
            self.canvas.width(),
            self.total_blocks,
        );
        self.canvas.push_columns(columns, FIRST_MAPPED_ROW, colours);

        self.cursor += samples as u64;
        self.blocks_processed += 1;

        tracing::debug!(
            block = self.blocks_processed,
            total_blocks = self.total_blocks,
            samples,
            columns,
            "rendered block"
        );

        if self.cursor == self.info.total_samples {
            self.finish();
        }

        Ok(STEP_DELAY)
    }

    fn finish(&mut self) {
        self.complete = true;
        tracing::info!(
            blocks = self.blocks_processed,
            columns = self.canvas.write_head(),
            "render session complete"
        );
        self.listeners.notify_complete();
    }
}

impl<S> RenderSession<S> {
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Borrow of the current canvas contents.
    pub fn image(&self) -> &RgbImage {
        self.canvas.image()
    }

    /// Owned copy of the canvas, safe to hand to another thread.
    pub fn snapshot(&self) -> RgbImage {
        self.canvas.image().clone()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn source_info(&self) -> SourceInfo {
        self.info
    }

    pub fn progress(&self) -> Progress {
        Progress {
            blocks_processed: self.blocks_processed,
            total_blocks: self.total_blocks,
            samples_consumed: self.cursor,
            total_samples: self.info.total_samples,
        }
    }

    pub fn add_listener(&mut self, listener: impl CompletionListener + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl<S: WaveformSource> TimeSliceClient for RenderSession<S> {
    fn use_time_slice(&mut self) -> Result<Duration> {
        self.step()
    }

    fn is_finished(&self) -> bool {
        self.complete
    }
}

impl<S> std::fmt::Debug for RenderSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("info", &self.info)
            .field("block_size", &self.block_size)
            .field("total_blocks", &self.total_blocks)
            .field("cursor", &self.cursor)
            .field("blocks_processed", &self.blocks_processed)
            .field("complete", &self.complete)
            .field("canvas", &(self.canvas.width(), self.canvas.height()))
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use image::Rgb;

    use super::*;
    use crate::source::MemorySource;

    /// Wraps a source and fails the next `failures` reads at or after
    /// `fail_from`.
    struct Flaky {
        inner: MemorySource,
        fail_from: u64,
        failures: usize,
    }

    impl WaveformSource for Flaky {
        fn open(&mut self) -> Result<SourceInfo> {
            self.inner.open()
        }

        fn read(&mut self, channel: usize, start: u64, dest: &mut [f32]) -> Result<()> {
            if start >= self.fail_from && self.failures > 0 {
                self.failures -= 1;
                return Err(SpectrographError::ReadFailure {
                    channel,
                    start,
                    count: dest.len(),
                    reason: "corrupt frame".to_string(),
                });
            }
            self.inner.read(channel, start, dest)
        }
    }

    fn noise(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i * 7919) % 97) as f32 / 97.0 - 0.5).collect()
    }

    fn count_completions<S: WaveformSource>(session: &mut RenderSession<S>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        session.add_listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn block_size_doubles_unit() {
        let session = RenderSession::initialize(MemorySource::mono(vec![0.0; 2500]), 256).unwrap();

        assert_eq!(session.block_size(), 512);
        assert_eq!(session.total_blocks(), 5);
        assert!(!session.is_complete());
    }

    #[test]
    fn rejects_unusable_sources() {
        let err = RenderSession::initialize(MemorySource::new(Vec::new()), 256).unwrap_err();
        assert!(matches!(err, SpectrographError::SourceUnavailable(_)));

        let err = RenderSession::initialize(MemorySource::mono(vec![0.0; 8]), 0).unwrap_err();
        assert!(matches!(err, SpectrographError::Config(_)));
    }

    #[test]
    fn processes_one_block_per_step() {
        let mut session =
            RenderSession::initialize(MemorySource::mono(noise(1000)), 128).unwrap();
        session.set_image_size(40, 16).unwrap();

        assert_eq!(session.step().unwrap(), Duration::ZERO);
        let progress = session.progress();
        assert_eq!(progress.blocks_processed, 1);
        assert_eq!(progress.samples_consumed, 256);
        assert!(!session.is_complete());

        for _ in 0..3 {
            session.step().unwrap();
        }
        assert_eq!(session.progress().samples_consumed, 1000);
        assert_eq!(session.progress().blocks_processed, 4);
        assert!(session.is_complete());
        assert_eq!(session.progress().fraction(), 1.0);
    }

    #[test]
    fn completion_fires_once() {
        let mut session =
            RenderSession::initialize(MemorySource::mono(noise(600)), 150).unwrap();
        session.set_image_size(20, 8).unwrap();
        let count = count_completions(&mut session);

        for _ in 0..10 {
            session.step().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(session.progress().blocks_processed, 2);
    }

    #[test]
    fn empty_source_completes_with_blank_image() {
        let mut session = RenderSession::initialize(MemorySource::mono(Vec::new()), 64).unwrap();
        session.set_image_size(8, 8).unwrap();
        let count = count_completions(&mut session);

        assert_eq!(session.total_blocks(), 0);
        session.step().unwrap();
        session.step().unwrap();

        assert!(session.is_complete());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(session.image().pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn short_file_completes_in_one_step() {
        let mut session =
            RenderSession::initialize(MemorySource::new(vec![noise(300), noise(300)]), 512)
                .unwrap();
        session.set_image_size(16, 8).unwrap();

        session.step().unwrap();
        assert!(session.is_complete());
        assert_eq!(session.progress().blocks_processed, 1);
        assert_eq!(session.canvas().write_head(), 5);
    }

    #[test]
    fn column_total_tracks_width() {
        let width = 100;
        let mut session =
            RenderSession::initialize(MemorySource::mono(noise(10 * 1024 + 300)), 512).unwrap();
        session.set_image_size(width, 32).unwrap();

        while !session.is_complete() {
            session.step().unwrap();
        }

        let written = session.canvas().write_head() as i64;
        let blocks = session.total_blocks() as i64;
        assert_eq!(blocks, 11);
        assert!((written - i64::from(width)).abs() <= blocks);
    }

    #[test]
    fn resize_after_start_is_rejected() {
        let mut session = RenderSession::initialize(MemorySource::mono(noise(4096)), 256).unwrap();
        session.set_image_size(10, 10).unwrap();
        session.set_image_size(20, 12).unwrap();
        session.step().unwrap();

        let err = session.set_image_size(30, 30).unwrap_err();
        assert!(matches!(err, SpectrographError::InvalidSequencing(_)));
        assert_eq!(session.image().dimensions(), (20, 12));
    }

    #[test]
    fn read_failure_leaves_session_retryable() {
        let source = Flaky {
            inner: MemorySource::mono(noise(2048)),
            fail_from: 1024,
            failures: 1,
        };
        let mut session = RenderSession::initialize(source, 512).unwrap();
        session.set_image_size(8, 16).unwrap();
        let count = count_completions(&mut session);

        session.step().unwrap();
        let before = session.snapshot();

        let err = session.step().unwrap_err();
        assert!(err.is_retryable());
        assert!(!session.is_complete());
        assert_eq!(session.progress().samples_consumed, 1024);
        assert_eq!(session.snapshot(), before);

        session.step().unwrap();
        assert!(session.is_complete());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn snapshot_is_stable_after_completion() {
        let mut session = RenderSession::initialize(MemorySource::mono(noise(3000)), 512).unwrap();
        session.set_image_size(12, 24).unwrap();
        while !session.is_complete() {
            session.step().unwrap();
        }

        let first = session.snapshot();
        session.step().unwrap();
        session.step().unwrap();
        assert_eq!(session.snapshot(), first);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let mut session = RenderSession::initialize(MemorySource::mono(noise(100)), 64).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let id = session.add_listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(session.remove_listener(id));
        session.step().unwrap();
        assert!(session.is_complete());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
