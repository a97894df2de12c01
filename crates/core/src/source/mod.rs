//! Boundary to the audio decoding collaborator.
//!
//! A [`WaveformSource`] is opened once when a render session is created and
//! then read block by block. Every read either fills the destination slice
//! completely or fails; short reads are never reported as success.

mod wav;

use serde::{Deserialize, Serialize};

use crate::{Result, SpectrographError};

pub use wav::WavSource;

/// Metadata reported by a source when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub channel_count: usize,
    /// Length of each channel in samples.
    pub total_samples: u64,
    pub sample_rate: Option<u32>,
}

impl SourceInfo {
    /// Duration in seconds, when the sample rate is known.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.sample_rate
            .filter(|rate| *rate > 0)
            .map(|rate| self.total_samples as f64 / f64::from(rate))
    }
}

/// Seekable multichannel PCM provider.
pub trait WaveformSource {
    /// Prepares the source for reading and reports its layout.
    fn open(&mut self) -> Result<SourceInfo>;

    /// Fills `dest` with `dest.len()` samples of `channel`, starting at
    /// sample index `start`.
    fn read(&mut self, channel: usize, start: u64, dest: &mut [f32]) -> Result<()>;
}

impl<S: WaveformSource + ?Sized> WaveformSource for Box<S> {
    fn open(&mut self) -> Result<SourceInfo> {
        (**self).open()
    }

    fn read(&mut self, channel: usize, start: u64, dest: &mut [f32]) -> Result<()> {
        (**self).read(channel, start, dest)
    }
}

/// Planar, fully decoded audio held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    channels: Vec<Vec<f32>>,
    sample_rate: Option<u32>,
}

impl MemorySource {
    /// Creates a source from one sample vector per channel.
    pub fn new(channels: Vec<Vec<f32>>) -> Self {
        Self {
            channels,
            sample_rate: None,
        }
    }

    pub fn mono(samples: Vec<f32>) -> Self {
        Self::new(vec![samples])
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }
}

impl WaveformSource for MemorySource {
    fn open(&mut self) -> Result<SourceInfo> {
        let Some(first) = self.channels.first() else {
            return Err(SpectrographError::unavailable("source has no channels"));
        };

        let total_samples = first.len();
        if self.channels.iter().any(|c| c.len() != total_samples) {
            return Err(SpectrographError::unavailable(
                "channels have mismatched lengths",
            ));
        }

        Ok(SourceInfo {
            channel_count: self.channels.len(),
            total_samples: total_samples as u64,
            sample_rate: self.sample_rate,
        })
    }

    fn read(&mut self, channel: usize, start: u64, dest: &mut [f32]) -> Result<()> {
        let failure = |reason: &str| SpectrographError::ReadFailure {
            channel,
            start,
            count: dest.len(),
            reason: reason.to_string(),
        };

        let samples = self
            .channels
            .get(channel)
            .ok_or_else(|| failure("no such channel"))?;
        let begin = usize::try_from(start).map_err(|_| failure("start out of range"))?;
        let range = samples
            .get(begin..begin + dest.len())
            .ok_or_else(|| failure("range exceeds channel length"))?;

        dest.copy_from_slice(range);
        Ok(())
    }
}
