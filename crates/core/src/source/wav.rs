use std::{fs::File, io::BufReader, path::PathBuf};

use hound::{SampleFormat, WavReader, WavSpec};

use super::{SourceInfo, WaveformSource};
use crate::{Result, SpectrographError};

/// WAV file source backed by `hound`.
///
/// The file header is parsed on [`open`](WaveformSource::open). Each read
/// seeks to the requested frame and decodes one interleaved range, which is
/// cached so that reading every channel of a block touches the file once.
pub struct WavSource {
    path: PathBuf,
    reader: Option<WavReader<BufReader<File>>>,
    spec: Option<WavSpec>,
    total_frames: u64,
    cache: FrameCache,
}

#[derive(Debug, Default)]
struct FrameCache {
    start: u64,
    frames: usize,
    interleaved: Vec<f32>,
}

impl FrameCache {
    fn covers(&self, start: u64, count: usize) -> bool {
        start >= self.start && start + count as u64 <= self.start + self.frames as u64
    }
}

impl WavSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            spec: None,
            total_frames: 0,
            cache: FrameCache::default(),
        }
    }

    fn fill_cache(&mut self, channel: usize, start: u64, count: usize) -> Result<()> {
        let failure = |reason: String| SpectrographError::ReadFailure {
            channel,
            start,
            count,
            reason,
        };

        let (Some(reader), Some(spec)) = (self.reader.as_mut(), self.spec) else {
            return Err(failure("source is not open".to_string()));
        };

        if start + count as u64 > self.total_frames {
            return Err(failure(format!(
                "range ends past {} frames",
                self.total_frames
            )));
        }

        let seek_to = u32::try_from(start).map_err(|_| failure("start out of range".into()))?;
        reader.seek(seek_to).map_err(|e| failure(e.to_string()))?;

        let wanted = count * usize::from(spec.channels);
        self.cache.interleaved.clear();
        self.cache.frames = 0;
        decode_samples(reader, spec, wanted, &mut self.cache.interleaved)
            .map_err(|e| failure(e.to_string()))?;

        if self.cache.interleaved.len() != wanted {
            return Err(failure(format!(
                "file truncated after {} of {wanted} samples",
                self.cache.interleaved.len()
            )));
        }

        self.cache.start = start;
        self.cache.frames = count;
        Ok(())
    }
}

impl WaveformSource for WavSource {
    fn open(&mut self) -> Result<SourceInfo> {
        let reader = WavReader::open(&self.path).map_err(|e| {
            SpectrographError::unavailable(format!("{}: {e}", self.path.display()))
        })?;
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(SpectrographError::unavailable(format!(
                "{}: file declares zero channels",
                self.path.display()
            )));
        }
        if spec.sample_format == SampleFormat::Float && spec.bits_per_sample != 32 {
            return Err(SpectrographError::unavailable(format!(
                "{}: unsupported {}-bit float samples",
                self.path.display(),
                spec.bits_per_sample
            )));
        }

        self.total_frames = u64::from(reader.duration());
        self.spec = Some(spec);
        self.reader = Some(reader);
        self.cache = FrameCache::default();

        tracing::debug!(
            path = %self.path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            frames = self.total_frames,
            "opened wav source"
        );

        Ok(SourceInfo {
            channel_count: usize::from(spec.channels),
            total_samples: self.total_frames,
            sample_rate: Some(spec.sample_rate),
        })
    }

    fn read(&mut self, channel: usize, start: u64, dest: &mut [f32]) -> Result<()> {
        let Some(spec) = self.spec else {
            return Err(SpectrographError::InvalidSequencing(
                "wav source read before open",
            ));
        };

        let channels = usize::from(spec.channels);
        if channel >= channels {
            return Err(SpectrographError::ReadFailure {
                channel,
                start,
                count: dest.len(),
                reason: format!("source has {channels} channels"),
            });
        }

        if !self.cache.covers(start, dest.len()) {
            self.fill_cache(channel, start, dest.len())?;
        }

        let offset = (start - self.cache.start) as usize;
        let frames = self
            .cache
            .interleaved
            .chunks_exact(channels)
            .skip(offset)
            .take(dest.len());
        for (out, frame) in dest.iter_mut().zip(frames) {
            *out = frame[channel];
        }
        Ok(())
    }
}

impl std::fmt::Debug for WavSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSource")
            .field("path", &self.path)
            .field("spec", &self.spec)
            .field("total_frames", &self.total_frames)
            .finish()
    }
}

fn decode_samples(
    reader: &mut WavReader<BufReader<File>>,
    spec: WavSpec,
    wanted: usize,
    out: &mut Vec<f32>,
) -> std::result::Result<(), hound::Error> {
    match spec.sample_format {
        SampleFormat::Float => {
            for sample in reader.samples::<f32>().take(wanted) {
                out.push(sample?);
            }
        }
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>().take(wanted) {
                out.push(sample? as f32 / full_scale);
            }
        }
    }
    Ok(())
}
