use crate::{source::WaveformSource, Result};

/// Reads one block per channel and sums the channels into a mono track.
///
/// Scratch storage is allocated once for `channel_count * block_size`
/// samples and reused for every block.
#[derive(Debug, Clone)]
pub struct BlockReader {
    channel_count: usize,
    block_size: usize,
    channel_scratch: Vec<f32>,
    mono: Vec<f32>,
}

impl BlockReader {
    pub fn new(channel_count: usize, block_size: usize) -> Self {
        Self {
            channel_count,
            block_size,
            channel_scratch: vec![0.0; channel_count * block_size],
            mono: vec![0.0; block_size],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Reads `count` samples from every channel starting at `cursor` and
    /// returns their sum. A mono source passes through unchanged.
    ///
    /// Every channel is read before the mix buffer is touched, so a failed
    /// read leaves the previous mono block intact.
    pub fn read_block<S>(&mut self, source: &mut S, cursor: u64, count: usize) -> Result<&[f32]>
    where
        S: WaveformSource + ?Sized,
    {
        let count = count.min(self.block_size);

        for (channel, slot) in self
            .channel_scratch
            .chunks_exact_mut(self.block_size)
            .enumerate()
        {
            source.read(channel, cursor, &mut slot[..count])?;
        }

        let mono = &mut self.mono[..count];
        mono.fill(0.0);
        for slot in self.channel_scratch.chunks_exact(self.block_size) {
            for (mixed, sample) in mono.iter_mut().zip(&slot[..count]) {
                *mixed += *sample;
            }
        }

        Ok(&self.mono[..count])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn mono_passes_through() {
        let samples: Vec<f32> = (0..8).map(|i| i as f32 * 0.25).collect();
        let mut source = MemorySource::mono(samples.clone());
        let mut reader = BlockReader::new(1, 4);

        let block = reader.read_block(&mut source, 4, 4).unwrap();
        assert_eq!(block, &samples[4..8]);
    }

    #[test]
    fn channels_are_summed() {
        let mut source = MemorySource::new(vec![vec![0.5; 6], vec![0.25; 6], vec![-1.0; 6]]);
        let mut reader = BlockReader::new(3, 4);

        let block = reader.read_block(&mut source, 0, 4).unwrap();
        assert_eq!(block, &[-0.25; 4]);
    }

    #[test]
    fn partial_block_is_shorter() {
        let mut source = MemorySource::new(vec![vec![1.0; 6], vec![1.0; 6]]);
        let mut reader = BlockReader::new(2, 4);

        let block = reader.read_block(&mut source, 4, 2).unwrap();
        assert_eq!(block, &[2.0, 2.0]);
    }

    #[test]
    fn failed_read_keeps_previous_mix() {
        let mut source = MemorySource::new(vec![vec![1.0; 4], vec![2.0; 4]]);
        let mut reader = BlockReader::new(2, 4);
        reader.read_block(&mut source, 0, 4).unwrap();

        assert!(reader.read_block(&mut source, 2, 4).is_err());
        assert_eq!(reader.mono, vec![3.0; 4]);
    }
}
