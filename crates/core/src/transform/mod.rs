use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::Result;

/// Transform order; the analysis window is `1 << TRANSFORM_ORDER` samples.
pub const TRANSFORM_ORDER: u32 = 10;
pub const TRANSFORM_LENGTH: usize = 1 << TRANSFORM_ORDER;

/// Windowed, magnitude-only forward FFT over a fixed-length frame.
///
/// Buffers are planned once; [`process`](Self::process) never allocates.
pub struct SpectralTransform {
    length: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    magnitudes: Vec<f32>,
}

impl SpectralTransform {
    pub fn new() -> Self {
        let length = TRANSFORM_LENGTH;
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(length);
        // Hann table over length + 1 points, truncated to the frame.
        let window = (0..length).map(|i| hann_value(i, length + 1)).collect();

        Self {
            length,
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            magnitudes: vec![0.0; length / 2 + 1],
            window,
            plan,
        }
    }

    /// Number of samples in one analysis frame.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of bins from 0 Hz up to, but excluding, Nyquist.
    pub fn bin_count(&self) -> usize {
        self.length / 2
    }

    /// Windows and transforms `block`, returning `length / 2 + 1` magnitudes
    /// from 0 Hz to Nyquist inclusive.
    ///
    /// Blocks shorter than the frame are zero padded; longer blocks are
    /// analysed over their first `length` samples.
    pub fn process(&mut self, block: &[f32]) -> Result<&[f32]> {
        let used = block.len().min(self.length);
        self.input[..used].copy_from_slice(&block[..used]);
        self.input[used..].fill(0.0);

        for (sample, weight) in self.input.iter_mut().zip(&self.window) {
            *sample *= *weight;
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *magnitude = bin.norm();
        }

        Ok(&self.magnitudes)
    }

    /// Magnitudes produced by the most recent [`process`](Self::process).
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }
}

impl Default for SpectralTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("length", &self.length)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
