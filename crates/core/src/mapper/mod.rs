//! Converts magnitude spectra into coloured pixel columns.
//!
//! Rows are mapped to bins on a log-skewed scale so that low frequencies get
//! most of the vertical resolution. Levels are normalised against the
//! loudest bin of the same block, so brightness is relative per column.

use image::Rgb;
use serde::{Deserialize, Serialize};

/// Exponent of the row-to-bin skew curve.
pub const SKEW_EXPONENT: f32 = 0.2;
/// Lower bound on the local maximum used for normalisation.
pub const LEVEL_FLOOR: f32 = 1e-5;
/// Row 0 is a fixed border and never written.
pub const FIRST_MAPPED_ROW: u32 = 1;

/// Minimum and maximum magnitude of one block.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: f32,
    pub max: f32,
}

impl LevelRange {
    pub fn of(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        values.iter().fold(
            Self {
                min: f32::INFINITY,
                max: f32::NEG_INFINITY,
            },
            |range, value| Self {
                min: range.min.min(*value),
                max: range.max.max(*value),
            },
        )
    }

    /// Maps `magnitude` linearly from `[0, max]` onto `[0, 1]`, flooring the
    /// maximum at [`LEVEL_FLOOR`].
    pub fn normalise(&self, magnitude: f32) -> f32 {
        (magnitude / self.max.max(LEVEL_FLOOR)).clamp(0.0, 1.0)
    }
}

/// Returns the spectrum bin displayed on `row` of an image `height` rows
/// tall, for a spectrum with `half_length` bins below Nyquist.
pub fn skewed_bin(row: u32, height: u32, half_length: usize) -> usize {
    let proportion = row as f32 / height as f32;
    let skew = 1.0 - (proportion.ln() * SKEW_EXPONENT).exp();
    let bin = (skew * half_length as f32).round().max(0.0) as usize;
    bin.min(half_length)
}

/// Number of image columns a block of `samples` samples covers.
pub fn columns_for_block(samples: usize, block_size: usize, width: u32, total_blocks: u64) -> u32 {
    if total_blocks == 0 || block_size == 0 {
        return 0;
    }

    let width_fraction = samples as f64 / block_size as f64;
    let per_block = f64::from(width) / total_blocks as f64;
    (per_block * width_fraction).ceil() as u32
}

/// Colour for a normalised level: hue and value both follow the level at
/// full saturation.
pub fn level_colour(level: f32) -> Rgb<u8> {
    hsv_to_rgb(level, 1.0, level)
}

/// Converts HSV with every component in `[0, 1]` to 8-bit RGB. A hue of 1.0
/// wraps around to red.
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> Rgb<u8> {
    let saturation = saturation.clamp(0.0, 1.0);
    let value = value.clamp(0.0, 1.0);
    let h = hue.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;

    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));

    let (r, g, b) = match sector as u8 {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    };

    Rgb([channel(r), channel(g), channel(b)])
}

fn channel(component: f32) -> u8 {
    (component * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Row-to-bin table and column scratch for one image height.
#[derive(Debug, Clone)]
pub struct PixelMapper {
    height: u32,
    half_length: usize,
    row_bins: Vec<usize>,
    levels: Vec<f32>,
    colours: Vec<Rgb<u8>>,
    range: LevelRange,
}

impl PixelMapper {
    pub fn new(height: u32, half_length: usize) -> Self {
        let row_bins: Vec<usize> = (FIRST_MAPPED_ROW..height.max(FIRST_MAPPED_ROW))
            .map(|row| skewed_bin(row, height, half_length))
            .collect();
        let rows = row_bins.len();

        Self {
            height,
            half_length,
            row_bins,
            levels: vec![0.0; rows],
            colours: vec![Rgb([0, 0, 0]); rows],
            range: LevelRange::default(),
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bin displayed on each mapped row, starting at [`FIRST_MAPPED_ROW`].
    pub fn row_bins(&self) -> &[usize] {
        &self.row_bins
    }

    /// Maps `magnitudes` (at least `half_length + 1` bins) to one colour per
    /// mapped row. Entry `i` of the result belongs to row
    /// `FIRST_MAPPED_ROW + i`.
    pub fn map_column(&mut self, magnitudes: &[f32]) -> &[Rgb<u8>] {
        let analysed = self.half_length.min(magnitudes.len());
        self.range = LevelRange::of(&magnitudes[..analysed]);

        for ((bin, level), colour) in self
            .row_bins
            .iter()
            .zip(self.levels.iter_mut())
            .zip(self.colours.iter_mut())
        {
            let magnitude = magnitudes.get(*bin).copied().unwrap_or(0.0);
            *level = self.range.normalise(magnitude);
            *colour = level_colour(*level);
        }

        &self.colours
    }

    /// Normalised levels from the last [`map_column`](Self::map_column).
    pub fn levels(&self) -> &[f32] {
        &self.levels
    }

    /// Local range of the last mapped block.
    pub fn range(&self) -> LevelRange {
        self.range
    }
}
