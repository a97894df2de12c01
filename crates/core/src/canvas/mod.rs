use std::path::Path;

use image::{Rgb, RgbImage};

use crate::Result;

const CHANNELS: usize = 3;

/// Scrolling RGB canvas.
///
/// New columns always land at the right edge after the existing content has
/// been shifted left, so the buffer holds the most recent `width` columns of
/// history.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
    write_head: u64,
}

impl Canvas {
    /// Creates a blank (black) canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
            write_head: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Total columns requested so far, before clamping to the width.
    pub fn write_head(&self) -> u64 {
        self.write_head
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Shifts the content `columns` pixels to the left and blanks the
    /// vacated columns on the right.
    pub fn scroll_left(&mut self, columns: u32) {
        let width = self.image.width() as usize;
        let shift = (columns as usize).min(width);
        if shift == 0 {
            return;
        }

        let stride = width * CHANNELS;
        let raw: &mut [u8] = &mut self.image;
        for row in raw.chunks_exact_mut(stride) {
            row.copy_within(shift * CHANNELS.., 0);
            row[(width - shift) * CHANNELS..].fill(0);
        }
    }

    /// Scrolls by `columns` and paints the freed columns with `colours`,
    /// where `colours[i]` belongs to row `first_row + i`. Rows outside the
    /// canvas and columns beyond its width are dropped.
    pub fn push_columns(&mut self, columns: u32, first_row: u32, colours: &[Rgb<u8>]) {
        self.write_head += u64::from(columns);

        let width = self.image.width();
        let columns = columns.min(width);
        if columns == 0 {
            return;
        }

        self.scroll_left(columns);

        let height = self.image.height();
        for (row, colour) in (first_row..height).zip(colours) {
            for x in width - columns..width {
                self.image.put_pixel(x, row, *colour);
            }
        }
    }

    /// Writes the canvas to `path` as a PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        save_png(&self.image, path)
    }
}

/// Writes an RGB snapshot to `path` as a PNG.
pub fn save_png(image: &RgbImage, path: impl AsRef<Path>) -> Result<()> {
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
