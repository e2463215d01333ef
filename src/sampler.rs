//! Grayscale row access over a vertically stacked list of images.
//!
//! Decoding whole pages for every row would be ruinous, so the sampler keeps a
//! bounded "strip" of composited rows and only rebuilds it when a requested row
//! falls outside of it.

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::source::{stack_offsets, ImageSource};

/// Upper bound on the strip height, in rows.
pub const MAX_STRIP_HEIGHT: u32 = 4096;

/// Convert an RGB triple to 8-bit luma: `0.299*R + 0.587*G + 0.114*B`, rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luma(px: &Rgba<u8>) -> u8 {
    let lum = 0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2]);
    lum.round().clamp(0.0, 255.0) as u8
}

/// Produces grayscale rows for global Y coordinates of an image stack.
pub struct RowSampler<'a, S> {
    sources: &'a [S],
    offsets: Vec<u32>,
    total_height: u32,
    strip: RgbaImage,
    /// Global Y of the strip's first row, `None` until the first load.
    strip_offset: Option<u32>,
}

impl<'a, S: ImageSource> RowSampler<'a, S> {
    /// Build a sampler over `sources`.
    ///
    /// The strip is sized `min(total height, first width, 4096)` rows by the
    /// first source's width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySources`] if `sources` is empty and
    /// [`Error::StackTooTall`] if the total height overflows a `u32`.
    pub fn new(sources: &'a [S]) -> Result<Self> {
        let first = sources.first().ok_or(Error::EmptySources)?;
        let (offsets, total_height) = stack_offsets(sources)?;
        let strip_height = total_height.min(first.width()).min(MAX_STRIP_HEIGHT);

        Ok(Self {
            sources,
            offsets,
            total_height,
            strip: RgbaImage::new(first.width(), strip_height),
            strip_offset: None,
        })
    }

    /// Height of the whole stack.
    #[must_use]
    pub fn total_height(&self) -> u32 {
        self.total_height
    }

    /// Width of every sampled row (the first source's width).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.strip.width()
    }

    /// Grayscale values of global row `y`, one per horizontal pixel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `y` is not in `[0, total_height)`, or a
    /// decode error from a source intersecting the new strip.
    pub fn sample(&mut self, y: u32) -> Result<Vec<u8>> {
        if y >= self.total_height || self.strip.height() == 0 {
            return Err(Error::OutOfRange {
                y,
                total_height: self.total_height,
            });
        }

        let strip_height = self.strip.height();
        let offset = match self.strip_offset {
            Some(offset) if y >= offset && y < offset + strip_height => offset,
            _ => self.load_strip_ending_at(y)?,
        };

        let local_y = y - offset;
        Ok((0..self.strip.width())
            .map(|x| luma(self.strip.get_pixel(x, local_y)))
            .collect())
    }

    /// Reposition the strip so `y` is its last row, clamped to the stack, and
    /// composite every intersecting source into it.
    fn load_strip_ending_at(&mut self, y: u32) -> Result<u32> {
        let strip_height = self.strip.height();
        let strip_width = self.strip.width();
        let max_offset = self.total_height.saturating_sub(strip_height);
        let offset = (y + 1).saturating_sub(strip_height).min(max_offset);
        let strip_end = offset + strip_height;

        tracing::trace!(row = y, offset, strip_height, "reloading sampler strip");

        // Invalidate first so a failed decode can't leave a half-drawn strip cached.
        self.strip_offset = None;
        for px in self.strip.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }

        for (source, &start) in self.sources.iter().zip(&self.offsets) {
            let end = start + source.height();
            if end <= offset || start >= strip_end {
                continue;
            }

            let src_y = offset.saturating_sub(start);
            let dst_y = start.saturating_sub(offset);
            let rows = end.min(strip_end) - (start + src_y);
            let cols = source.width().min(strip_width);

            let pixels = source.decode()?;
            for dy in 0..rows {
                for dx in 0..cols {
                    let px = *pixels.get_pixel(dx, src_y + dy);
                    self.strip.put_pixel(dx, dst_y + dy, px);
                }
            }
        }

        self.strip_offset = Some(offset);
        Ok(offset)
    }
}
