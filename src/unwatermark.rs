//! Reverse alpha blending for a known, fixed-position watermark.
//!
//! Scanlation groups stamp a semi-transparent RGBA logo onto pages via
//! forward alpha blending:
//! `watermarked = a * logo + (1 - a) * original`
//!
//! Given the exact logo this module solves for `original`. Near-opaque logo
//! pixels carry almost no information about what was underneath, so those are
//! additionally smeared from their left neighbour.

use image::RgbaImage;

use crate::cancel::CancelSignal;
use crate::error::{Error, Result};

/// Placement and tuning of an [`Unwatermarker`].
#[derive(Debug, Clone)]
pub struct UnwatermarkerConfig {
    /// Top edge of the watermark. Negative aligns it to the bottom edge.
    pub top: i64,
    /// Left edge of the watermark. Negative aligns it to the right edge.
    pub left: i64,
    /// Multiplier applied to the logo's alpha channel.
    pub alpha_adjust: f32,
    /// Logo pixels with adjusted alpha at or below this are ignored.
    pub transparency_threshold: u8,
    /// Logo pixels with adjusted alpha above this are also blended with their left neighbour.
    pub opaque_threshold: u8,
}

impl Default for UnwatermarkerConfig {
    fn default() -> Self {
        Self {
            top: -1,
            left: -1,
            alpha_adjust: 1.0,
            transparency_threshold: 1,
            opaque_threshold: 250,
        }
    }
}

/// Removes one known watermark from images.
///
/// Create once per logo and reuse; the per-alpha coefficients are precomputed.
#[derive(Debug, Clone)]
pub struct Unwatermarker {
    watermark: RgbaImage,
    config: UnwatermarkerConfig,
    image_lut: [f32; 256],
    logo_lut: [f32; 256],
}

impl Unwatermarker {
    /// Build a remover for `watermark`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimension`] for an empty watermark and
    /// [`Error::InvalidParameter`] for a negative or non-finite `alpha_adjust`.
    pub fn new(watermark: RgbaImage, config: UnwatermarkerConfig) -> Result<Self> {
        let (width, height) = watermark.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimension { width, height });
        }
        if !config.alpha_adjust.is_finite() || config.alpha_adjust < 0.0 {
            return Err(Error::invalid_parameter(
                "alpha_adjust",
                format!("should be a non-negative number, got {}", config.alpha_adjust),
            ));
        }

        let mut image_lut = [1.0_f32; 256];
        let mut logo_lut = [0.0_f32; 256];
        // a == 255 keeps the defaults: the pixel is left as is.
        for a in 0..255u8 {
            let a_f = f32::from(a);
            image_lut[a as usize] = 255.0 / (255.0 - a_f);
            logo_lut[a as usize] = -a_f / (255.0 - a_f);
        }

        Ok(Self {
            watermark,
            config,
            image_lut,
            logo_lut,
        })
    }

    /// Load the watermark from a PNG (or any supported format) in memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not an image, plus the
    /// errors of [`new`](Self::new).
    pub fn from_bytes(bytes: &[u8], config: UnwatermarkerConfig) -> Result<Self> {
        let img = image::load_from_memory(bytes).map_err(Error::Decode)?;
        Self::new(img.to_rgba8(), config)
    }

    /// Where the watermark's top-left corner lands on an image of this size.
    #[must_use]
    pub fn position(&self, img_w: u32, img_h: u32) -> (i64, i64) {
        let x = if self.config.left >= 0 {
            self.config.left
        } else {
            i64::from(img_w) - i64::from(self.watermark.width())
        };
        let y = if self.config.top >= 0 {
            self.config.top
        } else {
            i64::from(img_h) - i64::from(self.watermark.height())
        };
        (x, y)
    }

    /// Remove the watermark from `image` in place.
    ///
    /// The watermark is clipped to the image; if it misses the image entirely
    /// nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `signal` fires. The image may be
    /// partially processed in that case.
    pub fn remove(&self, image: &mut RgbaImage, signal: &dyn CancelSignal) -> Result<()> {
        let (img_w, img_h) = image.dimensions();
        let (wm_w, wm_h) = self.watermark.dimensions();
        let (x, y) = self.position(img_w, img_h);

        let clip_x = x.max(0);
        let clip_y = y.max(0);
        let clip_max_x = (x + i64::from(wm_w)).min(i64::from(img_w));
        let clip_max_y = (y + i64::from(wm_h)).min(i64::from(img_h));
        if clip_max_x <= clip_x || clip_max_y <= clip_y {
            return Ok(());
        }

        // All four values are within u32 after clipping.
        let to_u32 = |v: i64| u32::try_from(v).unwrap_or(0);
        let (region_x, region_y) = (to_u32(clip_x), to_u32(clip_y));
        let region_w = to_u32(clip_max_x - clip_x);
        let region_h = to_u32(clip_max_y - clip_y);
        let (wm_off_x, wm_off_y) = (to_u32(-x.min(0)), to_u32(-y.min(0)));

        let check_interval = (region_h / 100).max(1);
        let opaque = f32::from(self.config.opaque_threshold);
        let opaque_range = 255.0 - opaque;

        for dy in 0..region_h {
            if dy % check_interval == 0 {
                signal.check()?;
            }
            for dx in 0..region_w {
                let logo = *self.watermark.get_pixel(dx + wm_off_x, dy + wm_off_y);
                let alpha = self.adjusted_alpha(logo[3]);
                if alpha <= self.config.transparency_threshold {
                    continue;
                }

                let k_img = self.image_lut[alpha as usize];
                let k_logo = self.logo_lut[alpha as usize];
                let (px_x, px_y) = (region_x + dx, region_y + dy);

                let px = image.get_pixel_mut(px_x, px_y);
                for ch in 0..3 {
                    px[ch] = round_channel(k_img * f32::from(px[ch]) + k_logo * f32::from(logo[ch]));
                }

                if alpha > self.config.opaque_threshold && dx > 0 {
                    let factor = if opaque_range > 1e-6 {
                        ((f32::from(alpha) - opaque) / opaque_range).clamp(0.0, 1.0)
                    } else {
                        1.0
                    };
                    let left = *image.get_pixel(px_x - 1, px_y);
                    let px = image.get_pixel_mut(px_x, px_y);
                    for ch in 0..3 {
                        px[ch] = round_channel(
                            factor * f32::from(left[ch]) + (1.0 - factor) * f32::from(px[ch]),
                        );
                    }
                }
            }
        }

        tracing::debug!(region_x, region_y, region_w, region_h, "watermark removed");
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn adjusted_alpha(&self, raw: u8) -> u8 {
        (self.config.alpha_adjust * f32::from(raw)).round().min(255.0) as u8
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_channel(value: f32) -> u8 {
    (value + 0.5).floor().clamp(0.0, 255.0) as u8
}
