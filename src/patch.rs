//! Overlapping square tiling with seamless reconstruction.
//!
//! Per-patch models (denoisers, upscalers) take a fixed input size. The image
//! is covered by overlapping `size × size` patches, each patch is transformed
//! independently, and the results are blended back with a tent weight so tile
//! borders don't show.

use image::{Rgba, RgbaImage};

use crate::cancel::CancelSignal;
use crate::error::{Error, Result};

/// An external per-patch transform, e.g. a neural denoiser.
///
/// The returned block must have the same dimensions as the input.
pub trait PatchTransform {
    /// Transform one patch.
    ///
    /// # Errors
    ///
    /// Implementations report their own failures, usually as [`Error::Transform`].
    fn transform(&self, patch: RgbaImage) -> Result<RgbaImage>;
}

impl<F> PatchTransform for F
where
    F: Fn(RgbaImage) -> Result<RgbaImage>,
{
    fn transform(&self, patch: RgbaImage) -> Result<RgbaImage> {
        self(patch)
    }
}

/// Top-left corner of one patch in the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRecipe {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
}

/// Splits an image into overlapping patches and stitches transformed patches back.
#[derive(Debug)]
pub struct Patchify<'a> {
    image: &'a RgbaImage,
    size: u32,
    recipe: Vec<PatchRecipe>,
}

impl<'a> Patchify<'a> {
    /// Plan patches of `size × size` with at least `min_overlap` shared pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimension`] if the image or the patch size is
    /// zero, and [`Error::InvalidOverlap`] if `min_overlap >= size`.
    pub fn new(image: &'a RgbaImage, size: u32, min_overlap: u32) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimension { width, height });
        }
        if size == 0 {
            return Err(Error::InvalidDimension {
                width: size,
                height: size,
            });
        }
        if min_overlap >= size {
            return Err(Error::InvalidOverlap {
                min_overlap,
                patch_size: size,
            });
        }

        let ys = axis_positions(height, size, min_overlap);
        let xs = axis_positions(width, size, min_overlap);
        let recipe = ys
            .iter()
            .flat_map(|&y| xs.iter().map(move |&x| PatchRecipe { x, y }))
            .collect();

        Ok(Self {
            image,
            size,
            recipe,
        })
    }

    /// Patch edge length.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Patch positions, row-major.
    #[must_use]
    pub fn recipe(&self) -> &[PatchRecipe] {
        &self.recipe
    }

    /// Copy the patch at `recipe` out of the image.
    ///
    /// Parts of the patch beyond the image edge (only possible when the image
    /// is smaller than a patch) are transparent black.
    #[must_use]
    pub fn extract(&self, recipe: PatchRecipe) -> RgbaImage {
        let mut patch = RgbaImage::new(self.size, self.size);
        let w = self.size.min(self.image.width() - recipe.x);
        let h = self.size.min(self.image.height() - recipe.y);
        for dy in 0..h {
            for dx in 0..w {
                patch.put_pixel(dx, dy, *self.image.get_pixel(recipe.x + dx, recipe.y + dy));
            }
        }
        patch
    }

    /// Transform every patch in recipe order and blend the results into a
    /// full-size image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `signal` fires, the transform's own
    /// error, or [`Error::PatchSizeMismatch`] if it changes the patch size.
    pub fn process<T: PatchTransform + ?Sized>(
        &self,
        transform: &T,
        signal: &dyn CancelSignal,
    ) -> Result<RgbaImage> {
        let mut patches = Vec::with_capacity(self.recipe.len());
        for &recipe in &self.recipe {
            signal.check()?;
            let out = transform.transform(self.extract(recipe))?;
            if out.dimensions() != (self.size, self.size) {
                return Err(Error::PatchSizeMismatch {
                    expected: self.size,
                    got_width: out.width(),
                    got_height: out.height(),
                });
            }
            patches.push(out);
        }
        tracing::debug!(patches = patches.len(), size = self.size, "patches transformed");
        self.stitch(&patches, signal)
    }

    /// Blend `patches` (one per recipe entry, same order) into a full-size image.
    ///
    /// Every output channel is the tent-weighted mean of the patches covering
    /// that pixel; uncovered pixels are transparent black.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `signal` fires, or
    /// [`Error::PatchSizeMismatch`] for a wrongly sized patch, or
    /// [`Error::InvalidParameter`] if the patch count doesn't match the recipe.
    pub fn stitch(&self, patches: &[RgbaImage], signal: &dyn CancelSignal) -> Result<RgbaImage> {
        if patches.len() != self.recipe.len() {
            return Err(Error::invalid_parameter(
                "patches",
                format!("expected {} patches, got {}", self.recipe.len(), patches.len()),
            ));
        }

        let (width, height) = self.image.dimensions();
        let w = width as usize;
        let mut sums = vec![[0.0_f64; 4]; w * height as usize];
        let mut weights = vec![0.0_f64; w * height as usize];

        let axis_weights: Vec<f64> = (0..self.size).map(|i| tent_weight(i, self.size)).collect();

        for (patch, recipe) in patches.iter().zip(&self.recipe) {
            if patch.dimensions() != (self.size, self.size) {
                return Err(Error::PatchSizeMismatch {
                    expected: self.size,
                    got_width: patch.width(),
                    got_height: patch.height(),
                });
            }
            let cols = self.size.min(width - recipe.x);
            let rows = self.size.min(height - recipe.y);
            for ly in 0..rows {
                signal.check()?;
                let wy = axis_weights[ly as usize];
                let row_base = (recipe.y + ly) as usize * w;
                for lx in 0..cols {
                    let weight = wy * axis_weights[lx as usize];
                    if weight <= 0.0 {
                        continue;
                    }
                    let idx = row_base + (recipe.x + lx) as usize;
                    let px = patch.get_pixel(lx, ly);
                    for ch in 0..4 {
                        sums[idx][ch] += f64::from(px[ch]) * weight;
                    }
                    weights[idx] += weight;
                }
            }
        }

        let mut out = RgbaImage::new(width, height);
        for y in 0..height {
            signal.check()?;
            for x in 0..width {
                let idx = y as usize * w + x as usize;
                let total = weights[idx];
                if total <= 0.0 {
                    continue;
                }
                let mut px = Rgba([0u8; 4]);
                for ch in 0..4 {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    {
                        px[ch] = (sums[idx][ch] / total).round_ties_even().clamp(0.0, 255.0) as u8;
                    }
                }
                out.put_pixel(x, y, px);
            }
        }
        Ok(out)
    }
}

/// Number of patches needed along an axis of length `axis`.
///
/// `1` when the axis fits in one patch, otherwise
/// `1 + ceil((axis - size) / (size - min_overlap))`.
#[must_use]
pub fn chunk_count(axis: u32, size: u32, min_overlap: u32) -> u32 {
    if axis <= size {
        return 1;
    }
    let advance = size - min_overlap;
    1 + (axis - size).div_ceil(advance)
}

/// Patch start positions along one axis. The last patch is pinned flush to the far edge.
fn axis_positions(axis: u32, size: u32, min_overlap: u32) -> Vec<u32> {
    let count = chunk_count(axis, size, min_overlap);
    let advance = size - min_overlap;
    (0..count)
        .map(|i| {
            if count == 1 {
                0
            } else if i == count - 1 {
                axis - size
            } else {
                i * advance
            }
        })
        .collect()
}

/// 1-D tent weight at `pos` within a patch of `size` pixels.
///
/// `1 - |pos - c| / (size / 2)` with `c = (size - 1) / 2`, clamped at zero.
/// Normalising by `size / 2` keeps edge weights strictly positive.
#[must_use]
pub fn tent_weight(pos: u32, size: u32) -> f64 {
    if size == 0 {
        return 0.0;
    }
    if size == 1 {
        return 1.0;
    }
    let size = f64::from(size);
    let center = (size - 1.0) / 2.0;
    let distance = (f64::from(pos) - center).abs();
    (1.0 - distance / (size / 2.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NeverCancel;
    use std::sync::atomic::AtomicBool;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = [x % 256, y % 256, (x + y) % 256].map(|v| u8::try_from(v).unwrap());
            Rgba([r, g, b, 255])
        })
    }

    #[test]
    fn chunk_count_matches_formula() {
        assert_eq!(chunk_count(300, 256, 16), 2);
        assert_eq!(chunk_count(256, 256, 16), 1);
        assert_eq!(chunk_count(100, 256, 16), 1);
        assert_eq!(chunk_count(497, 256, 16), 3);
        assert_eq!(chunk_count(496, 256, 16), 2);
    }

    #[test]
    fn patches_are_flush_to_both_edges() {
        let img = gradient(300, 300);
        let patches = Patchify::new(&img, 256, 16).unwrap();
        let coords: Vec<(u32, u32)> = patches.recipe().iter().map(|r| (r.x, r.y)).collect();
        assert_eq!(coords, vec![(0, 0), (44, 0), (0, 44), (44, 44)]);
    }

    #[test]
    fn intermediate_patches_advance_by_size_minus_overlap() {
        let img = gradient(600, 10);
        let patches = Patchify::new(&img, 256, 16).unwrap();
        let xs: Vec<u32> = patches.recipe().iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![0, 240, 344]);
    }

    #[test]
    fn rejects_bad_geometry() {
        let img = gradient(10, 10);
        assert!(matches!(
            Patchify::new(&img, 8, 8),
            Err(Error::InvalidOverlap {
                min_overlap: 8,
                patch_size: 8
            })
        ));
        let empty = RgbaImage::new(0, 10);
        assert!(matches!(
            Patchify::new(&empty, 8, 2),
            Err(Error::InvalidDimension { .. })
        ));
    }

    #[test]
    fn tent_weight_peaks_at_center_and_stays_positive() {
        assert!((tent_weight(0, 1) - 1.0).abs() < 1e-12);
        // Odd size: exact center gets full weight.
        assert!((tent_weight(2, 5) - 1.0).abs() < 1e-12);
        let edge = tent_weight(0, 256);
        assert!(edge > 0.0 && edge < 0.01);
        assert!((tent_weight(0, 256) - tent_weight(255, 256)).abs() < 1e-12);
    }

    #[test]
    fn identity_transform_reconstructs_image() {
        let img = gradient(300, 170);
        let patches = Patchify::new(&img, 64, 8).unwrap();
        let identity = |patch: RgbaImage| -> Result<RgbaImage> { Ok(patch) };
        let out = patches.process(&identity, &NeverCancel).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn image_smaller_than_patch_round_trips() {
        let img = gradient(20, 12);
        let patches = Patchify::new(&img, 32, 4).unwrap();
        assert_eq!(patches.recipe(), &[PatchRecipe { x: 0, y: 0 }]);
        let out = patches
            .process(&|patch: RgbaImage| -> Result<RgbaImage> { Ok(patch) }, &NeverCancel)
            .unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn overlapping_values_are_blended() {
        let img = gradient(12, 8);
        let patches = Patchify::new(&img, 8, 2).unwrap();
        assert_eq!(patches.recipe().len(), 2);
        let flat: Vec<RgbaImage> = [0u8, 200]
            .iter()
            .map(|&v| RgbaImage::from_pixel(8, 8, Rgba([v, v, v, 255])))
            .collect();
        let out = patches.stitch(&flat, &NeverCancel).unwrap();
        // Only the first patch covers column 0, only the second covers column 11.
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(11, 0)[0], 200);
        // Overlap columns 4..8 fall strictly between the two.
        let mid = out.get_pixel(5, 3)[0];
        assert!(mid > 0 && mid < 200, "blended value {mid}");
        assert_eq!(out.get_pixel(5, 3)[3], 255);
    }

    #[test]
    fn transform_errors_and_size_changes_propagate() {
        let img = gradient(40, 40);
        let patches = Patchify::new(&img, 32, 4).unwrap();
        let failing =
            |_: RgbaImage| -> Result<RgbaImage> { Err(Error::Transform("model crashed".into())) };
        assert!(matches!(
            patches.process(&failing, &NeverCancel),
            Err(Error::Transform(_))
        ));

        let shrinking = |_: RgbaImage| -> Result<RgbaImage> { Ok(RgbaImage::new(16, 16)) };
        assert!(matches!(
            patches.process(&shrinking, &NeverCancel),
            Err(Error::PatchSizeMismatch { expected: 32, .. })
        ));
    }

    #[test]
    fn cancellation_stops_processing() {
        let img = gradient(40, 40);
        let patches = Patchify::new(&img, 32, 4).unwrap();
        let cancelled = AtomicBool::new(true);
        let identity = |patch: RgbaImage| -> Result<RgbaImage> { Ok(patch) };
        assert!(matches!(
            patches.process(&identity, &cancelled),
            Err(Error::Cancelled)
        ));
    }
}
