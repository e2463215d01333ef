//! Post-processing passes applied to rendered slices.

use image::RgbaImage;

use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::patch::{PatchTransform, Patchify};
use crate::unwatermark::Unwatermarker;

/// Patch edge expected by the bundled denoising models.
pub const DEFAULT_PATCH_SIZE: u32 = 256;

/// Minimum overlap between neighbouring model patches.
pub const DEFAULT_PATCH_OVERLAP: u32 = 32;

/// A whole-image cleanup pass.
pub trait Denoiser: Send + Sync {
    /// Produce a cleaned copy of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`](crate::Error::Cancelled) when `signal`
    /// fires, or the pass's own failure.
    fn process(&self, image: &RgbaImage, signal: &dyn CancelSignal) -> Result<RgbaImage>;
}

impl Denoiser for Unwatermarker {
    fn process(&self, image: &RgbaImage, signal: &dyn CancelSignal) -> Result<RgbaImage> {
        let mut out = image.clone();
        self.remove(&mut out, signal)?;
        Ok(out)
    }
}

/// Runs a fixed-size per-patch model over a whole image.
#[derive(Debug, Clone)]
pub struct PatchDenoiser<T> {
    transform: T,
    patch_size: u32,
    min_overlap: u32,
}

impl<T> PatchDenoiser<T> {
    /// Wrap `transform` with the default 256px patches and 32px overlap.
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            patch_size: DEFAULT_PATCH_SIZE,
            min_overlap: DEFAULT_PATCH_OVERLAP,
        }
    }

    /// Override the patch geometry. Validated when an image is processed.
    #[must_use]
    pub fn with_geometry(mut self, patch_size: u32, min_overlap: u32) -> Self {
        self.patch_size = patch_size;
        self.min_overlap = min_overlap;
        self
    }
}

impl<T: PatchTransform + Send + Sync> Denoiser for PatchDenoiser<T> {
    fn process(&self, image: &RgbaImage, signal: &dyn CancelSignal) -> Result<RgbaImage> {
        Patchify::new(image, self.patch_size, self.min_overlap)?.process(&self.transform, signal)
    }
}

/// Apply `passes` in order.
///
/// # Errors
///
/// Returns the first failing pass's error.
pub fn apply_all(
    image: RgbaImage,
    passes: &[Box<dyn Denoiser>],
    signal: &dyn CancelSignal,
) -> Result<RgbaImage> {
    passes
        .iter()
        .try_fold(image, |img, pass| pass.process(&img, signal))
}
