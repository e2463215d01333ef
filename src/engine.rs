//! End-to-end slicing job: load, cut, plan, render, clean up, save.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::cancel::CancelSignal;
use crate::carving;
use crate::cuts::CutsState;
use crate::denoise::{self, Denoiser};
use crate::detection::{self, DetectorParams};
use crate::error::{Error, ErrorKind, Result};
use crate::render::{CanvasChef, Chef};
use crate::source::{total_height, FileSource, ImageSource};

/// How initial cut positions are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorKind {
    /// Evenly spaced cuts, `max_distance` apart.
    Manual,
    /// Content-aware cuts from [`detection::detect`].
    #[default]
    PixelComparison,
}

/// Options controlling a slicing job.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Cut placement strategy.
    pub detector: DetectorKind,
    /// Detector tuning. `max_distance` is the slice height limit for both strategies.
    pub params: DetectorParams,
}

/// Result of writing one job to disk.
#[derive(Debug)]
pub struct ProcessResult {
    /// Directory the slices were written to.
    pub output_dir: PathBuf,
    /// Written files, in slice order.
    pub written: Vec<PathBuf>,
    /// Whether the job completed.
    pub success: bool,
    /// Whether the job was aborted through its cancellation signal.
    pub cancelled: bool,
    /// Human-readable status message.
    pub message: String,
}

/// The slicing engine holding the post-processing chain.
///
/// Create once and reuse for multiple jobs.
#[derive(Default)]
pub struct Cropybara {
    chef: CanvasChef,
    passes: Vec<Box<dyn Denoiser>>,
}

impl Cropybara {
    /// Create an engine with no post-processing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a post-processing pass, run on every rendered slice in insertion order.
    #[must_use]
    pub fn with_pass(mut self, pass: Box<dyn Denoiser>) -> Self {
        self.passes.push(pass);
        self
    }

    /// Number of configured post-processing passes.
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Choose cut positions for the stack.
    ///
    /// # Errors
    ///
    /// Returns detector errors, [`Error::StackTooTall`] for a stack taller
    /// than `u32::MAX` rows, or [`Error::InvalidConfiguration`] when the
    /// manual strategy gets a limit below 2.
    pub fn plan_cuts<S: ImageSource>(
        &self,
        sources: &[S],
        opts: &ProcessOptions,
    ) -> Result<Vec<u32>> {
        match opts.detector {
            DetectorKind::PixelComparison => detection::detect(sources, &opts.params),
            DetectorKind::Manual => {
                let height = total_height(sources)?;
                if height == 0 {
                    return Ok(Vec::new());
                }
                Ok(CutsState::new(1, opts.params.max_distance, height, 1)?.into_cuts())
            }
        }
    }

    /// Cut, render and post-process the stack into slice images.
    ///
    /// # Errors
    ///
    /// Returns the first error from planning, rendering or a pass;
    /// [`Error::Cancelled`] if `signal` fires.
    pub fn run<S: ImageSource + Sync>(
        &self,
        sources: &[S],
        opts: &ProcessOptions,
        signal: &dyn CancelSignal,
    ) -> Result<Vec<RgbaImage>> {
        let cuts = self.plan_cuts(sources, opts)?;
        tracing::debug!(cuts = ?cuts, "cuts planned");
        signal.check()?;

        let slices = carving::cut(sources, &cuts)?;
        let rendered = self.chef.cook(&slices, signal)?;
        if self.passes.is_empty() {
            return Ok(rendered);
        }

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            rendered
                .into_par_iter()
                .map(|img| denoise::apply_all(img, &self.passes, signal))
                .collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            rendered
                .into_iter()
                .map(|img| denoise::apply_all(img, &self.passes, signal))
                .collect()
        }
    }

    /// Slice the images at `inputs` and write `NN.png` files into `output_dir`.
    ///
    /// A single directory input is expanded to its supported images sorted
    /// by file name.
    #[must_use]
    pub fn process_paths(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        opts: &ProcessOptions,
        signal: &dyn CancelSignal,
    ) -> ProcessResult {
        let mut result = ProcessResult {
            output_dir: output_dir.to_path_buf(),
            written: Vec::new(),
            success: false,
            cancelled: false,
            message: String::new(),
        };

        match self.try_process_paths(inputs, output_dir, opts, signal) {
            Ok(written) => {
                result.success = true;
                result.message = format!("Wrote {} slices", written.len());
                result.written = written;
            }
            Err(e) => {
                result.cancelled = e.kind() == ErrorKind::Cancelled;
                result.message = e.to_string();
            }
        }

        result
    }

    fn try_process_paths(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        opts: &ProcessOptions,
        signal: &dyn CancelSignal,
    ) -> Result<Vec<PathBuf>> {
        let files = collect_inputs(inputs)?;
        let sources = files
            .iter()
            .map(FileSource::open)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(sources = sources.len(), "sources loaded");

        let slices = self.run(&sources, opts, signal)?;

        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }

        let total = slices.len();
        let mut written = Vec::with_capacity(total);
        for (index, slice) in slices.iter().enumerate() {
            signal.check()?;
            let path = output_dir.join(output_file_name(index, total));
            save_image(slice, &path)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Expand `inputs` into an ordered list of image files.
///
/// A lone directory yields its supported images sorted by file name; files
/// are taken as given, in order.
///
/// # Errors
///
/// Returns [`Error::EmptySources`] if nothing usable is found, or an I/O error
/// while listing a directory.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let files = match inputs {
        [dir] if dir.is_dir() => {
            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect();
            files.sort();
            files
        }
        _ => inputs.to_vec(),
    };

    if files.is_empty() {
        return Err(Error::EmptySources);
    }
    Ok(files)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "jfif" | "png" | "gif" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Name of slice `index` (0-based) out of `total`: 1-based, zero-padded to the
/// digit count of `total`.
///
/// Example: slice 0 of 12 is `"01.png"`.
#[must_use]
pub fn output_file_name(index: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!("{:0width$}.png", index + 1)
}

/// Save an RGBA image, picking the encoder from the extension.
///
/// JPEG has no alpha channel, so it is flattened to RGB at quality 100.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NeverCancel;
    use image::Rgba;

    fn page(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    fn opts(detector: DetectorKind, max_distance: u32) -> ProcessOptions {
        ProcessOptions {
            detector,
            params: DetectorParams {
                max_distance,
                ..DetectorParams::default()
            },
        }
    }

    #[test]
    fn output_names_are_zero_padded() {
        assert_eq!(output_file_name(0, 9), "1.png");
        assert_eq!(output_file_name(0, 12), "01.png");
        assert_eq!(output_file_name(11, 12), "12.png");
        assert_eq!(output_file_name(4, 100), "005.png");
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("page.jpg")));
        assert!(is_supported_image(Path::new("page.JPEG")));
        assert!(is_supported_image(Path::new("page.jfif")));
        assert!(is_supported_image(Path::new("page.png")));
        assert!(is_supported_image(Path::new("page.webp")));
        assert!(is_supported_image(Path::new("page.gif")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("pages.zip")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("page")));
    }

    #[test]
    fn manual_cuts_are_evenly_spaced() {
        let stack = [page(10, 250, 0), page(10, 250, 0)];
        let cuts = Cropybara::new()
            .plan_cuts(&stack, &opts(DetectorKind::Manual, 200))
            .unwrap();
        assert_eq!(cuts, vec![200, 400]);
    }

    #[test]
    fn run_renders_every_slice() {
        let stack = [page(10, 250, 30), page(10, 250, 60)];
        let slices = Cropybara::new()
            .run(&stack, &opts(DetectorKind::PixelComparison, 200), &NeverCancel)
            .unwrap();
        let heights: Vec<u32> = slices.iter().map(RgbaImage::height).collect();
        assert_eq!(heights, vec![200, 200, 100]);
        assert_eq!(slices[1].get_pixel(0, 0)[0], 30);
        assert_eq!(slices[1].get_pixel(0, 199)[0], 60);
    }

    #[test]
    fn collect_inputs_rejects_empty() {
        assert!(matches!(collect_inputs(&[]), Err(Error::EmptySources)));
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let img = page(2, 2, 0);
        assert!(matches!(
            save_image(&img, Path::new("out.unknown")),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
