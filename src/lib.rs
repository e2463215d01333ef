//! Split tall, vertically stacked comic pages into slices.
//!
//! Webtoon and manhwa chapters arrive as a handful of very tall images. This
//! crate treats them as one continuous strip, finds cut positions that land
//! in the gutters between panels instead of through artwork, and turns the
//! cuts into per-slice copy instructions that may span several source pages.
//! Rendered slices can then be cleaned up with tiled per-patch models or a
//! known-watermark remover.
//!
//! # Quick Start
//!
//! ```no_run
//! use cropybara::{carving, detect, CanvasChef, Chef, DetectorParams, FileSource, NeverCancel};
//!
//! let pages = vec![
//!     FileSource::open("001.jpg").unwrap(),
//!     FileSource::open("002.jpg").unwrap(),
//! ];
//! let params = DetectorParams { max_distance: 4000, ..DetectorParams::default() };
//! let cuts = detect(&pages, &params).unwrap();
//! let slices = carving::cut(&pages, &cuts).unwrap();
//! let images = CanvasChef.cook(&slices, &NeverCancel).unwrap();
//! for (i, img) in images.iter().enumerate() {
//!     img.save(format!("{:02}.png", i + 1)).unwrap();
//! }
//! ```
//!
//! # Editing cuts
//!
//! [`CutsState`] keeps a cut list valid while it is edited: moving one cut
//! ripples through the ones below it, and [`CutsState::cleanup`] drops cuts
//! that became redundant.
//!
//! ```
//! use cropybara::CutsState;
//!
//! let mut cuts = CutsState::new(50, 400, 1000, 5).unwrap();
//! assert_eq!(cuts.cuts(), &[400, 800]);
//! cuts.move_cut(1, 450).unwrap();
//! assert_eq!(cuts.cuts(), &[400, 450, 850]);
//! ```

#![deny(missing_docs)]

pub mod cancel;
pub mod carving;
pub mod cuts;
pub mod denoise;
pub mod detection;
mod engine;
pub mod error;
pub mod patch;
pub mod render;
pub mod sampler;
pub mod source;
pub mod unwatermark;

pub use cancel::{CancelSignal, NeverCancel};
pub use carving::{Chunk, Slice};
pub use cuts::{CutsEditor, CutsState};
pub use denoise::{Denoiser, PatchDenoiser};
pub use detection::{detect, DetectorParams, StallPolicy};
pub use engine::{
    collect_inputs, is_supported_image, output_file_name, save_image, Cropybara, DetectorKind,
    ProcessOptions, ProcessResult,
};
pub use error::{Error, ErrorKind, Result};
pub use patch::{PatchRecipe, PatchTransform, Patchify};
pub use render::{CanvasChef, Chef};
pub use sampler::RowSampler;
pub use source::{Dimensions, FileSource, ImageSource};
pub use unwatermark::{Unwatermarker, UnwatermarkerConfig};
