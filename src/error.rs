//! Error types for the cropybara crate.

/// Errors that can occur while detecting, editing, planning or processing slices.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller-supplied parameter is outside its accepted range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A cut constraint model was configured with inconsistent limits.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The image stack has no members.
    #[error("empty sources")]
    EmptySources,

    /// A member of the image stack has zero height.
    #[error("zero height source at index {index}")]
    ZeroHeightSource {
        /// Position of the offending source in the stack.
        index: usize,
    },

    /// The stacked heights do not fit in a `u32` row coordinate.
    #[error("stack height overflows at source {index}")]
    StackTooTall {
        /// Position of the first source that pushes the total past `u32::MAX`.
        index: usize,
    },

    /// Two consecutive cut boundaries are less than one pixel apart.
    #[error("zero height slice {index} ({start}..{end})")]
    ZeroHeightSlice {
        /// Index of the slice that would be empty.
        index: usize,
        /// Slice start boundary.
        start: u32,
        /// Slice end boundary.
        end: u32,
    },

    /// A planned chunk came out empty. Indicates broken offset bookkeeping.
    #[error("zero height chunk for source {source_index} in slice {slice}")]
    ZeroHeightChunk {
        /// Slice being planned.
        slice: usize,
        /// Source that produced the empty chunk.
        source_index: usize,
    },

    /// A row outside `[0, total_height)` was requested.
    #[error("row {y} out of range [0, {total_height})")]
    OutOfRange {
        /// Requested global row.
        y: u32,
        /// Height of the whole stack.
        total_height: u32,
    },

    /// Patch overlap is not smaller than the patch itself.
    #[error("minOverlap ({min_overlap}) must be less than patch size ({patch_size})")]
    InvalidOverlap {
        /// Requested minimum overlap.
        min_overlap: u32,
        /// Patch edge length.
        patch_size: u32,
    },

    /// An image or patch dimension is zero.
    #[error("image dimension must be positive, got {width}x{height}")]
    InvalidDimension {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },

    /// `move` addressed a cut that does not exist.
    #[error("cut index {index} out of range (len {len})")]
    CutIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Current number of cuts.
        len: usize,
    },

    /// A patch transform returned a block of the wrong size.
    #[error("patch transform returned {got_width}x{got_height}, expected {expected}x{expected}")]
    PatchSizeMismatch {
        /// Patch edge length that was handed to the transform.
        expected: u32,
        /// Returned width.
        got_width: u32,
        /// Returned height.
        got_height: u32,
    },

    /// The detector could not advance and the stall policy asks for an error.
    #[error("detection stalled: fallback cut {fallback} does not advance past {last_cut}")]
    DetectionStalled {
        /// Fallback position that failed to advance.
        fallback: u32,
        /// Last accepted cut.
        last_cut: u32,
    },

    /// The operation was aborted through its cancellation signal.
    #[error("operation cancelled")]
    Cancelled,

    /// An external per-patch transform failed.
    #[error("patch transform failed: {0}")]
    Transform(String),

    /// A source image could not be decoded.
    #[error("failed to decode source image: {0}")]
    Decode(image::ImageError),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while encoding or saving an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Out-of-range configuration supplied by the caller.
    InvalidParameter,
    /// Structurally invalid input such as an empty stack.
    InvalidInput,
    /// A logic defect was detected.
    InternalInvariantViolation,
    /// Cooperative abort.
    Cancelled,
    /// Row query outside the stack.
    OutOfRange,
    /// Failure in a collaborator: decoding, I/O, transforms.
    External,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. }
            | Self::InvalidConfiguration(_)
            | Self::InvalidOverlap { .. }
            | Self::InvalidDimension { .. }
            | Self::CutIndexOutOfRange { .. }
            | Self::DetectionStalled { .. } => ErrorKind::InvalidParameter,
            Self::EmptySources
            | Self::ZeroHeightSource { .. }
            | Self::StackTooTall { .. }
            | Self::ZeroHeightSlice { .. } => ErrorKind::InvalidInput,
            Self::ZeroHeightChunk { .. } => ErrorKind::InternalInvariantViolation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::PatchSizeMismatch { .. }
            | Self::Transform(_)
            | Self::Decode(_)
            | Self::Io(_)
            | Self::UnsupportedFormat(_)
            | Self::Image(_) => ErrorKind::External,
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
