//! Slice planning.
//!
//! Turns a finalized cut list into per-slice copy instructions. A slice may
//! draw from several stacked sources, and one source may feed two slices when
//! a cut lands inside it.

use crate::error::{Error, Result};
use crate::source::{stack_offsets, Dimensions};

/// One rectangular copy from a source into a slice.
///
/// `src_height == dst_height > 0`, and `src_x == dst_x == 0` with the source's full width.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a, S> {
    /// The source image to read from.
    pub source: &'a S,
    /// Position of `source` in the stack.
    pub source_index: usize,
    /// Source rectangle left edge.
    pub src_x: u32,
    /// Source rectangle top edge.
    pub src_y: u32,
    /// Source rectangle width.
    pub src_width: u32,
    /// Source rectangle height.
    pub src_height: u32,
    /// Destination left edge within the slice.
    pub dst_x: u32,
    /// Destination top edge within the slice.
    pub dst_y: u32,
    /// Destination width.
    pub dst_width: u32,
    /// Destination height.
    pub dst_height: u32,
}

/// One output image and the chunks that compose it, top to bottom.
#[derive(Debug, Clone)]
pub struct Slice<'a, S> {
    /// Slice width, always the first source's width.
    pub width: u32,
    /// Distance between the slice's two boundaries.
    pub height: u32,
    /// Copy instructions in stack order.
    pub chunks: Vec<Chunk<'a, S>>,
}

/// Plan the slices produced by cutting `sources` at `cuts`.
///
/// Slice `i` spans `[cuts[i-1] or 0, cuts[i] or total height)`. Sources of
/// differing widths are not validated; the first source's width is used for
/// every slice.
///
/// # Errors
///
/// - [`Error::EmptySources`] if `sources` is empty.
/// - [`Error::ZeroHeightSource`] if any source has zero height.
/// - [`Error::StackTooTall`] if the total height overflows a `u32`.
/// - [`Error::ZeroHeightSlice`] if two boundaries are less than one pixel
///   apart (duplicate, unordered, or out-of-range cuts).
/// - [`Error::ZeroHeightChunk`] if a planned chunk is empty.
pub fn cut<'a, S: Dimensions>(sources: &'a [S], cuts: &[u32]) -> Result<Vec<Slice<'a, S>>> {
    let first = sources.first().ok_or(Error::EmptySources)?;
    if let Some(index) = sources.iter().position(|s| s.height() == 0) {
        return Err(Error::ZeroHeightSource { index });
    }

    let (offsets, scroll_height) = stack_offsets(sources)?;
    let width = first.width();

    let mut slices = Vec::with_capacity(cuts.len() + 1);
    for index in 0..=cuts.len() {
        let start = if index == 0 { 0 } else { cuts[index - 1] };
        let end = cuts.get(index).copied().unwrap_or(scroll_height);
        if end <= start {
            return Err(Error::ZeroHeightSlice { index, start, end });
        }
        let slice_height = end - start;

        let mut chunks = Vec::new();
        for (source_index, (source, &offset)) in sources.iter().zip(&offsets).enumerate() {
            if offset + source.height() <= start || offset >= end {
                continue;
            }

            let dst_y = offset.saturating_sub(start);
            let src_y = start.saturating_sub(offset);
            let height = (dst_y + source.height() - src_y).min(slice_height) - dst_y;
            if height == 0 {
                return Err(Error::ZeroHeightChunk {
                    slice: index,
                    source_index,
                });
            }

            chunks.push(Chunk {
                source,
                source_index,
                src_x: 0,
                src_y,
                src_width: source.width(),
                src_height: height,
                dst_x: 0,
                dst_y,
                dst_width: source.width(),
                dst_height: height,
            });
        }

        slices.push(Slice {
            width,
            height: slice_height,
            chunks,
        });
    }

    tracing::debug!(slices = slices.len(), scroll_height, "planned slices");
    Ok(slices)
}
