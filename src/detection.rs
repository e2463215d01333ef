//! Content-aware cut detection.
//!
//! Walks down the stack one slice at a time. For each slice the ideal cut is
//! `max_distance` below the previous one; the detector scans upward from there
//! for a row whose horizontally adjacent pixels are all nearly equal (a flat
//! gutter between panels) and cuts there instead of through artwork.

use crate::error::{Error, Result};
use crate::sampler::RowSampler;
use crate::source::ImageSource;

/// What to do when the fallback cut cannot advance past the previous cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallPolicy {
    /// Log a warning and return the cuts found so far.
    #[default]
    Stop,
    /// Fail with [`Error::DetectionStalled`].
    Error,
}

/// Parameters for [`detect`].
#[derive(Debug, Clone)]
pub struct DetectorParams {
    /// Maximum distance between consecutive cuts. Must be > 0.
    pub max_distance: u32,
    /// Scan step and alignment of candidate rows. Must be > 0.
    pub step: u32,
    /// Pixels ignored at each horizontal edge of a row.
    pub margins: u32,
    /// Edge sensitivity in `[0, 1]`; higher means smaller differences count as edges.
    pub sensitivity: f64,
    /// Fraction of `max_distance` to search upward before falling back, in `[0, 1]`.
    pub max_search_deviation_factor: f64,
    /// Behaviour when detection cannot make progress.
    pub on_stall: StallPolicy,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            max_distance: 5000,
            step: 5,
            margins: 5,
            sensitivity: 0.9,
            max_search_deviation_factor: 0.5,
            on_stall: StallPolicy::Stop,
        }
    }
}

impl DetectorParams {
    /// Check every parameter against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(Error::invalid_parameter("step", "should be a positive number"));
        }
        if self.max_distance == 0 {
            return Err(Error::invalid_parameter(
                "max_distance",
                "should be a positive number",
            ));
        }
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(Error::invalid_parameter(
                "sensitivity",
                format!("should be in range [0, 1], got {}", self.sensitivity),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_search_deviation_factor) {
            return Err(Error::invalid_parameter(
                "max_search_deviation_factor",
                format!(
                    "should be in range [0, 1], got {}",
                    self.max_search_deviation_factor
                ),
            ));
        }
        Ok(())
    }

    /// Largest tolerated difference between adjacent grayscale pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn threshold(&self) -> u8 {
        (255.0 * (1.0 - self.sensitivity)).floor().clamp(0.0, 255.0) as u8
    }

    /// How far above the ideal cut the scan may move, in rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn search_depth(&self) -> u32 {
        (f64::from(self.max_distance) * self.max_search_deviation_factor)
            .floor()
            .clamp(0.0, f64::from(self.max_distance)) as u32
    }
}

/// Round `position` down to a multiple of `divisor`.
#[must_use]
pub fn align_down(position: u32, divisor: u32) -> u32 {
    if divisor == 0 {
        return position;
    }
    position / divisor * divisor
}

/// Whether every pair of adjacent pixels between the margins differs by at most `threshold`.
///
/// Rows too narrow to contain a single pair are always accepted.
#[must_use]
pub fn is_uniform_row(row: &[u8], margins: u32, threshold: u8) -> bool {
    let margins = margins as usize;
    let end = row.len().saturating_sub(margins);
    if margins >= end {
        return true;
    }
    row[margins..end]
        .windows(2)
        .all(|pair| pair[0].abs_diff(pair[1]) <= threshold)
}

/// Propose cut positions for the stack.
///
/// Returns an empty list for an empty stack or a stack of zero total height.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] for out-of-range parameters, decode
/// errors from the sources, and [`Error::DetectionStalled`] if detection
/// cannot advance and `params.on_stall` is [`StallPolicy::Error`].
pub fn detect<S: ImageSource>(sources: &[S], params: &DetectorParams) -> Result<Vec<u32>> {
    params.validate()?;
    if sources.is_empty() {
        return Ok(Vec::new());
    }

    let mut sampler = RowSampler::new(sources)?;
    let total_height = sampler.total_height();
    if total_height == 0 {
        return Ok(Vec::new());
    }

    let threshold = params.threshold();
    let depth = params.search_depth();
    let mut cuts = Vec::new();
    let mut last_cut = 0u32;

    while let Some(ideal) = last_cut
        .checked_add(params.max_distance)
        .filter(|&ideal| ideal < total_height)
    {
        let search_start = align_down(ideal, params.step);
        let search_end = align_down(ideal - depth, params.step);

        let mut found = None;
        let mut y = search_start;
        loop {
            if y > last_cut && y < total_height {
                let row = sampler.sample(y)?;
                if is_uniform_row(&row, params.margins, threshold) {
                    found = Some(y);
                    break;
                }
            }
            if y < search_end + params.step {
                break;
            }
            y -= params.step;
        }

        if let Some(y) = found {
            cuts.push(y);
            last_cut = y;
            continue;
        }

        let fallback = search_start;
        if fallback > last_cut && fallback < total_height {
            cuts.push(fallback);
            last_cut = fallback;
        } else if fallback <= last_cut {
            if params.on_stall == StallPolicy::Error {
                return Err(Error::DetectionStalled { fallback, last_cut });
            }
            tracing::warn!(
                fallback,
                last_cut,
                max_distance = params.max_distance,
                step = params.step,
                "fallback cut does not advance; max_distance may be too small for step, stopping"
            );
            break;
        } else {
            // Fallback lands past the bottom; nothing left to cut.
            break;
        }
    }

    tracing::debug!(count = cuts.len(), total_height, "detection finished");
    Ok(cuts)
}
