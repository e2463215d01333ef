//! Editable cut list with spacing constraints.
//!
//! [`CutsState`] owns the cut positions while a user drags them around. Every
//! public operation leaves the list strictly increasing, aligned to the
//! divisor, and with the bottom of the image no more than `max_distance` below
//! the last cut.

use crate::error::{Error, Result};

/// Ordered cut list constrained by minimum and maximum spacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutsState {
    min_distance: u32,
    max_distance: u32,
    height: u32,
    divisor: u32,
    cuts: Vec<u32>,
}

impl CutsState {
    /// Create a model with no initial cuts; bottom cuts are filled in immediately.
    ///
    /// # Errors
    ///
    /// See [`with_cuts`](Self::with_cuts).
    pub fn new(min_distance: u32, max_distance: u32, height: u32, divisor: u32) -> Result<Self> {
        Self::with_cuts(min_distance, max_distance, height, divisor, Vec::new())
    }

    /// Create a model seeded with `init`, then fill cuts down to the bottom.
    ///
    /// `min_distance`, `max_distance` and every seed are aligned down to
    /// `divisor`; seeds are then clamped into spacing limits front to back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if any value is zero, if
    /// `min_distance >= max_distance`, if alignment to `divisor` collapses
    /// either distance to zero, or if `init` is not strictly increasing
    /// within `(0, height)`.
    pub fn with_cuts(
        min_distance: u32,
        max_distance: u32,
        height: u32,
        divisor: u32,
        init: Vec<u32>,
    ) -> Result<Self> {
        if height == 0 {
            return Err(Error::InvalidConfiguration(
                "height must be a positive number".into(),
            ));
        }
        if divisor == 0 {
            return Err(Error::InvalidConfiguration(
                "divisor must be a positive number".into(),
            ));
        }
        if min_distance == 0 {
            return Err(Error::InvalidConfiguration(
                "minDistance must be a positive number".into(),
            ));
        }
        if max_distance == 0 {
            return Err(Error::InvalidConfiguration(
                "maxDistance must be a positive number".into(),
            ));
        }
        if min_distance >= max_distance {
            return Err(Error::InvalidConfiguration(
                "minDistance must be less than maxDistance".into(),
            ));
        }

        let min_aligned = min_distance / divisor * divisor;
        let max_aligned = max_distance / divisor * divisor;
        if min_aligned == 0 {
            return Err(Error::InvalidConfiguration(format!(
                "minDistance {min_distance} is smaller than divisor {divisor}"
            )));
        }

        let mut prev = 0;
        for &cut in &init {
            if cut <= prev || cut >= height {
                return Err(Error::InvalidConfiguration(format!(
                    "initial cuts must be strictly increasing within (0, {height}), got {init:?}"
                )));
            }
            prev = cut;
        }

        let mut state = Self {
            min_distance: min_aligned,
            max_distance: max_aligned,
            height,
            divisor,
            cuts: init.into_iter().map(|cut| cut / divisor * divisor).collect(),
        };
        state.enforce_limits(0);
        Ok(state)
    }

    /// Current cut positions.
    #[must_use]
    pub fn cuts(&self) -> &[u32] {
        &self.cuts
    }

    /// Consume the model, yielding the final cut list.
    #[must_use]
    pub fn into_cuts(self) -> Vec<u32> {
        self.cuts
    }

    /// Aligned minimum spacing.
    #[must_use]
    pub fn min_distance(&self) -> u32 {
        self.min_distance
    }

    /// Aligned maximum spacing.
    #[must_use]
    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// Image height the cuts live in.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Alignment of every cut position.
    #[must_use]
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Move cut `index` to `position` (aligned down), then re-apply limits to it
    /// and every following cut. Cuts before `index` are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CutIndexOutOfRange`] if there is no cut at `index`.
    pub fn move_cut(&mut self, index: usize, position: u32) -> Result<()> {
        let len = self.cuts.len();
        let aligned = self.align(position);
        let slot = self
            .cuts
            .get_mut(index)
            .ok_or(Error::CutIndexOutOfRange { index, len })?;
        *slot = aligned;
        self.enforce_limits(index);
        Ok(())
    }

    /// Remove every cut whose neighbours are already within `max_distance` of each other.
    ///
    /// Scans back to front. Returns whether anything was removed.
    pub fn cleanup(&mut self) -> bool {
        let mut changed = false;
        for i in (0..self.cuts.len()).rev() {
            let prev = if i == 0 { 0 } else { self.cuts[i - 1] };
            let next = self.cuts.get(i + 1).copied().unwrap_or(self.height);
            if next.saturating_sub(prev) <= self.max_distance {
                self.cuts.remove(i);
                changed = true;
            }
        }
        changed
    }

    fn align(&self, position: u32) -> u32 {
        position / self.divisor * self.divisor
    }

    fn enforce_limits(&mut self, from: usize) {
        for i in from..self.cuts.len() {
            let prev = if i == 0 { 0 } else { self.cuts[i - 1] };
            let min = self.align(prev.saturating_add(self.min_distance));
            let max = self.align(prev.saturating_add(self.max_distance));
            self.cuts[i] = self.cuts[i].clamp(min, max);
        }

        self.fill_cuts_to_bottom();
        self.remove_excess_bottom_cuts();
    }

    fn last(&self) -> u32 {
        self.cuts.last().copied().unwrap_or(0)
    }

    fn fill_cuts_to_bottom(&mut self) {
        while self.last().saturating_add(self.max_distance) < self.height {
            let pos = self.align(self.last() + self.max_distance);
            self.cuts.push(pos);
        }
    }

    fn remove_excess_bottom_cuts(&mut self) {
        while self.cuts.last().is_some_and(|&cut| cut >= self.height) {
            self.cuts.pop();
        }
        while self.cuts.len() >= 2
            && self.cuts[self.cuts.len() - 2].saturating_add(self.max_distance) >= self.height
        {
            self.cuts.pop();
        }
    }
}

/// A pointer-drag session over a [`CutsState`].
///
/// Positions are in screen space; `zoom` converts pointer displacement to
/// image pixels.
#[derive(Debug)]
pub struct CutsEditor {
    cuts: CutsState,
    active: Option<ActiveMove>,
}

#[derive(Debug, Clone, Copy)]
struct ActiveMove {
    index: usize,
    cut_start: u32,
    pointer_start: f64,
}

impl CutsEditor {
    /// Wrap a cut model for interactive editing.
    #[must_use]
    pub fn new(cuts: CutsState) -> Self {
        Self { cuts, active: None }
    }

    /// Current cut positions.
    #[must_use]
    pub fn cuts(&self) -> &[u32] {
        self.cuts.cuts()
    }

    /// The underlying model.
    #[must_use]
    pub fn state(&self) -> &CutsState {
        &self.cuts
    }

    /// Release the underlying model.
    #[must_use]
    pub fn into_state(self) -> CutsState {
        self.cuts
    }

    /// Index of the cut being dragged, if any.
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.active.map(|m| m.index)
    }

    /// Begin dragging cut `index` with the pointer at `pointer_y`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CutIndexOutOfRange`] if there is no cut at `index`.
    pub fn start_move(&mut self, index: usize, pointer_y: f64) -> Result<()> {
        let cut_start = *self
            .cuts
            .cuts()
            .get(index)
            .ok_or(Error::CutIndexOutOfRange {
                index,
                len: self.cuts.cuts().len(),
            })?;
        self.active = Some(ActiveMove {
            index,
            cut_start,
            pointer_start: pointer_y,
        });
        Ok(())
    }

    /// Move the active cut by the pointer displacement scaled by `1 / zoom`.
    ///
    /// Does nothing when no drag is active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a non-positive or non-finite
    /// `zoom`, or [`Error::CutIndexOutOfRange`] if the dragged cut was removed.
    pub fn perform_move(&mut self, pointer_y: f64, zoom: f64) -> Result<()> {
        let Some(active) = self.active else {
            return Ok(());
        };
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(Error::invalid_parameter(
                "zoom",
                format!("should be a positive finite number, got {zoom}"),
            ));
        }

        let displacement = (pointer_y - active.pointer_start) / zoom;
        let target = (f64::from(active.cut_start) + displacement).max(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target = target.min(f64::from(u32::MAX)) as u32;
        self.cuts.move_cut(active.index, target)
    }

    /// End the drag and settle the cut list. Returns whether cleanup removed anything.
    pub fn finish_move(&mut self) -> bool {
        self.active = None;
        self.cuts.cleanup()
    }
}
