//! Cooperative cancellation.
//!
//! Long pixel loops poll a [`CancelSignal`] once per row, patch or chunk and
//! bail out with [`Error::Cancelled`] when the work is no longer wanted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Poll-style "is this operation still wanted" check.
pub trait CancelSignal: Sync {
    /// Returns `true` once the caller has asked for the operation to stop.
    fn is_cancelled(&self) -> bool;

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when [`is_cancelled`](Self::is_cancelled) is `true`.
    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A signal that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: CancelSignal + Send + ?Sized> CancelSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
