//! Pipeline state and the handle a control surface edits it through.
//!
//! The capture side and the control side never share mutable fields
//! directly. The control side writes through a [`SharedState`]; the
//! capture side copies one [`PipelineState`] snapshot at the start of
//! each frame and works only from that copy, so no stage sees a
//! half-applied edit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::types::PipelineParameters;

/// Parameters plus the bypass flag, as seen by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineState {
    /// Current tunable parameters.
    pub parameters: PipelineParameters,
    /// When `true`, frames pass through untouched.
    pub bypass: bool,
}

impl PipelineState {
    /// Active state with the given parameters.
    #[must_use]
    pub const fn new(parameters: PipelineParameters) -> Self {
        Self {
            parameters,
            bypass: false,
        }
    }
}

/// Cloneable handle to the live [`PipelineState`] of a stream.
///
/// Every setter holds the lock only long enough to write a few words,
/// and [`snapshot`](Self::snapshot) only long enough to copy them.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<PipelineState>>,
}

impl SharedState {
    /// Wrap an initial state.
    #[must_use]
    pub fn new(state: PipelineState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PipelineState {
        *self.lock()
    }

    /// Apply several edits as one atomic update.
    ///
    /// `edit` works on a copy that is stored only once it returns, so a
    /// panicking edit leaves the previous state in place.
    pub fn update<R>(&self, edit: impl FnOnce(&mut PipelineState) -> R) -> R {
        let mut guard = self.lock();
        let mut next = *guard;
        let result = edit(&mut next);
        *guard = next;
        result
    }

    /// Set the smoothing kernel size from a raw control position.
    ///
    /// Zero and even positions are bumped to the next odd size.
    pub fn set_kernel_size(&self, progress: u32) {
        let size = self.update(|s| {
            s.parameters.set_kernel_size(progress);
            s.parameters.kernel_size
        });
        tracing::debug!(progress, %size, "kernel size changed");
    }

    /// Set the hysteresis low threshold from a raw control position.
    pub fn set_low_threshold(&self, progress: u32) {
        self.update(|s| s.parameters.set_low_threshold(progress));
        tracing::debug!(low_threshold = progress, "low threshold changed");
    }

    /// Set the hysteresis high threshold from a raw control position.
    pub fn set_high_threshold(&self, progress: u32) {
        self.update(|s| s.parameters.set_high_threshold(progress));
        tracing::debug!(high_threshold = progress, "high threshold changed");
    }

    /// Replace all three parameters at once.
    pub fn set_parameters(&self, parameters: PipelineParameters) {
        self.update(|s| s.parameters = parameters);
        tracing::debug!(?parameters, "parameters replaced");
    }

    /// Enable or disable bypass. Takes effect from the next frame.
    pub fn set_bypass(&self, bypass: bool) {
        let previous = self.update(|s| std::mem::replace(&mut s.bypass, bypass));
        if previous != bypass {
            tracing::info!(bypass, "bypass changed");
        }
    }

    /// Flip bypass and return the new value.
    pub fn toggle_bypass(&self) -> bool {
        let bypass = self.update(|s| {
            s.bypass = !s.bypass;
            s.bypass
        });
        tracing::info!(bypass, "bypass toggled");
        bypass
    }

    /// Writes only ever store a complete state, so a lock poisoned by a
    /// panicking writer still guards the last whole value.
    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
