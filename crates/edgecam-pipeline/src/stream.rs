//! Frame stream driver.
//!
//! A [`Stream`] pulls frames from a [`FrameSource`], runs each one
//! through a [`PipelineController`] using a fresh [`SharedState`]
//! snapshot, and pushes the result to a [`FrameSink`]. The control side
//! holds a clone of the shared state (see [`Stream::control`]) and may
//! edit it from any thread while the stream runs.
//!
//! Any `Iterator<Item = RgbaImage>` is a source and any
//! `FnMut(&RgbaImage)` is a sink:
//!
//! ```rust
//! # use edgecam_pipeline::{PipelineState, RgbaImage, Stream};
//! let frames = (0..3).map(|_| RgbaImage::new(8, 8));
//! let mut shown = 0;
//!
//! let mut stream = Stream::new(PipelineState::default());
//! let summary = stream.run(frames, |_: &RgbaImage| shown += 1);
//! assert_eq!(summary.frames, 3);
//! assert_eq!(shown, 3);
//! ```

use serde::{Deserialize, Serialize};

use crate::controller::PipelineController;
use crate::diagnostics::{Clock, FrameDiagnostics};
use crate::state::{PipelineState, SharedState};
use crate::types::RgbaImage;

/// Producer of camera frames.
pub trait FrameSource {
    /// Next frame, or `None` when the stream has ended.
    fn next_frame(&mut self) -> Option<RgbaImage>;
}

impl<I: Iterator<Item = RgbaImage>> FrameSource for I {
    fn next_frame(&mut self) -> Option<RgbaImage> {
        self.next()
    }
}

/// Consumer of displayed frames.
pub trait FrameSink {
    /// Display one frame. The frame is only borrowed for the call.
    fn present(&mut self, frame: &RgbaImage);
}

impl<F: FnMut(&RgbaImage)> FrameSink for F {
    fn present(&mut self, frame: &RgbaImage) {
        self(frame);
    }
}

/// Counters collected over one [`Stream::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamSummary {
    /// Frames delivered to the sink.
    pub frames: u64,
    /// Frames passed through unprocessed.
    pub bypassed_frames: u64,
    /// Scratch reallocations caused by frame size changes.
    pub resizes: u64,
}

/// Capture-side driver owning the controller and a handle to the state.
#[derive(Debug, Default)]
pub struct Stream {
    controller: PipelineController,
    state: SharedState,
}

impl Stream {
    /// Stream starting from `initial`.
    #[must_use]
    pub fn new(initial: PipelineState) -> Self {
        Self::with_shared(SharedState::new(initial))
    }

    /// Stream driven by an existing shared state.
    #[must_use]
    pub fn with_shared(state: SharedState) -> Self {
        Self {
            controller: PipelineController::new(),
            state,
        }
    }

    /// Handle for the control surface.
    #[must_use]
    pub fn control(&self) -> SharedState {
        self.state.clone()
    }

    /// The controller, for inspecting the last frame's intermediates.
    #[must_use]
    pub const fn controller(&self) -> &PipelineController {
        &self.controller
    }

    /// Drive frames from `source` to `sink` until the source ends.
    ///
    /// Each frame is processed with the state as of its arrival. Frames
    /// are delivered in arrival order, exactly one output per input.
    pub fn run(&mut self, source: impl FrameSource, sink: impl FrameSink) -> StreamSummary {
        self.run_with_diagnostics(source, sink, &crate::diagnostics::NoClock, |_| {})
    }

    /// Like [`run`](Self::run), reporting per-frame diagnostics to
    /// `on_frame` after each frame is presented.
    pub fn run_with_diagnostics<C: Clock>(
        &mut self,
        mut source: impl FrameSource,
        mut sink: impl FrameSink,
        clock: &C,
        mut on_frame: impl FnMut(&FrameDiagnostics),
    ) -> StreamSummary {
        let resizes_before = self.controller.resize_count();
        let mut summary = StreamSummary::default();
        tracing::info!(state = ?self.state.snapshot(), "stream started");

        while let Some(frame) = source.next_frame() {
            let state = self.state.snapshot();
            let (output, diagnostics) =
                self.controller.process_with_diagnostics(&state, &frame, clock);
            sink.present(output);

            summary.frames += 1;
            if diagnostics.bypassed() {
                summary.bypassed_frames += 1;
            }
            on_frame(&diagnostics);
        }

        summary.resizes = self.controller.resize_count() - resizes_before;
        tracing::info!(
            frames = summary.frames,
            bypassed = summary.bypassed_frames,
            resizes = summary.resizes,
            "stream stopped"
        );
        summary
    }
}
