//! Per-frame pipeline controller.
//!
//! [`PipelineController`] runs one frame at a time through
//!
//! ```text
//! blur -> intensity -> gradients -> magnitude/direction
//!                   \-> edge decision -> RGBA expansion
//! ```
//!
//! or hands the frame straight back when the state says bypass.
//!
//! All intermediate frames live in scratch storage owned by the
//! controller. The storage is allocated on the first active frame and
//! replaced only when a frame arrives with different dimensions. The
//! gradient fields and the Canny detector's internal smoothing still
//! come back from `imageproc` as fresh buffers each frame.
//!
//! ```rust
//! # use edgecam_pipeline::{PipelineController, PipelineState, RgbaImage};
//! let mut controller = PipelineController::new();
//! let frame = RgbaImage::from_pixel(8, 8, image::Rgba([128, 128, 128, 255]));
//!
//! let output = controller.process(&PipelineState::default(), &frame);
//! assert_eq!(output.dimensions(), frame.dimensions());
//! ```

use crate::blur::{GaussianKernel, gaussian_blur_rgba_into};
use crate::canny::EdgeScratch;
use crate::diagnostics::{
    Clock, FrameDiagnostics, NoClock, StageBreakdown, StageDiagnostics, StageMetrics,
    magnitude_stats,
};
use crate::edge::{count_edge_pixels, detect_edges_into, expand_mask_into};
use crate::gradient::{Gradients, Polar, magnitude_and_direction_into, sobel_gradients};
use crate::grayscale::to_intensity_into;
use crate::state::{PipelineState, SharedState};
use crate::types::{Dimensions, FloatImage, GrayImage, PipelineParameters, RgbaImage};

/// Owns scratch storage and runs the stage sequence for each frame.
#[derive(Debug, Default)]
pub struct PipelineController {
    scratch: Option<Scratch>,
    resizes: u64,
}

/// Every intermediate buffer for one frame size.
#[derive(Debug)]
struct Scratch {
    dimensions: Dimensions,
    kernel: GaussianKernel,
    blur_rows: Vec<f32>,
    blurred: RgbaImage,
    intensity: GrayImage,
    gradients: Gradients,
    polar: Polar,
    edge: EdgeScratch,
    mask: GrayImage,
    result: RgbaImage,
}

impl Scratch {
    fn new(dimensions: Dimensions, parameters: &PipelineParameters) -> Self {
        let Dimensions { width, height } = dimensions;
        Self {
            dimensions,
            kernel: GaussianKernel::for_frame(parameters.kernel_size, width, height),
            blur_rows: Vec::with_capacity(width as usize * height as usize * 4),
            blurred: RgbaImage::new(width, height),
            intensity: GrayImage::new(width, height),
            gradients: Gradients::new(width, height),
            polar: Polar::new(width, height),
            edge: EdgeScratch::new(width, height),
            mask: GrayImage::new(width, height),
            result: RgbaImage::new(width, height),
        }
    }
}

/// Time spent in each stage of one active frame.
struct StageTimings {
    blur: std::time::Duration,
    intensity: std::time::Duration,
    gradient: std::time::Duration,
    edge_detection: std::time::Duration,
    expand: std::time::Duration,
}

impl PipelineController {
    /// Controller with no scratch storage yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one frame with a parameter snapshot.
    ///
    /// When `state.bypass` is set the input frame itself is returned and
    /// no stage runs. Otherwise the returned frame is the color-expanded
    /// edge mask, borrowed from scratch storage until the next call.
    pub fn process<'a>(&'a mut self, state: &PipelineState, frame: &'a RgbaImage) -> &'a RgbaImage {
        if state.bypass {
            tracing::trace!("bypassed frame");
            return frame;
        }
        let (scratch, _) = self.run_stages(&state.parameters, frame, &NoClock);
        &scratch.result
    }

    /// Take one snapshot of `shared` and process `frame` with it.
    ///
    /// Edits made through `shared` while the frame is in flight apply
    /// from the next frame on.
    pub fn process_shared<'a>(
        &'a mut self,
        shared: &SharedState,
        frame: &'a RgbaImage,
    ) -> &'a RgbaImage {
        let state = shared.snapshot();
        self.process(&state, frame)
    }

    /// Process one frame and collect per-stage diagnostics.
    ///
    /// Produces exactly the same output as [`process`](Self::process).
    pub fn process_with_diagnostics<'a, C: Clock>(
        &'a mut self,
        state: &PipelineState,
        frame: &'a RgbaImage,
        clock: &C,
    ) -> (&'a RgbaImage, FrameDiagnostics) {
        let start = clock.now();
        let dimensions = Dimensions::of(frame);
        if state.bypass {
            let diagnostics = FrameDiagnostics {
                dimensions,
                parameters: state.parameters,
                stages: None,
                total_duration: clock.elapsed(&start),
            };
            return (frame, diagnostics);
        }

        let (scratch, timings) = self.run_stages(&state.parameters, frame, clock);
        let total_duration = clock.elapsed(&start);

        let (max_magnitude, mean_magnitude) = magnitude_stats(&scratch.polar.magnitude);
        let Dimensions { width, height } = dimensions;
        let stages = StageBreakdown {
            blur: StageDiagnostics {
                duration: timings.blur,
                metrics: StageMetrics::Blur {
                    kernel_size: state.parameters.kernel_size.get(),
                    sigma: state.parameters.kernel_size.sigma(),
                    taps: scratch.kernel.taps().len(),
                },
            },
            intensity: StageDiagnostics {
                duration: timings.intensity,
                metrics: StageMetrics::Intensity { width, height },
            },
            gradient: StageDiagnostics {
                duration: timings.gradient,
                metrics: StageMetrics::Gradient {
                    max_magnitude,
                    mean_magnitude,
                },
            },
            edge_detection: StageDiagnostics {
                duration: timings.edge_detection,
                metrics: StageMetrics::EdgeDetection {
                    low_threshold: state.parameters.low_threshold,
                    high_threshold: state.parameters.high_threshold,
                    edge_pixel_count: count_edge_pixels(&scratch.mask),
                    total_pixel_count: dimensions.pixel_count(),
                },
            },
            expand: StageDiagnostics {
                duration: timings.expand,
                metrics: StageMetrics::Expand { width, height },
            },
        };

        let diagnostics = FrameDiagnostics {
            dimensions,
            parameters: state.parameters,
            stages: Some(stages),
            total_duration,
        };
        (&scratch.result, diagnostics)
    }

    /// Dimensions of the current scratch storage, if any.
    #[must_use]
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.scratch.as_ref().map(|s| s.dimensions)
    }

    /// How many times scratch storage was replaced because the frame
    /// size changed.
    #[must_use]
    pub const fn resize_count(&self) -> u64 {
        self.resizes
    }

    /// Blurred color frame from the last active frame.
    #[must_use]
    pub fn blurred(&self) -> Option<&RgbaImage> {
        self.scratch.as_ref().map(|s| &s.blurred)
    }

    /// Intensity frame from the last active frame.
    #[must_use]
    pub fn intensity(&self) -> Option<&GrayImage> {
        self.scratch.as_ref().map(|s| &s.intensity)
    }

    /// Horizontal gradient from the last active frame.
    #[must_use]
    pub fn gradient_x(&self) -> Option<&FloatImage> {
        self.scratch.as_ref().map(|s| &s.gradients.gx)
    }

    /// Vertical gradient from the last active frame.
    #[must_use]
    pub fn gradient_y(&self) -> Option<&FloatImage> {
        self.scratch.as_ref().map(|s| &s.gradients.gy)
    }

    /// Gradient magnitude from the last active frame.
    #[must_use]
    pub fn magnitude(&self) -> Option<&FloatImage> {
        self.scratch.as_ref().map(|s| &s.polar.magnitude)
    }

    /// Gradient direction (radians) from the last active frame.
    #[must_use]
    pub fn direction(&self) -> Option<&FloatImage> {
        self.scratch.as_ref().map(|s| &s.polar.direction)
    }

    /// Binary edge mask from the last active frame.
    #[must_use]
    pub fn edges(&self) -> Option<&GrayImage> {
        self.scratch.as_ref().map(|s| &s.mask)
    }

    /// Scratch storage sized for `dimensions`, replacing any storage of
    /// another size.
    fn scratch_for(&mut self, dimensions: Dimensions, parameters: &PipelineParameters) -> &mut Scratch {
        if let Some(previous) = self.dimensions().filter(|d| *d != dimensions) {
            tracing::debug!(%previous, current = %dimensions, "frame size changed, reallocating scratch");
            self.resizes += 1;
            self.scratch = None;
        }
        self.scratch
            .get_or_insert_with(|| Scratch::new(dimensions, parameters))
    }

    fn run_stages<C: Clock>(
        &mut self,
        parameters: &PipelineParameters,
        frame: &RgbaImage,
        clock: &C,
    ) -> (&Scratch, StageTimings) {
        let dimensions = Dimensions::of(frame);
        let scratch = self.scratch_for(dimensions, parameters);
        if scratch.kernel.size() != parameters.kernel_size {
            scratch.kernel =
                GaussianKernel::for_frame(parameters.kernel_size, dimensions.width, dimensions.height);
        }
        tracing::trace!(?parameters, %dimensions, "processing frame");

        let t = clock.now();
        gaussian_blur_rgba_into(frame, &scratch.kernel, &mut scratch.blur_rows, &mut scratch.blurred);
        let blur = clock.elapsed(&t);

        let t = clock.now();
        to_intensity_into(&scratch.blurred, &mut scratch.intensity);
        let intensity = clock.elapsed(&t);

        // Not read by the mask; kept per frame for inspection.
        let t = clock.now();
        scratch.gradients = sobel_gradients(&scratch.intensity);
        magnitude_and_direction_into(&scratch.gradients, &mut scratch.polar);
        let gradient = clock.elapsed(&t);

        let t = clock.now();
        detect_edges_into(
            &scratch.intensity,
            parameters.low_threshold,
            parameters.high_threshold,
            &mut scratch.edge,
            &mut scratch.mask,
        );
        let edge_detection = clock.elapsed(&t);

        let t = clock.now();
        expand_mask_into(&scratch.mask, &mut scratch.result);
        let expand = clock.elapsed(&t);

        let timings = StageTimings {
            blur,
            intensity,
            gradient,
            edge_detection,
            expand,
        };
        (scratch, timings)
    }
}
