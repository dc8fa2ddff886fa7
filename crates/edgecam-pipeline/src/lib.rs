//! edgecam-pipeline: live edge detection over a stream of camera frames
//! (sans-IO).
//!
//! Each frame is either passed through untouched (bypass) or run through:
//! Gaussian smoothing -> intensity conversion -> Sobel gradients ->
//! Canny edge decision -> RGBA expansion of the binary mask.
//!
//! The smoothing kernel size and both hysteresis thresholds can be
//! changed from another thread while frames are flowing; each frame
//! sees one consistent snapshot. See [`SharedState`].
//!
//! This crate has **no I/O dependencies**. Frames come in and go out as
//! in-memory [`RgbaImage`]s; capture devices, displays, and control
//! surfaces live with the caller behind [`FrameSource`] and
//! [`FrameSink`].

pub mod blur;
pub mod canny;
pub mod controller;
pub mod diagnostics;
pub mod edge;
pub mod gradient;
pub mod grayscale;
pub mod state;
pub mod stream;
pub mod types;

pub use controller::PipelineController;
pub use diagnostics::{Clock, FrameDiagnostics, NoClock, StageMetrics};
pub use state::{PipelineState, SharedState};
pub use stream::{FrameSink, FrameSource, Stream, StreamSummary};
pub use types::{
    Dimensions, FloatImage, GrayImage, KernelSize, PipelineError, PipelineParameters, RgbaImage,
    decode_frame,
};

/// Process a single frame with a throwaway controller.
///
/// Convenient for one-off frames. A stream should keep a
/// [`PipelineController`] around instead so scratch storage is reused.
///
/// Returns a copy of `frame` when `state.bypass` is set, otherwise the
/// expanded edge mask.
#[must_use]
pub fn process(frame: &RgbaImage, state: &PipelineState) -> RgbaImage {
    PipelineController::new().process(state, frame).clone()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Encode an RGBA frame as PNG bytes.
    fn png(frame: &RgbaImage) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        frame.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    /// 40x40 frame with a white disk on black.
    fn disk_frame() -> RgbaImage {
        RgbaImage::from_fn(40, 40, |x, y| {
            let dx = f64::from(x) - 20.0;
            let dy = f64::from(y) - 20.0;
            if dx.hypot(dy) < 10.0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn decoded_frame_produces_edges() {
        let frame = decode_frame(&png(&disk_frame())).unwrap();
        let output = process(&frame, &PipelineState::default());
        assert_eq!(output.dimensions(), (40, 40));
        assert!(output.pixels().any(|p| p.0 == [255, 255, 255, 255]));
        // Far corner is flat background.
        assert_eq!(output.get_pixel(2, 2).0, [0, 0, 0, 255]);
    }

    #[test]
    fn bypass_copies_input() {
        let frame = disk_frame();
        let state = PipelineState {
            bypass: true,
            ..PipelineState::default()
        };
        assert_eq!(process(&frame, &state), frame);
    }

    #[test]
    fn process_is_deterministic() {
        let frame = disk_frame();
        let state = PipelineState::default();
        assert_eq!(process(&frame, &state), process(&frame, &state));
    }
}
