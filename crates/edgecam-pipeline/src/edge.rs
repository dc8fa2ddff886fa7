//! Edge decision and mask expansion.
//!
//! [`detect_edges`] takes the integer thresholds straight from the
//! control surface and runs the [`canny`](crate::canny) detector on an
//! intensity frame. Returns a binary mask where white pixels (255) are
//! edges and black pixels (0) are background.
//!
//! [`expand_mask`] turns that single-channel mask back into the RGBA
//! layout the frame sink displays.

use crate::canny::{self, EDGE, EdgeScratch};
use crate::types::{GrayImage, RgbaImage};

/// Detect edges with two-threshold hysteresis.
///
/// Pixels whose suppressed gradient magnitude is at least
/// `high_threshold` are strong edges. Pixels at least `low_threshold`
/// are kept only when 8-connected to a strong edge.
///
/// The thresholds are used as given. `low_threshold > high_threshold`
/// is not an error and degenerates to the strong pixels alone.
#[must_use = "returns the binary edge mask"]
pub fn detect_edges(image: &GrayImage, low_threshold: u32, high_threshold: u32) -> GrayImage {
    let mut scratch = EdgeScratch::new(image.width(), image.height());
    let mut out = GrayImage::new(image.width(), image.height());
    detect_edges_into(image, low_threshold, high_threshold, &mut scratch, &mut out);
    out
}

pub(crate) fn detect_edges_into(
    image: &GrayImage,
    low_threshold: u32,
    high_threshold: u32,
    scratch: &mut EdgeScratch,
    out: &mut GrayImage,
) {
    canny::canny_into(
        image,
        threshold_to_f32(low_threshold),
        threshold_to_f32(high_threshold),
        scratch,
        out,
    );
}

#[allow(clippy::cast_precision_loss)]
const fn threshold_to_f32(threshold: u32) -> f32 {
    threshold as f32
}

/// Expand a single-channel mask to RGBA, `v -> (v, v, v, 255)`.
#[must_use = "returns the expanded color frame"]
pub fn expand_mask(mask: &GrayImage) -> RgbaImage {
    let mut out = RgbaImage::new(mask.width(), mask.height());
    expand_mask_into(mask, &mut out);
    out
}

pub(crate) fn expand_mask_into(mask: &GrayImage, out: &mut RgbaImage) {
    debug_assert_eq!(mask.dimensions(), out.dimensions());
    for (dst, &v) in out.pixels_mut().zip(mask.iter()) {
        *dst = image::Rgba([v, v, v, u8::MAX]);
    }
}

/// Count edge pixels (value == 255) in a mask.
#[must_use]
pub fn count_edge_pixels(mask: &GrayImage) -> u64 {
    mask.iter().map(|&v| u64::from(v == EDGE)).sum()
}
