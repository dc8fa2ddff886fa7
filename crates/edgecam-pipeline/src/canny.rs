//! Canny edge detection over reusable scratch buffers.
//!
//! Internal smoothing and Sobel differentiation go through `imageproc`;
//! non-maximum suppression and hysteresis run here so their outputs can
//! land in buffers owned by the caller.
//!
//! Gradient strength is the L1 norm `|gx| + |gy|`, so threshold values
//! are on that scale rather than the Euclidean one `imageproc` uses.
//!
//! Hysteresis differs from `imageproc::edges::canny` in three ways:
//!
//! 1. Threshold order is not asserted. With `low > high` only pixels at
//!    or above `high` survive, since no weak neighbor can qualify.
//! 2. Candidates must have non-zero suppressed magnitude, so a zero
//!    threshold does not mark flat regions as edges.
//! 3. The stack walk checks all 8 neighbors and bounds-checks each one
//!    at the frame border (see image-rs/imageproc#705).

use image::Luma;
use imageproc::definitions::Image;
use imageproc::filter::{filter_clamped, gaussian_blur_f32};
use imageproc::kernel;

use crate::types::{FloatImage, GrayImage};

/// Sigma of the smoothing applied inside the detector.
pub const SIGMA: f32 = 1.4;

/// Mask value for edge pixels.
pub const EDGE: u8 = 255;

/// Mask value for non-edge pixels.
pub const NON_EDGE: u8 = 0;

/// Buffers reused by [`canny_into`] across frames.
#[derive(Debug, Clone)]
pub(crate) struct EdgeScratch {
    magnitude: FloatImage,
    thinned: FloatImage,
    stack: Vec<(u32, u32)>,
}

impl EdgeScratch {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            magnitude: FloatImage::new(width, height),
            thinned: FloatImage::new(width, height),
            stack: Vec::new(),
        }
    }
}

/// Run Canny edge detection and return a binary mask.
///
/// Returns [`EDGE`] for edge pixels and [`NON_EDGE`] elsewhere. Frames
/// smaller than 3x3 have no interior and produce an empty mask.
#[must_use = "returns the binary edge mask"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let mut scratch = EdgeScratch::new(image.width(), image.height());
    let mut out = GrayImage::new(image.width(), image.height());
    canny_into(image, low_threshold, high_threshold, &mut scratch, &mut out);
    out
}

pub(crate) fn canny_into(
    image: &GrayImage,
    low_threshold: f32,
    high_threshold: f32,
    scratch: &mut EdgeScratch,
    out: &mut GrayImage,
) {
    debug_assert_eq!(image.dimensions(), out.dimensions());
    out.fill(NON_EDGE);
    if image.width() < 3 || image.height() < 3 {
        return;
    }

    // 1. Gaussian blur.
    let blurred = gaussian_blur_f32(image, SIGMA);

    // 2. Intensity of gradients.
    let gx: Image<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_VERTICAL_3X3);
    l1_magnitude(&gx, &gy, &mut scratch.magnitude);

    // 3. Non-maximum suppression (make edges thinner).
    non_maximum_suppression(&scratch.magnitude, &gx, &gy, &mut scratch.thinned);

    // 4. Hysteresis to filter out edges based on thresholds.
    hysteresis(
        &scratch.thinned,
        low_threshold,
        high_threshold,
        &mut scratch.stack,
        out,
    );
}

/// `|gx| + |gy|` per pixel. Thresholds are on this scale.
fn l1_magnitude(gx: &Image<Luma<i16>>, gy: &Image<Luma<i16>>, out: &mut FloatImage) {
    for ((m, h), v) in out.iter_mut().zip(gx.iter()).zip(gy.iter()) {
        *m = f32::from(h.unsigned_abs()) + f32::from(v.unsigned_abs());
    }
}

/// Keeps only local maxima along the gradient direction. The one-pixel
/// border is left at zero.
fn non_maximum_suppression(
    g: &FloatImage,
    gx: &Image<Luma<i16>>,
    gy: &Image<Luma<i16>>,
    out: &mut FloatImage,
) {
    const RADIANS_TO_DEGREES: f32 = 180.0 / std::f32::consts::PI;
    out.fill(0.0);
    for y in 1..g.height() - 1 {
        for x in 1..g.width() - 1 {
            let x_gradient = f32::from(gx.get_pixel(x, y).0[0]);
            let y_gradient = f32::from(gy.get_pixel(x, y).0[0]);
            let mut angle = y_gradient.atan2(x_gradient) * RADIANS_TO_DEGREES;
            if angle < 0.0 {
                angle += 180.0;
            }

            // Two neighbors across the edge.
            let (cmp1, cmp2) = if (22.5..67.5).contains(&angle) {
                (g.get_pixel(x + 1, y + 1).0[0], g.get_pixel(x - 1, y - 1).0[0])
            } else if (67.5..112.5).contains(&angle) {
                (g.get_pixel(x, y - 1).0[0], g.get_pixel(x, y + 1).0[0])
            } else if (112.5..157.5).contains(&angle) {
                (g.get_pixel(x - 1, y + 1).0[0], g.get_pixel(x + 1, y - 1).0[0])
            } else {
                (g.get_pixel(x - 1, y).0[0], g.get_pixel(x + 1, y).0[0])
            };

            let pixel = g.get_pixel(x, y).0[0];
            if pixel >= cmp1 && pixel >= cmp2 {
                out.put_pixel(x, y, Luma([pixel]));
            }
        }
    }
}

/// Marks strong pixels and everything 8-connected to them through weak
/// pixels. Non-recursive; `stack` keeps its capacity between frames.
fn hysteresis(
    input: &FloatImage,
    low_thresh: f32,
    high_thresh: f32,
    stack: &mut Vec<(u32, u32)>,
    out: &mut GrayImage,
) {
    let (w, h) = (input.width(), input.height());
    stack.clear();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let strength = input.get_pixel(x, y).0[0];
            if strength <= 0.0 || strength < high_thresh || out.get_pixel(x, y).0[0] != NON_EDGE {
                continue;
            }
            out.put_pixel(x, y, Luma([EDGE]));
            stack.push((x, y));

            while let Some((nx, ny)) = stack.pop() {
                let neighbors = [
                    (nx + 1, ny),
                    (nx + 1, ny + 1),
                    (nx, ny + 1),
                    (nx.wrapping_sub(1), ny.wrapping_sub(1)),
                    (nx.wrapping_sub(1), ny),
                    (nx.wrapping_sub(1), ny + 1),
                    (nx, ny.wrapping_sub(1)),
                    (nx + 1, ny.wrapping_sub(1)),
                ];
                for (px, py) in neighbors {
                    if px >= w || py >= h {
                        continue;
                    }
                    let s = input.get_pixel(px, py).0[0];
                    if s > 0.0 && s >= low_thresh && out.get_pixel(px, py).0[0] == NON_EDGE {
                        out.put_pixel(px, py, Luma([EDGE]));
                        stack.push((px, py));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn edge_count(mask: &GrayImage) -> usize {
        mask.iter().filter(|&&v| v == EDGE).count()
    }

    /// 20x20 frame with a sharp vertical boundary at x = 10.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| if x < 10 { Luma([0]) } else { Luma([255]) })
    }

    #[test]
    fn border_edge_does_not_panic() {
        let mut img = GrayImage::from_pixel(10, 10, Luma([0]));
        for y in 0..10 {
            img.put_pixel(1, y, Luma([255]));
        }
        // Low thresholds push the walk into border pixels.
        let _edges = canny(&img, 1.0, 2.0);
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = GrayImage::new(17, 31);
        let edges = canny(&img, 50.0, 150.0);
        assert_eq!(edges.dimensions(), (17, 31));
    }

    #[test]
    fn sharp_edge_detected() {
        let edges = canny(&sharp_edge_image(), 50.0, 150.0);
        assert!(edge_count(&edges) > 0, "expected edges at sharp boundary");
    }

    #[test]
    fn uniform_frame_has_no_edges_even_at_zero_thresholds() {
        let img = GrayImage::from_pixel(20, 20, Luma([128]));
        assert_eq!(edge_count(&canny(&img, 0.0, 0.0)), 0);
        assert_eq!(edge_count(&canny(&img, 80.0, 100.0)), 0);
    }

    #[test]
    fn reversed_thresholds_do_not_panic() {
        let edges = canny(&sharp_edge_image(), 200.0, 100.0);
        assert_eq!(edges.dimensions(), (20, 20));
        // Only strong pixels can survive.
        let strong_only = canny(&sharp_edge_image(), 100.0, 100.0);
        for (a, b) in edges.iter().zip(strong_only.iter()) {
            assert!(*a <= *b);
        }
    }

    #[test]
    fn magnitude_is_l1_norm() {
        let gx = Image::<Luma<i16>>::from_vec(3, 1, vec![3, -300, 0]).unwrap();
        let gy = Image::<Luma<i16>>::from_vec(3, 1, vec![-4, 400, i16::MIN]).unwrap();
        let mut out = FloatImage::new(3, 1);
        l1_magnitude(&gx, &gy, &mut out);
        assert_eq!(out.get_pixel(0, 0).0[0], 7.0);
        assert_eq!(out.get_pixel(1, 0).0[0], 700.0);
        assert_eq!(out.get_pixel(2, 0).0[0], 32768.0);
    }

    #[test]
    fn diagonal_edge_strength_uses_l1_norm() {
        // On a diagonal step gx == gy, so |gx| + |gy| is about 1.41 times
        // the Euclidean strength.
        let img = GrayImage::from_fn(24, 24, |x, y| Luma([if x + y < 24 { 0 } else { 255 }]));
        let blurred = gaussian_blur_f32(&img, SIGMA);
        let gx: Image<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_HORIZONTAL_3X3);
        let gy: Image<Luma<i16>> = filter_clamped(&blurred, kernel::SOBEL_VERTICAL_3X3);
        let l2_max = gx
            .iter()
            .zip(gy.iter())
            .map(|(h, v)| f32::from(*h).hypot(f32::from(*v)))
            .fold(0.0f32, f32::max);
        // Above every Euclidean strength in the frame.
        let high = l2_max + 1.0;
        assert!(edge_count(&canny(&img, high, high)) > 0);
    }

    #[test]
    fn tiny_frames_are_empty_masks() {
        for (w, h) in [(0, 0), (1, 1), (2, 5), (5, 2)] {
            let img = GrayImage::from_fn(w, h, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
            let edges = canny(&img, 1.0, 2.0);
            assert_eq!(edges.dimensions(), (w, h));
            assert_eq!(edge_count(&edges), 0);
        }
    }

    #[test]
    fn border_pixels_are_never_edges() {
        let img = GrayImage::from_fn(12, 12, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }]));
        let edges = canny(&img, 1.0, 2.0);
        for x in 0..12 {
            assert_eq!(edges.get_pixel(x, 0).0[0], NON_EDGE);
            assert_eq!(edges.get_pixel(x, 11).0[0], NON_EDGE);
            assert_eq!(edges.get_pixel(0, x).0[0], NON_EDGE);
            assert_eq!(edges.get_pixel(11, x).0[0], NON_EDGE);
        }
    }

    #[test]
    fn into_variant_matches_allocating_variant() {
        let img = sharp_edge_image();
        let mut scratch = EdgeScratch::new(20, 20);
        let mut out = GrayImage::from_pixel(20, 20, Luma([EDGE]));
        canny_into(&img, 30.0, 90.0, &mut scratch, &mut out);
        assert_eq!(out, canny(&img, 30.0, 90.0));
        // Second run over the same scratch gives the same answer.
        canny_into(&img, 30.0, 90.0, &mut scratch, &mut out);
        assert_eq!(out, canny(&img, 30.0, 90.0));
    }
}
