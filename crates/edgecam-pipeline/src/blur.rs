//! Gaussian smoothing ahead of intensity conversion.
//!
//! Applies a square Gaussian kernel of side [`KernelSize`] to every
//! channel of a color frame, suppressing high-frequency noise that would
//! otherwise produce spurious gradients. The kernel is separable, so the
//! frame is filtered with a horizontal 1-D pass into an `f32` row buffer
//! and then a vertical 1-D pass back to 8-bit channels.
//!
//! # Borders
//!
//! Samples outside the frame replicate the nearest edge pixel
//! (clamp-to-edge). A uniform frame is therefore a fixed point of the
//! blur, including at its borders.
//!
//! Taps further from the center than the longest frame axis are dropped
//! and the remaining weights renormalized, which keeps the work bounded
//! for arbitrarily large kernel sizes coming from a control surface.
//!
//! # Rounding
//!
//! The vertical pass rounds to nearest before narrowing to `u8`.
//! `imageproc`'s filters narrow `f32` to `u8` through `Clamp`, which
//! truncates: normalized taps that sum to just under 1.0 turn a uniform
//! 128 into 127.99 and then 127, so a uniform frame would drift darker.

use crate::types::{KernelSize, PipelineError, RgbaImage};

const CHANNELS: usize = 4;

/// Normalized 1-D Gaussian taps for one kernel size.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    size: KernelSize,
    radius: usize,
    taps: Vec<f32>,
}

impl GaussianKernel {
    /// Build the taps for `size`, truncated to at most `max_radius` on
    /// each side of the center.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(size: KernelSize, max_radius: u32) -> Self {
        let radius = size.radius().min(max_radius) as usize;
        let sigma = size.sigma();
        let denom = 2.0 * sigma * sigma;

        let mut taps: Vec<f32> = (0..=2 * radius)
            .map(|i| {
                let d = i.abs_diff(radius) as f32;
                (-(d * d) / denom).exp()
            })
            .collect();
        let sum: f32 = taps.iter().sum();
        for tap in &mut taps {
            *tap /= sum;
        }

        Self { size, radius, taps }
    }

    /// Build the taps for `size` applied to a frame of the given extent.
    #[must_use]
    pub fn for_frame(size: KernelSize, width: u32, height: u32) -> Self {
        Self::new(size, width.max(height))
    }

    /// The kernel size these taps were built for.
    #[must_use]
    pub const fn size(&self) -> KernelSize {
        self.size
    }

    /// Left-to-right tap weights. Symmetric, summing to 1.
    #[must_use]
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }
}

/// Blur a color frame with a square Gaussian kernel of side `kernel_size`.
///
/// Returns a new frame with identical dimensions. The standard deviation
/// is derived from the kernel size (see [`KernelSize::sigma`]).
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `kernel_size` is zero
/// or even. Callers holding raw control positions should normalize with
/// [`KernelSize::from_progress`] first.
pub fn gaussian_blur_rgba(image: &RgbaImage, kernel_size: u32) -> Result<RgbaImage, PipelineError> {
    let size = KernelSize::new(kernel_size)?;
    let kernel = GaussianKernel::for_frame(size, image.width(), image.height());
    let mut rows = Vec::new();
    let mut out = RgbaImage::new(image.width(), image.height());
    gaussian_blur_rgba_into(image, &kernel, &mut rows, &mut out);
    Ok(out)
}

/// Blur `image` into the preallocated `out`, using `rows` as the
/// intermediate buffer for the horizontal pass.
///
/// `out` must have the same dimensions as `image`. `rows` is resized as
/// needed and keeps its capacity across calls.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub(crate) fn gaussian_blur_rgba_into(
    image: &RgbaImage,
    kernel: &GaussianKernel,
    rows: &mut Vec<f32>,
    out: &mut RgbaImage,
) {
    debug_assert_eq!(image.dimensions(), out.dimensions());
    let (w, h) = (image.width() as usize, image.height() as usize);
    rows.clear();
    rows.resize(w * h * CHANNELS, 0.0);
    if w == 0 || h == 0 {
        return;
    }

    let src: &[u8] = image;
    let taps = kernel.taps();
    let radius = kernel.radius as isize;

    // Horizontal pass: u8 -> f32.
    for y in 0..h {
        let row = &src[y * w * CHANNELS..(y + 1) * w * CHANNELS];
        for x in 0..w {
            let mut acc = [0.0f32; CHANNELS];
            for (t, &weight) in taps.iter().enumerate() {
                let sx = clamp_index(x as isize + t as isize - radius, w);
                let px = &row[sx * CHANNELS..(sx + 1) * CHANNELS];
                for (a, &p) in acc.iter_mut().zip(px) {
                    *a = f32::from(p).mul_add(weight, *a);
                }
            }
            let i = (y * w + x) * CHANNELS;
            rows[i..i + CHANNELS].copy_from_slice(&acc);
        }
    }

    // Vertical pass: f32 -> u8.
    let dst: &mut [u8] = out;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; CHANNELS];
            for (t, &weight) in taps.iter().enumerate() {
                let sy = clamp_index(y as isize + t as isize - radius, h);
                let i = (sy * w + x) * CHANNELS;
                for (a, &p) in acc.iter_mut().zip(&rows[i..i + CHANNELS]) {
                    *a = p.mul_add(weight, *a);
                }
            }
            let i = (y * w + x) * CHANNELS;
            for (d, a) in dst[i..i + CHANNELS].iter_mut().zip(acc) {
                *d = round_to_u8(a);
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 10x10 frame, black left of x=5 and white from x=5.
    fn sharp_edge_frame() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn taps_are_symmetric_and_normalized() {
        let kernel = GaussianKernel::new(KernelSize::from_progress(7), u32::MAX);
        let taps = kernel.taps();
        assert_eq!(taps.len(), 7);
        let sum: f32 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "taps sum to {sum}");
        for i in 0..taps.len() / 2 {
            assert!((taps[i] - taps[taps.len() - 1 - i]).abs() < f32::EPSILON);
        }
        // Peak at the center.
        assert!(taps[3] > taps[2] && taps[2] > taps[1] && taps[1] > taps[0]);
    }

    #[test]
    fn taps_truncate_to_max_radius() {
        let kernel = GaussianKernel::new(KernelSize::from_progress(101), 3);
        assert_eq!(kernel.taps().len(), 7);
        assert_eq!(kernel.size().get(), 101);
        let sum: f32 = kernel.taps().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn even_kernel_size_is_rejected() {
        let img = sharp_edge_frame();
        assert!(matches!(
            gaussian_blur_rgba(&img, 4),
            Err(PipelineError::InvalidParameter { .. })
        ));
        assert!(matches!(
            gaussian_blur_rgba(&img, 0),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn kernel_size_one_is_identity() {
        let img = sharp_edge_frame();
        let blurred = gaussian_blur_rgba(&img, 1).unwrap();
        assert_eq!(img, blurred);
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = RgbaImage::new(17, 31);
        let blurred = gaussian_blur_rgba(&img, 5).unwrap();
        assert_eq!(blurred.dimensions(), (17, 31));
    }

    #[test]
    fn narrowing_rounds_to_nearest() {
        assert_eq!(round_to_u8(127.99), 128);
        assert_eq!(round_to_u8(127.49), 127);
        assert_eq!(round_to_u8(-0.4), 0);
        assert_eq!(round_to_u8(255.6), 255);
    }

    #[test]
    fn every_gray_level_survives_uniform_blur() {
        for v in 0..=255u8 {
            let img = RgbaImage::from_pixel(6, 5, image::Rgba([v, v, v, 255]));
            for k in [3, 7, 15] {
                let blurred = gaussian_blur_rgba(&img, k).unwrap();
                assert_eq!(img, blurred, "level {v} drifted at kernel size {k}");
            }
        }
    }

    #[test]
    fn uniform_frame_is_fixed_point() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([128, 128, 128, 128]));
        for k in [1, 3, 5, 9, 31] {
            let blurred = gaussian_blur_rgba(&img, k).unwrap();
            assert_eq!(img, blurred, "kernel size {k} changed a uniform frame");
        }
    }

    #[test]
    fn uniform_color_frame_is_fixed_point() {
        let img = RgbaImage::from_pixel(12, 7, image::Rgba([100, 150, 200, 250]));
        let blurred = gaussian_blur_rgba(&img, 7).unwrap();
        assert_eq!(img, blurred);
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let img = sharp_edge_frame();
        let blurred = gaussian_blur_rgba(&img, 5).unwrap();

        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];
        assert!(
            left_of_edge > 0,
            "expected blur to raise left-of-edge above 0, got {left_of_edge}",
        );
        assert!(
            right_of_edge < 255,
            "expected blur to lower right-of-edge below 255, got {right_of_edge}",
        );
        // Alpha is uniform and stays put.
        assert!(blurred.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn larger_kernel_spreads_further() {
        let img = sharp_edge_frame();
        let narrow = gaussian_blur_rgba(&img, 3).unwrap();
        let wide = gaussian_blur_rgba(&img, 9).unwrap();
        // Two pixels left of the edge only the wide kernel reaches.
        assert_eq!(narrow.get_pixel(2, 5).0[0], 0);
        assert!(wide.get_pixel(2, 5).0[0] > 0);
    }

    #[test]
    fn border_replicates_edge_pixel() {
        // A single pixel has only itself to replicate, whatever the kernel.
        let img = RgbaImage::from_pixel(1, 1, image::Rgba([9, 99, 199, 255]));
        let blurred = gaussian_blur_rgba(&img, 15).unwrap();
        assert_eq!(img, blurred);
    }

    #[test]
    fn huge_kernel_on_small_frame_is_bounded() {
        let img = sharp_edge_frame();
        let blurred = gaussian_blur_rgba(&img, 1_000_001).unwrap();
        assert_eq!(blurred.dimensions(), img.dimensions());
    }

    #[test]
    fn empty_frame_is_tolerated() {
        let img = RgbaImage::new(0, 0);
        let blurred = gaussian_blur_rgba(&img, 5).unwrap();
        assert_eq!(blurred.dimensions(), (0, 0));
    }

    #[test]
    fn into_variant_reuses_row_buffer() {
        let img = sharp_edge_frame();
        let kernel = GaussianKernel::for_frame(KernelSize::from_progress(5), 10, 10);
        let mut rows = Vec::new();
        let mut out = RgbaImage::new(10, 10);
        gaussian_blur_rgba_into(&img, &kernel, &mut rows, &mut out);
        let capacity = rows.capacity();
        let first = out.clone();
        gaussian_blur_rgba_into(&img, &kernel, &mut rows, &mut out);
        assert_eq!(rows.capacity(), capacity);
        assert_eq!(first, out);
        assert_eq!(out, gaussian_blur_rgba(&img, 5).unwrap());
    }
}
