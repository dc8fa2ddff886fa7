//! Sobel gradients with magnitude and direction fields.
//!
//! - Convolves the intensity frame with the 3x3 Sobel pair, sampling
//!   outside the frame by replicating the nearest edge pixel.
//! - Outputs signed `gx`, `gy` as `f32` frames.
//! - [`magnitude_and_direction`] derives `mag = sqrt(gx^2 + gy^2)` and
//!   `dir = atan2(gy, gx)` in radians, range (-pi, pi].
//!
//! The edge mask does not read these fields; the controller still
//! computes them on every frame and exposes them for inspection.

use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;

use crate::types::{FloatImage, GrayImage};

/// Row-major 3x3 Sobel weights, matching `imageproc::kernel::SOBEL_*_3X3`
/// but in `f32` so the fields come out unclamped.
const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// Horizontal and vertical derivative fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    /// Horizontal derivative (convolution with the X kernel).
    pub gx: FloatImage,
    /// Vertical derivative (convolution with the Y kernel).
    pub gy: FloatImage,
}

impl Gradients {
    /// Zeroed fields of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            gx: FloatImage::new(width, height),
            gy: FloatImage::new(width, height),
        }
    }
}

/// Gradient magnitude and direction fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Polar {
    /// Euclidean magnitude per pixel.
    pub magnitude: FloatImage,
    /// Direction per pixel in radians, (-pi, pi].
    pub direction: FloatImage,
}

impl Polar {
    /// Zeroed fields of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            magnitude: FloatImage::new(width, height),
            direction: FloatImage::new(width, height),
        }
    }
}

/// Compute Sobel gradients of an intensity frame.
#[must_use = "returns the gradient fields"]
pub fn sobel_gradients(image: &GrayImage) -> Gradients {
    Gradients {
        gx: filter_clamped::<_, f32, f32>(image, Kernel::new(&SOBEL_X, 3, 3)),
        gy: filter_clamped::<_, f32, f32>(image, Kernel::new(&SOBEL_Y, 3, 3)),
    }
}

/// Compute magnitude and direction from a pair of gradient fields.
#[must_use = "returns the magnitude and direction fields"]
pub fn magnitude_and_direction(gradients: &Gradients) -> Polar {
    let mut out = Polar::new(gradients.gx.width(), gradients.gx.height());
    magnitude_and_direction_into(gradients, &mut out);
    out
}

pub(crate) fn magnitude_and_direction_into(gradients: &Gradients, out: &mut Polar) {
    debug_assert_eq!(gradients.gx.dimensions(), out.magnitude.dimensions());
    let pairs = gradients.gx.iter().zip(gradients.gy.iter());
    let dst = out.magnitude.iter_mut().zip(out.direction.iter_mut());
    for ((&gx, &gy), (mag, dir)) in pairs.zip(dst) {
        *mag = gx.hypot(gy);
        *dir = gy.atan2(gx);
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    #[test]
    fn constant_frame_has_zero_gradient() {
        let img = GrayImage::from_pixel(9, 5, image::Luma([128]));
        let grads = sobel_gradients(&img);
        assert!(grads.gx.iter().all(|&v| v == 0.0));
        assert!(grads.gy.iter().all(|&v| v == 0.0));

        let polar = magnitude_and_direction(&grads);
        assert!(polar.magnitude.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn vertical_step_gives_horizontal_gradient() {
        let img = GrayImage::from_fn(8, 8, |x, _| image::Luma([if x < 4 { 0 } else { 100 }]));
        let grads = sobel_gradients(&img);
        // Interior pixel left of the step: (0,0,100) columns -> 4 * 100.
        assert!((grads.gx.get_pixel(3, 4).0[0] - 400.0).abs() < 1e-3);
        assert!((grads.gx.get_pixel(4, 4).0[0] - 400.0).abs() < 1e-3);
        assert!(grads.gy.iter().all(|&v| v.abs() < 1e-3));
        // Far from the step nothing changes.
        assert!(grads.gx.get_pixel(0, 4).0[0].abs() < 1e-3);
        assert!(grads.gx.get_pixel(7, 4).0[0].abs() < 1e-3);
    }

    #[test]
    fn horizontal_step_gives_vertical_gradient() {
        let img = GrayImage::from_fn(6, 6, |_, y| image::Luma([if y < 3 { 200 } else { 50 }]));
        let grads = sobel_gradients(&img);
        assert!((grads.gy.get_pixel(2, 2).0[0] + 600.0).abs() < 1e-3);
        assert!(grads.gx.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn magnitude_and_direction_per_pixel() {
        let mut grads = Gradients::new(4, 1);
        let samples = [(3.0, 4.0), (-1.0, 0.0), (0.0, -2.0), (0.0, 0.0)];
        for (x, (gx, gy)) in (0u32..).zip(samples) {
            grads.gx.put_pixel(x, 0, image::Luma([gx]));
            grads.gy.put_pixel(x, 0, image::Luma([gy]));
        }
        let polar = magnitude_and_direction(&grads);

        assert!((polar.magnitude.get_pixel(0, 0).0[0] - 5.0).abs() < 1e-6);
        assert!((polar.direction.get_pixel(0, 0).0[0] - 4.0f32.atan2(3.0)).abs() < 1e-6);
        // Negative x axis is +pi, not -pi.
        assert!((polar.direction.get_pixel(1, 0).0[0] - PI).abs() < 1e-6);
        assert!((polar.direction.get_pixel(2, 0).0[0] + PI / 2.0).abs() < 1e-6);
        assert!(polar.magnitude.get_pixel(3, 0).0[0].abs() < f32::EPSILON);
    }

    #[test]
    fn direction_stays_in_range() {
        let img = GrayImage::from_fn(16, 16, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 37 + y * 91) % 256) as u8;
            image::Luma([v])
        });
        let polar = magnitude_and_direction(&sobel_gradients(&img));
        for &d in polar.direction.iter() {
            assert!(d > -PI - 1e-6 && d <= PI + 1e-6, "direction {d} out of range");
        }
        assert!(polar.magnitude.iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn matches_imageproc_sobel_including_borders() {
        let img = GrayImage::from_fn(11, 7, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x * 53 + y * y * 29) % 256) as u8;
            image::Luma([v])
        });
        let grads = sobel_gradients(&img);
        let h = imageproc::gradients::horizontal_sobel(&img);
        let v = imageproc::gradients::vertical_sobel(&img);
        for (x, y, px) in h.enumerate_pixels() {
            let expected_gy = f32::from(v.get_pixel(x, y).0[0]);
            assert_eq!(grads.gx.get_pixel(x, y).0[0], f32::from(px.0[0]), "gx at ({x}, {y})");
            assert_eq!(grads.gy.get_pixel(x, y).0[0], expected_gy, "gy at ({x}, {y})");
        }
    }

    #[test]
    fn empty_and_single_pixel_frames() {
        let empty = sobel_gradients(&GrayImage::new(0, 0));
        assert_eq!(empty.gx.dimensions(), (0, 0));

        let single = sobel_gradients(&GrayImage::from_pixel(1, 1, image::Luma([77])));
        assert_eq!(single.gx.get_pixel(0, 0).0[0], 0.0);
        assert_eq!(single.gy.get_pixel(0, 0).0[0], 0.0);
    }
}
