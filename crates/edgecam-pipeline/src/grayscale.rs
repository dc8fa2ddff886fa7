//! Color-to-intensity conversion.
//!
//! Reduces an RGBA frame to single-channel luma using the BT.601
//! weights `0.299*R + 0.587*G + 0.114*B`, evaluated in 14-bit fixed
//! point with round-to-nearest. Alpha is ignored. The weights sum to
//! exactly 1.0, so a gray pixel `(v, v, v, _)` maps to `v`.

use crate::types::{GrayImage, RgbaImage};

const SHIFT: u32 = 14;
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const _: () = assert!(R_WEIGHT + G_WEIGHT + B_WEIGHT == 1 << SHIFT);

/// Luma of one RGB triple.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT;
    ((sum + (1 << (SHIFT - 1))) >> SHIFT) as u8
}

/// Convert a color frame to an intensity frame of the same dimensions.
#[must_use = "returns the intensity frame"]
pub fn to_intensity(image: &RgbaImage) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    to_intensity_into(image, &mut out);
    out
}

/// Convert `image` into the preallocated `out` of the same dimensions.
pub(crate) fn to_intensity_into(image: &RgbaImage, out: &mut GrayImage) {
    debug_assert_eq!(image.dimensions(), out.dimensions());
    for (dst, px) in out.iter_mut().zip(image.pixels()) {
        let [r, g, b, _] = px.0;
        *dst = luma(r, g, b);
    }
}
