//! Shared types for the edgecam frame pipeline.

use std::fmt;

use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intensity frames and edge masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can hand color frames
/// to the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Single-channel 32-bit float frame (gradients, magnitude, direction).
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an RGBA frame.
    #[must_use]
    pub fn of(frame: &RgbaImage) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Side length of the square smoothing kernel. Always odd and at least 1.
///
/// Slider positions arrive as raw integers; [`KernelSize::from_progress`]
/// bumps zero and even values up by one so every stored size is valid.
/// [`KernelSize::new`] is the strict constructor for callers that want
/// bad input reported rather than corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct KernelSize(u32);

impl KernelSize {
    /// Normalize a raw control position to the nearest odd size `>= 1`.
    ///
    /// Odd values pass through. Zero and even values are incremented.
    #[must_use]
    pub const fn from_progress(progress: u32) -> Self {
        if progress % 2 == 0 {
            // u32::MAX is odd, so an even value never overflows here.
            Self(progress + 1)
        } else {
            Self(progress)
        }
    }

    /// Create a kernel size, rejecting zero and even values.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] if `size` is zero or even.
    pub fn new(size: u32) -> Result<Self, PipelineError> {
        if size == 0 || size % 2 == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "kernel_size",
                reason: format!("must be odd and at least 1, got {size}"),
            });
        }
        Ok(Self(size))
    }

    /// The side length in pixels.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Number of taps on each side of the center tap.
    #[must_use]
    pub const fn radius(self) -> u32 {
        self.0 / 2
    }

    /// Gaussian standard deviation derived from the kernel size.
    ///
    /// Uses the conventional automatic rule
    /// `0.3 * ((k - 1) / 2 - 1) + 0.8`, so `k = 1` gives 0.5 and `k = 5`
    /// gives 1.1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sigma(self) -> f32 {
        let radius = self.radius() as f32;
        0.3f32.mul_add(radius - 1.0, 0.8)
    }
}

impl Default for KernelSize {
    fn default() -> Self {
        Self(PipelineParameters::DEFAULT_KERNEL_SIZE)
    }
}

impl From<u32> for KernelSize {
    fn from(progress: u32) -> Self {
        Self::from_progress(progress)
    }
}

impl From<KernelSize> for u32 {
    fn from(size: KernelSize) -> Self {
        size.0
    }
}

impl fmt::Display for KernelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}x{0}", self.0)
    }
}

/// Tunable parameters for the per-frame pipeline.
///
/// # Threshold ordering
///
/// `low_threshold` and `high_threshold` are set independently and are
/// never reordered. `low > high` is allowed and yields a sparse mask
/// made of the strong pixels only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParameters {
    /// Side length of the smoothing kernel.
    pub kernel_size: KernelSize,

    /// Hysteresis low threshold. Pixels at or above it are edges only
    /// when connected to a strong edge.
    pub low_threshold: u32,

    /// Hysteresis high threshold. Pixels at or above it are strong edges.
    pub high_threshold: u32,
}

impl PipelineParameters {
    /// Default smoothing kernel side length.
    pub const DEFAULT_KERNEL_SIZE: u32 = 5;

    /// Default hysteresis low threshold.
    pub const DEFAULT_LOW_THRESHOLD: u32 = 80;

    /// Default hysteresis high threshold.
    pub const DEFAULT_HIGH_THRESHOLD: u32 = 100;

    /// Set the kernel size from a raw control position.
    pub const fn set_kernel_size(&mut self, progress: u32) {
        self.kernel_size = KernelSize::from_progress(progress);
    }

    /// Set the low threshold from a raw control position.
    pub const fn set_low_threshold(&mut self, progress: u32) {
        self.low_threshold = progress;
    }

    /// Set the high threshold from a raw control position.
    pub const fn set_high_threshold(&mut self, progress: u32) {
        self.high_threshold = progress;
    }
}

const _: () = assert!(PipelineParameters::DEFAULT_KERNEL_SIZE % 2 == 1);

impl Default for PipelineParameters {
    fn default() -> Self {
        Self {
            kernel_size: KernelSize::default(),
            low_threshold: Self::DEFAULT_LOW_THRESHOLD,
            high_threshold: Self::DEFAULT_HIGH_THRESHOLD,
        }
    }
}

/// Errors reported by the pipeline.
///
/// Per-frame processing itself is total; these only come from strict
/// constructors and from decoding frames out of encoded bytes.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A parameter was outside its valid domain.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What was wrong with the value.
        reason: String,
    },

    /// The encoded frame bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode an encoded frame.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Decode encoded image bytes (PNG, JPEG, BMP, WebP) into a color frame.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_frame(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}
