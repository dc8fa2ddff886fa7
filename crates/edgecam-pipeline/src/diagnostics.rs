//! Per-frame diagnostics: timing and counts for each stage.
//!
//! Collected by
//! [`PipelineController::process_with_diagnostics`](crate::PipelineController::process_with_diagnostics)
//! alongside the normal frame output. The plain
//! [`process`](crate::PipelineController::process) path skips all of it.
//!
//! Time is read through the [`Clock`] trait so the library never touches
//! a platform timer itself; callers plug in `std::time::Instant` or
//! whatever their target provides.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, FloatImage, PipelineParameters};

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Clock that never advances. Used when timing is not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) -> Self::Instant {}

    fn elapsed(&self, _since: &Self::Instant) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// Frame dimensions.
    pub dimensions: Dimensions,
    /// Parameter snapshot the frame was processed with.
    pub parameters: PipelineParameters,
    /// Per-stage breakdown, `None` when the frame was bypassed.
    pub stages: Option<StageBreakdown>,
    /// Wall-clock duration of the whole frame (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for every stage of an active frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBreakdown {
    /// Gaussian smoothing.
    pub blur: StageDiagnostics,
    /// Luma conversion.
    pub intensity: StageDiagnostics,
    /// Sobel gradients plus magnitude and direction.
    pub gradient: StageDiagnostics,
    /// Canny edge decision.
    pub edge_detection: StageDiagnostics,
    /// Mask to RGBA expansion.
    pub expand: StageDiagnostics,
}

impl StageBreakdown {
    /// Stages in pipeline order with display names.
    #[must_use]
    pub fn named(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Blur", &self.blur),
            ("Intensity", &self.intensity),
            ("Gradient", &self.gradient),
            ("Edge Detection", &self.edge_detection),
            ("Expand", &self.expand),
        ]
    }
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Gaussian smoothing metrics.
    Blur {
        /// Kernel side length after normalization.
        kernel_size: u32,
        /// Sigma derived from the kernel size.
        sigma: f32,
        /// Taps actually applied per axis.
        taps: usize,
    },
    /// Luma conversion metrics.
    Intensity {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
    },
    /// Gradient field metrics.
    Gradient {
        /// Largest gradient magnitude in the frame.
        max_magnitude: f32,
        /// Mean gradient magnitude over the frame.
        mean_magnitude: f64,
    },
    /// Edge decision metrics.
    EdgeDetection {
        /// Low threshold as applied.
        low_threshold: u32,
        /// High threshold as applied.
        high_threshold: u32,
        /// Number of edge pixels (value == 255) in the mask.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Mask expansion metrics.
    Expand {
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
    },
}

impl FrameDiagnostics {
    /// Whether the frame passed through untouched.
    #[must_use]
    pub const fn bypassed(&self) -> bool {
        self.stages.is_none()
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Frame Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {} ({} pixels)",
            self.dimensions,
            self.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Parameters: kernel={} low={} high={}",
            self.parameters.kernel_size,
            self.parameters.low_threshold,
            self.parameters.high_threshold,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        let Some(stages) = &self.stages else {
            lines.push("Bypassed: frame returned unchanged".to_string());
            return lines.join("\n");
        };

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in stages.named() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Blur {
            kernel_size,
            sigma,
            taps,
        } => format!("k={kernel_size} sigma={sigma:.2} taps={taps}"),
        StageMetrics::Intensity { width, height } | StageMetrics::Expand { width, height } => {
            format!("{width}x{height}")
        }
        StageMetrics::Gradient {
            max_magnitude,
            mean_magnitude,
        } => format!("max={max_magnitude:.1} mean={mean_magnitude:.2}"),
        StageMetrics::EdgeDetection {
            low_threshold,
            high_threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!(
                "low={low_threshold} high={high_threshold} edges={edge_pixel_count} ({density:.1}%)",
            )
        }
    }
}

/// Max and mean of a magnitude field. Both are zero for an empty field.
pub(crate) fn magnitude_stats(magnitude: &FloatImage) -> (f32, f64) {
    let max = magnitude.iter().copied().fold(0.0f32, f32::max);
    let sum: f64 = magnitude.iter().map(|&m| f64::from(m)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = if magnitude.is_empty() {
        0.0
    } else {
        sum / magnitude.len() as f64
    };
    (max, mean)
}
