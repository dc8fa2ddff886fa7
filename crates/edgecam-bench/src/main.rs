//! edgecam-bench: CLI tool for streaming experiments and diagnostics.
//!
//! Decodes a still image and feeds it through the edge pipeline as if it
//! were a live camera stream, printing per-stage diagnostics. Useful for:
//!
//! - Tuning the smoothing kernel size and hysteresis thresholds
//! - Measuring per-stage durations to identify bottlenecks
//! - Exercising live parameter edits (`--sweep`) and bypass toggling
//!   (`--toggle-every`) while frames are flowing
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin edgecam-bench -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use edgecam_pipeline::{
    Clock, FrameDiagnostics, KernelSize, PipelineParameters, PipelineState, RgbaImage,
    SharedState, Stream, StreamSummary,
};

/// Streaming experiments and diagnostics for edgecam.
///
/// Repeats one image as a frame stream through the edge pipeline with
/// configurable parameters and prints per-stage timing and edge counts.
#[derive(Parser)]
#[command(name = "edgecam-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Number of frames to stream.
    #[arg(long, default_value_t = 30, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    frames: usize,

    /// Smoothing kernel size. Zero and even values are bumped to the
    /// next odd size, as from a slider.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_KERNEL_SIZE)]
    kernel_size: u32,

    /// Hysteresis low threshold.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_LOW_THRESHOLD)]
    low_threshold: u32,

    /// Hysteresis high threshold.
    #[arg(long, default_value_t = PipelineParameters::DEFAULT_HIGH_THRESHOLD)]
    high_threshold: u32,

    /// Start with bypass enabled (frames pass through unprocessed).
    #[arg(long)]
    bypass: bool,

    /// Full pipeline state as a JSON string.
    ///
    /// When provided, `--kernel-size`, `--low-threshold`,
    /// `--high-threshold` and `--bypass` are ignored. Missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Walk the kernel size and thresholds from a control thread while
    /// frames are processed.
    #[arg(long)]
    sweep: bool,

    /// Flip bypass after every N presented frames.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    toggle_every: Option<u64>,

    /// Write the last presented frame to a PNG file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Log parameter edits and scratch reallocations.
    #[arg(long)]
    verbose: bool,
}

/// Build the initial [`PipelineState`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineState, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineState {
        parameters: PipelineParameters {
            kernel_size: KernelSize::from_progress(cli.kernel_size),
            low_threshold: cli.low_threshold,
            high_threshold: cli.high_threshold,
        },
        bypass: cli.bypass,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let state = match config_from_cli(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let frame = match edgecam_pipeline::decode_frame(&image_bytes) {
        Ok(frame) => frame,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes, {}x{})",
        cli.image_path.display(),
        image_bytes.len(),
        frame.width(),
        frame.height(),
    );
    eprintln!("State: {state:#?}");
    eprintln!("Frames: {}", cli.frames);
    eprintln!();

    let mut stream = Stream::new(state);
    let control = stream.control();
    let stop = AtomicBool::new(false);

    let mut presented: u64 = 0;
    let mut last_frame: Option<RgbaImage> = None;
    let mut all_diagnostics = Vec::with_capacity(cli.frames);

    let summary = std::thread::scope(|scope| {
        if cli.sweep {
            scope.spawn(|| sweep(&control, &stop));
        }

        let sink = |output: &RgbaImage| {
            presented += 1;
            if cli.output.is_some() {
                match last_frame.as_mut() {
                    Some(last) => last.clone_from(output),
                    None => last_frame = Some(output.clone()),
                }
            }
            if let Some(n) = cli.toggle_every
                && presented % n == 0
            {
                control.toggle_bypass();
            }
        };

        let summary = stream.run_with_diagnostics(
            std::iter::repeat_n(frame, cli.frames),
            sink,
            &StdClock,
            |d| all_diagnostics.push(d.clone()),
        );
        stop.store(true, Ordering::Relaxed);
        summary
    });

    if let Err(code) = print_diagnostics(&cli, &summary, &all_diagnostics) {
        return code;
    }

    if let (Some(path), Some(last)) = (&cli.output, &last_frame) {
        match last.save(path) {
            Ok(()) => eprintln!("Last frame written to {}", path.display()),
            Err(e) => {
                eprintln!("Error writing frame to {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Print the first active frame's diagnostics, then the stream summary.
fn print_diagnostics(
    cli: &Cli,
    summary: &StreamSummary,
    all_diagnostics: &[FrameDiagnostics],
) -> Result<(), ExitCode> {
    let first = all_diagnostics
        .iter()
        .find(|d| !d.bypassed())
        .or_else(|| all_diagnostics.first());

    if cli.json {
        let doc = serde_json::json!({
            "first_frame": first,
            "summary": summary,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return Err(ExitCode::FAILURE);
            }
        }
        return Ok(());
    }

    if let Some(first) = first {
        println!("{}", first.report());
    }
    print_stream_summary(summary, all_diagnostics);
    Ok(())
}

/// Edit the shared state in a loop until `stop` is set, covering the
/// slider ranges of all three parameters.
fn sweep(control: &SharedState, stop: &AtomicBool) {
    let mut step: u32 = 0;
    while !stop.load(Ordering::Relaxed) {
        // Even positions exercise kernel size normalization.
        control.set_kernel_size(step % 16);
        let low = step.wrapping_mul(7) % 200;
        control.update(|s| {
            s.parameters.low_threshold = low;
            s.parameters.high_threshold = low + 50;
        });
        step = step.wrapping_add(1);
        std::thread::sleep(Duration::from_millis(2));
    }
    tracing::debug!(steps = step, "sweep finished");
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&FrameDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across all frames.
#[allow(clippy::cast_precision_loss)]
fn print_stream_summary(summary: &StreamSummary, all_diagnostics: &[FrameDiagnostics]) {
    println!();
    println!(
        "Summary ({} frames, {} bypassed, {} resizes)\n{}",
        summary.frames,
        summary.bypassed_frames,
        summary.resizes,
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| edgecam_pipeline::diagnostics::duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Frame duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means over active frames.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Blur", |d| d.stages.as_ref().map(|s| s.blur.duration)),
        ("Intensity", |d| d.stages.as_ref().map(|s| s.intensity.duration)),
        ("Gradient", |d| d.stages.as_ref().map(|s| s.gradient.duration)),
        ("Edge Detection", |d| {
            d.stages.as_ref().map(|s| s.edge_detection.duration)
        }),
        ("Expand", |d| d.stages.as_ref().map(|s| s.expand.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(edgecam_pipeline::diagnostics::duration_ms)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
