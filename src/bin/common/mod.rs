// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for CLI commands.

use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing_subscriber::EnvFilter;

use vidimu::align::{Frame, FrameSource};
use vidimu::core::Resolution;
use vidimu::pipeline::{Pipeline, PipelineConfig};
use vidimu::ExportReport;

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
}

/// Frame selection flags; they override the configuration file.
#[derive(Args, Clone, Debug, Default)]
pub struct FrameArgs {
    /// Take every n-th video frame
    #[arg(long, value_name = "N")]
    pub subsample: Option<u32>,

    /// Resize frames, e.g. 960x540
    #[arg(long, value_name = "WxH")]
    pub resize: Option<Resolution>,
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`, `debug` with
/// `--verbose`).
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second call only happens in tests; keep the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Build the pipeline from `--config` plus command-line overrides.
pub fn pipeline(
    global: &GlobalOpts,
    frames: &FrameArgs,
    customize: impl FnOnce(&mut PipelineConfig),
) -> Result<Pipeline> {
    let mut config = match &global.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(subsample) = frames.subsample {
        config.subsample = subsample;
    }
    if let Some(resize) = frames.resize {
        config.resize = Some(resize);
    }
    customize(&mut config);
    Ok(Pipeline::new(config)?)
}

/// `--result-dir`, or `<data_dir>/<name>`.
pub fn result_dir(explicit: Option<PathBuf>, data_dir: &Path, name: &str) -> PathBuf {
    explicit.unwrap_or_else(|| data_dir.join(name))
}

/// Format a duration in nanoseconds to human-readable string.
pub fn format_duration(nanos: u64) -> String {
    let secs = nanos / 1_000_000_000;
    let millis = (nanos % 1_000_000_000) / 1_000_000;

    if secs >= 3600 {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        format!("{}h {}m", hours, minutes)
    } else if secs >= 60 {
        let minutes = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}m {}s", minutes, remaining_secs)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

/// Format a timestamp in nanoseconds since the epoch.
pub fn format_timestamp(nanos: i64) -> String {
    let datetime = chrono::DateTime::<chrono::Utc>::from_timestamp(
        nanos.div_euclid(1_000_000_000),
        nanos.rem_euclid(1_000_000_000) as u32,
    );

    match datetime {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        None => format!("{} ns", nanos),
    }
}

/// Progress bar wrapper for consistent progress reporting.
pub struct ProgressBar {
    inner: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a new progress bar; hidden when stderr is not a terminal.
    pub fn new(total: u64, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let inner = if std::io::stderr().is_terminal() {
            let pb = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
                "{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.set_prefix(prefix);
            Some(pb)
        } else {
            None
        };

        Self { inner }
    }

    pub fn inc(&self) {
        if let Some(pb) = &self.inner {
            pb.inc(1);
        }
    }

    /// Finish the progress bar with a message.
    pub fn finish_with_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.finish_with_message(msg);
        }
    }
}

/// Frame source that advances a progress bar for every frame pulled.
pub struct ProgressSource<S> {
    inner: S,
    progress: ProgressBar,
}

impl<S: FrameSource> ProgressSource<S> {
    pub fn new(inner: S, total: usize, prefix: &str) -> Self {
        Self {
            inner,
            progress: ProgressBar::new(total as u64, prefix),
        }
    }
}

impl<S: FrameSource> FrameSource for ProgressSource<S> {
    fn next_frame(&mut self) -> vidimu::Result<Option<Frame>> {
        let frame = self.inner.next_frame()?;
        if frame.is_some() {
            self.progress.inc();
        }
        Ok(frame)
    }

    fn skip_frame(&mut self) -> vidimu::Result<bool> {
        let skipped = self.inner.skip_frame()?;
        if skipped {
            self.progress.inc();
        }
        Ok(skipped)
    }

    fn resolution(&self) -> Option<Resolution> {
        self.inner.resolution()
    }
}

impl<S> Drop for ProgressSource<S> {
    fn drop(&mut self) {
        self.progress.finish_with_message("done".to_string());
    }
}

/// Print the outcome of an export.
pub fn print_report(output: &Path, report: &ExportReport) {
    println!("Wrote {}", output.display());
    if report.frames_decoded > 0 || report.frames_emitted > 0 {
        println!(
            "  Frames:      {} emitted / {} decoded",
            report.frames_emitted, report.frames_decoded
        );
    }
    if report.imu_samples > 0 {
        println!("  IMU samples: {}", report.imu_samples);
    }
    if let Some(resolution) = report.output_resolution {
        println!("  Resolution:  {resolution}");
    }
    if report.time_mismatches > 0 {
        println!("  Timestamp mismatches: {}", report.time_mismatches);
    }
    if report.untimed_frames > 0 {
        println!("  Frames without timestamps: {}", report.untimed_frames);
    }
    for file in &report.files {
        println!("  + {}", file.display());
    }
    if let Some(warning) = &report.warning {
        println!("  Warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500_000_000), "500ms");
        assert_eq!(format_duration(1_500_000_000), "1.500s");
        assert_eq!(format_duration(90_000_000_000), "1m 30s");
        assert_eq!(format_duration(3_600_000_000_000), "1h 0m");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00.000 UTC");
        assert_eq!(
            format_timestamp(1_600_000_000_250_000_000),
            "2020-09-13 12:26:40.250 UTC"
        );
    }

    #[test]
    fn test_result_dir_default() {
        let dir = result_dir(None, Path::new("/data/session"), "kalibr");
        assert_eq!(dir, PathBuf::from("/data/session/kalibr"));
        let dir = result_dir(Some(PathBuf::from("/out")), Path::new("/data"), "kalibr");
        assert_eq!(dir, PathBuf::from("/out"));
    }
}
