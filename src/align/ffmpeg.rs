// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! FFmpeg subprocess frame source.
//!
//! Decodes the video by piping raw frames out of an `ffmpeg` child process
//! (`-f rawvideo`), one fixed-size frame per pull. Frames are passed through
//! without frame-rate conversion so that the n-th frame read is the n-th
//! frame recorded. The child's stderr is drained on a helper thread so a
//! noisy decoder can never stall the frame pipe.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use super::source::{Frame, FrameSource, PixelFormat};
use crate::core::{Resolution, Result, VidimuError, NSECS_IN_SEC};

/// Frame source backed by an `ffmpeg` subprocess.
///
/// The child process is killed and reaped when the source is dropped, so an
/// aborted run never leaves a decoder behind.
pub struct FfmpegFrameSource {
    path: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<Vec<String>>>,
    resolution: Resolution,
    format: PixelFormat,
    frame_times: Option<Vec<u64>>,
    frames_read: u64,
    finished: bool,
}

/// Lines of decoder diagnostics kept for error messages.
const STDERR_TAIL_LINES: usize = 16;
/// Longest diagnostic line kept, in bytes.
const STDERR_LINE_LIMIT: usize = 512;

impl FfmpegFrameSource {
    /// Open a video, probing its resolution with `ffprobe`.
    pub fn open<P: AsRef<Path>>(path: P, format: PixelFormat) -> Result<Self> {
        let resolution = probe_resolution(path.as_ref())?;
        Self::open_with_resolution(path, format, resolution)
    }

    /// Open a video whose decoded resolution is already known.
    pub fn open_with_resolution<P: AsRef<Path>>(
        path: P,
        format: PixelFormat,
        resolution: Resolution,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(VidimuError::io(
                "FfmpegFrameSource::open",
                format!("{} does not exist", path.display()),
            ));
        }
        if resolution.is_empty() {
            return Err(VidimuError::config("resolution", "must be non-zero"));
        }

        let pix_fmt = match format {
            PixelFormat::Gray8 => "gray",
            PixelFormat::Rgb8 => "rgb24",
        };

        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&path)
            .args([
                "-map", "0:v:0", "-vsync", "passthrough", "-f", "rawvideo", "-pix_fmt", pix_fmt,
                "-",
            ]);
        Self::spawn(command, path, format, resolution)
    }

    /// Run `command`, which must write raw `format` frames of `resolution`
    /// to stdout.
    pub(crate) fn spawn(
        mut command: Command,
        path: PathBuf,
        format: PixelFormat,
        resolution: Resolution,
    ) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VidimuError::io(
                    "FfmpegFrameSource::open",
                    format!("Failed to spawn ffmpeg: {e}"),
                )
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take().map(|pipe| {
            std::thread::Builder::new()
                .name("ffmpeg-stderr".to_string())
                .spawn(move || drain_stderr(pipe))
        });
        let (stdout, stderr) = match (stdout, stderr) {
            (Some(stdout), Some(Ok(stderr))) => (stdout, stderr),
            (_, stderr) => {
                let _ = child.kill();
                let _ = child.wait();
                if let Some(Ok(handle)) = stderr {
                    let _ = handle.join();
                }
                return Err(VidimuError::io(
                    "FfmpegFrameSource::open",
                    "ffmpeg output pipes not captured",
                ));
            }
        };

        tracing::debug!(
            path = %path.display(),
            resolution = %resolution,
            ?format,
            "Started ffmpeg frame decoder"
        );

        Ok(Self {
            path,
            child,
            stdout: BufReader::new(stdout),
            stderr: Some(stderr),
            resolution,
            format,
            frame_times: None,
            frames_read: 0,
            finished: false,
        })
    }

    /// Attach presentation timestamps, one per frame in stream order.
    ///
    /// Frames beyond the end of `times` carry no timestamp.
    pub fn with_frame_times(mut self, times: Vec<u64>) -> Self {
        self.frame_times = Some(times);
        self
    }

    /// Check if FFmpeg is available.
    pub fn is_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn frame_len(&self) -> usize {
        self.resolution.area() * self.format.channels()
    }

    /// Fill `buf` completely; returns the number of bytes read before EOF.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(VidimuError::io(
                        "FfmpegFrameSource::next_frame",
                        format!("Failed to read decoded frame: {e}"),
                    ))
                }
            }
        }
        Ok(filled)
    }

    /// Wait for the stderr thread and return the last diagnostic lines.
    fn stderr_tail(&mut self) -> Vec<String> {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    fn finish_stream(&mut self, partial_bytes: usize) -> Result<()> {
        self.finished = true;
        let status = self.child.wait().map_err(|e| {
            VidimuError::io("FfmpegFrameSource", format!("Failed to wait for ffmpeg: {e}"))
        })?;
        let stderr = self.stderr_tail();

        if !status.success() {
            return Err(VidimuError::io(
                "FfmpegFrameSource",
                format!(
                    "ffmpeg failed on {}: {}",
                    self.path.display(),
                    stderr.last().map(String::as_str).unwrap_or("unknown error")
                ),
            ));
        }

        for line in &stderr {
            tracing::debug!(context = "ffmpeg_decode", "{line}");
        }
        if partial_bytes > 0 {
            tracing::warn!(
                context = "ffmpeg_decode",
                bytes = partial_bytes,
                frames = self.frames_read,
                "Discarding truncated trailing frame"
            );
        }
        Ok(())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        let mut pixels = vec![0u8; self.frame_len()];
        let filled = self.read_full(&mut pixels)?;
        if filled < pixels.len() {
            self.finish_stream(filled)?;
            return Ok(None);
        }
        let pts = self
            .frame_times
            .as_ref()
            .and_then(|times| times.get(self.frames_read as usize).copied());
        self.frames_read += 1;
        let frame = Frame::new(
            pixels,
            self.resolution.width,
            self.resolution.height,
            self.format,
        )?;
        Ok(Some(match pts {
            Some(pts) => frame.with_pts(pts),
            None => frame,
        }))
    }

    fn resolution(&self) -> Option<Resolution> {
        Some(self.resolution)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        // The pipe closes with the child, so the drain thread ends too.
        let _ = self.stderr_tail();
    }
}

/// Read stderr to EOF, keeping the last few lines.
fn drain_stderr(pipe: ChildStderr) -> Vec<String> {
    let mut reader = BufReader::new(pipe);
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                line.truncate(STDERR_LINE_LIMIT);
                let text = String::from_utf8_lossy(&line).trim_end().to_string();
                if text.is_empty() {
                    continue;
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(text);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    tail.into()
}

/// Query the first video stream's resolution with `ffprobe`.
pub fn probe_resolution(path: &Path) -> Result<Resolution> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| VidimuError::io("probe_resolution", format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VidimuError::io(
            "probe_resolution",
            format!(
                "ffprobe failed: {}",
                stderr.lines().last().unwrap_or("unknown error")
            ),
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.trim().parse::<Resolution>().map_err(|e| {
        VidimuError::io("probe_resolution", format!("Unexpected ffprobe output: {e}"))
    })
}

/// Presentation times of the first video stream, in stream order.
///
/// Reads packet timestamps with `ffprobe` (no decoding) and sorts them into
/// presentation order, which is the order `-vsync passthrough` emits frames.
pub fn probe_frame_times(path: &Path) -> Result<Vec<u64>> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "packet=pts_time",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| VidimuError::io("probe_frame_times", format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VidimuError::io(
            "probe_frame_times",
            format!(
                "ffprobe failed: {}",
                stderr.lines().last().unwrap_or("unknown error")
            ),
        ));
    }

    let times = parse_frame_times(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!(path = %path.display(), frames = times.len(), "Probed frame times");
    Ok(times)
}

/// Parse `pts_time` lines (seconds) into sorted nanoseconds.
///
/// Packets without a timestamp (`N/A`) and negative times are skipped.
fn parse_frame_times(text: &str) -> Vec<u64> {
    let mut times: Vec<u64> = text
        .lines()
        .filter_map(|line| line.trim().trim_end_matches(',').parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * NSECS_IN_SEC as f64).round() as u64)
        .collect();
    times.sort_unstable();
    times
}
