// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Inspect command - show recording metadata and written bags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};

use crate::common::{format_duration, format_timestamp, Result};
use vidimu::io::formats::bag::BagReader;
use vidimu::metadata::{DecodeOptions, DumpFormat, RecordingMetadata};
use vidimu::pipeline::METADATA_FILE;

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    /// Short human-readable summary
    #[default]
    Summary,
    Yaml,
    Json,
}

/// Inspect inputs and outputs.
#[derive(Subcommand, Clone, Debug)]
pub enum InspectCmd {
    /// Show decoded recording metadata
    Meta {
        /// video_meta.pb3, or the folder containing it
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,

        /// Accept a non-zero reserved intrinsic parameter
        #[arg(long)]
        allow_reserved_intrinsic: bool,
    },

    /// List connections and records of a bag
    Bag {
        /// Input bag
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the first N records
        #[arg(short = 'n', long, default_value_t = 0)]
        messages: usize,
    },
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        match self {
            InspectCmd::Meta {
                input,
                format,
                allow_reserved_intrinsic,
            } => cmd_meta(&input, format, allow_reserved_intrinsic),
            InspectCmd::Bag { input, messages } => cmd_bag(&input, messages),
        }
    }
}

fn cmd_meta(input: &Path, format: OutputFormat, allow_reserved_intrinsic: bool) -> Result<()> {
    let path = if input.is_dir() {
        input.join(METADATA_FILE)
    } else {
        input.to_path_buf()
    };
    let options = DecodeOptions {
        require_zero_reserved_intrinsic: !allow_reserved_intrinsic,
    };
    let metadata = RecordingMetadata::from_file_with(&path, &options)?;

    match format {
        OutputFormat::Yaml => print!("{}", metadata.dump(DumpFormat::Yaml)?),
        OutputFormat::Json => println!("{}", metadata.dump(DumpFormat::Json)?),
        OutputFormat::Summary => print_summary(&path, &metadata),
    }
    Ok(())
}

fn print_summary(path: &Path, metadata: &RecordingMetadata) {
    let camera = &metadata.camera;
    println!("=== {} ===", path.display());
    if let Some(start) = metadata.recording_start_ns {
        println!("Started:      {}", format_timestamp(start));
    }
    println!("Resolution:   {}", camera.resolution);
    match &camera.intrinsics {
        Some(k) => println!(
            "Intrinsics:   fx={:.3} fy={:.3} cx={:.3} cy={:.3}",
            k.fx, k.fy, k.cx, k.cy
        ),
        None => println!("Intrinsics:   (none)"),
    }
    println!("Distortion:   {:?}", camera.distortion);
    if let Some(pose) = &camera.lens_pose {
        println!("Lens pose:    q={:?} t={:?}", pose.rotation, pose.translation);
    }
    println!("IMU rate:     {} Hz", metadata.imu_meta.sample_frequency);

    let frames = &metadata.video_frames;
    let span = match (frames.first(), frames.last()) {
        (Some(first), Some(last)) => last.time_ns.saturating_sub(first.time_ns),
        _ => 0,
    };
    println!("Frames:       {} over {}", frames.len(), format_duration(span));
    println!("IMU samples:  {}", metadata.imu_samples.len());

    match metadata.check_ordering() {
        Ok(()) => println!("Ordering:     ok"),
        Err(e) => println!("Ordering:     {e}"),
    }
}

fn cmd_bag(input: &Path, messages: usize) -> Result<()> {
    let reader = BagReader::open(input)?;
    let header = reader.header();
    println!("=== {} ===", input.display());
    println!("Version:      {}", header.version);
    println!("Chunks:       {}", header.chunk_count);
    if !reader.chunk_compressions().is_empty() {
        let mut kinds: Vec<_> = reader.chunk_compressions().to_vec();
        kinds.dedup();
        println!("Compression:  {}", kinds.join(", "));
    }

    let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
    let mut span: Option<(u64, u64)> = None;
    for (i, record) in reader.messages().enumerate() {
        let record = record?;
        *counts.entry(record.conn_id).or_default() += 1;
        span = Some(match span {
            Some((lo, hi)) => (lo.min(record.time_ns), hi.max(record.time_ns)),
            None => (record.time_ns, record.time_ns),
        });
        if i < messages {
            println!(
                "  [{i}] {} t={} ({} bytes)",
                record.topic,
                record.time_ns,
                record.data.len()
            );
        }
    }

    if let Some((start, end)) = span {
        println!("Duration:     {}", format_duration(end - start));
    }
    println!("Connections:");
    for conn in reader.connections().values() {
        println!(
            "  {:<20} {:<28} {} messages",
            conn.topic,
            conn.message_type,
            counts.get(&conn.conn_id).copied().unwrap_or(0)
        );
    }
    Ok(())
}
