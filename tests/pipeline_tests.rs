// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! End-to-end exports over in-memory frame sources.

mod common;

use vidimu::align::{Frame, VecFrameSource};
use vidimu::core::Resolution;
use vidimu::io::formats::bag::messages::{CompressedImage, Image};
use vidimu::io::formats::bag::{BagCompression, BagReader, ImageEncoding};
use vidimu::io::formats::kalibr::CAMCHAIN_FILE;
use vidimu::io::formats::yaml::YamlFlavor;
use vidimu::io::CamchainFileSink;
use vidimu::io::traits::CalibrationSink;
use vidimu::pipeline::{KALIBR_BAG, RECORDING_BAG};
use vidimu::{CalibrationDescriptor, Pipeline, PipelineConfig, Recording, VidimuError};

fn pipeline(config: PipelineConfig) -> Pipeline {
    Pipeline::new(config).unwrap()
}

#[test]
fn test_export_bag_writes_merged_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(6, 50);
    let path = dir.path().join("rosbag").join(RECORDING_BAG);

    let report = pipeline(PipelineConfig::default())
        .export_bag(&meta, VecFrameSource::new(common::gray_frames(6)), &path)
        .unwrap();

    assert_eq!(report.frames_decoded, 6);
    assert_eq!(report.frames_emitted, 6);
    assert_eq!(report.imu_samples, 50);
    assert!(report.warning.is_none());
    assert_eq!(
        report.output_resolution,
        Some(Resolution::new(common::WIDTH, common::HEIGHT))
    );

    let reader = BagReader::open(&path).unwrap();
    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 56);
    assert!(records.windows(2).all(|w| w[0].time_ns <= w[1].time_ns));

    let cam = reader.connection_by_topic("/cam0/image_raw").unwrap();
    assert_eq!(cam.message_type, "sensor_msgs/CompressedImage");
    let first = records.iter().find(|r| r.conn_id == cam.conn_id).unwrap();
    let image = CompressedImage::deserialize(&first.data).unwrap();
    assert_eq!(image.format, "png");
    assert!(image.data.starts_with(&[0x89, b'P', b'N', b'G']));
    assert_eq!(first.time_ns, meta.video_frames[0].time_ns);
}

#[test]
fn test_export_bag_raw_subsampled_and_resized() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(9, 10);
    let path = dir.path().join("raw.bag");
    let config = PipelineConfig {
        subsample: 3,
        resize: Some(Resolution::new(4, 3)),
        image_encoding: ImageEncoding::Raw,
        bag_compression: BagCompression::Bz2,
        ..Default::default()
    };

    let report = pipeline(config)
        .export_bag(&meta, VecFrameSource::new(common::rgb_frames(9)), &path)
        .unwrap();
    assert_eq!(report.frames_decoded, 9);
    assert_eq!(report.frames_emitted, 3);
    assert_eq!(report.output_resolution, Some(Resolution::new(4, 3)));

    let reader = BagReader::open(&path).unwrap();
    let cam = reader.connection_by_topic("/cam0/image_raw").unwrap();
    assert_eq!(cam.message_type, "sensor_msgs/Image");
    let images: Vec<Image> = reader
        .read_all()
        .unwrap()
        .iter()
        .filter(|r| r.conn_id == cam.conn_id)
        .map(|r| Image::deserialize(&r.data).unwrap())
        .collect();

    assert_eq!(images.len(), 3);
    for (image, index) in images.iter().zip([0, 3, 6]) {
        assert_eq!((image.width, image.height), (4, 3));
        assert_eq!(image.encoding, "mono8");
        assert_eq!(image.header.stamp_ns, meta.video_frames[index].time_ns);
    }
}

#[test]
fn test_export_bag_short_video_reports_warning() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(10, 5);
    let path = dir.path().join("short.bag");

    let report = pipeline(PipelineConfig::default())
        .export_bag(&meta, VecFrameSource::new(common::gray_frames(7)), &path)
        .unwrap();

    assert_eq!(report.frames_emitted, 7);
    let warning = report.warning.unwrap();
    assert_eq!(warning.metadata_frames, 10);
    assert_eq!(warning.paired, 7);
    assert!(path.exists());
}

#[test]
fn test_failed_export_leaves_no_bag() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = common::capture(3, 6);
    data.imu.swap(0, 5);
    let meta = vidimu::metadata::decode(&prost::Message::encode_to_vec(&data)).unwrap();
    let path = dir.path().join("broken.bag");

    let err = pipeline(PipelineConfig::default())
        .export_bag(&meta, VecFrameSource::new(common::gray_frames(3)), &path)
        .unwrap_err();

    assert!(matches!(err, VidimuError::Validation { .. }));
    assert!(!path.exists());
    assert!(!vidimu::io::formats::bag::writer::partial_path_for(&path).exists());
}

#[test]
fn test_export_kalibr_writes_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(4, 20);
    let out = dir.path().join("kalibr");
    let config = PipelineConfig {
        resize: Some(Resolution::new(4, 3)),
        ..Default::default()
    };

    let report = pipeline(config)
        .export_kalibr(
            &meta,
            VecFrameSource::new(common::gray_frames(4)),
            &out,
            None,
            None,
        )
        .unwrap();

    assert!(out.join(KALIBR_BAG).exists());
    for name in ["camchain.yaml", "imu.yaml", "target.yaml", "camchain_4x3.yaml"] {
        assert!(report.files.contains(&out.join(name)), "missing {name}");
        assert!(out.join(name).exists());
    }

    let full = CalibrationDescriptor::load_camchain(out.join(CAMCHAIN_FILE)).unwrap();
    assert_eq!(full.resolution, Resolution::new(common::WIDTH, common::HEIGHT));
    assert_eq!(full.intrinsics, [6.0, 6.5, 4.0, 3.0]);

    let resized = CalibrationDescriptor::load_camchain(out.join("camchain_4x3.yaml")).unwrap();
    assert_eq!(resized.resolution, Resolution::new(4, 3));
    assert_eq!(resized.intrinsics, [3.0, 3.25, 2.0, 1.5]);
}

#[test]
fn test_export_kalibr_with_existing_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(2, 4);
    let existing = dir.path().join("mine.yaml");
    let mut descriptor = CalibrationDescriptor::from_metadata(
        &meta,
        &Default::default(),
        None,
    )
    .unwrap();
    descriptor.intrinsics = [9.0, 9.0, 4.0, 3.0];
    CamchainFileSink::new(&existing, YamlFlavor::Kalibr)
        .write_descriptor(&descriptor)
        .unwrap();

    let out = dir.path().join("kalibr");
    pipeline(PipelineConfig::default())
        .export_kalibr(
            &meta,
            VecFrameSource::new(common::gray_frames(2)),
            &out,
            None,
            Some(&existing),
        )
        .unwrap();

    assert_eq!(
        std::fs::read(out.join(CAMCHAIN_FILE)).unwrap(),
        std::fs::read(&existing).unwrap()
    );
}

const EQUIDISTANT_CAMCHAIN: &str = "cam0:
  camera_model: pinhole
  intrinsics: [461.6, 460.3, 366.2, 249.0]
  distortion_model: equidistant
  distortion_coeffs: [-0.0164, 0.0393, -0.0438, 0.0197]
  resolution: [752, 480]
  rostopic: /cam0/image_raw
";

#[test]
fn test_export_kalibr_copies_any_distortion_model() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(2, 4);
    let existing = dir.path().join("equidistant.yaml");
    std::fs::write(&existing, EQUIDISTANT_CAMCHAIN).unwrap();

    let out = dir.path().join("kalibr");
    let report = pipeline(PipelineConfig::default())
        .export_kalibr(
            &meta,
            VecFrameSource::new(common::gray_frames(2)),
            &out,
            None,
            Some(&existing),
        )
        .unwrap();

    assert!(out.join(KALIBR_BAG).exists());
    assert_eq!(
        std::fs::read_to_string(out.join(CAMCHAIN_FILE)).unwrap(),
        EQUIDISTANT_CAMCHAIN
    );
    assert!(report.files.contains(&out.join("imu.yaml")));
    assert!(report.files.contains(&out.join("target.yaml")));
}

#[test]
fn test_export_kalibr_missing_calibration_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(2, 4);
    let out = dir.path().join("kalibr");

    let err = pipeline(PipelineConfig::default())
        .export_kalibr(
            &meta,
            VecFrameSource::new(common::gray_frames(2)),
            &out,
            None,
            Some(&dir.path().join("missing.yaml")),
        )
        .unwrap_err();

    assert!(matches!(err, VidimuError::Io { .. }));
    assert!(!out.join(KALIBR_BAG).exists());
}

#[test]
fn test_export_kalibr_without_intrinsics_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = common::capture(2, 2);
    data.camera_meta.as_mut().unwrap().intrinsic_params.clear();
    let meta = vidimu::metadata::decode(&prost::Message::encode_to_vec(&data)).unwrap();
    let out = dir.path().join("kalibr");

    let err = pipeline(PipelineConfig::default())
        .export_kalibr(
            &meta,
            VecFrameSource::new(common::gray_frames(2)),
            &out,
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(err, VidimuError::Validation { .. }));
    assert!(!out.join(KALIBR_BAG).exists());
}

#[test]
fn test_export_bag_cross_checks_frame_times() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(5, 10);
    let config = PipelineConfig {
        frame_time_tolerance_ns: Some(100_000),
        ..Default::default()
    };

    // Decoder clock starts at zero; frame 3 is 2 ms late.
    let frames: Vec<Frame> = common::gray_frames(5)
        .into_iter()
        .zip(&meta.video_frames)
        .enumerate()
        .map(|(i, (frame, m))| {
            let late = if i == 3 { 2_000_000 } else { 0 };
            frame.with_pts(m.time_ns - common::T0_NS as u64 + late)
        })
        .collect();

    let report = pipeline(config.clone())
        .export_bag(&meta, VecFrameSource::new(frames), dir.path().join("timed.bag"))
        .unwrap();
    assert_eq!(report.time_mismatches, 1);
    assert_eq!(report.untimed_frames, 0);

    let report = pipeline(config)
        .export_bag(
            &meta,
            VecFrameSource::new(common::gray_frames(5)),
            dir.path().join("untimed.bag"),
        )
        .unwrap();
    assert_eq!(report.time_mismatches, 0);
    assert_eq!(report.untimed_frames, 5);
}

#[test]
fn test_export_images() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("images");
    let config = PipelineConfig {
        subsample: 2,
        resize: Some(Resolution::new(4, 3)),
        ..Default::default()
    };

    let report = pipeline(config)
        .export_images(VecFrameSource::new(common::rgb_frames(5)), &out)
        .unwrap();

    assert_eq!(report.frames_decoded, 5);
    assert_eq!(report.frames_emitted, 3);
    for index in [0, 2, 4] {
        let img = image::open(out.join(format!("{index}.png"))).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }
    assert!(!out.join("1.png").exists());
    assert!(!out.join("3.png").exists());
}

#[test]
fn test_export_lth() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(3, 6);
    let out = dir.path().join("lth");

    let report = pipeline(PipelineConfig::default())
        .export_lth(&meta, &out, None)
        .unwrap();

    assert_eq!(report.files.len(), 3);
    for name in ["video.data", "imu.data", "sync.data"] {
        assert!(out.join(name).exists());
    }
}

#[test]
fn test_export_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let meta = common::metadata(5, 21);

    let stats = pipeline(PipelineConfig::default())
        .export_statistics(&meta, dir.path())
        .unwrap();

    assert_eq!(stats.frame_count, 5);
    assert_eq!(stats.imu_sample_count, 21);
    let rate = stats.imu_rate_hz.unwrap();
    assert!((rate - 200.0).abs() < 1e-6);

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("statistics.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["frame_count"], 5);
    assert!(json["video"]["exposure_time_ns"]["mean"].is_number());
}

#[test]
fn test_recording_open() {
    let dir = tempfile::tempdir().unwrap();
    common::write_recording(dir.path(), &common::capture(3, 9));
    let pipeline = pipeline(PipelineConfig::default());

    let recording = Recording::open(dir.path(), &pipeline).unwrap();
    assert_eq!(recording.metadata().video_frames.len(), 3);
    assert_eq!(recording.video_path(), dir.path().join("video_recording.mp4"));
    assert_eq!(recording.result_dir("kalibr"), dir.path().join("kalibr"));

    let empty = tempfile::tempdir().unwrap();
    let err = Recording::open(empty.path(), &pipeline).unwrap_err();
    assert!(matches!(err, VidimuError::Io { .. }));
}

#[test]
fn test_config_from_toml() {
    let config = PipelineConfig::from_toml_str(
        r#"
subsample = 3
resize = { width = 960, height = 540 }
image_encoding = "raw"
bag_compression = "bz2"

[topics]
camera = "/cam1/image_raw"

[target]
tagSize = 0.03
"#,
    )
    .unwrap();

    assert_eq!(config.subsample, 3);
    assert_eq!(config.resize, Some(Resolution::new(960, 540)));
    assert_eq!(config.image_encoding, ImageEncoding::Raw);
    assert_eq!(config.bag_compression, BagCompression::Bz2);
    assert_eq!(config.topics.camera, "/cam1/image_raw");
    assert_eq!(config.topics.imu, "/imu0");
    assert_eq!(config.target.tag_size, 0.03);
    assert_eq!(config.target.tag_cols, 6);

    let sink = config.bag_sink_options();
    assert_eq!(sink.camera_topic, "/cam1/image_raw");
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = PipelineConfig::from_toml_str("subsample = 0").unwrap_err();
    assert!(matches!(err, VidimuError::Config { .. }));

    let config = PipelineConfig {
        quaternion_tolerance: -1.0,
        ..Default::default()
    };
    assert!(Pipeline::new(config).is_err());
}
