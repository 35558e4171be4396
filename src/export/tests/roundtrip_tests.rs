//! Cross-format engine behavior: directory layout, progress, cancellation,
//! partial failure, and the YOLO text round-trip guarantee.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::EngineError;
use crate::export::{
    ExportEngine, ExportFormat, ExportProgress, ProjectSnapshot, YoloLabel, parse_label_line,
};
use crate::model::{BoundingBox, ClassRegistry, Fingerprint};
use crate::store::AnnotationStore;

/// Snapshot with three annotated frames.
fn create_snapshot() -> ProjectSnapshot {
    let mut store = AnnotationStore::new();
    for i in 1..=3u64 {
        let id = store.register_image(
            format!("/frames/frame_{i:04}.png"),
            1920,
            1080,
            Fingerprint::new(i, i),
        );
        store
            .add_manual(id, 1, BoundingBox::new(10.0, 10.0, 100.0, 100.0))
            .unwrap();
    }
    ProjectSnapshot::capture(&store, &ClassRegistry::default_vehicle_classes())
}

#[test]
fn test_every_format_creates_its_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = create_snapshot();
    for format in ExportFormat::ALL {
        let report = ExportEngine::new()
            .export(&snapshot, format, dir.path(), &AtomicBool::new(false), |_| {})
            .unwrap();
        assert!(report.is_complete(), "{} export incomplete", format.name());
        assert!(dir.path().join(format.subdir()).is_dir());
    }
    // The four formats never share a directory.
    for d in ["yolo", "coco", "voc", "json"] {
        assert!(dir.path().join(d).is_dir());
    }
}

#[test]
fn test_progress_fires_once_per_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut seen: Vec<ExportProgress> = Vec::new();
    ExportEngine::new()
        .export(
            &create_snapshot(),
            ExportFormat::CustomJson,
            dir.path(),
            &AtomicBool::new(false),
            |p| seen.push(p),
        )
        .unwrap();

    assert_eq!(seen.len(), 3);
    for (i, progress) in seen.iter().enumerate() {
        assert_eq!(progress.completed, i + 1);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.image_id, (i + 1) as u64);
    }
}

#[test]
fn test_cancel_between_images() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = AtomicBool::new(false);
    let report = ExportEngine::new()
        .export(
            &create_snapshot(),
            ExportFormat::CustomJson,
            dir.path(),
            &cancel,
            |progress| {
                if progress.completed == 1 {
                    cancel.store(true, Ordering::SeqCst);
                }
            },
        )
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.images_exported, 1);
    assert!(dir.path().join("json/frame_0001.json").exists());
    assert!(!dir.path().join("json/frame_0002.json").exists());
}

#[test]
fn test_unwritable_artifact_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // Occupy the first artifact path with a directory so the write fails.
    fs::create_dir_all(dir.path().join("json/frame_0001.json")).unwrap();

    let report = ExportEngine::new()
        .export(
            &create_snapshot(),
            ExportFormat::CustomJson,
            dir.path(),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].image_id, Some(1));
    // The rest of the batch still ran.
    assert_eq!(report.images_exported, 2);
    assert!(dir.path().join("json/frame_0002.json").exists());
    assert!(dir.path().join("json/frame_0003.json").exists());
}

#[test]
fn test_unprovisionable_destination_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("blocked");
    fs::write(&blocked, "not a directory").unwrap();

    let result = ExportEngine::new().export(
        &create_snapshot(),
        ExportFormat::Yolo,
        &blocked,
        &AtomicBool::new(false),
        |_| {},
    );
    assert!(matches!(result, Err(EngineError::ExportIo { .. })));
}

#[test]
fn test_yolo_text_round_trip_is_exact() {
    // Parsing a written line and re-writing it reproduces the bytes, so
    // labels survive external tooling that rewrites files line by line.
    let boxes = [
        BoundingBox::new(10.0, 20.0, 110.0, 220.0),
        BoundingBox::new(0.0, 0.0, 1000.0, 500.0),
        BoundingBox::new(10.123_456_789_012, 20.0, 110.5, 220.999_999_999_999),
        BoundingBox::new(333.333, 111.111, 666.667, 444.444),
    ];
    for (i, bbox) in boxes.iter().enumerate() {
        let line = YoloLabel::from_bbox(i, bbox, 1000, 500).to_line();
        let reparsed = parse_label_line(&line).unwrap().to_line();
        assert_eq!(line, reparsed);
    }
}
