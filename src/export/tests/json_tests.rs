//! End-to-end tests for the custom JSON export path.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use crate::export::{ExportEngine, ExportFormat, ProjectSnapshot};
use crate::model::{BoundingBox, ClassRegistry, Fingerprint};
use crate::store::AnnotationStore;

fn create_snapshot() -> ProjectSnapshot {
    let mut store = AnnotationStore::new();
    let frame = store.register_image("/frames/frame_0001.png", 1920, 1080, Fingerprint::new(1, 1));
    store.register_image("/frames/frame_0002.png", 1280, 720, Fingerprint::new(2, 2));
    store
        .add_manual(frame, 1, BoundingBox::new(100.5, 200.25, 300.5, 400.25))
        .unwrap();
    store
        .add_proposed(frame, 2, BoundingBox::new(10.0, 20.0, 110.0, 220.0), 0.875)
        .unwrap();
    ProjectSnapshot::capture(&store, &ClassRegistry::default_vehicle_classes())
}

fn export_and_read(dir: &Path, snapshot: &ProjectSnapshot, file: &str) -> serde_json::Value {
    ExportEngine::new()
        .export(
            snapshot,
            ExportFormat::CustomJson,
            dir,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();
    let raw = fs::read_to_string(dir.join("json").join(file)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_json_writes_one_document_per_image() {
    let dir = tempfile::tempdir().unwrap();
    let report = ExportEngine::new()
        .export(
            &create_snapshot(),
            ExportFormat::CustomJson,
            dir.path(),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.files_created.len(), 2);
    assert!(dir.path().join("json/frame_0001.json").exists());
    assert!(dir.path().join("json/frame_0002.json").exists());
}

#[test]
fn test_json_document_fields() {
    let dir = tempfile::tempdir().unwrap();
    let doc = export_and_read(dir.path(), &create_snapshot(), "frame_0001.json");

    assert_eq!(doc["image"]["filename"], "frame_0001.png");
    assert_eq!(doc["image"]["width"], 1920);
    assert_eq!(doc["image"]["height"], 1080);

    let annotations = doc["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 2);

    let manual = &annotations[0];
    assert_eq!(manual["class_id"], 1);
    assert_eq!(manual["class_name"], "car");
    assert_eq!(manual["origin"], "manual");
    assert!(manual.get("confidence").is_none());
    assert_eq!(manual["bbox"]["x_min"].as_f64().unwrap(), 100.5);
    assert_eq!(manual["bbox"]["y_max"].as_f64().unwrap(), 400.25);
}

#[test]
fn test_json_proposals_carry_origin_and_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let doc = export_and_read(dir.path(), &create_snapshot(), "frame_0001.json");

    let proposal = &doc["annotations"][1];
    assert_eq!(proposal["origin"], "proposed");
    assert_eq!(proposal["confidence"].as_f64().unwrap(), 0.875);
    assert_eq!(proposal["class_name"], "truck");
}

#[test]
fn test_json_unannotated_image_has_empty_array() {
    let dir = tempfile::tempdir().unwrap();
    let doc = export_and_read(dir.path(), &create_snapshot(), "frame_0002.json");

    assert_eq!(doc["image"]["filename"], "frame_0002.png");
    assert!(doc["annotations"].as_array().unwrap().is_empty());
}

#[test]
fn test_json_rounds_coordinates_to_twelve_decimals() {
    let mut store = AnnotationStore::new();
    let frame = store.register_image("/frames/frame_0001.png", 1000, 500, Fingerprint::new(1, 1));
    store
        .add_manual(
            frame,
            0,
            BoundingBox::new(10.123_456_789_012_345_6, 0.0, 110.0, 220.0),
        )
        .unwrap();
    let snapshot = ProjectSnapshot::capture(&store, &ClassRegistry::default_vehicle_classes());

    let dir = tempfile::tempdir().unwrap();
    let doc = export_and_read(dir.path(), &snapshot, "frame_0001.json");
    let x_min = doc["annotations"][0]["bbox"]["x_min"].as_f64().unwrap();
    assert_eq!(x_min, 10.123_456_789_012);
}
