//! Custom per-image JSON export.
//!
//! The only format that carries the full annotation record: review origin
//! and detector confidence included. One `{stem}.json` per image, absolute
//! pixel coordinates rounded to 12 decimal places.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::export::round12;
use crate::export::snapshot::{ProjectSnapshot, SnapshotImage};
use crate::model::AnnotationOrigin;

#[derive(Debug, Serialize)]
struct JsonDocument<'a> {
    image: JsonImage<'a>,
    annotations: Vec<JsonAnnotation<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonImage<'a> {
    filename: &'a str,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct JsonAnnotation<'a> {
    id: u64,
    class_id: u32,
    class_name: &'a str,
    bbox: JsonBox,
    origin: AnnotationOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
struct JsonBox {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

/// Path of the JSON file for one image.
pub(super) fn artifact_path(dir: &Path, image: &SnapshotImage) -> PathBuf {
    dir.join(format!("{}.json", image.record.stem()))
}

/// Write one image's JSON document. Unannotated images produce a document
/// with an empty annotation array.
pub(super) fn write_image(
    dir: &Path,
    image: &SnapshotImage,
    snapshot: &ProjectSnapshot,
) -> Result<(PathBuf, usize, usize)> {
    let path = artifact_path(dir, image);
    let document = JsonDocument {
        image: JsonImage {
            filename: image.record.filename(),
            width: image.record.width,
            height: image.record.height,
        },
        annotations: image
            .annotations
            .iter()
            .map(|ann| JsonAnnotation {
                id: ann.id,
                class_id: ann.class_id,
                class_name: snapshot.class_name(ann.class_id),
                bbox: JsonBox {
                    x_min: round12(ann.bbox.x_min),
                    y_min: round12(ann.bbox.y_min),
                    x_max: round12(ann.bbox.x_max),
                    y_max: round12(ann.bbox.y_max),
                },
                origin: ann.origin,
                confidence: ann.confidence,
            })
            .collect(),
    };
    let written = document.annotations.len();
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(&path, json).map_err(|e| EngineError::export_io(&path, e))?;
    Ok((path, written, 0))
}
