//! Export engine: project snapshot in, dataset artifacts out.
//!
//! Each [`ExportFormat`] variant has exactly one writer; there is no plugin
//! surface. Every format writes under its own subdirectory of the
//! destination, which is created when missing. Batches report progress per
//! image, honor a cancel flag between images (never mid-image), and collect
//! per-image failures into the report instead of aborting the rest.

mod coco;
mod json;
mod pascal_voc;
pub mod snapshot;
pub mod yolo;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::ImageId;

pub use snapshot::{ProjectSnapshot, SnapshotImage};
pub use yolo::{YoloLabel, parse_label_line};

/// Round a coordinate to the 12 decimal places the export formats guarantee.
///
/// Numeric rounding, not string truncation; YOLO additionally pins its text
/// output to exactly 12 fractional digits.
pub fn round12(value: f64) -> f64 {
    (value * 1e12).round() / 1e12
}

/// The closed set of supported dataset formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Per-image TXT labels with normalized coordinates, plus `classes.txt`.
    Yolo,
    /// Single `annotations.json` dataset, absolute pixels.
    Coco,
    /// Per-image XML, absolute pixels.
    PascalVoc,
    /// Per-image JSON carrying origin and confidence, absolute pixels.
    CustomJson,
}

impl ExportFormat {
    /// Every supported format, in display order.
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Yolo,
        ExportFormat::Coco,
        ExportFormat::PascalVoc,
        ExportFormat::CustomJson,
    ];

    /// Subdirectory under the export destination.
    pub fn subdir(&self) -> &'static str {
        match self {
            ExportFormat::Yolo => "yolo",
            ExportFormat::Coco => "coco",
            ExportFormat::PascalVoc => "voc",
            ExportFormat::CustomJson => "json",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Yolo => "YOLO",
            ExportFormat::Coco => "COCO",
            ExportFormat::PascalVoc => "Pascal VOC",
            ExportFormat::CustomJson => "Custom JSON",
        }
    }
}

/// Progress notification after each completed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportProgress {
    /// Images handled so far, including failed ones.
    pub completed: usize,
    /// Images in the batch.
    pub total: usize,
    /// The image just handled.
    pub image_id: ImageId,
}

/// One artifact that could not be written.
#[derive(Debug, Clone)]
pub struct ExportFailure {
    /// The image concerned, or `None` for batch-level artifacts such as
    /// `classes.txt` or the COCO dataset file.
    pub image_id: Option<ImageId>,
    /// The artifact path that failed.
    pub path: PathBuf,
    /// User-facing failure description.
    pub message: String,
}

/// Outcome of one export batch.
#[derive(Debug)]
pub struct ExportReport {
    /// The format exported.
    pub format: ExportFormat,
    /// Images in the snapshot.
    pub images_total: usize,
    /// Images whose artifact was written (or, for COCO, included).
    pub images_exported: usize,
    /// Annotations serialized.
    pub annotations_exported: usize,
    /// Annotations dropped for an unregistered class id.
    pub skipped_annotations: usize,
    /// Every file written.
    pub files_created: Vec<PathBuf>,
    /// Artifacts that failed; the batch continued past each.
    pub failures: Vec<ExportFailure>,
    /// Whether the batch stopped early on the cancel flag.
    pub cancelled: bool,
}

impl ExportReport {
    fn new(format: ExportFormat, images_total: usize) -> Self {
        Self {
            format,
            images_total,
            images_exported: 0,
            annotations_exported: 0,
            skipped_annotations: 0,
            files_created: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    /// Whether every image was exported with nothing skipped or failed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.images_exported == self.images_total
    }

    fn complete_image(&mut self, path: PathBuf, written: usize, skipped: usize) {
        self.images_exported += 1;
        self.annotations_exported += written;
        self.skipped_annotations += skipped;
        self.files_created.push(path);
    }

    fn fail_image(&mut self, image_id: Option<ImageId>, path: PathBuf, error: &EngineError) {
        log::warn!("📦 Export failed for {:?}: {}", path, error);
        self.failures.push(ExportFailure {
            image_id,
            path,
            message: error.to_string(),
        });
    }
}

/// Writes project snapshots out as dataset files.
///
/// Stateless; every call is independent. Runs off the editing thread against
/// an immutable [`ProjectSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportEngine;

impl ExportEngine {
    pub fn new() -> Self {
        Self
    }

    /// Export `snapshot` in `format` under `destination/<format subdir>/`.
    ///
    /// The subdirectory is provisioned when missing; only a destination that
    /// cannot be created fails the call. Everything after that — unwritable
    /// artifacts included — is collected into the returned report.
    /// `progress` fires after each image; `cancel` is honored between
    /// images, and a cancelled COCO export still writes the dataset built so
    /// far.
    pub fn export(
        &self,
        snapshot: &ProjectSnapshot,
        format: ExportFormat,
        destination: &Path,
        cancel: &AtomicBool,
        mut progress: impl FnMut(ExportProgress),
    ) -> Result<ExportReport> {
        let dir = destination.join(format.subdir());
        fs::create_dir_all(&dir).map_err(|e| EngineError::export_io(&dir, e))?;
        log::info!(
            "📦 Exporting {} annotation(s) across {} image(s) as {} to {:?}",
            snapshot.total_annotations(),
            snapshot.images.len(),
            format.name(),
            dir
        );

        let mut report = ExportReport::new(format, snapshot.images.len());
        match format {
            ExportFormat::Yolo => export_yolo(snapshot, &dir, cancel, &mut progress, &mut report),
            ExportFormat::Coco => export_coco(snapshot, &dir, cancel, &mut progress, &mut report),
            ExportFormat::PascalVoc => export_per_image(
                snapshot,
                &dir,
                cancel,
                &mut progress,
                &mut report,
                pascal_voc::artifact_path,
                pascal_voc::write_image,
            ),
            ExportFormat::CustomJson => export_per_image(
                snapshot,
                &dir,
                cancel,
                &mut progress,
                &mut report,
                json::artifact_path,
                json::write_image,
            ),
        }

        log::info!(
            "📦 Export finished: {}/{} image(s), {} annotation(s), {} failure(s){}",
            report.images_exported,
            report.images_total,
            report.annotations_exported,
            report.failures.len(),
            if report.cancelled { ", cancelled" } else { "" }
        );
        Ok(report)
    }
}

/// Check the cancel flag between images, flagging the report once.
fn cancel_requested(cancel: &AtomicBool, report: &mut ExportReport) -> bool {
    if cancel.load(Ordering::SeqCst) {
        if !report.cancelled {
            log::info!(
                "📦 Export cancelled after {} image(s)",
                report.images_exported
            );
            report.cancelled = true;
        }
        true
    } else {
        false
    }
}

fn export_yolo(
    snapshot: &ProjectSnapshot,
    dir: &Path,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(ExportProgress),
    report: &mut ExportReport,
) {
    match yolo::write_classes(dir, snapshot) {
        Ok(path) => report.files_created.push(path),
        Err(e) => report.fail_image(None, dir.join("classes.txt"), &e),
    }
    let class_index = snapshot.class_index();
    let total = snapshot.images.len();
    for (index, image) in snapshot.images.iter().enumerate() {
        if cancel_requested(cancel, report) {
            break;
        }
        match yolo::write_image(dir, image, &class_index) {
            Ok((path, written, skipped)) => report.complete_image(path, written, skipped),
            Err(e) => report.fail_image(Some(image.record.id), yolo::artifact_path(dir, image), &e),
        }
        progress(ExportProgress {
            completed: index + 1,
            total,
            image_id: image.record.id,
        });
    }
}

fn export_coco(
    snapshot: &ProjectSnapshot,
    dir: &Path,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(ExportProgress),
    report: &mut ExportReport,
) {
    let mut builder = coco::CocoBuilder::new(snapshot);
    let total = snapshot.images.len();
    for (index, image) in snapshot.images.iter().enumerate() {
        if cancel_requested(cancel, report) {
            break;
        }
        let written = builder.push_image(image);
        report.images_exported += 1;
        report.annotations_exported += written;
        progress(ExportProgress {
            completed: index + 1,
            total,
            image_id: image.record.id,
        });
    }
    // A cancelled batch still writes the images gathered so far.
    match builder.write(dir) {
        Ok(path) => report.files_created.push(path),
        Err(e) => report.fail_image(None, dir.join(coco::DATASET_FILE), &e),
    }
}

fn export_per_image(
    snapshot: &ProjectSnapshot,
    dir: &Path,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(ExportProgress),
    report: &mut ExportReport,
    artifact: fn(&Path, &SnapshotImage) -> PathBuf,
    write: fn(&Path, &SnapshotImage, &ProjectSnapshot) -> Result<(PathBuf, usize, usize)>,
) {
    let total = snapshot.images.len();
    for (index, image) in snapshot.images.iter().enumerate() {
        if cancel_requested(cancel, report) {
            break;
        }
        match write(dir, image, snapshot) {
            Ok((path, written, skipped)) => report.complete_image(path, written, skipped),
            Err(e) => report.fail_image(Some(image.record.id), artifact(dir, image), &e),
        }
        progress(ExportProgress {
            completed: index + 1,
            total,
            image_id: image.record.id,
        });
    }
}
