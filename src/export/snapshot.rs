//! Immutable project snapshot used by all exporters.
//!
//! Export runs off the editing thread, so it never reads the live store:
//! [`ProjectSnapshot::capture`] copies everything the format writers need at
//! one instant. Edits made while an export runs simply postdate the snapshot.

use std::collections::HashMap;

use crate::model::{Annotation, ClassRegistry, ImageRecord, VehicleClass};
use crate::store::AnnotationStore;

/// One image with its annotations, frozen at capture time.
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    /// The image record as registered.
    pub record: ImageRecord,
    /// Annotations of this image, ascending by id.
    pub annotations: Vec<Annotation>,
}

/// Everything an exporter reads: images in id order plus the class table.
#[derive(Debug, Clone, Default)]
pub struct ProjectSnapshot {
    /// Images in ascending id order.
    pub images: Vec<SnapshotImage>,
    /// Classes in ascending id order; position defines the YOLO class index.
    pub classes: Vec<VehicleClass>,
}

impl ProjectSnapshot {
    /// Copy the current store contents and class table.
    pub fn capture(store: &AnnotationStore, registry: &ClassRegistry) -> Self {
        let images: Vec<SnapshotImage> = store
            .images()
            .map(|record| SnapshotImage {
                record: record.clone(),
                annotations: store
                    .annotations_for(record.id)
                    .into_iter()
                    .cloned()
                    .collect(),
            })
            .collect();
        let classes: Vec<VehicleClass> = registry.iter().cloned().collect();
        log::info!(
            "📦 Snapshot captured: {} image(s), {} annotation(s), {} class(es)",
            images.len(),
            images.iter().map(|i| i.annotations.len()).sum::<usize>(),
            classes.len()
        );
        Self { images, classes }
    }

    /// Total annotation count across all images.
    pub fn total_annotations(&self) -> usize {
        self.images.iter().map(|i| i.annotations.len()).sum()
    }

    /// Whether the snapshot holds no annotations at all.
    pub fn has_annotations(&self) -> bool {
        self.images.iter().any(|i| !i.annotations.is_empty())
    }

    /// Class id → zero-based export index (position in id order).
    pub fn class_index(&self) -> HashMap<u32, usize> {
        self.classes
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.id, idx))
            .collect()
    }

    /// Display name for a class id, or "unknown".
    pub fn class_name(&self, id: u32) -> &str {
        self.classes
            .iter()
            .find(|c| c.id == id)
            .map_or("unknown", |c| c.name.as_str())
    }
}
