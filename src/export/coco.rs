//! COCO JSON export: a single `annotations.json` for the whole batch.
//!
//! Standard `images` / `annotations` / `categories` arrays with absolute
//! pixel boxes in `[x, y, width, height]` order. All coordinate values are
//! rounded numerically to 12 decimal places before serialization. Detector
//! confidence rides along as the conventional `score` field when present.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::export::round12;
use crate::export::snapshot::{ProjectSnapshot, SnapshotImage};

pub(super) const DATASET_FILE: &str = "annotations.json";

#[derive(Debug, Serialize, Deserialize)]
struct CocoDataset {
    info: CocoInfo,
    images: Vec<CocoImage>,
    annotations: Vec<CocoAnnotation>,
    categories: Vec<CocoCategory>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CocoInfo {
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoImage {
    id: u64,
    file_name: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoAnnotation {
    id: u64,
    image_id: u64,
    category_id: u32,
    /// `[x, y, width, height]` in absolute pixels.
    bbox: [f64; 4],
    area: f64,
    iscrowd: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CocoCategory {
    id: u32,
    name: String,
    supercategory: String,
}

/// Accumulates one dataset across the image loop.
///
/// Image and annotation ids are assigned sequentially from 1 in snapshot
/// order; category ids are the registry's class ids.
pub(super) struct CocoBuilder {
    dataset: CocoDataset,
    next_annotation_id: u64,
}

impl CocoBuilder {
    pub(super) fn new(snapshot: &ProjectSnapshot) -> Self {
        let categories = snapshot
            .classes
            .iter()
            .map(|c| CocoCategory {
                id: c.id,
                name: c.name.clone(),
                supercategory: "vehicle".to_string(),
            })
            .collect();
        Self {
            dataset: CocoDataset {
                info: CocoInfo {
                    description: "roadmark export".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                images: Vec::new(),
                annotations: Vec::new(),
                categories,
            },
            next_annotation_id: 1,
        }
    }

    /// Append one image and its annotations. Returns annotations added.
    pub(super) fn push_image(&mut self, image: &SnapshotImage) -> usize {
        let image_id = self.dataset.images.len() as u64 + 1;
        self.dataset.images.push(CocoImage {
            id: image_id,
            file_name: image.record.filename().to_string(),
            width: image.record.width,
            height: image.record.height,
        });
        for ann in &image.annotations {
            let bbox = &ann.bbox;
            self.dataset.annotations.push(CocoAnnotation {
                id: self.next_annotation_id,
                image_id,
                category_id: ann.class_id,
                bbox: [
                    round12(bbox.x_min),
                    round12(bbox.y_min),
                    round12(bbox.width()),
                    round12(bbox.height()),
                ],
                area: round12(bbox.area()),
                iscrowd: 0,
                score: ann.confidence,
            });
            self.next_annotation_id += 1;
        }
        image.annotations.len()
    }

    /// Serialize to `annotations.json` under `dir`.
    pub(super) fn write(self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(DATASET_FILE);
        let json = serde_json::to_string_pretty(&self.dataset)?;
        fs::write(&path, json).map_err(|e| EngineError::export_io(&path, e))?;
        Ok(path)
    }
}
