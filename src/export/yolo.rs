//! YOLO TXT export: one label file per image, normalized coordinates.
//!
//! Lines are `class_index cx cy w h` with every value carrying exactly 12
//! fractional digits. Class indices are positions in ascending class-id
//! order; `classes.txt` lists the names in that same order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::export::snapshot::{ProjectSnapshot, SnapshotImage};
use crate::model::BoundingBox;

/// One parsed or to-be-written YOLO label line, still normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloLabel {
    /// Zero-based class index (position in `classes.txt`).
    pub class_index: usize,
    /// Box center x, as a fraction of image width.
    pub center_x: f64,
    /// Box center y, as a fraction of image height.
    pub center_y: f64,
    /// Box width, as a fraction of image width.
    pub width: f64,
    /// Box height, as a fraction of image height.
    pub height: f64,
}

impl YoloLabel {
    /// Normalize a pixel-space box against its image dimensions.
    pub fn from_bbox(
        class_index: usize,
        bbox: &BoundingBox,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        Self {
            class_index,
            center_x: (bbox.x_min + bbox.x_max) / 2.0 / w,
            center_y: (bbox.y_min + bbox.y_max) / 2.0 / h,
            width: bbox.width() / w,
            height: bbox.height() / h,
        }
    }

    /// Denormalize back to pixel space.
    pub fn to_bbox(&self, image_width: u32, image_height: u32) -> BoundingBox {
        let w = f64::from(image_width);
        let h = f64::from(image_height);
        let half_w = self.width * w / 2.0;
        let half_h = self.height * h / 2.0;
        let cx = self.center_x * w;
        let cy = self.center_y * h;
        BoundingBox::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    /// Format as a label line with exactly 12 fractional digits per value.
    pub fn to_line(&self) -> String {
        format!(
            "{} {:.12} {:.12} {:.12} {:.12}",
            self.class_index, self.center_x, self.center_y, self.width, self.height
        )
    }
}

/// Parse one YOLO label line.
///
/// Accepts any float formatting on input; only output is pinned to 12
/// digits. Fails with `InvalidGeometry` on malformed lines.
pub fn parse_label_line(line: &str) -> Result<YoloLabel> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(EngineError::invalid_geometry(format!(
            "expected 5 fields in YOLO label line, got {}",
            parts.len()
        )));
    }
    let class_index: usize = parts[0]
        .parse()
        .map_err(|_| EngineError::invalid_geometry(format!("bad class index '{}'", parts[0])))?;
    let mut values = [0.0f64; 4];
    for (slot, raw) in values.iter_mut().zip(&parts[1..]) {
        *slot = raw
            .parse()
            .map_err(|_| EngineError::invalid_geometry(format!("bad coordinate '{raw}'")))?;
    }
    Ok(YoloLabel {
        class_index,
        center_x: values[0],
        center_y: values[1],
        width: values[2],
        height: values[3],
    })
}

/// Path of the label file for one image.
pub(super) fn artifact_path(dir: &Path, image: &SnapshotImage) -> PathBuf {
    dir.join(format!("{}.txt", image.record.stem()))
}

/// Write `classes.txt`: one name per line, ascending class-id order.
pub(super) fn write_classes(dir: &Path, snapshot: &ProjectSnapshot) -> Result<PathBuf> {
    let path = dir.join("classes.txt");
    let content: String = snapshot
        .classes
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&path, content).map_err(|e| EngineError::export_io(&path, e))?;
    Ok(path)
}

/// Write one image's label file. An image without annotations still gets an
/// (empty) file. Returns the path, lines written, and annotations skipped
/// for an unregistered class id.
pub(super) fn write_image(
    dir: &Path,
    image: &SnapshotImage,
    class_index: &HashMap<u32, usize>,
) -> Result<(PathBuf, usize, usize)> {
    let path = artifact_path(dir, image);
    let mut lines = Vec::new();
    let mut skipped = 0;
    for ann in &image.annotations {
        let Some(&index) = class_index.get(&ann.class_id) else {
            log::warn!(
                "Unknown class id {} on annotation {}, skipping",
                ann.class_id,
                ann.id
            );
            skipped += 1;
            continue;
        };
        let label = YoloLabel::from_bbox(index, &ann.bbox, image.record.width, image.record.height);
        lines.push(label.to_line());
    }
    let written = lines.len();
    fs::write(&path, lines.join("\n")).map_err(|e| EngineError::export_io(&path, e))?;
    Ok((path, written, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_line() {
        let label = parse_label_line("2 0.5 0.25 0.1 0.2").unwrap();
        assert_eq!(label.class_index, 2);
        assert_eq!(label.center_x, 0.5);
        assert_eq!(label.height, 0.2);

        let bbox = label.to_bbox(100, 100);
        assert!((bbox.x_min - 45.0).abs() < 1e-9);
        assert!((bbox.y_min - 15.0).abs() < 1e-9);
        assert!((bbox.x_max - 55.0).abs() < 1e-9);
        assert!((bbox.y_max - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(parse_label_line("0 0.5 0.5 0.1").is_err());
        assert!(parse_label_line("x 0.5 0.5 0.1 0.1").is_err());
        assert!(parse_label_line("0 0.5 nope 0.1 0.1").is_err());
        assert!(parse_label_line("").is_err());
    }

    #[test]
    fn test_line_has_twelve_fractional_digits() {
        let label = YoloLabel {
            class_index: 1,
            center_x: 0.5,
            center_y: 0.25,
            width: 1.0 / 3.0,
            height: 0.1,
        };
        let line = label.to_line();
        assert_eq!(line, "1 0.500000000000 0.250000000000 0.333333333333 0.100000000000");
        for field in line.split_whitespace().skip(1) {
            let (_, frac) = field.split_once('.').unwrap();
            assert_eq!(frac.len(), 12);
        }
    }

    #[test]
    fn test_normalization_round_trip() {
        let bbox = BoundingBox::new(10.0, 20.0, 110.0, 220.0);
        let label = YoloLabel::from_bbox(0, &bbox, 1000, 500);
        assert_eq!(label.center_x, 0.06);
        assert_eq!(label.center_y, 0.24);
        assert_eq!(label.width, 0.1);
        assert_eq!(label.height, 0.4);

        let back = label.to_bbox(1000, 500);
        assert!((back.x_min - bbox.x_min).abs() < 1e-9);
        assert!((back.y_max - bbox.y_max).abs() < 1e-9);
    }
}
