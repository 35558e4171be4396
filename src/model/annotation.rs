//! Annotation identity, origin tagging, and the annotation record itself.

use serde::{Deserialize, Serialize};

use crate::model::geometry::BoundingBox;

/// Unique identifier for an annotation, stable across its image's lifetime.
pub type AnnotationId = u64;

/// Unique identifier for an image record.
pub type ImageId = u64;

/// How an annotation came to exist.
///
/// Detector output enters as `Proposed` and is retagged `Accepted` when a
/// reviewer confirms it; rejected proposals are deleted instead. Boxes drawn
/// by hand are always `Manual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationOrigin {
    /// Drawn by a human.
    Manual,
    /// Suggested by the detector, not yet reviewed.
    Proposed,
    /// Suggested by the detector and accepted by a reviewer.
    Accepted,
}

impl AnnotationOrigin {
    /// Display name for this origin.
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationOrigin::Manual => "manual",
            AnnotationOrigin::Proposed => "proposed",
            AnnotationOrigin::Accepted => "accepted",
        }
    }

    /// Whether this annotation still awaits review.
    pub fn is_proposed(&self) -> bool {
        matches!(self, AnnotationOrigin::Proposed)
    }

    /// Whether a human has vouched for this annotation (drawn or accepted).
    pub fn is_reviewed(&self) -> bool {
        !self.is_proposed()
    }
}

/// A bounding-box label on one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier.
    pub id: AnnotationId,
    /// The image this annotation belongs to.
    pub image_id: ImageId,
    /// Class ID, resolved against the external class registry.
    pub class_id: u32,
    /// Box extents in image-pixel coordinates.
    pub bbox: BoundingBox,
    /// How this annotation came to exist.
    pub origin: AnnotationOrigin,
    /// Detector confidence, present only on proposed/accepted annotations.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<f64>,
}

impl Annotation {
    /// Create a manual annotation.
    pub fn manual(id: AnnotationId, image_id: ImageId, class_id: u32, bbox: BoundingBox) -> Self {
        Self {
            id,
            image_id,
            class_id,
            bbox,
            origin: AnnotationOrigin::Manual,
            confidence: None,
        }
    }

    /// Create a detector-proposed annotation awaiting review.
    pub fn proposed(
        id: AnnotationId,
        image_id: ImageId,
        class_id: u32,
        bbox: BoundingBox,
        confidence: f64,
    ) -> Self {
        Self {
            id,
            image_id,
            class_id,
            bbox,
            origin: AnnotationOrigin::Proposed,
            confidence: Some(confidence),
        }
    }
}
