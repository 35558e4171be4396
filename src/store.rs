//! The authoritative annotation store.
//!
//! Owns every [`Annotation`] and the [`ImageRecord`] table. All mutations go
//! through checked methods so the geometry invariant (finite, ordered, inside
//! the owning image) holds at all times; callers with new coordinates use
//! [`AnnotationStore::set_box`] rather than mutable references. The store is
//! single-writer: one logical editing sequence performs all mutations.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{EngineError, Result};
use crate::model::{
    Annotation, AnnotationId, AnnotationOrigin, BoundingBox, Fingerprint, ImageId, ImageRecord,
};

/// Owns all annotations and image records of one project.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    /// Image records keyed by id; BTreeMap keeps iteration in id order.
    images: BTreeMap<ImageId, ImageRecord>,
    /// All annotations, keyed by their ID.
    annotations: HashMap<AnnotationId, Annotation>,
    /// Counter for generating unique image IDs.
    next_image_id: ImageId,
    /// Counter for generating unique annotation IDs.
    next_annotation_id: AnnotationId,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            images: BTreeMap::new(),
            annotations: HashMap::new(),
            next_image_id: 1,
            next_annotation_id: 1,
        }
    }

    // ========================================================================
    // Image records
    // ========================================================================

    /// Register an image and return its new id.
    pub fn register_image(
        &mut self,
        path: impl Into<PathBuf>,
        width: u32,
        height: u32,
        fingerprint: Fingerprint,
    ) -> ImageId {
        let id = self.next_image_id;
        self.next_image_id += 1;
        let record = ImageRecord::new(id, path, width, height, fingerprint);
        log::debug!("Registered image {} at {:?}", id, record.path);
        self.images.insert(id, record);
        id
    }

    /// Get an image record by id.
    pub fn image(&self, id: ImageId) -> Option<&ImageRecord> {
        self.images.get(&id)
    }

    /// Iterate image records in ascending id order.
    pub fn images(&self) -> impl Iterator<Item = &ImageRecord> {
        self.images.values()
    }

    /// Number of registered images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Re-probe an image's fingerprint from disk, replacing the record if the
    /// file changed. Returns whether it did; the cache then treats the old
    /// pixels as stale.
    pub fn refresh_image(&mut self, id: ImageId) -> Result<bool> {
        let record = self
            .images
            .get(&id)
            .ok_or(EngineError::UnknownImage { id })?;
        let fresh = Fingerprint::probe(&record.path)?;
        if fresh == record.fingerprint {
            return Ok(false);
        }
        log::info!("Image {} changed on disk, refreshing fingerprint", id);
        let updated = record.clone().with_fingerprint(fresh);
        self.images.insert(id, updated);
        Ok(true)
    }

    /// Remove an image and every annotation attached to it.
    ///
    /// Returns the record and the removed annotations (in id order), or
    /// `None` if the image was not registered.
    pub fn remove_image(&mut self, id: ImageId) -> Option<(ImageRecord, Vec<Annotation>)> {
        let record = self.images.remove(&id)?;
        let mut removed: Vec<Annotation> = Vec::new();
        self.annotations.retain(|_, ann| {
            if ann.image_id == id {
                removed.push(ann.clone());
                false
            } else {
                true
            }
        });
        removed.sort_by_key(|a| a.id);
        log::debug!(
            "Removed image {} with {} annotations",
            id,
            removed.len()
        );
        Some((record, removed))
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    /// Add a manual annotation and return its ID.
    ///
    /// Fails with `InvalidGeometry` if the box violates the invariant for the
    /// owning image, leaving the store untouched.
    pub fn add_manual(
        &mut self,
        image_id: ImageId,
        class_id: u32,
        bbox: BoundingBox,
    ) -> Result<AnnotationId> {
        self.validate_box(image_id, &bbox)?;
        let id = self.alloc_annotation_id();
        self.annotations
            .insert(id, Annotation::manual(id, image_id, class_id, bbox));
        Ok(id)
    }

    /// Add a detector-proposed annotation and return its ID.
    pub fn add_proposed(
        &mut self,
        image_id: ImageId,
        class_id: u32,
        bbox: BoundingBox,
        confidence: f64,
    ) -> Result<AnnotationId> {
        self.validate_box(image_id, &bbox)?;
        let id = self.alloc_annotation_id();
        self.annotations
            .insert(id, Annotation::proposed(id, image_id, class_id, bbox, confidence));
        Ok(id)
    }

    /// Re-insert an annotation with its original ID.
    ///
    /// Used by undo to bring back removed annotations exactly as they were.
    pub fn restore(&mut self, annotation: Annotation) {
        if annotation.id >= self.next_annotation_id {
            self.next_annotation_id = annotation.id + 1;
        }
        self.annotations.insert(annotation.id, annotation);
    }

    /// Remove an annotation by ID.
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        self.annotations.remove(&id)
    }

    /// Get an annotation by ID.
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    /// Replace an annotation's box, returning the previous one.
    ///
    /// The new box is validated against the owning image before anything is
    /// written.
    pub fn set_box(&mut self, id: AnnotationId, bbox: BoundingBox) -> Result<BoundingBox> {
        let image_id = self
            .annotations
            .get(&id)
            .ok_or(EngineError::UnknownAnnotation { id })?
            .image_id;
        self.validate_box(image_id, &bbox)?;
        let ann = self
            .annotations
            .get_mut(&id)
            .ok_or(EngineError::UnknownAnnotation { id })?;
        let old = ann.bbox;
        ann.bbox = bbox;
        Ok(old)
    }

    /// Replace an annotation's origin tag, returning the previous one.
    pub fn set_origin(
        &mut self,
        id: AnnotationId,
        origin: AnnotationOrigin,
    ) -> Result<AnnotationOrigin> {
        let ann = self
            .annotations
            .get_mut(&id)
            .ok_or(EngineError::UnknownAnnotation { id })?;
        let old = ann.origin;
        ann.origin = origin;
        Ok(old)
    }

    /// Get all annotations in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    /// Annotations of one image, in ascending id order.
    pub fn annotations_for(&self, image_id: ImageId) -> Vec<&Annotation> {
        let mut list: Vec<&Annotation> = self
            .annotations
            .values()
            .filter(|a| a.image_id == image_id)
            .collect();
        list.sort_by_key(|a| a.id);
        list
    }

    /// Unreviewed proposals of one image, in ascending id order.
    pub fn proposals_for(&self, image_id: ImageId) -> Vec<&Annotation> {
        let mut list: Vec<&Annotation> = self
            .annotations
            .values()
            .filter(|a| a.image_id == image_id && a.origin.is_proposed())
            .collect();
        list.sort_by_key(|a| a.id);
        list
    }

    /// Get the number of annotations.
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Check if there are no annotations.
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn alloc_annotation_id(&mut self) -> AnnotationId {
        let id = self.next_annotation_id;
        self.next_annotation_id += 1;
        id
    }

    /// Check the geometry invariant for a box against its owning image.
    fn validate_box(&self, image_id: ImageId, bbox: &BoundingBox) -> Result<()> {
        let record = self
            .images
            .get(&image_id)
            .ok_or(EngineError::UnknownImage { id: image_id })?;
        if !bbox.is_finite() {
            return Err(EngineError::invalid_geometry("box has non-finite coordinates"));
        }
        if !bbox.is_ordered() {
            return Err(EngineError::invalid_geometry(format!(
                "box extents not ordered: ({}, {}) .. ({}, {})",
                bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max
            )));
        }
        if !bbox.fits_within(record.width, record.height) {
            return Err(EngineError::invalid_geometry(format!(
                "box ({}, {}) .. ({}, {}) outside image {}x{}",
                bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max, record.width, record.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_image() -> (AnnotationStore, ImageId) {
        let mut store = AnnotationStore::new();
        let image_id = store.register_image("/tmp/a.png", 640, 480, Fingerprint::new(1, 1));
        (store, image_id)
    }

    #[test]
    fn test_add_and_get() {
        let (mut store, image_id) = store_with_image();
        let id = store
            .add_manual(image_id, 1, BoundingBox::new(10.0, 20.0, 110.0, 220.0))
            .unwrap();
        let ann = store.get(id).unwrap();
        assert_eq!(ann.image_id, image_id);
        assert_eq!(ann.class_id, 1);
        assert_eq!(ann.origin, AnnotationOrigin::Manual);
    }

    #[test]
    fn test_out_of_bounds_box_rejected() {
        let (mut store, image_id) = store_with_image();
        let result = store.add_manual(image_id, 0, BoundingBox::new(0.0, 0.0, 641.0, 100.0));
        assert!(matches!(result, Err(EngineError::InvalidGeometry { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unordered_box_rejected() {
        let (mut store, image_id) = store_with_image();
        let result = store.add_manual(image_id, 0, BoundingBox::new(50.0, 0.0, 30.0, 100.0));
        assert!(matches!(result, Err(EngineError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_unknown_image_rejected() {
        let mut store = AnnotationStore::new();
        let result = store.add_manual(99, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(matches!(result, Err(EngineError::UnknownImage { id: 99 })));
    }

    #[test]
    fn test_set_box_validates_and_returns_old() {
        let (mut store, image_id) = store_with_image();
        let id = store
            .add_manual(image_id, 0, BoundingBox::new(10.0, 10.0, 50.0, 50.0))
            .unwrap();

        let old = store
            .set_box(id, BoundingBox::new(20.0, 20.0, 60.0, 60.0))
            .unwrap();
        assert_eq!(old, BoundingBox::new(10.0, 10.0, 50.0, 50.0));

        let bad = store.set_box(id, BoundingBox::new(-1.0, 0.0, 10.0, 10.0));
        assert!(bad.is_err());
        // The failed write left the previous box in place.
        assert_eq!(store.get(id).unwrap().bbox, BoundingBox::new(20.0, 20.0, 60.0, 60.0));
    }

    #[test]
    fn test_restore_preserves_id() {
        let (mut store, image_id) = store_with_image();
        let id = store
            .add_manual(image_id, 0, BoundingBox::new(10.0, 10.0, 50.0, 50.0))
            .unwrap();
        let removed = store.remove(id).unwrap();
        assert!(store.get(id).is_none());

        store.restore(removed);
        assert!(store.get(id).is_some());

        // New IDs never collide with restored ones.
        let next = store
            .add_manual(image_id, 0, BoundingBox::new(0.0, 0.0, 5.0, 5.0))
            .unwrap();
        assert_ne!(next, id);
    }

    #[test]
    fn test_remove_image_drops_annotations() {
        let (mut store, image_id) = store_with_image();
        let other = store.register_image("/tmp/b.png", 100, 100, Fingerprint::new(2, 2));
        store
            .add_manual(image_id, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        store
            .add_manual(image_id, 0, BoundingBox::new(5.0, 5.0, 15.0, 15.0))
            .unwrap();
        let kept = store
            .add_manual(other, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();

        let (record, removed) = store.remove_image(image_id).unwrap();
        assert_eq!(record.id, image_id);
        assert_eq!(removed.len(), 2);
        assert!(removed.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(store.len(), 1);
        assert!(store.get(kept).is_some());
    }

    #[test]
    fn test_annotations_for_sorted_by_id() {
        let (mut store, image_id) = store_with_image();
        for i in 0..5 {
            store
                .add_manual(
                    image_id,
                    0,
                    BoundingBox::new(f64::from(i), 0.0, f64::from(i) + 10.0, 10.0),
                )
                .unwrap();
        }
        let list = store.annotations_for(image_id);
        assert_eq!(list.len(), 5);
        assert!(list.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_proposals_for_filters_origin() {
        let (mut store, image_id) = store_with_image();
        store
            .add_manual(image_id, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();
        let p = store
            .add_proposed(image_id, 1, BoundingBox::new(20.0, 20.0, 40.0, 40.0), 0.8)
            .unwrap();

        let proposals = store.proposals_for(image_id);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, p);
    }
}
