//! Interactive geometry editing: handle drags and new-box drawing.
//!
//! [`GeometryEditor`] is a per-project editing session. At most one gesture
//! (a handle drag or a new-box draw) is active at a time; calling an
//! operation outside its valid state fails with `InvalidState` so UI-layer
//! bugs surface instead of being swallowed. Committed gestures land in the
//! [`AnnotationStore`] as single atomic mutations paired with one undo
//! command each.

use crate::error::{EngineError, Result};
use crate::model::{
    AnnotationId, BoundingBox, DEFAULT_MIN_BOX_SIZE, Handle, ImageId, Point,
};
use crate::store::AnnotationStore;
use crate::undo::{Command, UndoStack, record_command};

/// Current gesture of the editor.
#[derive(Debug, Clone)]
pub enum EditState {
    /// No gesture in progress.
    Idle,
    /// A handle drag is resizing an existing annotation.
    Dragging {
        /// The annotation being resized.
        annotation_id: AnnotationId,
        /// The handle being dragged.
        handle: Handle,
        /// Box coordinates at drag start, the base for cumulative offsets.
        origin_box: BoundingBox,
        /// Pointer position at drag start.
        start_pointer: Point,
        /// Owning image width, for clamping.
        image_width: u32,
        /// Owning image height, for clamping.
        image_height: u32,
    },
    /// A new box is being drawn from an anchor corner.
    Drawing {
        /// The image the new box belongs to.
        image_id: ImageId,
        /// The fixed corner where drawing started.
        anchor: Point,
        /// The opposite corner, following the pointer.
        current: Point,
        /// Owning image width, for clamping.
        image_width: u32,
        /// Owning image height, for clamping.
        image_height: u32,
    },
}

impl EditState {
    /// No gesture in progress.
    pub fn is_idle(&self) -> bool {
        matches!(self, EditState::Idle)
    }

    /// A handle drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self, EditState::Dragging { .. })
    }

    /// A new box is being drawn.
    pub fn is_drawing(&self) -> bool {
        matches!(self, EditState::Drawing { .. })
    }
}

/// Handle-based box editing against one annotation store.
#[derive(Debug)]
pub struct GeometryEditor {
    state: EditState,
    min_box_size: f64,
}

impl Default for GeometryEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryEditor {
    /// Create an editor with the default minimum box size.
    pub fn new() -> Self {
        Self {
            state: EditState::Idle,
            min_box_size: DEFAULT_MIN_BOX_SIZE,
        }
    }

    /// Override the minimum box size (pixels).
    pub fn with_min_box_size(mut self, min_box_size: f64) -> Self {
        self.min_box_size = min_box_size;
        self
    }

    /// The current gesture, for preview rendering.
    pub fn state(&self) -> &EditState {
        &self.state
    }

    /// The configured minimum box size.
    pub fn min_box_size(&self) -> f64 {
        self.min_box_size
    }

    // ========================================================================
    // Handle drags
    // ========================================================================

    /// Start dragging a handle of an existing annotation.
    pub fn begin_drag(
        &mut self,
        store: &AnnotationStore,
        annotation_id: AnnotationId,
        handle: Handle,
        pointer: Point,
    ) -> Result<()> {
        self.require_idle("begin_drag")?;

        let annotation = store
            .get(annotation_id)
            .ok_or(EngineError::UnknownAnnotation { id: annotation_id })?;
        let record = store
            .image(annotation.image_id)
            .ok_or(EngineError::UnknownImage {
                id: annotation.image_id,
            })?;

        log::debug!(
            "Starting {} drag on box {} from ({}, {})",
            handle.name(),
            annotation_id,
            pointer.x,
            pointer.y
        );
        self.state = EditState::Dragging {
            annotation_id,
            handle,
            origin_box: annotation.bbox,
            start_pointer: pointer,
            image_width: record.width,
            image_height: record.height,
        };
        Ok(())
    }

    /// Move the dragged handle to a new pointer position.
    ///
    /// The box is recomputed from the drag-start coordinates plus the
    /// cumulative pointer offset, clamped to the image, held to the minimum
    /// size, and written to the store. Returns the resulting box.
    pub fn update_drag(
        &mut self,
        store: &mut AnnotationStore,
        pointer: Point,
    ) -> Result<BoundingBox> {
        let EditState::Dragging {
            annotation_id,
            handle,
            origin_box,
            start_pointer,
            image_width,
            image_height,
        } = self.state
        else {
            return Err(EngineError::invalid_state("update_drag without an active drag"));
        };

        let dx = pointer.x - start_pointer.x;
        let dy = pointer.y - start_pointer.y;
        let next = origin_box.resized(
            handle,
            dx,
            dy,
            image_width,
            image_height,
            self.min_box_size,
        );
        store.set_box(annotation_id, next)?;
        Ok(next)
    }

    /// Finish the drag, committing the current box as one undoable mutation.
    ///
    /// A drag that never moved the box commits nothing and records no undo
    /// step. Returns the committed box.
    pub fn end_drag(
        &mut self,
        store: &mut AnnotationStore,
        undo: &mut UndoStack,
    ) -> Result<BoundingBox> {
        let EditState::Dragging {
            annotation_id,
            origin_box,
            ..
        } = self.state
        else {
            return Err(EngineError::invalid_state("end_drag without an active drag"));
        };

        let committed = store
            .get(annotation_id)
            .ok_or(EngineError::UnknownAnnotation { id: annotation_id })?
            .bbox;
        if committed != origin_box {
            record_command(
                undo,
                Command::ModifyBox {
                    annotation_id,
                    old_box: origin_box,
                    new_box: committed,
                },
            );
        }
        log::debug!("Finished drag on box {}", annotation_id);
        self.state = EditState::Idle;
        Ok(committed)
    }

    /// Abort the current gesture.
    ///
    /// A drag restores the drag-start box; a draw discards the half-built
    /// box. Neither records an undo step.
    pub fn cancel(&mut self, store: &mut AnnotationStore) -> Result<()> {
        match self.state {
            EditState::Dragging {
                annotation_id,
                origin_box,
                ..
            } => {
                store.set_box(annotation_id, origin_box)?;
                log::debug!("Cancelled drag on box {}", annotation_id);
            }
            EditState::Drawing { image_id, .. } => {
                log::debug!("Cancelled drawing on image {}", image_id);
            }
            EditState::Idle => {
                return Err(EngineError::invalid_state("cancel with no gesture in progress"));
            }
        }
        self.state = EditState::Idle;
        Ok(())
    }

    // ========================================================================
    // Drawing new boxes
    // ========================================================================

    /// Start drawing a new box anchored at `start`.
    pub fn create_new(
        &mut self,
        store: &AnnotationStore,
        image_id: ImageId,
        start: Point,
    ) -> Result<()> {
        self.require_idle("create_new")?;

        let record = store
            .image(image_id)
            .ok_or(EngineError::UnknownImage { id: image_id })?;
        let anchor = clamp_point(start, record.width, record.height);

        log::debug!(
            "Drawing new box on image {} from ({}, {})",
            image_id,
            anchor.x,
            anchor.y
        );
        self.state = EditState::Drawing {
            image_id,
            anchor,
            current: anchor,
            image_width: record.width,
            image_height: record.height,
        };
        Ok(())
    }

    /// Drag the free corner of the box being drawn.
    ///
    /// Behaves like dragging the corner opposite the anchor; returns the
    /// preview box, which may still be under the minimum size.
    pub fn update_new(&mut self, pointer: Point) -> Result<BoundingBox> {
        let EditState::Drawing {
            anchor,
            ref mut current,
            image_width,
            image_height,
            ..
        } = self.state
        else {
            return Err(EngineError::invalid_state("update_new without an active draw"));
        };

        *current = clamp_point(pointer, image_width, image_height);
        Ok(BoundingBox::from_corners(anchor, *current))
    }

    /// Commit the drawn box as a new manual annotation.
    ///
    /// Fails with `InvalidGeometry` if the box is under the minimum size; the
    /// draw stays active so the caller can keep dragging or cancel.
    pub fn commit_new(
        &mut self,
        store: &mut AnnotationStore,
        undo: &mut UndoStack,
        class_id: u32,
    ) -> Result<AnnotationId> {
        let EditState::Drawing {
            image_id,
            anchor,
            current,
            ..
        } = self.state
        else {
            return Err(EngineError::invalid_state("commit_new without an active draw"));
        };

        let bbox = BoundingBox::from_corners(anchor, current);
        if !bbox.meets_min_size(self.min_box_size) {
            return Err(EngineError::invalid_geometry(format!(
                "box {}x{} is under the minimum size {}",
                bbox.width(),
                bbox.height(),
                self.min_box_size
            )));
        }

        let id = store.add_manual(image_id, class_id, bbox)?;
        record_command(
            undo,
            Command::AddBox {
                annotation: store
                    .get(id)
                    .ok_or(EngineError::UnknownAnnotation { id })?
                    .clone(),
            },
        );
        log::info!("Created box {} on image {}", id, image_id);
        self.state = EditState::Idle;
        Ok(id)
    }

    // ========================================================================
    // One-shot box operations
    // ========================================================================

    /// Translate a whole box, shifting it to stay inside its image.
    pub fn move_box(
        &self,
        store: &mut AnnotationStore,
        undo: &mut UndoStack,
        annotation_id: AnnotationId,
        dx: f64,
        dy: f64,
    ) -> Result<BoundingBox> {
        self.require_idle("move_box")?;

        let annotation = store
            .get(annotation_id)
            .ok_or(EngineError::UnknownAnnotation { id: annotation_id })?;
        let record = store
            .image(annotation.image_id)
            .ok_or(EngineError::UnknownImage {
                id: annotation.image_id,
            })?;

        let old_box = annotation.bbox;
        let new_box = old_box.translate_clamped(dx, dy, record.width, record.height);
        if new_box == old_box {
            return Ok(old_box);
        }

        store.set_box(annotation_id, new_box)?;
        record_command(
            undo,
            Command::ModifyBox {
                annotation_id,
                old_box,
                new_box,
            },
        );
        Ok(new_box)
    }

    /// Delete an annotation as one undoable step.
    pub fn delete_box(
        &self,
        store: &mut AnnotationStore,
        undo: &mut UndoStack,
        annotation_id: AnnotationId,
    ) -> Result<()> {
        self.require_idle("delete_box")?;

        let annotation = store
            .remove(annotation_id)
            .ok_or(EngineError::UnknownAnnotation { id: annotation_id })?;
        log::info!("Deleted box {}", annotation_id);
        record_command(undo, Command::RemoveBox { annotation });
        Ok(())
    }

    fn require_idle(&self, operation: &str) -> Result<()> {
        match &self.state {
            EditState::Idle => Ok(()),
            EditState::Dragging { annotation_id, .. } => Err(EngineError::invalid_state(format!(
                "{} while dragging box {}",
                operation, annotation_id
            ))),
            EditState::Drawing { image_id, .. } => Err(EngineError::invalid_state(format!(
                "{} while drawing on image {}",
                operation, image_id
            ))),
        }
    }
}

/// Clamp a point into an image rectangle.
fn clamp_point(p: Point, width: u32, height: u32) -> Point {
    Point::new(
        p.x.clamp(0.0, f64::from(width)),
        p.y.clamp(0.0, f64::from(height)),
    )
}
