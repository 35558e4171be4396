//! Data model for the annotation engine.

mod annotation;
mod class;
mod geometry;
mod image;

pub use annotation::{Annotation, AnnotationId, AnnotationOrigin, ImageId};
pub use class::{ClassRegistry, VehicleClass};
pub use geometry::{BoundingBox, DEFAULT_MIN_BOX_SIZE, HANDLE_HIT_RADIUS, Handle, Point};
pub use image::{Fingerprint, ImageRecord};
