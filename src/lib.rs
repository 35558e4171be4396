//! roadmark - interactive annotation engine for road-scene imagery.
//!
//! The engine behind a bounding-box labeling tool: everything except the
//! rendering and input layer, which the host application provides. The
//! pieces fit together like this:
//!
//! - [`store::AnnotationStore`] owns images and annotations; all mutations
//!   go through it, paired with [`undo`] commands that invert exactly.
//! - [`editor::GeometryEditor`] runs the drag/draw gesture state machine in
//!   sub-pixel image coordinates.
//! - [`cache::ImageCache`] serves decoded pixels under a memory budget,
//!   with background prefetch of neighboring images.
//! - [`detect::DetectionBridge`] turns an injected [`detect::Detector`]'s
//!   output into reviewable proposals, never touching manual annotations.
//! - [`export::ExportEngine`] writes YOLO, COCO, Pascal VOC, and custom
//!   JSON datasets from an immutable project snapshot.

pub mod cache;
pub mod config;
pub mod detect;
pub mod editor;
pub mod error;
pub mod export;
pub mod model;
pub mod store;
pub mod undo;

pub use cache::ImageCache;
pub use config::EngineConfig;
pub use detect::{DetectionBridge, DetectionEvent, Detector};
pub use editor::{EditState, GeometryEditor};
pub use error::{EngineError, Result};
pub use export::{ExportEngine, ExportFormat, ExportReport, ProjectSnapshot};
pub use model::{
    Annotation, AnnotationId, AnnotationOrigin, BoundingBox, ClassRegistry, Fingerprint, ImageId,
    ImageRecord, VehicleClass,
};
pub use store::AnnotationStore;
pub use undo::{Command, UndoStack};
