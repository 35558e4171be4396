//! Error types for the annotation engine.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the annotation engine.
///
/// State and geometry errors are contract violations returned synchronously
/// to the caller. Decode, detection, and export errors are collected into
/// batch reports by the operations that produce them; a single bad image
/// never aborts the rest of a batch.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Operation invoked outside its valid state-machine transition
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the violated transition
        message: String,
    },

    /// Box would violate the minimum-size or bounds invariants
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of the geometry violation
        message: String,
    },

    /// Image could not be decoded
    #[error("Decode error for {path:?}: {message}")]
    Decode {
        /// Path of the unreadable image
        path: PathBuf,
        /// Underlying decoder message
        message: String,
    },

    /// Operation conflicts with an in-flight reference
    #[error("Busy: {message}")]
    Busy {
        /// Description of the conflicting reference
        message: String,
    },

    /// External detector failed or is not available
    #[error("Detection unavailable: {message}")]
    DetectionUnavailable {
        /// Detector-provided failure description
        message: String,
    },

    /// Export destination could not be written
    #[error("Export IO error for {path:?}: {source}")]
    ExportIo {
        /// Path that could not be written
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// I/O error outside the export path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML serialization error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Annotation ID does not exist in the store
    #[error("Unknown annotation: {id}")]
    UnknownAnnotation {
        /// The missing annotation ID
        id: u64,
    },

    /// Image ID does not exist in the store
    #[error("Unknown image: {id}")]
    UnknownImage {
        /// The missing image ID
        id: u64,
    },
}

impl EngineError {
    /// Create an invalid state error with a message.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an invalid geometry error with a message.
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    /// Create a decode error for a path.
    pub fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a busy error with a message.
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    /// Create a detection unavailable error.
    pub fn detection_unavailable(message: impl Into<String>) -> Self {
        Self::DetectionUnavailable {
            message: message.into(),
        }
    }

    /// Create an export IO error for a path.
    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ExportIo {
            path: path.into(),
            source,
        }
    }
}
