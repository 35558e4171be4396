//! Image identity: records and content fingerprints.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

use crate::model::annotation::ImageId;

/// Content fingerprint of an image file: size plus mtime.
///
/// Cheap to compute and good enough to detect on-disk changes; used as the
/// cache-invalidation key so stale pixels are never served after a file is
/// rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File size in bytes.
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub mtime_ms: u64,
}

impl Fingerprint {
    /// Create a fingerprint from explicit values.
    pub fn new(size: u64, mtime_ms: u64) -> Self {
        Self { size, mtime_ms }
    }

    /// Read the fingerprint of a file on disk.
    pub fn probe(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis() as u64);
        Ok(Self {
            size: metadata.len(),
            mtime_ms,
        })
    }
}

/// Identity and metadata of one image in the project.
///
/// Immutable once created; when the underlying file changes, the store
/// replaces the record with one carrying the fresh fingerprint and the same
/// id, and the cache treats the old entry as stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Stable identifier within the project.
    pub id: ImageId,
    /// Source path of the image file.
    pub path: PathBuf,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Content fingerprint at registration time.
    pub fingerprint: Fingerprint,
}

impl ImageRecord {
    /// Create a new image record.
    pub fn new(
        id: ImageId,
        path: impl Into<PathBuf>,
        width: u32,
        height: u32,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            width,
            height,
            fingerprint,
        }
    }

    /// File name portion of the path, or "unknown" when absent.
    pub fn filename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
    }

    /// File stem used for per-image export artifacts.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
    }

    /// Same record with a replacement fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_and_stem() {
        let record = ImageRecord::new(
            1,
            "/data/frames/cam0_000123.png",
            1920,
            1080,
            Fingerprint::new(1024, 99),
        );
        assert_eq!(record.filename(), "cam0_000123.png");
        assert_eq!(record.stem(), "cam0_000123");
    }

    #[test]
    fn test_fingerprint_equality_tracks_content() {
        let a = Fingerprint::new(100, 5000);
        let b = Fingerprint::new(100, 5000);
        let c = Fingerprint::new(100, 6000);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_probe_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.bin");
        std::fs::write(&path, [0u8; 64]).unwrap();
        let fp = Fingerprint::probe(&path).unwrap();
        assert_eq!(fp.size, 64);
    }
}
