//! Bridge between an object detector and the annotation store.
//!
//! Inference runs on a worker thread and streams [`DetectionEvent`]s back
//! over a channel, so the editing loop never blocks on the model. Raw
//! detections only become annotations through [`merge_proposals`], which is
//! strictly additive: it inserts `Proposed` boxes and never modifies or
//! removes what a human has drawn. Reviewers then keep or drop proposals with
//! [`accept_proposal`] / [`reject_proposal`], each recorded as an undoable
//! step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;

use crate::cache::{DecodedImage, ImageCache};
use crate::error::{EngineError, Result};
use crate::model::{AnnotationId, AnnotationOrigin, BoundingBox, ImageId, ImageRecord};
use crate::store::AnnotationStore;
use crate::undo::{Command, UndoStack, record_command};

/// Proposals below this confidence are dropped before they reach the store.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Proposals overlapping an existing same-class box at or above this IoU are
/// treated as duplicates.
pub const DEFAULT_DUPLICATE_IOU: f64 = 0.5;

/// One raw box out of the detector, before clamping and merging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    /// Predicted class id, resolved against the class registry.
    pub class_id: u32,
    /// Predicted box in image-pixel coordinates.
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

/// An object detector the bridge can drive.
///
/// Implementations run synchronously; the bridge supplies the thread. A
/// backend that cannot serve (model missing, runtime failed to load) returns
/// [`EngineError::DetectionUnavailable`], which stops the batch without
/// failing the application.
pub trait Detector: Send + Sync {
    /// Run inference over one decoded image.
    fn detect(&self, record: &ImageRecord, pixels: &DecodedImage) -> Result<Vec<RawDetection>>;

    /// Short backend name used in logs.
    fn name(&self) -> &str {
        "detector"
    }
}

/// Events streamed back while a detection batch runs.
#[derive(Debug, Clone)]
pub enum DetectionEvent {
    /// Confidence-filtered detections for one image, ready to merge.
    Proposals {
        image_id: ImageId,
        detections: Vec<RawDetection>,
    },
    /// One image could not be processed; the batch continues.
    ImageFailed { image_id: ImageId, message: String },
    /// The backend cannot serve at all; the batch stops here.
    Unavailable { message: String },
    /// End of batch.
    Finished(DetectionReport),
}

/// Summary of one detection batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    /// Images the batch was asked to process.
    pub requested: usize,
    /// Images that produced a (possibly empty) proposal set.
    pub processed: usize,
    /// Proposals emitted after confidence filtering.
    pub proposals: usize,
    /// Images that failed to decode or infer.
    pub failures: usize,
    /// Whether the batch stopped early on the cancel token.
    pub cancelled: bool,
}

/// Drives a [`Detector`] over batches of images.
pub struct DetectionBridge {
    detector: Arc<dyn Detector>,
    cache: Arc<ImageCache>,
}

impl DetectionBridge {
    /// Create a bridge reading pixels through `cache`.
    pub fn new(detector: Arc<dyn Detector>, cache: Arc<ImageCache>) -> Self {
        Self { detector, cache }
    }

    /// Run inference over `records` on a worker thread.
    ///
    /// Detections below `confidence_threshold` are dropped before they are
    /// reported. Returns immediately; progress arrives on the returned
    /// channel, ending with [`DetectionEvent::Finished`]. Setting `cancel`
    /// stops the batch between images.
    pub fn predict_batch(
        &self,
        records: Vec<ImageRecord>,
        confidence_threshold: f64,
        cancel: Arc<AtomicBool>,
    ) -> Receiver<DetectionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let detector = Arc::clone(&self.detector);
        let cache = Arc::clone(&self.cache);
        let threshold = confidence_threshold.clamp(0.0, 1.0);
        log::info!(
            "🤖 Detection batch started: {} image(s) via {}",
            records.len(),
            detector.name()
        );
        std::thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || {
                let mut report = DetectionReport {
                    requested: records.len(),
                    ..DetectionReport::default()
                };
                for record in records {
                    if cancel.load(Ordering::SeqCst) {
                        log::info!("🤖 Detection batch cancelled");
                        report.cancelled = true;
                        break;
                    }
                    let pixels = match cache.acquire(&record) {
                        Ok(pixels) => pixels,
                        Err(e) => {
                            log::warn!("🤖 Skipping image {}: {}", record.id, e);
                            report.failures += 1;
                            let _ = tx.send(DetectionEvent::ImageFailed {
                                image_id: record.id,
                                message: e.to_string(),
                            });
                            continue;
                        }
                    };
                    let result = detector.detect(&record, &pixels);
                    drop(pixels);
                    if let Err(e) = cache.release(record.id) {
                        log::warn!("🤖 Release after inference failed: {}", e);
                    }
                    match result {
                        Ok(detections) => {
                            let kept: Vec<RawDetection> = detections
                                .into_iter()
                                .filter(|d| d.confidence >= threshold)
                                .collect();
                            report.processed += 1;
                            report.proposals += kept.len();
                            let _ = tx.send(DetectionEvent::Proposals {
                                image_id: record.id,
                                detections: kept,
                            });
                        }
                        Err(EngineError::DetectionUnavailable { message }) => {
                            log::warn!("🤖 Detector unavailable: {}", message);
                            let _ = tx.send(DetectionEvent::Unavailable { message });
                            break;
                        }
                        Err(e) => {
                            log::warn!("🤖 Inference failed on image {}: {}", record.id, e);
                            report.failures += 1;
                            let _ = tx.send(DetectionEvent::ImageFailed {
                                image_id: record.id,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                log::info!(
                    "🤖 Detection batch finished: {}/{} processed, {} proposal(s), {} failure(s)",
                    report.processed,
                    report.requested,
                    report.proposals,
                    report.failures
                );
                let _ = tx.send(DetectionEvent::Finished(report));
            })
            .expect("failed to spawn detection worker");
        rx
    }
}

// ============================================================================
// Merging detections into the store
// ============================================================================

/// What happened to each detection during a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Ids of the proposals that were added, in insertion order.
    pub added: Vec<AnnotationId>,
    /// Detections dropped for overlapping an existing same-class box.
    pub skipped_duplicates: usize,
    /// Detections dropped for degenerate geometry after clamping.
    pub skipped_invalid: usize,
}

/// Merge raw detections into the store as `Proposed` annotations.
///
/// Additive by construction: existing annotations are never modified or
/// removed, whatever the detector returns. Boxes are clamped to the image
/// first; a detection that collapses to zero area is skipped, as is one whose
/// IoU with an existing box of the same class reaches `duplicate_iou`. All
/// insertions of one call form a single undo step.
pub fn merge_proposals(
    store: &mut AnnotationStore,
    undo: &mut UndoStack,
    image_id: ImageId,
    detections: &[RawDetection],
    duplicate_iou: Option<f64>,
) -> Result<MergeOutcome> {
    let record = store
        .image(image_id)
        .ok_or(EngineError::UnknownImage { id: image_id })?;
    let (width, height) = (record.width, record.height);

    let mut existing: Vec<(u32, BoundingBox)> = store
        .annotations_for(image_id)
        .into_iter()
        .map(|a| (a.class_id, a.bbox))
        .collect();

    let mut outcome = MergeOutcome::default();
    let mut commands = Vec::new();
    for detection in detections {
        let bbox = detection.bbox.clamp_to(width, height);
        if !bbox.is_finite() || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            log::debug!(
                "🤖 Skipping degenerate detection on image {}: {:?}",
                image_id,
                detection.bbox
            );
            outcome.skipped_invalid += 1;
            continue;
        }
        if let Some(threshold) = duplicate_iou {
            let duplicate = existing
                .iter()
                .any(|(class_id, other)| *class_id == detection.class_id && iou(&bbox, other) >= threshold);
            if duplicate {
                outcome.skipped_duplicates += 1;
                continue;
            }
        }
        let id = store.add_proposed(image_id, detection.class_id, bbox, detection.confidence)?;
        existing.push((detection.class_id, bbox));
        outcome.added.push(id);
        if let Some(annotation) = store.get(id) {
            commands.push(Command::AddBox {
                annotation: annotation.clone(),
            });
        }
    }

    if !commands.is_empty() {
        record_command(
            undo,
            Command::Batch {
                description: format!("Merge {} detection(s)", commands.len()),
                commands,
            },
        );
    }
    log::info!(
        "🤖 Merged {} proposal(s) into image {} ({} duplicate, {} invalid)",
        outcome.added.len(),
        image_id,
        outcome.skipped_duplicates,
        outcome.skipped_invalid
    );
    Ok(outcome)
}

// ============================================================================
// Review decisions
// ============================================================================

/// Accept one proposal, retagging it `Accepted`. Undoable.
pub fn accept_proposal(
    store: &mut AnnotationStore,
    undo: &mut UndoStack,
    id: AnnotationId,
) -> Result<()> {
    require_proposed(store, id)?;
    let old = store.set_origin(id, AnnotationOrigin::Accepted)?;
    record_command(
        undo,
        Command::SetOrigin {
            annotation_id: id,
            old_origin: old,
            new_origin: AnnotationOrigin::Accepted,
        },
    );
    Ok(())
}

/// Reject one proposal, removing it from the store. Undoable.
pub fn reject_proposal(
    store: &mut AnnotationStore,
    undo: &mut UndoStack,
    id: AnnotationId,
) -> Result<()> {
    require_proposed(store, id)?;
    let annotation = store
        .remove(id)
        .ok_or(EngineError::UnknownAnnotation { id })?;
    record_command(undo, Command::RemoveBox { annotation });
    Ok(())
}

/// Accept every open proposal on one image as a single undo step.
///
/// Returns the number of proposals accepted.
pub fn accept_all(
    store: &mut AnnotationStore,
    undo: &mut UndoStack,
    image_id: ImageId,
) -> Result<usize> {
    let ids: Vec<AnnotationId> = store.proposals_for(image_id).iter().map(|a| a.id).collect();
    let mut commands = Vec::new();
    for id in &ids {
        let old = store.set_origin(*id, AnnotationOrigin::Accepted)?;
        commands.push(Command::SetOrigin {
            annotation_id: *id,
            old_origin: old,
            new_origin: AnnotationOrigin::Accepted,
        });
    }
    let count = commands.len();
    if count > 0 {
        record_command(
            undo,
            Command::Batch {
                description: format!("Accept {count} detection(s)"),
                commands,
            },
        );
    }
    Ok(count)
}

/// Reject every open proposal on one image as a single undo step.
///
/// Returns the number of proposals removed.
pub fn reject_all(
    store: &mut AnnotationStore,
    undo: &mut UndoStack,
    image_id: ImageId,
) -> Result<usize> {
    let ids: Vec<AnnotationId> = store.proposals_for(image_id).iter().map(|a| a.id).collect();
    let mut commands = Vec::new();
    for id in &ids {
        let annotation = store
            .remove(*id)
            .ok_or(EngineError::UnknownAnnotation { id: *id })?;
        commands.push(Command::RemoveBox { annotation });
    }
    let count = commands.len();
    if count > 0 {
        record_command(
            undo,
            Command::Batch {
                description: format!("Reject {count} detection(s)"),
                commands,
            },
        );
    }
    Ok(count)
}

fn require_proposed(store: &AnnotationStore, id: AnnotationId) -> Result<()> {
    let annotation = store
        .get(id)
        .ok_or(EngineError::UnknownAnnotation { id })?;
    if !annotation.origin.is_proposed() {
        return Err(EngineError::invalid_state(format!(
            "annotation {id} is {}, not an open proposal",
            annotation.origin.name()
        )));
    }
    Ok(())
}

/// Intersection-over-union of two boxes. Degenerate inputs yield 0.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let ix_min = a.x_min.max(b.x_min);
    let iy_min = a.y_min.max(b.y_min);
    let ix_max = a.x_max.min(b.x_max);
    let iy_max = a.y_max.min(b.y_max);
    let intersection = (ix_max - ix_min).max(0.0) * (iy_max - iy_min).max(0.0);
    if intersection <= 0.0 {
        return 0.0;
    }
    let union = a.area() + b.area() - intersection;
    if union <= 0.0 { 0.0 } else { intersection / union }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use crate::cache::ImageDecoder;
    use crate::model::Fingerprint;
    use crate::undo::undo_command;

    /// Fabricates pixels so detection tests never touch the disk.
    struct FakeDecoder;

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, path: &Path) -> Result<DecodedImage> {
            if path.to_string_lossy().contains("broken") {
                return Err(EngineError::decode(path, "fake decode failure"));
            }
            Ok(DecodedImage {
                width: 100,
                height: 100,
                pixels: vec![0; 100 * 100 * 4],
            })
        }
    }

    /// Scripted detector returning canned boxes per image id.
    struct MockDetector {
        responses: Mutex<HashMap<ImageId, Vec<RawDetection>>>,
        available: bool,
    }

    impl MockDetector {
        fn with_responses(responses: HashMap<ImageId, Vec<RawDetection>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                available: true,
            }
        }

        fn unavailable() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                available: false,
            }
        }
    }

    impl Detector for MockDetector {
        fn detect(&self, record: &ImageRecord, _pixels: &DecodedImage) -> Result<Vec<RawDetection>> {
            if !self.available {
                return Err(EngineError::detection_unavailable("model not loaded"));
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .get(&record.id)
                .cloned()
                .unwrap_or_default())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    /// Route worker logs through the test harness when RUST_LOG is set.
    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn detection(class_id: u32, bbox: BoundingBox, confidence: f64) -> RawDetection {
        RawDetection {
            class_id,
            bbox,
            confidence,
        }
    }

    fn record(id: u64, name: &str) -> ImageRecord {
        ImageRecord::new(id, format!("/frames/{name}"), 100, 100, Fingerprint::new(id, id))
    }

    fn bridge_with(responses: HashMap<ImageId, Vec<RawDetection>>) -> DetectionBridge {
        let cache = Arc::new(ImageCache::new(64 * 1024 * 1024, 1, Arc::new(FakeDecoder)));
        DetectionBridge::new(Arc::new(MockDetector::with_responses(responses)), cache)
    }

    fn drain(rx: Receiver<DetectionEvent>) -> Vec<DetectionEvent> {
        rx.iter().collect()
    }

    #[test]
    fn test_predict_batch_filters_by_confidence() {
        init_logs();
        let mut responses = HashMap::new();
        responses.insert(
            1,
            vec![
                detection(0, BoundingBox::new(10.0, 10.0, 30.0, 30.0), 0.9),
                detection(1, BoundingBox::new(40.0, 40.0, 60.0, 60.0), 0.2),
            ],
        );
        let bridge = bridge_with(responses);

        let rx = bridge.predict_batch(
            vec![record(1, "a.png")],
            0.5,
            Arc::new(AtomicBool::new(false)),
        );
        let events = drain(rx);

        let Some(DetectionEvent::Proposals { detections, .. }) = events.first() else {
            panic!("expected a proposals event, got {events:?}");
        };
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.9);

        let Some(DetectionEvent::Finished(report)) = events.last() else {
            panic!("expected a finished event");
        };
        assert_eq!(report.processed, 1);
        assert_eq!(report.proposals, 1);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_predict_batch_continues_past_decode_failure() {
        init_logs();
        let mut responses = HashMap::new();
        responses.insert(2, vec![detection(0, BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9)]);
        let bridge = bridge_with(responses);

        let rx = bridge.predict_batch(
            vec![record(1, "broken.png"), record(2, "ok.png")],
            0.5,
            Arc::new(AtomicBool::new(false)),
        );
        let events = drain(rx);

        assert!(matches!(
            events[0],
            DetectionEvent::ImageFailed { image_id: 1, .. }
        ));
        assert!(matches!(
            events[1],
            DetectionEvent::Proposals { image_id: 2, .. }
        ));
        let Some(DetectionEvent::Finished(report)) = events.last() else {
            panic!("expected a finished event");
        };
        assert_eq!(report.failures, 1);
        assert_eq!(report.processed, 1);
    }

    #[test]
    fn test_predict_batch_stops_when_detector_unavailable() {
        init_logs();
        let cache = Arc::new(ImageCache::new(64 * 1024 * 1024, 1, Arc::new(FakeDecoder)));
        let bridge = DetectionBridge::new(Arc::new(MockDetector::unavailable()), cache);

        let rx = bridge.predict_batch(
            vec![record(1, "a.png"), record(2, "b.png")],
            DEFAULT_CONFIDENCE_THRESHOLD,
            Arc::new(AtomicBool::new(false)),
        );
        let events = drain(rx);

        assert!(matches!(events[0], DetectionEvent::Unavailable { .. }));
        let Some(DetectionEvent::Finished(report)) = events.last() else {
            panic!("expected a finished event");
        };
        // The batch stopped at the first image; the second was never tried.
        assert_eq!(report.processed, 0);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_predict_batch_honors_cancel_token() {
        init_logs();
        let bridge = bridge_with(HashMap::new());
        let cancel = Arc::new(AtomicBool::new(true));

        let rx = bridge.predict_batch(vec![record(1, "a.png")], 0.5, cancel);
        let events = drain(rx);

        let Some(DetectionEvent::Finished(report)) = events.last() else {
            panic!("expected a finished event");
        };
        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
    }

    // ------------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------------

    fn store_with_image() -> (AnnotationStore, ImageId) {
        let mut store = AnnotationStore::new();
        let image_id = store.register_image("/frames/a.png", 100, 100, Fingerprint::new(1, 1));
        (store, image_id)
    }

    #[test]
    fn test_merge_never_touches_manual_annotations() {
        let (mut store, image_id) = store_with_image();
        let mut undo = UndoStack::new();
        let manual_box = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        let manual_id = store.add_manual(image_id, 0, manual_box).unwrap();

        // One detection right on top of the manual box (same class, filtered
        // as duplicate) and one elsewhere (different class, kept).
        let outcome = merge_proposals(
            &mut store,
            &mut undo,
            image_id,
            &[
                detection(0, BoundingBox::new(11.0, 11.0, 51.0, 51.0), 0.9),
                detection(1, BoundingBox::new(60.0, 60.0, 90.0, 90.0), 0.8),
            ],
            Some(DEFAULT_DUPLICATE_IOU),
        )
        .unwrap();

        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.skipped_duplicates, 1);

        let manual = store.get(manual_id).unwrap();
        assert_eq!(manual.bbox, manual_box);
        assert_eq!(manual.origin, AnnotationOrigin::Manual);

        // Undoing the merge removes the proposals and nothing else.
        assert!(undo_command(&mut undo, &mut store));
        assert_eq!(store.len(), 1);
        assert!(store.get(manual_id).is_some());
    }

    #[test]
    fn test_merge_clamps_and_skips_degenerate() {
        let (mut store, image_id) = store_with_image();
        let mut undo = UndoStack::new();

        let outcome = merge_proposals(
            &mut store,
            &mut undo,
            image_id,
            &[
                // Partially outside: clamped and kept.
                detection(0, BoundingBox::new(-10.0, -10.0, 50.0, 50.0), 0.9),
                // Entirely outside: collapses to zero area, skipped.
                detection(0, BoundingBox::new(200.0, 200.0, 300.0, 300.0), 0.9),
            ],
            None,
        )
        .unwrap();

        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.skipped_invalid, 1);
        let added = store.get(outcome.added[0]).unwrap();
        assert_eq!(added.bbox, BoundingBox::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(added.origin, AnnotationOrigin::Proposed);
    }

    #[test]
    fn test_merge_dedups_within_batch() {
        let (mut store, image_id) = store_with_image();
        let mut undo = UndoStack::new();

        // Two near-identical detections in one batch: only the first lands.
        let outcome = merge_proposals(
            &mut store,
            &mut undo,
            image_id,
            &[
                detection(2, BoundingBox::new(10.0, 10.0, 40.0, 40.0), 0.9),
                detection(2, BoundingBox::new(11.0, 10.0, 41.0, 40.0), 0.8),
            ],
            Some(0.5),
        )
        .unwrap();

        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.skipped_duplicates, 1);
    }

    #[test]
    fn test_merge_unknown_image_is_rejected() {
        let mut store = AnnotationStore::new();
        let mut undo = UndoStack::new();
        let result = merge_proposals(&mut store, &mut undo, 42, &[], None);
        assert!(matches!(result, Err(EngineError::UnknownImage { id: 42 })));
    }

    // ------------------------------------------------------------------------
    // Review
    // ------------------------------------------------------------------------

    fn store_with_proposals(count: usize) -> (AnnotationStore, ImageId, Vec<AnnotationId>) {
        let (mut store, image_id) = store_with_image();
        let ids = (0..count)
            .map(|i| {
                let offset = i as f64 * 20.0;
                store
                    .add_proposed(
                        image_id,
                        0,
                        BoundingBox::new(offset, 0.0, offset + 10.0, 10.0),
                        0.8,
                    )
                    .unwrap()
            })
            .collect();
        (store, image_id, ids)
    }

    #[test]
    fn test_accept_proposal_round_trips_through_undo() {
        let (mut store, _, ids) = store_with_proposals(1);
        let mut undo = UndoStack::new();

        accept_proposal(&mut store, &mut undo, ids[0]).unwrap();
        assert_eq!(store.get(ids[0]).unwrap().origin, AnnotationOrigin::Accepted);

        assert!(undo_command(&mut undo, &mut store));
        assert_eq!(store.get(ids[0]).unwrap().origin, AnnotationOrigin::Proposed);
    }

    #[test]
    fn test_reject_proposal_restores_on_undo() {
        let (mut store, _, ids) = store_with_proposals(1);
        let mut undo = UndoStack::new();
        let before = store.get(ids[0]).unwrap().clone();

        reject_proposal(&mut store, &mut undo, ids[0]).unwrap();
        assert!(store.get(ids[0]).is_none());

        assert!(undo_command(&mut undo, &mut store));
        assert_eq!(store.get(ids[0]), Some(&before));
    }

    #[test]
    fn test_review_rejects_non_proposals() {
        let (mut store, image_id) = store_with_image();
        let mut undo = UndoStack::new();
        let manual = store
            .add_manual(image_id, 0, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .unwrap();

        let result = accept_proposal(&mut store, &mut undo, manual);
        assert!(matches!(result, Err(EngineError::InvalidState { .. })));
        let result = reject_proposal(&mut store, &mut undo, manual);
        assert!(matches!(result, Err(EngineError::InvalidState { .. })));
        assert!(store.get(manual).is_some());
        assert_eq!(undo.undo_count(), 0);
    }

    #[test]
    fn test_accept_all_is_one_undo_step() {
        let (mut store, image_id, ids) = store_with_proposals(3);
        let mut undo = UndoStack::new();

        let accepted = accept_all(&mut store, &mut undo, image_id).unwrap();
        assert_eq!(accepted, 3);
        assert!(store.proposals_for(image_id).is_empty());
        assert_eq!(undo.undo_count(), 1);

        assert!(undo_command(&mut undo, &mut store));
        assert_eq!(store.proposals_for(image_id).len(), ids.len());
    }

    #[test]
    fn test_reject_all_is_one_undo_step() {
        let (mut store, image_id, _) = store_with_proposals(3);
        let mut undo = UndoStack::new();
        let manual = store
            .add_manual(image_id, 0, BoundingBox::new(90.0, 90.0, 99.0, 99.0))
            .unwrap();

        let rejected = reject_all(&mut store, &mut undo, image_id).unwrap();
        assert_eq!(rejected, 3);
        assert_eq!(store.len(), 1);
        assert!(store.get(manual).is_some());

        assert!(undo_command(&mut undo, &mut store));
        assert_eq!(store.proposals_for(image_id).len(), 3);
    }

    // ------------------------------------------------------------------------
    // IoU
    // ------------------------------------------------------------------------

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 2.0, 1.0);
        let b = BoundingBox::new(1.0, 0.0, 3.0, 1.0);
        // Intersection 1, union 3.
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_touching_edges_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(iou(&a, &b), 0.0);
    }
}
