//! Memory-budgeted cache of decoded images.
//!
//! Decoded pixels are expensive, so the cache keeps them under an advisory
//! byte budget and evicts in strict least-recently-used order. Only entries
//! that are neither pinned nor currently referenced are eviction candidates;
//! when nothing can be evicted the cache overshoots the budget and logs the
//! pressure rather than failing the caller.
//!
//! Callers hold pixels through [`PixelView`] handles obtained from
//! [`ImageCache::acquire`] and must pair each acquire with a
//! [`ImageCache::release`]. Entries are keyed by image id and validated
//! against the record's content fingerprint, so a file rewritten on disk is
//! re-decoded instead of served stale.

pub mod decoder;
pub mod prefetch;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{EngineError, Result};
use crate::model::{Fingerprint, ImageId, ImageRecord};

pub use decoder::{DecodedImage, IMAGE_EXTENSIONS, ImageDecoder, RgbaDecoder, is_image_file};
pub use prefetch::prefetch_order;

use prefetch::PrefetchPool;

/// Shared read-only handle to a decoded pixel buffer.
pub type PixelView = Arc<DecodedImage>;

/// Default memory budget for decoded pixels: 512 MiB.
pub const DEFAULT_MEMORY_BUDGET: usize = 512 * 1024 * 1024;

/// Default number of background prefetch workers.
pub const DEFAULT_PREFETCH_WORKERS: usize = 2;

/// Default prefetch window: neighbors fetched on each side of the current
/// image.
pub const DEFAULT_PREFETCH_WINDOW: usize = 2;

/// One cached decode.
#[derive(Debug)]
struct CacheEntry {
    fingerprint: Fingerprint,
    pixels: PixelView,
    bytes: usize,
    last_access: u64,
    pinned: bool,
    refcount: usize,
}

/// Mutable cache innards, shared with the prefetch workers.
#[derive(Debug)]
struct CacheState {
    entries: HashMap<ImageId, CacheEntry>,
    used_bytes: usize,
    budget_bytes: usize,
    tick: u64,
}

impl CacheState {
    fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            used_bytes: 0,
            budget_bytes,
            tick: 0,
        }
    }

    /// Whether `record` is cached with a matching fingerprint.
    fn has_fresh(&self, record: &ImageRecord) -> bool {
        self.entries
            .get(&record.id)
            .map_or(false, |e| e.fingerprint == record.fingerprint)
    }

    /// Bump the access clock and take one reference on an existing entry.
    fn reference(&mut self, id: ImageId) -> PixelView {
        self.tick += 1;
        let tick = self.tick;
        let entry = self
            .entries
            .get_mut(&id)
            .expect("referenced cache entry must exist");
        entry.last_access = tick;
        entry.refcount += 1;
        Arc::clone(&entry.pixels)
    }

    /// Insert a freshly decoded buffer, evicting to make room first.
    fn insert(&mut self, record: &ImageRecord, pixels: PixelView, refcount: usize) {
        let bytes = pixels.byte_len();
        self.shrink_to(self.budget_bytes.saturating_sub(bytes));
        if self.used_bytes + bytes > self.budget_bytes {
            log::warn!(
                "🖼️ Memory pressure: {} bytes cached + {} incoming exceeds budget of {} bytes",
                self.used_bytes,
                bytes,
                self.budget_bytes
            );
        }
        self.tick += 1;
        self.used_bytes += bytes;
        let old = self.entries.insert(
            record.id,
            CacheEntry {
                fingerprint: record.fingerprint,
                pixels,
                bytes,
                last_access: self.tick,
                pinned: false,
                refcount,
            },
        );
        if let Some(old) = old {
            self.used_bytes -= old.bytes;
        }
    }

    fn remove_entry(&mut self, id: ImageId) -> Option<CacheEntry> {
        let entry = self.entries.remove(&id);
        if let Some(entry) = &entry {
            self.used_bytes -= entry.bytes;
        }
        entry
    }

    /// Evict unpinned, unreferenced entries (oldest first) until usage is at
    /// or below `target`, or no candidate remains.
    fn shrink_to(&mut self, target: usize) {
        while self.used_bytes > target {
            if !self.evict_one() {
                break;
            }
        }
    }

    /// Evict the least recently used entry that is neither pinned nor
    /// referenced. Returns false when no entry qualifies.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .filter(|(_, e)| e.refcount == 0 && !e.pinned)
            .min_by_key(|(_, e)| e.last_access)
            .map(|(id, _)| *id);
        match victim {
            Some(id) => {
                if let Some(entry) = self.remove_entry(id) {
                    log::debug!("🖼️ Evicted image {} ({} bytes)", id, entry.bytes);
                }
                true
            }
            None => false,
        }
    }
}

/// Thread-safe image cache with explicit lifetime control.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct ImageCache {
    state: Arc<Mutex<CacheState>>,
    decoder: Arc<dyn ImageDecoder>,
    pool: PrefetchPool,
}

impl ImageCache {
    /// Create a cache with the given budget, worker count, and decoder.
    pub fn new(
        memory_budget_bytes: usize,
        prefetch_workers: usize,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        let state = Arc::new(Mutex::new(CacheState::new(memory_budget_bytes)));
        let pool = PrefetchPool::new(prefetch_workers, Arc::clone(&state), Arc::clone(&decoder));
        Self {
            state,
            decoder,
            pool,
        }
    }

    /// Acquire decoded pixels for `record`, decoding on a miss.
    ///
    /// Every successful call takes one reference that must be returned with
    /// [`release`](Self::release). A cached entry whose fingerprint no longer
    /// matches the record is re-decoded; if such a stale entry is still
    /// referenced elsewhere the call fails with [`EngineError::Busy`].
    pub fn acquire(&self, record: &ImageRecord) -> Result<PixelView> {
        {
            let mut state = self.state.lock().unwrap();
            let cached = state
                .entries
                .get(&record.id)
                .map(|e| (e.fingerprint == record.fingerprint, e.refcount));
            match cached {
                Some((true, _)) => {
                    log::trace!("🖼️ Cache hit for image {}", record.id);
                    return Ok(state.reference(record.id));
                }
                Some((false, refs)) if refs > 0 => {
                    return Err(EngineError::busy(format!(
                        "stale pixels for image {} still have {} outstanding reference(s)",
                        record.id, refs
                    )));
                }
                Some((false, _)) => {
                    log::debug!("🖼️ Dropping stale cache entry for image {}", record.id);
                    state.remove_entry(record.id);
                }
                None => {}
            }
        }

        // Decode outside the lock so other readers are not stalled.
        let decoded = self.decoder.decode(&record.path)?;
        let pixels: PixelView = Arc::new(decoded);

        let mut state = self.state.lock().unwrap();
        if state.has_fresh(record) {
            // Another thread (or a prefetch worker) beat us to it.
            return Ok(state.reference(record.id));
        }
        state.insert(record, Arc::clone(&pixels), 1);
        Ok(pixels)
    }

    /// Return one reference taken by [`acquire`](Self::acquire).
    pub fn release(&self, id: ImageId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownImage { id })?;
        if entry.refcount == 0 {
            return Err(EngineError::invalid_state(format!(
                "release of image {id} without a matching acquire"
            )));
        }
        entry.refcount -= 1;
        Ok(())
    }

    /// Exclude a cached entry from eviction until unpinned.
    pub fn pin(&self, id: ImageId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownImage { id })?;
        entry.pinned = true;
        log::debug!("🖼️ Pinned image {}", id);
        Ok(())
    }

    /// Make a pinned entry evictable again.
    pub fn unpin(&self, id: ImageId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(EngineError::UnknownImage { id })?;
        entry.pinned = false;
        log::debug!("🖼️ Unpinned image {}", id);
        Ok(())
    }

    /// Queue background decodes for records not already cached fresh.
    ///
    /// Supersedes any batch queued earlier; superseded jobs that have not
    /// started are skipped.
    pub fn prefetch(&self, records: &[ImageRecord]) {
        let pending: Vec<ImageRecord> = {
            let state = self.state.lock().unwrap();
            records
                .iter()
                .filter(|r| !state.has_fresh(r))
                .cloned()
                .collect()
        };
        if pending.is_empty() {
            return;
        }
        log::debug!("🖼️ Prefetching {} image(s)", pending.len());
        self.pool.submit(pending);
    }

    /// Prefetch a window of images around `current`, nearest first.
    pub fn prefetch_window(&self, records: &[ImageRecord], current: usize, window: usize) {
        let batch: Vec<ImageRecord> = prefetch_order(current, records.len(), window)
            .into_iter()
            .map(|i| records[i].clone())
            .collect();
        self.prefetch(&batch);
    }

    /// Cancel any prefetch batch still in flight.
    pub fn cancel_prefetch(&self) {
        self.pool.cancel();
    }

    /// Replace the advisory byte budget and evict down towards it.
    pub fn set_memory_budget(&self, bytes: usize) {
        let mut state = self.state.lock().unwrap();
        state.budget_bytes = bytes;
        state.shrink_to(bytes);
        if state.used_bytes > state.budget_bytes {
            log::warn!(
                "🖼️ Memory pressure: {} bytes cached exceeds new budget of {} bytes",
                state.used_bytes,
                state.budget_bytes
            );
        }
        log::info!("🖼️ Memory budget set to {} bytes", bytes);
    }

    /// Drop a specific entry, pinned or not. Absent entries are a no-op.
    ///
    /// Fails with [`EngineError::Busy`] while the entry is referenced.
    pub fn invalidate(&self, id: ImageId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.entries.get(&id).map(|e| e.refcount) {
            None => Ok(()),
            Some(refs) if refs > 0 => Err(EngineError::busy(format!(
                "image {id} still has {refs} outstanding reference(s)"
            ))),
            Some(_) => {
                state.remove_entry(id);
                log::debug!("🖼️ Invalidated cached image {}", id);
                Ok(())
            }
        }
    }

    /// Whether an entry (fresh or stale) exists for `id`.
    pub fn contains(&self, id: ImageId) -> bool {
        self.state.lock().unwrap().entries.contains_key(&id)
    }

    /// Bytes of decoded pixels currently held.
    pub fn used_bytes(&self) -> usize {
        self.state.lock().unwrap().used_bytes
    }

    /// Current advisory budget in bytes.
    pub fn budget_bytes(&self) -> usize {
        self.state.lock().unwrap().budget_bytes
    }

    /// Number of cached entries.
    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_MEMORY_BUDGET,
            DEFAULT_PREFETCH_WORKERS,
            Arc::new(RgbaDecoder),
        )
    }
}
