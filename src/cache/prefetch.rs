//! Background prefetch workers.
//!
//! A small pool of threads decodes upcoming images ahead of navigation so the
//! foreground never waits on disk for the common next/previous step. Each
//! [`PrefetchPool::submit`] call carries a batch token; submitting a new batch
//! flips the previous token so stale jobs drain without decoding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use super::CacheState;
use crate::cache::decoder::ImageDecoder;
use crate::model::ImageRecord;

/// Indices to prefetch around `current`: nearest first, alternating forward
/// and backward, wrapping at both ends. `current` itself is excluded.
pub fn prefetch_order(current: usize, len: usize, window: usize) -> Vec<usize> {
    let mut order = Vec::new();
    if len <= 1 || window == 0 {
        return order;
    }
    let current = current % len;
    for step in 1..=window.min(len - 1) {
        let next = (current + step) % len;
        if next != current && !order.contains(&next) {
            order.push(next);
        }
        let prev = (current + len - step) % len;
        if prev != current && !order.contains(&prev) {
            order.push(prev);
        }
    }
    order
}

struct PrefetchJob {
    record: ImageRecord,
    token: Arc<AtomicBool>,
}

/// Fixed pool of decode workers fed over a channel.
///
/// Dropping the pool closes the channel and joins every worker.
pub(crate) struct PrefetchPool {
    tx: Option<Sender<PrefetchJob>>,
    workers: Vec<JoinHandle<()>>,
    current_batch: Mutex<Arc<AtomicBool>>,
}

impl PrefetchPool {
    pub(crate) fn new(
        worker_count: usize,
        state: Arc<Mutex<CacheState>>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<PrefetchJob>();
        let workers = (0..worker_count.max(1))
            .map(|i| {
                let rx = rx.clone();
                let state = Arc::clone(&state);
                let decoder = Arc::clone(&decoder);
                std::thread::Builder::new()
                    .name(format!("prefetch-{i}"))
                    .spawn(move || worker_loop(rx, state, decoder))
                    .expect("failed to spawn prefetch worker")
            })
            .collect();
        Self {
            tx: Some(tx),
            workers,
            current_batch: Mutex::new(Arc::new(AtomicBool::new(false))),
        }
    }

    /// Queue a batch, cancelling whatever batch came before it.
    pub(crate) fn submit(&self, records: Vec<ImageRecord>) {
        let token = Arc::new(AtomicBool::new(false));
        {
            let mut current = self.current_batch.lock().unwrap();
            current.store(true, Ordering::SeqCst);
            *current = Arc::clone(&token);
        }
        if let Some(tx) = &self.tx {
            for record in records {
                let job = PrefetchJob {
                    record,
                    token: Arc::clone(&token),
                };
                if tx.send(job).is_err() {
                    break;
                }
            }
        }
    }

    /// Flip the current batch token so queued jobs drain without decoding.
    pub(crate) fn cancel(&self) {
        let current = self.current_batch.lock().unwrap();
        current.store(true, Ordering::SeqCst);
    }
}

impl Drop for PrefetchPool {
    fn drop(&mut self) {
        self.cancel();
        // Closing the channel lets each worker's receive loop end.
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    rx: Receiver<PrefetchJob>,
    state: Arc<Mutex<CacheState>>,
    decoder: Arc<dyn ImageDecoder>,
) {
    for job in rx.iter() {
        if job.token.load(Ordering::SeqCst) {
            continue;
        }
        if state.lock().unwrap().has_fresh(&job.record) {
            continue;
        }
        let decoded = match decoder.decode(&job.record.path) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("🖼️ Prefetch failed for {:?}: {}", job.record.path, e);
                continue;
            }
        };
        // Re-check after the decode: the batch may have been superseded, or a
        // foreground acquire may have landed the same image already.
        if job.token.load(Ordering::SeqCst) {
            continue;
        }
        let mut state = state.lock().unwrap();
        if state.entries.contains_key(&job.record.id) {
            continue;
        }
        state.insert(&job.record, Arc::new(decoded), 0);
        log::debug!("🖼️ Prefetched image {}", job.record.id);
    }
}
