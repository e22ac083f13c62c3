//! Bounded, drop-oldest chunk queue shared by the capture callbacks and the engine.

use super::AudioChunk;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A bounded FIFO of [`AudioChunk`]s.
///
/// `push` never blocks: when the queue is full the oldest chunk is discarded.
/// Producers run on audio callback threads, so the lock is held only for a
/// `VecDeque` operation.
pub struct ChunkQueue {
    inner: Mutex<VecDeque<AudioChunk>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AudioChunk>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue a chunk. Returns `false` if an older chunk had to be dropped.
    pub fn push(&self, chunk: AudioChunk) -> bool {
        let mut queue = self.lock();
        let mut kept_all = true;
        while queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            kept_all = false;
        }
        queue.push_back(chunk);
        drop(queue);
        self.available.notify_one();
        kept_all
    }

    /// Dequeue without waiting.
    pub fn try_pop(&self) -> Option<AudioChunk> {
        self.lock().pop_front()
    }

    /// Dequeue, waiting up to `timeout` for a chunk to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioChunk> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if let Some(chunk) = queue.pop_front() {
                return Some(chunk);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            queue = self
                .available
                .wait_timeout(queue, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Discard every queued chunk.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Chunks discarded on overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new(super::QUEUE_CAPACITY)
    }
}
