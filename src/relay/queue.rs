//! Pending Request Queue
//!
//! FIFO buffer coupled to the claim flag that enforces the
//! single-worker rule. The buffer and the flag change together under
//! one lock held by the caller, so "queue went empty" and "worker
//! released" are a single atomic transition.

use std::collections::VecDeque;

/// FIFO queue with a single-drainer claim.
///
/// `push` tells the caller whether it has claimed the drain; exactly
/// one claim is outstanding until `pop_or_finish` observes an empty
/// buffer and releases it.
#[derive(Debug)]
pub struct PendingQueue<T> {
    items: VecDeque<T>,
    draining: bool,
}

impl<T> PendingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            draining: false,
        }
    }

    /// Enqueue an item. Returns true when the caller must start a
    /// drain worker, false while a worker is already claimed.
    pub fn push(&mut self, item: T) -> bool {
        self.items.push_back(item);
        if self.draining {
            false
        } else {
            self.draining = true;
            true
        }
    }

    /// Take the next item, or release the drain claim when the buffer
    /// is empty.
    ///
    /// `None` means the worker must stop; the claim is already
    /// released, so a later `push` starts a fresh worker.
    pub fn pop_or_finish(&mut self) -> Option<T> {
        match self.items.pop_front() {
            Some(item) => Some(item),
            None => {
                self.draining = false;
                None
            }
        }
    }

    /// Drop all buffered items, returning how many were discarded.
    ///
    /// The drain claim is untouched; an active worker still finishes
    /// its in-flight item and releases the claim itself.
    pub fn discard_pending(&mut self) -> usize {
        let discarded = self.items.len();
        self.items.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Idle means nothing buffered and no worker claimed.
    pub fn is_idle(&self) -> bool {
        self.items.is_empty() && !self.draining
    }
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
