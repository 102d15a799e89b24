//! OCR Relay
//!
//! Front door for recognition requests. Every submission is
//! fingerprinted and answered from the result cache when possible;
//! misses are buffered and drained by a single worker task, so at most
//! one engine invocation is ever in flight. Completion callbacks fire
//! on the drain task (or synchronously on the submitting thread for
//! cache hits); callers that need them on a specific thread hop via
//! [`crate::dispatch`].

pub mod queue;

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::engine::{EngineError, Recognition, RecognitionEngine};
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::frame::Frame;
use crate::relay::queue::PendingQueue;

/// Completion callback for one submission
pub type RecognizeCallback = Box<dyn FnOnce(Result<Recognition, EngineError>) + Send + 'static>;

/// Broadcast capacity; lagging subscribers lose oldest events first
const EVENT_CAPACITY: usize = 64;

/// How a submission was admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Answered synchronously from the cache; the callback already ran
    CacheHit,
    /// Buffered behind `depth` earlier requests
    Queued { depth: usize },
}

/// Why a submission was refused
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Input frame is empty")]
    EmptyInput,

    #[error("Recognition engine is not ready")]
    EngineNotReady,

    #[error("Relay is closed")]
    Closed,
}

/// Completion notification fanned out to subscribers
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A submission resolved with a result
    Completed {
        fingerprint: Fingerprint,
        recognition: Recognition,
        from_cache: bool,
    },
    /// A queued submission failed in the engine
    Failed {
        fingerprint: Fingerprint,
        error: String,
    },
}

/// A buffered recognition request
struct QueuedRequest {
    frame: Frame,
    fingerprint: Fingerprint,
    callback: RecognizeCallback,
}

struct Shared {
    engine: Arc<dyn RecognitionEngine>,
    cache: Mutex<ResultCache>,
    queue: Mutex<PendingQueue<QueuedRequest>>,
    last_result: Mutex<Option<Recognition>>,
    closed: AtomicBool,
    events: broadcast::Sender<RelayEvent>,
    // Mirrors queue idleness; flipped under the queue lock so watchers
    // never observe a stale idle.
    idle_tx: watch::Sender<bool>,
}

/// Handle to the relay; clones share one cache, queue, and worker
#[derive(Clone)]
pub struct OcrRelay {
    inner: Arc<Shared>,
}

impl OcrRelay {
    pub fn new(engine: Arc<dyn RecognitionEngine>, cache: ResultCache) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (idle_tx, _) = watch::channel(true);

        info!(
            "OCR relay ready (engine: {}, {} cached results)",
            engine.name(),
            cache.len()
        );

        Self {
            inner: Arc::new(Shared {
                engine,
                cache: Mutex::new(cache),
                queue: Mutex::new(PendingQueue::new()),
                last_result: Mutex::new(None),
                closed: AtomicBool::new(false),
                events,
                idle_tx,
            }),
        }
    }

    /// Submit a frame for recognition.
    ///
    /// Cache hits resolve synchronously: the callback runs before this
    /// returns, ahead of any misses still buffered, and without needing
    /// the engine. Misses are buffered and drained one at a time on a
    /// background task, which requires a Tokio runtime on the calling
    /// thread.
    pub fn recognize<F>(&self, frame: Frame, callback: F) -> Result<Submission, SubmitError>
    where
        F: FnOnce(Result<Recognition, EngineError>) + Send + 'static,
    {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SubmitError::Closed);
        }
        if frame.is_empty() {
            warn!("Rejecting empty frame");
            return Err(SubmitError::EmptyInput);
        }

        let fingerprint = fingerprint(&frame.data);

        // Hits bypass the queue entirely, so they keep working while
        // the engine is busy or unavailable.
        let hit = self.inner.cache.lock().try_get(&fingerprint).cloned();
        if let Some(recognition) = hit {
            debug!("Cache hit for {}", fingerprint);
            *self.inner.last_result.lock() = Some(recognition.clone());
            callback(Ok(recognition.clone()));
            let _ = self.inner.events.send(RelayEvent::Completed {
                fingerprint,
                recognition,
                from_cache: true,
            });
            return Ok(Submission::CacheHit);
        }

        if !self.inner.engine.is_ready() {
            return Err(SubmitError::EngineNotReady);
        }

        let request = QueuedRequest {
            frame,
            fingerprint,
            callback: Box::new(callback),
        };

        let (start_drain, depth) = {
            let mut queue = self.inner.queue.lock();
            let start_drain = queue.push(request);
            if start_drain {
                self.inner.idle_tx.send_replace(false);
            }
            (start_drain, queue.len() - 1)
        };

        if depth > 0 {
            debug!("Request queued behind {} others", depth);
        }
        if start_drain {
            tokio::spawn(drain(self.inner.clone()));
        }

        Ok(Submission::Queued { depth })
    }

    /// Enable or disable cache lookups and writes. Entries already in
    /// memory are kept across toggles.
    pub fn set_cache_enabled(&self, enabled: bool) {
        self.inner.cache.lock().set_enabled(enabled);
        info!(
            "Result cache {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Drop every cached entry and delete the store file.
    pub fn clear_cache(&self) {
        self.inner.cache.lock().clear();
        info!("Result cache cleared");
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Most recent successful recognition, from either source.
    pub fn last_result(&self) -> Option<Recognition> {
        self.inner.last_result.lock().clone()
    }

    /// Number of buffered requests not yet handed to the engine.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Subscribe to completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.inner.events.subscribe()
    }

    /// Stop accepting submissions; already-buffered requests still
    /// drain to completion.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!(
                "Relay closed; {} queued requests will still drain",
                self.pending()
            );
        }
    }

    /// Stop accepting submissions and drop everything still buffered.
    ///
    /// The in-flight request, if any, still completes. Returns how
    /// many buffered requests were discarded; their callbacks never
    /// run.
    pub fn close_now(&self) -> usize {
        self.close();
        let discarded = self.inner.queue.lock().discard_pending();
        if discarded > 0 {
            warn!("Discarded {} queued requests", discarded);
        }
        discarded
    }

    /// Wait until no request is buffered or in flight.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle_tx.subscribe();
        // wait_for returns immediately when the relay is already idle
        let _ = idle.wait_for(|is_idle| *is_idle).await;
    }
}

/// Single-worker drain loop. Runs until the buffer empties, then
/// releases the claim and reports the relay idle.
async fn drain(shared: Arc<Shared>) {
    debug!("Drain worker started");
    loop {
        let request = {
            let mut queue = shared.queue.lock();
            let request = queue.pop_or_finish();
            if request.is_none() {
                shared.idle_tx.send_replace(true);
            }
            request
        };

        let Some(request) = request else {
            debug!("Drain worker finished");
            return;
        };

        process(&shared, request).await;
    }
}

/// Run one buffered request through the engine and deliver the outcome.
///
/// On success the cache entry is written before the callback runs, so
/// a resubmission from inside the callback already hits.
async fn process(shared: &Shared, request: QueuedRequest) {
    let QueuedRequest {
        frame,
        fingerprint,
        callback,
    } = request;

    let outcome = shared
        .engine
        .recognize(&frame.data, frame.width, frame.height)
        .await;

    match outcome {
        Ok(recognition) => {
            shared
                .cache
                .lock()
                .put(fingerprint.clone(), recognition.clone());
            *shared.last_result.lock() = Some(recognition.clone());
            debug!(
                "Recognition complete for {} ({} words)",
                fingerprint,
                recognition.word_boxes.len()
            );
            callback(Ok(recognition.clone()));
            let _ = shared.events.send(RelayEvent::Completed {
                fingerprint,
                recognition,
                from_cache: false,
            });
        }
        Err(error) => {
            warn!("Recognition failed for {}: {}", fingerprint, error);
            let message = error.to_string();
            callback(Err(error));
            let _ = shared.events.send(RelayEvent::Failed {
                fingerprint,
                error: message,
            });
        }
    }
}
