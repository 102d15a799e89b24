//! Main-Loop Dispatch
//!
//! Hands completion work back to a designated thread. Relay callbacks
//! fire on the drain task; callers that must react on one particular
//! thread (a render loop, the CLI's tick loop) create a
//! [`MainLoopDispatcher`] on that thread, pass its handle into
//! callbacks, and drain once per tick. Ownership is explicit: the
//! owner holds the dispatcher, handles go anywhere.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::any::Any;
use tracing::{error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Owner side; lives on the designated thread and runs queued jobs
pub struct MainLoopDispatcher {
    jobs: Receiver<Job>,
    handle: DispatchHandle,
}

/// Sender side; cheap to clone and safe to use from any thread
#[derive(Clone)]
pub struct DispatchHandle {
    jobs: Sender<Job>,
}

impl MainLoopDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            jobs: rx,
            handle: DispatchHandle { jobs: tx },
        }
    }

    /// A handle for queueing work from other threads and tasks.
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Run queued jobs on the calling thread until the queue is empty,
    /// returning how many ran. A panicking job is reported and skipped;
    /// the drain continues with the next one.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.jobs.try_recv() {
            ran += 1;
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
                error!("Dispatched job panicked: {}", panic_message(payload.as_ref()));
            }
        }
        ran
    }
}

impl Default for MainLoopDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchHandle {
    /// Queue `job` to run on the dispatcher's thread at its next drain.
    ///
    /// A handle that outlives its dispatcher drops the job.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.jobs.send(Box::new(job)).is_err() {
            warn!("Dispatch after dispatcher teardown; job dropped");
        }
    }
}

/// Best-effort text of a panic payload. `panic!` carries `&str` or
/// `String`; anything else has no message to recover.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_drain_runs_jobs_in_dispatch_order() {
        let dispatcher = MainLoopDispatcher::new();
        let handle = dispatcher.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = seen.clone();
            handle.dispatch(move || seen.lock().push(i));
        }

        assert_eq!(dispatcher.drain(), 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drain_on_empty_queue_is_a_no_op() {
        let dispatcher = MainLoopDispatcher::new();
        assert_eq!(dispatcher.drain(), 0);
    }

    #[test]
    fn test_jobs_cross_threads_and_run_on_draining_thread() {
        let dispatcher = MainLoopDispatcher::new();
        let handle = dispatcher.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_remote = seen.clone();
        let worker = std::thread::spawn(move || {
            let seen = seen_remote.clone();
            handle.dispatch(move || seen.lock().push(std::thread::current().id()));
        });
        worker.join().unwrap();

        assert_eq!(dispatcher.drain(), 1);
        assert_eq!(*seen.lock(), vec![std::thread::current().id()]);
    }

    #[test]
    fn test_panicking_job_does_not_poison_the_drain() {
        let dispatcher = MainLoopDispatcher::new();
        let handle = dispatcher.handle();
        let seen = Arc::new(Mutex::new(Vec::new()));

        handle.dispatch(|| panic!("scripted panic"));
        let seen_after = seen.clone();
        handle.dispatch(move || seen_after.lock().push("survivor"));

        assert_eq!(dispatcher.drain(), 2);
        assert_eq!(*seen.lock(), vec!["survivor"]);
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let plain: Box<dyn Any + Send> = Box::new("scripted panic");
        assert_eq!(panic_message(plain.as_ref()), "scripted panic");

        let formatted: Box<dyn Any + Send> = Box::new(String::from("job 42 exploded"));
        assert_eq!(panic_message(formatted.as_ref()), "job 42 exploded");

        let opaque: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(opaque.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_dispatch_after_teardown_drops_job() {
        let dispatcher = MainLoopDispatcher::new();
        let handle = dispatcher.handle();
        drop(dispatcher);

        // Must not panic; the job is silently discarded
        handle.dispatch(|| unreachable!("ran after teardown"));
    }
}
