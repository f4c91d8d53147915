//! Cancellable background computation with atomic progress reporting.
//!
//! Wraps a single worker thread that owns its working data for the duration
//! of the run and hands it back through `join`. The worker publishes
//! progress as a u32 fraction through a shared atomic — the only data the
//! worker and the polling thread touch concurrently — and observes a
//! cooperative cancellation flag at whatever granularity it chooses.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Handle given to the worker closure for progress/cancellation plumbing.
#[derive(Clone)]
pub struct TaskHandle {
    progress: Arc<AtomicU32>,
    cancel: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Publish progress as a fraction in [0, 1].
    pub fn set_progress(&self, fraction: f32) {
        let raw = (fraction.clamp(0.0, 1.0) * u32::MAX as f32) as u32;
        self.progress.store(raw, Ordering::Relaxed);
    }

    /// True once the owner has requested a stop. Advisory only; the worker
    /// decides when to observe it.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// A restartable, cancellable, progress-reporting background computation
/// producing a value of type `T`.
pub struct AsyncProgressTask<T> {
    handle: Option<JoinHandle<T>>,
    progress: Arc<AtomicU32>,
    cancel: Arc<AtomicBool>,
}

impl<T: Send + 'static> AsyncProgressTask<T> {
    pub fn new() -> Self {
        Self {
            handle: None,
            progress: Arc::new(AtomicU32::new(0)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the worker. No-op if a previous worker is still running or has
    /// finished but was not yet joined.
    pub fn start<F>(&mut self, task_fn: F)
    where
        F: FnOnce(TaskHandle) -> T + Send + 'static,
    {
        if self.handle.is_some() {
            return;
        }
        self.progress.store(0, Ordering::Relaxed);
        self.cancel.store(false, Ordering::Relaxed);
        let handle = TaskHandle {
            progress: Arc::clone(&self.progress),
            cancel: Arc::clone(&self.cancel),
        };
        self.handle = Some(std::thread::spawn(move || task_fn(handle)));
    }

    /// Request a cooperative stop. Does not block; the worker keeps running
    /// until it next observes the flag.
    pub fn notify_stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// True when no worker exists or the worker function has returned.
    pub fn is_done(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Last progress fraction published by the worker, in [0, 1].
    pub fn progress(&self) -> f32 {
        self.progress.load(Ordering::Relaxed) as f32 / u32::MAX as f32
    }

    /// Recover the worker's result. Returns `None` while the worker is still
    /// running (never blocks mid-run) or when there is nothing to join.
    pub fn join(&mut self) -> Option<T> {
        if self.handle.as_ref()?.is_finished() {
            // Finished workers return immediately from join.
            self.handle.take().and_then(|h| h.join().ok())
        } else {
            None
        }
    }

    /// Blocking join used on teardown; returns the result if a worker ran.
    fn join_blocking(&mut self) -> Option<T> {
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl<T: Send + 'static> Default for AsyncProgressTask<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AsyncProgressTask<T> {
    /// The working data must never be reclaimed under a live worker, so
    /// teardown signals a stop and waits for the thread.
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_idle_task_is_done() {
        let task: AsyncProgressTask<u32> = AsyncProgressTask::new();
        assert!(task.is_done());
        assert_eq!(task.progress(), 0.0);
    }

    #[test]
    fn test_run_to_completion_and_join() {
        let mut task = AsyncProgressTask::new();
        task.start(|handle| {
            for i in 0..10 {
                handle.set_progress((i + 1) as f32 / 10.0);
            }
            42u32
        });

        while !task.is_done() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!((task.progress() - 1.0).abs() < 1e-6);
        assert_eq!(task.join(), Some(42));
        // A second join has nothing left to recover.
        assert_eq!(task.join(), None);
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let mut task = AsyncProgressTask::new();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        task.start(move |_| {
            rx.recv().ok();
            1u32
        });
        assert!(!task.is_done());

        // Second start must not replace the live worker.
        task.start(|_| 2u32);
        tx.send(()).unwrap();

        while !task.is_done() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(task.join(), Some(1));
    }

    #[test]
    fn test_cooperative_cancellation() {
        let mut task = AsyncProgressTask::new();
        task.start(|handle| {
            let mut rows = 0u32;
            while !handle.is_cancelled() {
                rows += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
            rows
        });

        task.notify_stop();
        while !task.is_done() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(task.join().is_some());
    }

    #[test]
    fn test_join_while_running_returns_none() {
        let mut task = AsyncProgressTask::new();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        task.start(move |_| {
            rx.recv().ok();
            7u32
        });
        assert_eq!(task.join(), None);
        tx.send(()).unwrap();
        while !task.is_done() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(task.join(), Some(7));
    }
}
