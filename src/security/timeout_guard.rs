//! Wall-clock timeout enforcement via watchdog thread.
//!
//! 1. Guard spawns a watchdog thread with a timeout duration
//! 2. Thread sleeps until timeout or cancellation
//! 3. On timeout: sends the termination signal to the isolate
//! 4. On drop: sends cancellation signal, joins thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::isolate::TerminationHandle;

/// RAII guard that terminates a running script once its time budget is spent.
///
/// ```rust,ignore
/// let guard = TimeoutGuard::new(isolate.thread_safe_handle()?, 500);
/// let result = run(...);
/// let timed_out = guard.was_triggered();
/// drop(guard); // watchdog cancelled
/// ```
pub struct TimeoutGuard {
    cancel_tx: Option<mpsc::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    triggered: Arc<AtomicBool>,
}

impl TimeoutGuard {
    /// Arm a watchdog for `timeout_ms` milliseconds (0 = disabled, no thread).
    pub fn new(handle: TerminationHandle, timeout_ms: u64) -> Self {
        let triggered = Arc::new(AtomicBool::new(false));

        if timeout_ms == 0 {
            return Self::disabled(triggered);
        }

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let triggered_clone = Arc::clone(&triggered);

        let spawned = thread::Builder::new()
            .name("isolate-watchdog".into())
            .spawn(move || {
                match cancel_rx.recv_timeout(Duration::from_millis(timeout_ms)) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        tracing::warn!(timeout_ms, "wall-clock timeout, terminating isolate");
                        triggered_clone.store(true, Ordering::SeqCst);
                        handle.terminate_execution();
                    }
                    // Cancelled or guard dropped
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {}
                }
            });

        match spawned {
            Ok(thread_handle) => Self {
                cancel_tx: Some(cancel_tx),
                thread_handle: Some(thread_handle),
                triggered,
            },
            Err(e) => {
                tracing::error!("failed to spawn watchdog thread, timeout disabled: {}", e);
                Self::disabled(triggered)
            }
        }
    }

    fn disabled(triggered: Arc<AtomicBool>) -> Self {
        Self {
            cancel_tx: None,
            thread_handle: None,
            triggered,
        }
    }

    /// Whether the watchdog fired.
    pub fn was_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            // Ignore error if thread already exited
            let _ = cancel_tx.send(());
        }

        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            tracing::error!("watchdog thread panicked");
        }
    }
}
