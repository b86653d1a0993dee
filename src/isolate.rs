//! Owning handle over one V8 isolate.
//!
//! An [`Isolate`] is a JavaScript VM instance with its own heap and garbage
//! collector. Only one thread may drive a given isolate at a time: an
//! `Isolate` is `Send` and may move between threads, but every engine call
//! takes `&mut self` and holds a `v8::Locker`. Different threads may drive
//! different isolates simultaneously. The only operation that runs while
//! another thread drives the isolate is termination, through a
//! [`TerminationHandle`].
//!
//! The native isolate is created unentered and every engine call goes through
//! a `v8::Locker`, so isolates can be created and dropped in any order.
//!
//! ## Lifecycle
//!
//! ```text
//! Isolate::new() ──► Live ──dispose() / Drop──► Disposed
//!                    │  ▲
//!                    └──┘ heap_statistics(), terminate_execution(), run
//! ```
//!
//! Disposal runs exactly once. Every operation on a disposed isolate returns
//! [`Error::IsolateDisposed`] instead of reaching native code.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::heap_statistics::HeapStatistics;
use crate::options::IsolateOptions;
use crate::security::{HeapGuard, TimeoutGuard};

static NEXT_ISOLATE_ID: AtomicU64 = AtomicU64::new(1);

/// Execution state shared between an isolate and its termination handles.
#[derive(Debug, Default)]
struct ExecutionState {
    running: AtomicBool,
    signalled: AtomicBool,
    disposed: AtomicBool,
}

/// Thread-safe handle used to terminate script running in an isolate.
///
/// Cheap to clone, `Send + Sync`. Stays valid after the isolate is disposed;
/// signals sent then are dropped.
#[derive(Clone)]
pub struct TerminationHandle {
    id: u64,
    handle: v8::IsolateHandle,
    state: Arc<ExecutionState>,
}

impl TerminationHandle {
    /// Forcefully terminate the script currently running in the isolate.
    ///
    /// This is a signal, not a wait: V8 unwinds the script at its next safe
    /// point. Returns `false` when nothing was signalled (isolate idle or
    /// disposed).
    pub fn terminate_execution(&self) -> bool {
        if self.state.disposed.load(Ordering::SeqCst) {
            tracing::trace!(isolate = self.id, "terminate ignored: isolate disposed");
            return false;
        }

        if !self.state.running.load(Ordering::SeqCst) {
            tracing::trace!(isolate = self.id, "terminate ignored: isolate idle");
            return false;
        }

        self.state.signalled.store(true, Ordering::SeqCst);
        tracing::debug!(isolate = self.id, "terminating execution");
        self.handle.terminate_execution()
    }

    /// Whether a script is currently running in the isolate.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Whether the isolate has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for TerminationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminationHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Why a guarded run was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
    HeapLimit,
    Timeout(u64),
    Signal,
}

impl From<Interrupt> for Error {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::HeapLimit => Error::HeapLimit,
            Interrupt::Timeout(ms) => Error::Timeout(ms),
            Interrupt::Signal => Error::Terminated,
        }
    }
}

/// Native resources. Field order matters: the isolate must drop before the
/// heap guard it holds a pointer to.
struct NativeIsolate {
    isolate: v8::UnenteredIsolate,
    heap_guard: Box<HeapGuard>,
    heap_limit_hit: Arc<AtomicBool>,
}

/// A JavaScript VM instance with its own heap and garbage collector.
pub struct Isolate {
    id: u64,
    native: Option<NativeIsolate>,
    handle: TerminationHandle,
    options: IsolateOptions,
}

impl Isolate {
    /// Create an isolate with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(IsolateOptions::default())
    }

    /// Create an isolate, bootstrapping the engine first if needed.
    pub fn with_options(options: IsolateOptions) -> Result<Self> {
        options.validate()?;
        crate::platform::init();

        let id = NEXT_ISOLATE_ID.fetch_add(1, Ordering::Relaxed);
        let params = v8::CreateParams::default()
            .heap_limits(options.heap_initial_bytes(), options.heap_max_bytes())
            .allow_atomics_wait(false);

        let mut isolate = catch_unwind(AssertUnwindSafe(|| v8::Isolate::new_unentered(params)))
            .map_err(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "native allocation failed".to_string());
                tracing::error!(isolate = id, "isolate creation failed: {}", reason);
                Error::CreationFailed(reason)
            })?;

        let heap_limit_hit = Arc::new(AtomicBool::new(false));

        let (handle, heap_guard) = {
            let mut locker = v8::Locker::new(&mut isolate);
            let handle = locker.thread_safe_handle();
            let heap_guard = HeapGuard::install(
                &mut locker,
                Arc::clone(&heap_limit_hit),
                options.heap_max_bytes(),
            );
            (handle, heap_guard)
        };

        tracing::debug!(
            isolate = id,
            heap_initial_mb = options.heap_initial_mb,
            heap_max_mb = options.heap_max_mb,
            "isolate created"
        );

        Ok(Self {
            id,
            native: Some(NativeIsolate {
                isolate,
                heap_guard,
                heap_limit_hit,
            }),
            handle: TerminationHandle {
                id,
                handle,
                state: Arc::new(ExecutionState::default()),
            },
            options,
        })
    }

    /// Process-unique identifier, used in log events.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn options(&self) -> &IsolateOptions {
        &self.options
    }

    pub fn is_disposed(&self) -> bool {
        self.native.is_none()
    }

    /// Get a thread-safe handle for terminating execution from another thread.
    pub fn thread_safe_handle(&self) -> Result<TerminationHandle> {
        self.ensure_live()?;
        Ok(self.handle.clone())
    }

    /// Forcefully terminate the current thread of JavaScript execution.
    ///
    /// No-op when the isolate is idle.
    pub fn terminate_execution(&self) -> Result<()> {
        self.ensure_live()?;
        self.handle.terminate_execution();
        Ok(())
    }

    /// Whether V8 is currently unwinding a terminated script.
    pub fn is_execution_terminating(&mut self) -> Result<bool> {
        self.with_locked(|isolate| isolate.is_execution_terminating())
    }

    /// Snapshot of the isolate's current heap counters.
    pub fn heap_statistics(&mut self) -> Result<HeapStatistics> {
        let stats =
            self.with_locked(|isolate| HeapStatistics::from(&isolate.get_heap_statistics()))?;

        tracing::trace!(
            isolate = self.id,
            used_mb = stats.used_heap_mb(),
            contexts = stats.number_of_native_contexts,
            "heap statistics"
        );

        Ok(stats)
    }

    /// Ask V8 to collect as much garbage as it can.
    pub fn low_memory_notification(&mut self) -> Result<()> {
        self.with_locked(|isolate| isolate.low_memory_notification())
    }

    /// Release the native isolate. Idempotent; also runs on drop.
    pub fn dispose(&mut self) {
        let Some(native) = self.native.take() else {
            return;
        };

        // Stop handles from signalling before the isolate goes away
        self.handle.state.disposed.store(true, Ordering::SeqCst);

        let NativeIsolate {
            isolate,
            heap_guard,
            heap_limit_hit: _,
        } = native;

        drop(isolate);
        drop(heap_guard);

        tracing::debug!(isolate = self.id, "isolate disposed");
    }

    fn ensure_live(&self) -> Result<()> {
        if self.native.is_none() {
            return Err(Error::IsolateDisposed);
        }
        Ok(())
    }

    /// Run `f` with the isolate locked on this thread.
    pub(crate) fn with_locked<R>(&mut self, f: impl FnOnce(&mut v8::Isolate) -> R) -> Result<R> {
        let native = self.native.as_mut().ok_or(Error::IsolateDisposed)?;
        let mut locker = v8::Locker::new(&mut native.isolate);
        Ok(f(&mut locker))
    }

    /// Run script work with the isolate locked, the wall-clock watchdog armed
    /// and termination handles live.
    ///
    /// Returns what `f` produced plus the reason execution was cut short, if
    /// any. A pending termination is always cleared before returning so the
    /// isolate stays usable.
    pub(crate) fn run_guarded<R>(
        &mut self,
        f: impl FnOnce(&mut v8::Isolate) -> R,
    ) -> Result<(R, Option<Interrupt>)> {
        let timeout_ms = self.options.max_wall_clock_time_ms;
        let state = Arc::clone(&self.handle.state);
        let watchdog_handle = self.handle.clone();

        let native = self.native.as_mut().ok_or(Error::IsolateDisposed)?;
        let heap_limit_hit = Arc::clone(&native.heap_limit_hit);
        let mut locker = v8::Locker::new(&mut native.isolate);

        // Drop any signal that arrived after the previous run finished
        locker.cancel_terminate_execution();
        state.signalled.store(false, Ordering::SeqCst);
        heap_limit_hit.store(false, Ordering::SeqCst);
        state.running.store(true, Ordering::SeqCst);

        let guard = TimeoutGuard::new(watchdog_handle, timeout_ms);
        let output = f(&mut locker);
        state.running.store(false, Ordering::SeqCst);

        let timed_out = guard.was_triggered();
        drop(guard);

        let interrupt = if heap_limit_hit.swap(false, Ordering::SeqCst) {
            Some(Interrupt::HeapLimit)
        } else if timed_out {
            Some(Interrupt::Timeout(timeout_ms))
        } else if state.signalled.swap(false, Ordering::SeqCst) {
            Some(Interrupt::Signal)
        } else {
            None
        };

        locker.cancel_terminate_execution();

        if let Some(interrupt) = interrupt {
            tracing::debug!(isolate = self.id, ?interrupt, "execution interrupted");
        }

        Ok((output, interrupt))
    }

    /// Drop a global handle while holding the isolate lock.
    pub(crate) fn release_global<T>(&mut self, global: v8::Global<T>) {
        match self.native.as_mut() {
            Some(native) => {
                let _locker = v8::Locker::new(&mut native.isolate);
                drop(global);
            }
            // The isolate is gone, there is nothing left to release into
            None => std::mem::forget(global),
        }
    }
}

impl Drop for Isolate {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Isolate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Isolate")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .field("options", &self.options)
            .finish()
    }
}
