//! Near-heap-limit protection for isolates.
//!
//! Without this, V8 calls `FatalProcessOutOfMemory` when a script exhausts
//! the heap and the whole host process dies. The callback below turns that
//! into a termination of the running script:
//!
//! 1. First call: raise the limit by 10% (capped at the configured max) so
//!    V8 can attempt a full GC
//! 2. Subsequent calls: flag the limit as hit and terminate execution
//!
//! An OOM error handler is installed as well. It cannot prevent the abort for
//! allocations outside the managed heap, it only logs them.

use std::ffi::{c_char, c_void};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// State shared with the near-heap-limit callback.
///
/// Boxed and handed to V8 as a raw pointer: it must outlive the isolate.
pub struct HeapGuard {
    isolate_handle: v8::IsolateHandle,
    limit_hit: Arc<AtomicBool>,
    invocations: AtomicU32,
    max_heap_bytes: usize,
}

impl HeapGuard {
    fn new(
        isolate_handle: v8::IsolateHandle,
        limit_hit: Arc<AtomicBool>,
        max_heap_bytes: usize,
    ) -> Self {
        Self {
            isolate_handle,
            limit_hit,
            invocations: AtomicU32::new(0),
            max_heap_bytes,
        }
    }

    /// Install the guard on a freshly created isolate.
    ///
    /// Must be called before any script runs. The returned box must be dropped
    /// after the isolate.
    pub fn install(
        isolate: &mut v8::Isolate,
        limit_hit: Arc<AtomicBool>,
        max_heap_bytes: usize,
    ) -> Box<Self> {
        let guard = Box::new(Self::new(
            isolate.thread_safe_handle(),
            limit_hit,
            max_heap_bytes,
        ));

        let data = &*guard as *const HeapGuard as *mut c_void;
        isolate.add_near_heap_limit_callback(near_heap_limit_callback, data);
        isolate.set_oom_error_handler(oom_error_handler);

        guard
    }

    /// Whether the guard terminated execution at least once.
    pub fn limit_hit(&self) -> bool {
        self.limit_hit.load(Ordering::SeqCst)
    }

    /// Compute the new limit for one callback invocation.
    ///
    /// Returns `None` when execution must be terminated instead.
    fn next_limit(&self, current_heap_limit: usize) -> Option<usize> {
        let count = self.invocations.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            let new_limit = (current_heap_limit + current_heap_limit / 10).min(self.max_heap_bytes);

            if new_limit > current_heap_limit {
                return Some(new_limit);
            }
        }

        None
    }
}

/// # Safety
///
/// `data` must point to a live `HeapGuard`, as set up by [`HeapGuard::install`].
unsafe extern "C" fn near_heap_limit_callback(
    data: *mut c_void,
    current_heap_limit: usize,
    initial_heap_limit: usize,
) -> usize {
    // SAFETY: data was registered by HeapGuard::install and outlives the isolate
    let guard = unsafe { &*(data as *const HeapGuard) };

    tracing::warn!(
        current_mb = current_heap_limit / (1024 * 1024),
        initial_mb = initial_heap_limit / (1024 * 1024),
        max_mb = guard.max_heap_bytes / (1024 * 1024),
        "isolate near heap limit"
    );

    if let Some(new_limit) = guard.next_limit(current_heap_limit) {
        tracing::warn!("raising heap limit to {} MB to allow GC", new_limit / (1024 * 1024));
        return new_limit;
    }

    tracing::error!("heap limit exhausted, terminating execution");
    guard.limit_hit.store(true, Ordering::SeqCst);
    guard.isolate_handle.terminate_execution();

    current_heap_limit
}

unsafe extern "C" fn oom_error_handler(location: *const c_char, details: &v8::OomDetails) {
    let location = if location.is_null() {
        "unknown".to_string()
    } else {
        // SAFETY: V8 passes a valid C string
        unsafe { std::ffi::CStr::from_ptr(location) }
            .to_string_lossy()
            .into_owned()
    };

    let detail = if details.detail.is_null() {
        String::new()
    } else {
        // SAFETY: V8 passes a valid C string
        unsafe { std::ffi::CStr::from_ptr(details.detail as *const c_char) }
            .to_string_lossy()
            .into_owned()
    };

    tracing::error!(
        %location,
        %detail,
        heap = details.is_heap_oom,
        "V8 out of memory"
    );
}
