//! Global V8 platform initialization.
//!
//! V8 can only be initialized once per process. This module provides
//! a single entry point for platform initialization used by all other modules.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use v8;

/// Extra V8 flags applied before initialization (space separated).
pub const V8_FLAGS_ENV: &str = "OPENWORKERS_V8_FLAGS";

static PLATFORM: OnceLock<v8::SharedRef<v8::Platform>> = OnceLock::new();

/// Number of times the bootstrap closure actually ran. Must stay at 1.
static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Get the global V8 platform, initializing it if necessary.
///
/// This is safe to call from multiple threads - the platform is only
/// initialized once and the same reference is returned to all callers.
/// Concurrent callers block until the first one has finished.
pub fn init() -> &'static v8::SharedRef<v8::Platform> {
    PLATFORM.get_or_init(|| {
        INIT_COUNT.fetch_add(1, Ordering::SeqCst);

        // Disable incremental marking - better for small heaps and avoids GC bugs
        v8::V8::set_flags_from_string("--noincremental-marking");

        // On macOS, use single-threaded GC to avoid code collection issues
        #[cfg(target_os = "macos")]
        v8::V8::set_flags_from_string("--single-threaded-gc");

        if let Some(flags) = extra_flags(std::env::var(V8_FLAGS_ENV).ok()) {
            log::info!("Applying V8 flags from {}: {}", V8_FLAGS_ENV, flags);
            v8::V8::set_flags_from_string(&flags);
        }

        let platform = v8::new_default_platform(0, false).make_shared();
        v8::V8::initialize_platform(platform.clone());
        v8::V8::initialize();

        log::info!("V8 {} initialized", v8::V8::get_version());
        platform
    })
}

/// Whether the engine has been bootstrapped in this process.
pub fn is_initialized() -> bool {
    PLATFORM.get().is_some()
}

pub(crate) fn init_count() -> usize {
    INIT_COUNT.load(Ordering::SeqCst)
}

/// Trimmed flag string from the environment, `None` when blank.
fn extra_flags(raw: Option<String>) -> Option<String> {
    let flags = raw?.trim().to_string();
    (!flags.is_empty()).then_some(flags)
}
