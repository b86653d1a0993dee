//! Resource guards for isolates.
//!
//! Both guards end in the same place: a termination signal sent to the
//! isolate, plus a flag recording why.
//!
//! - [`heap_limit`]: near-heap-limit callback, terminates instead of aborting the process
//! - [`timeout_guard`]: wall-clock timeout enforcement via watchdog thread

mod heap_limit;
mod timeout_guard;

pub use heap_limit::HeapGuard;
pub use timeout_guard::TimeoutGuard;
