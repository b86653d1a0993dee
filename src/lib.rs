//! V8 isolate bindings.
//!
//! Create independent JavaScript VM instances, run script in them, sample
//! their heap and terminate runaway execution from another thread.
//!
//! ```rust,ignore
//! use openworkers_isolate::{Context, Isolate};
//!
//! let mut isolate = Isolate::new()?;
//! let handle = isolate.thread_safe_handle()?;
//!
//! let mut ctx = Context::new(&mut isolate)?;
//! let value = ctx.run_script("1 + 1", "main.js")?;
//!
//! // From any thread:
//! handle.terminate_execution();
//! ```

pub mod context;
pub mod error;
pub mod heap_statistics;
pub mod isolate;
pub mod options;
pub mod platform;
pub mod security;
pub mod value;

pub use context::Context;
pub use error::{Error, Result};
pub use heap_statistics::HeapStatistics;
pub use isolate::{Isolate, TerminationHandle};
pub use options::IsolateOptions;
pub use value::JsValue;
