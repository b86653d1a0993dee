//! Error type for isolate and context operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Options rejected before touching the engine.
    #[error("invalid isolate options: {0}")]
    InvalidOptions(String),

    /// The engine failed to allocate a new isolate.
    #[error("failed to create isolate: {0}")]
    CreationFailed(String),

    /// The isolate was disposed; the native handle is gone.
    #[error("isolate already disposed")]
    IsolateDisposed,

    #[error("{origin}: compile error: {message}")]
    Compile { origin: String, message: String },

    /// Uncaught JavaScript exception.
    #[error("{origin}: uncaught exception: {message}")]
    Exception { origin: String, message: String },

    /// Execution was aborted by a termination signal.
    #[error("execution terminated")]
    Terminated,

    /// Execution was aborted by the wall-clock watchdog.
    #[error("execution timed out after {0}ms")]
    Timeout(u64),

    /// Execution was aborted because the heap limit was reached.
    #[error("heap limit exceeded")]
    HeapLimit,

    /// A host string could not be converted into a V8 string.
    #[error("string too large for V8")]
    InvalidString,
}

impl Error {
    /// Whether this error comes from a forced termination of the isolate.
    pub fn is_termination(&self) -> bool {
        matches!(self, Error::Terminated | Error::Timeout(_) | Error::HeapLimit)
    }
}
