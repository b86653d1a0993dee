//! Isolate configuration
use serde::Deserialize;

use crate::error::{Error, Result};

/// Resource limits applied to a new isolate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IsolateOptions {
    /// Initial V8 heap size in MB (default: 1MB)
    pub heap_initial_mb: usize,
    /// Maximum V8 heap size in MB (default: 128MB)
    pub heap_max_mb: usize,
    /// Maximum wall-clock time per script run in milliseconds (default: 0 = disabled)
    pub max_wall_clock_time_ms: u64,
}

impl Default for IsolateOptions {
    fn default() -> Self {
        Self {
            heap_initial_mb: 1,
            heap_max_mb: 128,
            max_wall_clock_time_ms: 0,
        }
    }
}

impl IsolateOptions {
    pub fn validate(&self) -> Result<()> {
        if self.heap_max_mb == 0 {
            return Err(Error::InvalidOptions("heap_max_mb must be > 0".into()));
        }

        if mb_to_bytes(self.heap_max_mb).is_none() {
            return Err(Error::InvalidOptions(format!(
                "heap_max_mb ({}) does not fit in bytes",
                self.heap_max_mb
            )));
        }

        if self.heap_initial_mb > self.heap_max_mb {
            return Err(Error::InvalidOptions(format!(
                "heap_initial_mb ({}) exceeds heap_max_mb ({})",
                self.heap_initial_mb, self.heap_max_mb
            )));
        }

        Ok(())
    }

    // Saturating: only reached after validate(), which rejects overflow
    pub(crate) fn heap_initial_bytes(&self) -> usize {
        mb_to_bytes(self.heap_initial_mb).unwrap_or(usize::MAX)
    }

    pub(crate) fn heap_max_bytes(&self) -> usize {
        mb_to_bytes(self.heap_max_mb).unwrap_or(usize::MAX)
    }
}

fn mb_to_bytes(mb: usize) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
}
