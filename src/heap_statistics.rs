use serde::Serialize;

/// Point-in-time snapshot of an isolate's heap counters.
///
/// All sizes are in bytes. The two context fields are plain counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStatistics {
    pub total_heap_size: u64,
    pub total_heap_size_executable: u64,
    pub total_physical_size: u64,
    pub total_available_size: u64,
    pub used_heap_size: u64,
    pub heap_size_limit: u64,
    pub malloced_memory: u64,
    pub external_memory: u64,
    pub peak_malloced_memory: u64,
    pub number_of_native_contexts: u64,
    pub number_of_detached_contexts: u64,
}

impl From<&v8::HeapStatistics> for HeapStatistics {
    fn from(hs: &v8::HeapStatistics) -> Self {
        Self {
            total_heap_size: hs.total_heap_size() as u64,
            total_heap_size_executable: hs.total_heap_size_executable() as u64,
            total_physical_size: hs.total_physical_size() as u64,
            total_available_size: hs.total_available_size() as u64,
            used_heap_size: hs.used_heap_size() as u64,
            heap_size_limit: hs.heap_size_limit() as u64,
            malloced_memory: hs.malloced_memory() as u64,
            external_memory: hs.external_memory() as u64,
            peak_malloced_memory: hs.peak_malloced_memory() as u64,
            number_of_native_contexts: hs.number_of_native_contexts() as u64,
            number_of_detached_contexts: hs.number_of_detached_contexts() as u64,
        }
    }
}

impl HeapStatistics {
    /// Used heap in whole megabytes (for logging).
    pub fn used_heap_mb(&self) -> u64 {
        self.used_heap_size / (1024 * 1024)
    }
}
