use std::sync::Once;
use std::time::{Duration, Instant};

use openworkers_isolate::TerminationHandle;

#[allow(dead_code)]
/// Install a test-friendly tracing subscriber (RUST_LOG controls verbosity).
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[allow(dead_code)]
/// Wait until a script is running in the isolate, then terminate it.
///
/// Gives up after `timeout` and returns false.
pub fn terminate_when_running(handle: &TerminationHandle, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if handle.is_running() {
            return handle.terminate_execution();
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    false
}
