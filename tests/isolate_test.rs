mod common;

use openworkers_isolate::{Context, Error, Isolate, IsolateOptions, JsValue, platform};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_create_bootstraps_engine() {
    common::init_tracing();

    let isolate = Isolate::new().unwrap();

    assert!(platform::is_initialized());
    assert!(!isolate.is_disposed());
}

#[test]
fn test_concurrent_creation() {
    common::init_tracing();

    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();

                // Each thread drives its own isolate
                let mut isolate = Isolate::new().unwrap();
                let mut ctx = Context::new(&mut isolate).unwrap();
                let value = ctx.run_script(&format!("{} * 10", i), "thread.js").unwrap();
                value.as_f64().unwrap()
            })
        })
        .collect();

    let mut results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort_by(|a, b| a.partial_cmp(b).unwrap());

    assert_eq!(results, vec![0.0, 10.0, 20.0, 30.0]);
}

#[test]
fn test_invalid_options_rejected() {
    let result = Isolate::with_options(IsolateOptions {
        heap_initial_mb: 256,
        heap_max_mb: 64,
        max_wall_clock_time_ms: 0,
    });

    assert!(matches!(result, Err(Error::InvalidOptions(_))));
}

#[test]
fn test_options_from_json() {
    let options: IsolateOptions =
        serde_json::from_str(r#"{ "heap_max_mb": 32, "max_wall_clock_time_ms": 1000 }"#).unwrap();

    assert_eq!(options.heap_initial_mb, 1);
    assert_eq!(options.heap_max_mb, 32);
    assert_eq!(options.max_wall_clock_time_ms, 1000);

    let isolate = Isolate::with_options(options.clone()).unwrap();
    assert_eq!(isolate.options(), &options);
}

#[test]
fn test_explicit_dispose_then_drop() {
    let mut isolate = Isolate::new().unwrap();

    isolate.dispose();
    assert!(isolate.is_disposed());

    // Drop after explicit dispose must not release twice
    drop(isolate);
}

#[test]
fn test_operations_after_dispose() {
    let mut isolate = Isolate::new().unwrap();
    isolate.dispose();

    assert_eq!(isolate.heap_statistics(), Err(Error::IsolateDisposed));
    assert_eq!(isolate.terminate_execution(), Err(Error::IsolateDisposed));
    assert_eq!(isolate.is_execution_terminating(), Err(Error::IsolateDisposed));
    assert_eq!(isolate.low_memory_notification(), Err(Error::IsolateDisposed));
    assert!(matches!(
        isolate.thread_safe_handle(),
        Err(Error::IsolateDisposed)
    ));
    assert!(matches!(
        Context::new(&mut isolate),
        Err(Error::IsolateDisposed)
    ));
}

#[test]
fn test_many_isolates_sequentially() {
    for _ in 0..10 {
        let mut isolate = Isolate::new().unwrap();
        let stats = isolate.heap_statistics().unwrap();
        assert!(stats.used_heap_size > 0);
    }
}

#[test]
fn test_options_from_json_overflowing_heap() {
    let json = format!(r#"{{ "heap_max_mb": {} }}"#, usize::MAX);
    let options: IsolateOptions = serde_json::from_str(&json).unwrap();

    assert!(matches!(
        Isolate::with_options(options),
        Err(Error::InvalidOptions(_))
    ));
}

#[test]
fn test_isolate_moves_between_threads() {
    let mut isolate = Isolate::new().unwrap();
    {
        let mut ctx = Context::new(&mut isolate).unwrap();
        ctx.run_script("var origin = 'main';", "main.js").unwrap();
    }

    let mut isolate = thread::spawn(move || {
        {
            let mut ctx = Context::new(&mut isolate).unwrap();
            assert_eq!(
                ctx.run_script("'hello from ' + typeof origin", "worker.js").unwrap(),
                JsValue::from("hello from undefined")
            );
        }
        isolate
    })
    .join()
    .unwrap();

    // Back on the creating thread, still alive
    assert!(isolate.heap_statistics().unwrap().used_heap_size > 0);
    isolate.dispose();
}
