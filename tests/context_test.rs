mod common;

use openworkers_isolate::{Context, Error, Isolate, JsValue};

#[test]
fn test_run_script_values() {
    common::init_tracing();

    let mut isolate = Isolate::new().unwrap();
    let mut ctx = Context::new(&mut isolate).unwrap();

    assert_eq!(ctx.run_script("1 + 1", "add.js").unwrap(), JsValue::Number(2.0));
    assert_eq!(
        ctx.run_script("'hello' + ' ' + 'world'", "concat.js").unwrap(),
        JsValue::String("hello world".into())
    );
    assert_eq!(ctx.run_script("1 < 2", "cmp.js").unwrap(), JsValue::Boolean(true));
    assert_eq!(ctx.run_script("null", "null.js").unwrap(), JsValue::Null);
    assert_eq!(ctx.run_script("undefined", "undef.js").unwrap(), JsValue::Undefined);
    assert_eq!(
        ctx.run_script("({ a: 1 })", "obj.js").unwrap(),
        JsValue::Object("[object Object]".into())
    );
    assert_eq!(
        ctx.run_script("[1, 2, 3]", "arr.js").unwrap(),
        JsValue::Object("1,2,3".into())
    );
}

#[test]
fn test_state_persists_across_runs() {
    let mut isolate = Isolate::new().unwrap();
    let mut ctx = Context::new(&mut isolate).unwrap();

    ctx.run_script("var counter = 0; function inc() { return ++counter; }", "setup.js")
        .unwrap();
    ctx.run_script("inc(); inc();", "calls.js").unwrap();

    assert_eq!(ctx.run_script("inc()", "last.js").unwrap(), JsValue::Number(3.0));
}

#[test]
fn test_isolates_do_not_share_globals() {
    let mut isolate_a = Isolate::new().unwrap();
    let mut isolate_b = Isolate::new().unwrap();

    let mut ctx_a = Context::new(&mut isolate_a).unwrap();
    let mut ctx_b = Context::new(&mut isolate_b).unwrap();

    ctx_a.run_script("var x = 'a';", "a.js").unwrap();
    ctx_b.run_script("var x = 'b';", "b.js").unwrap();

    assert_eq!(ctx_a.global("x").unwrap(), JsValue::String("a".into()));
    assert_eq!(ctx_b.global("x").unwrap(), JsValue::String("b".into()));

    ctx_b.run_script("delete globalThis.x; var y = 1;", "b2.js").unwrap();

    assert_eq!(ctx_a.global("x").unwrap(), JsValue::String("a".into()));
    assert!(ctx_a.global("y").unwrap().is_undefined());
}

#[test]
fn test_set_and_get_global() {
    let mut isolate = Isolate::new().unwrap();
    let mut ctx = Context::new(&mut isolate).unwrap();

    ctx.set_global("name", &JsValue::from("worker")).unwrap();
    ctx.set_global("limit", &JsValue::from(5)).unwrap();
    ctx.set_global("enabled", &JsValue::from(true)).unwrap();

    assert_eq!(
        ctx.run_script("enabled ? name + ':' + limit : 'off'", "read.js")
            .unwrap(),
        JsValue::String("worker:5".into())
    );
    assert!(ctx.global("missing").unwrap().is_undefined());
}

#[test]
fn test_compile_error() {
    let mut isolate = Isolate::new().unwrap();
    let mut ctx = Context::new(&mut isolate).unwrap();

    let err = ctx.run_script("let = ;", "broken.js").unwrap_err();

    match err {
        Error::Compile { origin, message } => {
            assert_eq!(origin, "broken.js");
            assert!(message.contains("SyntaxError"), "got: {}", message);
        }
        other => panic!("expected compile error, got {:?}", other),
    }
}

#[test]
fn test_uncaught_exception() {
    let mut isolate = Isolate::new().unwrap();
    let mut ctx = Context::new(&mut isolate).unwrap();

    let err = ctx
        .run_script("throw new TypeError('bad input')", "throw.js")
        .unwrap_err();

    assert_eq!(
        err,
        Error::Exception {
            origin: "throw.js".into(),
            message: "TypeError: bad input".into(),
        }
    );

    // The context is still usable after an exception
    assert_eq!(ctx.run_script("2 * 21", "after.js").unwrap(), JsValue::Number(42.0));
}

#[test]
fn test_context_released_before_dispose() {
    let mut isolate = Isolate::new().unwrap();

    {
        let mut ctx = Context::new(&mut isolate).unwrap();
        ctx.run_script("var big = new Array(1000).fill('x')", "big.js")
            .unwrap();
    }

    // A second context on the same isolate starts with a clean global
    let mut ctx = Context::new(&mut isolate).unwrap();
    assert!(ctx.global("big").unwrap().is_undefined());
    drop(ctx);

    isolate.dispose();
}

#[test]
fn test_dispose_through_context() {
    let mut isolate = Isolate::new().unwrap();
    let mut ctx = Context::new(&mut isolate).unwrap();

    ctx.run_script("var kept = 1;", "setup.js").unwrap();
    assert!(!ctx.isolate().is_disposed());

    ctx.isolate().dispose();

    assert!(ctx.isolate().is_disposed());
    assert_eq!(ctx.run_script("kept", "after.js"), Err(Error::IsolateDisposed));
    assert_eq!(ctx.global("kept"), Err(Error::IsolateDisposed));
    assert_eq!(
        ctx.set_global("kept", &JsValue::from(2)),
        Err(Error::IsolateDisposed)
    );
    assert_eq!(ctx.heap_statistics(), Err(Error::IsolateDisposed));
    drop(ctx);

    // Dropping the owner after an inner dispose is still a no-op
    isolate.dispose();
    assert!(isolate.is_disposed());
}
