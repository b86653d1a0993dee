//! Execution contexts inside an isolate.
//!
//! A [`Context`] mutably borrows its [`Isolate`], so nothing else drives the
//! isolate while the context is alive. Disposing it through
//! [`Context::isolate`] turns the context inert. Each context
//! has its own global object: globals set in one context are invisible to
//! contexts in other isolates.

use std::pin::pin;

use crate::error::{Error, Result};
use crate::heap_statistics::HeapStatistics;
use crate::isolate::{Interrupt, Isolate, TerminationHandle};
use crate::value::JsValue;

/// How a script evaluation ended inside V8.
enum Failure {
    InvalidString,
    Compile(String),
    Exception(String),
    Terminated,
}

/// A V8 context bound to one isolate.
pub struct Context<'i> {
    isolate: &'i mut Isolate,
    context: Option<v8::Global<v8::Context>>,
}

impl<'i> Context<'i> {
    /// Create a fresh context with an empty global object.
    pub fn new(isolate: &'i mut Isolate) -> Result<Self> {
        let context = isolate.with_locked(|isolate| {
            let scope = pin!(v8::HandleScope::new(isolate));
            let scope = scope.init();
            let context = v8::Context::new(&scope, Default::default());
            v8::Global::new(&scope, context)
        })?;

        tracing::trace!(isolate = isolate.id(), "context created");

        Ok(Self {
            isolate,
            context: Some(context),
        })
    }

    /// Compile and run `source`, returning its completion value.
    ///
    /// `origin` names the script in error messages and log events.
    pub fn run_script(&mut self, source: &str, origin: &str) -> Result<JsValue> {
        let context = self.context.as_ref().ok_or(Error::IsolateDisposed)?;

        tracing::trace!(isolate = self.isolate.id(), origin, "running script");

        let (outcome, interrupt) = self
            .isolate
            .run_guarded(|isolate| evaluate(isolate, context, source))?;

        settle(self.isolate.id(), origin, outcome, interrupt)
    }

    /// Read a property of the global object.
    ///
    /// Getters run as script: they can throw, time out or be terminated.
    pub fn global(&mut self, name: &str) -> Result<JsValue> {
        let context = self.context.as_ref().ok_or(Error::IsolateDisposed)?;

        let (outcome, interrupt) = self
            .isolate
            .run_guarded(|isolate| read_global(isolate, context, name))?;

        settle(self.isolate.id(), name, outcome, interrupt)
    }

    /// Set a property of the global object.
    ///
    /// Setters run as script, like getters in [`Context::global`].
    pub fn set_global(&mut self, name: &str, value: &JsValue) -> Result<()> {
        let context = self.context.as_ref().ok_or(Error::IsolateDisposed)?;

        let (outcome, interrupt) = self
            .isolate
            .run_guarded(|isolate| write_global(isolate, context, name, value))?;

        settle(self.isolate.id(), name, outcome, interrupt)
    }

    /// The owning isolate.
    ///
    /// Disposing through this reference ends the context too: every later
    /// call returns [`Error::IsolateDisposed`].
    pub fn isolate(&mut self) -> &mut Isolate {
        self.isolate
    }

    /// Heap statistics of the owning isolate.
    pub fn heap_statistics(&mut self) -> Result<HeapStatistics> {
        self.isolate.heap_statistics()
    }

    /// Termination handle of the owning isolate.
    pub fn thread_safe_handle(&self) -> Result<TerminationHandle> {
        self.isolate.thread_safe_handle()
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.isolate.release_global(context);
        }
    }
}

/// Map what V8 reported plus what the guards saw onto a result.
///
/// An interrupt only decides the outcome when V8 actually terminated: a
/// signal landing right after completion does not discard the value.
fn settle<T>(
    isolate: u64,
    origin: &str,
    outcome: std::result::Result<T, Failure>,
    interrupt: Option<Interrupt>,
) -> Result<T> {
    match outcome {
        Ok(value) => Ok(value),
        Err(Failure::Terminated) => Err(interrupt.map(Error::from).unwrap_or(Error::Terminated)),
        Err(Failure::InvalidString) => Err(Error::InvalidString),
        Err(Failure::Compile(message)) => Err(Error::Compile {
            origin: origin.to_string(),
            message,
        }),
        Err(Failure::Exception(message)) => {
            tracing::debug!(isolate, origin, %message, "uncaught exception");
            Err(Error::Exception {
                origin: origin.to_string(),
                message,
            })
        }
    }
}

/// Turn the state of a `TryCatch` after a failed call into a `Failure`.
macro_rules! caught {
    ($tc:expr, $variant:ident, $fallback:expr) => {
        if $tc.has_terminated() {
            Failure::Terminated
        } else {
            Failure::$variant(
                $tc.exception()
                    .and_then(|e| e.to_string(&$tc).map(|s| s.to_rust_string_lossy(&$tc)))
                    .unwrap_or_else(|| $fallback.to_string()),
            )
        }
    };
}

fn evaluate(
    isolate: &mut v8::Isolate,
    context: &v8::Global<v8::Context>,
    source: &str,
) -> std::result::Result<JsValue, Failure> {
    let scope = pin!(v8::HandleScope::new(isolate));
    let mut scope = scope.init();
    let ctx = v8::Local::new(&scope, context);
    let scope = &mut v8::ContextScope::new(&mut scope, ctx);

    let code = v8::String::new(scope, source).ok_or(Failure::InvalidString)?;

    let tc = pin!(v8::TryCatch::new(scope));
    let tc = tc.init();

    let Some(script) = v8::Script::compile(&tc, code, None) else {
        return Err(caught!(tc, Compile, "Compile error"));
    };

    let Some(value) = script.run(&tc) else {
        return Err(caught!(tc, Exception, "Runtime error"));
    };

    copy_out(&tc, value)
}

fn read_global(
    isolate: &mut v8::Isolate,
    context: &v8::Global<v8::Context>,
    name: &str,
) -> std::result::Result<JsValue, Failure> {
    let scope = pin!(v8::HandleScope::new(isolate));
    let mut scope = scope.init();
    let ctx = v8::Local::new(&scope, context);
    let scope = &mut v8::ContextScope::new(&mut scope, ctx);

    let key = v8::String::new(scope, name).ok_or(Failure::InvalidString)?;

    let tc = pin!(v8::TryCatch::new(scope));
    let tc = tc.init();

    let global = ctx.global(&tc);
    let Some(value) = global.get(&tc, key.into()) else {
        return Err(caught!(tc, Exception, "Getter failed"));
    };

    copy_out(&tc, value)
}

fn write_global(
    isolate: &mut v8::Isolate,
    context: &v8::Global<v8::Context>,
    name: &str,
    value: &JsValue,
) -> std::result::Result<(), Failure> {
    let scope = pin!(v8::HandleScope::new(isolate));
    let mut scope = scope.init();
    let ctx = v8::Local::new(&scope, context);
    let scope = &mut v8::ContextScope::new(&mut scope, ctx);

    let key = v8::String::new(scope, name).ok_or(Failure::InvalidString)?;

    let tc = pin!(v8::TryCatch::new(scope));
    let tc = tc.init();

    let value = value.to_v8(&tc).ok_or(Failure::InvalidString)?;
    let global = ctx.global(&tc);

    if global.set(&tc, key.into(), value).is_none() {
        return Err(caught!(tc, Exception, "Setter failed"));
    }

    Ok(())
}

/// Copy a value to the host. Its string conversion may run (and be
/// terminated in) user code.
fn copy_out<'s>(
    tc: &v8::PinScope<'s, '_>,
    value: v8::Local<'s, v8::Value>,
) -> std::result::Result<JsValue, Failure> {
    let value = JsValue::from_v8(tc, value);

    if tc.is_execution_terminating() {
        return Err(Failure::Terminated);
    }

    Ok(value)
}
