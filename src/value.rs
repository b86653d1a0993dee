//! Host-side copies of JavaScript values.

use serde::Serialize;

/// A JavaScript value copied out of an isolate.
///
/// Primitives are copied as-is. Anything else (objects, functions, symbols)
/// is represented by its string conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(String),
}

impl JsValue {
    pub(crate) fn from_v8<'s>(scope: &v8::PinScope<'s, '_>, value: v8::Local<'s, v8::Value>) -> Self {
        if value.is_undefined() {
            JsValue::Undefined
        } else if value.is_null() {
            JsValue::Null
        } else if value.is_boolean() {
            JsValue::Boolean(value.is_true())
        } else if value.is_number() {
            JsValue::Number(value.number_value(scope).unwrap_or(f64::NAN))
        } else if value.is_string() {
            JsValue::String(to_rust_string(scope, value))
        } else {
            JsValue::Object(to_rust_string(scope, value))
        }
    }

    /// Create the V8 counterpart. `Object` becomes its string form.
    pub(crate) fn to_v8<'s>(&self, scope: &v8::PinScope<'s, '_>) -> Option<v8::Local<'s, v8::Value>> {
        let value: v8::Local<v8::Value> = match self {
            JsValue::Undefined => v8::undefined(scope).into(),
            JsValue::Null => v8::null(scope).into(),
            JsValue::Boolean(b) => v8::Boolean::new(scope, *b).into(),
            JsValue::Number(n) => v8::Number::new(scope, *n).into(),
            JsValue::String(s) | JsValue::Object(s) => v8::String::new(scope, s)?.into(),
        };
        Some(value)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

fn to_rust_string<'s>(scope: &v8::PinScope<'s, '_>, value: v8::Local<'s, v8::Value>) -> String {
    // Symbols and objects with a throwing toString() have no string form
    value
        .to_string(scope)
        .map(|s| s.to_rust_string_lossy(scope))
        .unwrap_or_default()
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(s.to_string())
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(s)
    }
}

impl std::fmt::Display for JsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", n),
            JsValue::String(s) | JsValue::Object(s) => write!(f, "{}", s),
        }
    }
}
