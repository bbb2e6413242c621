// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host value model.
//!
//! Everything the module can hold a handle to is a [`HostValue`]. Primitive
//! values are copied; object-like values are reference counted so that two
//! handles can alias the same object, exactly as two references would on the
//! host side. The module never interprets these values; it only passes their
//! handles back to adapters.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::bridge::functions::HostFunction;
use crate::bridge::promise::PromiseRef;
use crate::config::GlobalScopeKind;
use crate::net::objects::{AbortController, AbortSignal, HeaderList, Request, Response};

/// An opaque host value addressable from the module through a handle.
#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Option<Rc<str>>),
    Bytes(Rc<[u8]>),
    Array(Rc<RefCell<Vec<HostValue>>>),
    Object(Rc<PlainObject>),
    Error(Rc<HostError>),
    Function(HostFunction),
    Promise(PromiseRef),
    Headers(Rc<HeaderList>),
    Request(Rc<Request>),
    Response(Rc<Response>),
    AbortController(Rc<AbortController>),
    AbortSignal(AbortSignal),
    Iterator(Rc<ListIterator>),
    Global(Rc<GlobalScope>),
}

impl std::fmt::Debug for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::bridge::debug::describe(self))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(Rc::from(value))
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(Rc::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl HostValue {
    /// A fresh empty plain object.
    pub fn new_object() -> Self {
        HostValue::Object(Rc::new(PlainObject::default()))
    }

    /// A fresh array holding `items`.
    pub fn new_array(items: Vec<HostValue>) -> Self {
        HostValue::Array(Rc::new(RefCell::new(items)))
    }

    /// An error object with the given name (`Error`, `TypeError`, ...).
    pub fn error(name: &str, message: impl Into<String>) -> Self {
        HostValue::Error(Rc::new(HostError::new(name, message)))
    }

    /// An error object recording the adapter that raised it as its trace.
    pub fn error_at(name: &str, message: impl Into<String>, origin: &str) -> Self {
        HostValue::Error(Rc::new(HostError::new(name, message).at(origin)))
    }

    /// Short classification used in diagnostics and type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Symbol(_) => "symbol",
            HostValue::Bytes(_) => "Uint8Array",
            HostValue::Array(_) => "Array",
            HostValue::Object(_) => "Object",
            HostValue::Error(_) => "Error",
            HostValue::Function(_) => "Function",
            HostValue::Promise(_) => "Promise",
            HostValue::Headers(_) => "Headers",
            HostValue::Request(_) => "Request",
            HostValue::Response(_) => "Response",
            HostValue::AbortController(_) => "AbortController",
            HostValue::AbortSignal(_) => "AbortSignal",
            HostValue::Iterator(_) => "Iterator",
            HostValue::Global(_) => "global",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, HostValue::Function(_))
    }

    /// `typeof value === "object" && value !== null`.
    pub fn is_object(&self) -> bool {
        !matches!(
            self,
            HostValue::Undefined
                | HostValue::Null
                | HostValue::Bool(_)
                | HostValue::Number(_)
                | HostValue::String(_)
                | HostValue::Symbol(_)
                | HostValue::Function(_)
        )
    }

    /// Truthiness as used by conditionals.
    pub fn is_truthy(&self) -> bool {
        match self {
            HostValue::Undefined | HostValue::Null => false,
            HostValue::Bool(b) => *b,
            HostValue::Number(n) => *n != 0.0 && !n.is_nan(),
            HostValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&PromiseRef> {
        match self {
            HostValue::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Identity comparison for objects, value comparison for primitives.
    pub fn strict_equals(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Symbol(a), HostValue::Symbol(b)) => match (a, b) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            },
            (HostValue::Bytes(a), HostValue::Bytes(b)) => Rc::ptr_eq(a, b),
            (HostValue::Array(a), HostValue::Array(b)) => Rc::ptr_eq(a, b),
            (HostValue::Object(a), HostValue::Object(b)) => Rc::ptr_eq(a, b),
            (HostValue::Error(a), HostValue::Error(b)) => Rc::ptr_eq(a, b),
            (HostValue::Function(a), HostValue::Function(b)) => a.same_function(b),
            (HostValue::Promise(a), HostValue::Promise(b)) => Rc::ptr_eq(a, b),
            (HostValue::Headers(a), HostValue::Headers(b)) => Rc::ptr_eq(a, b),
            (HostValue::Request(a), HostValue::Request(b)) => Rc::ptr_eq(a, b),
            (HostValue::Response(a), HostValue::Response(b)) => Rc::ptr_eq(a, b),
            (HostValue::AbortController(a), HostValue::AbortController(b)) => Rc::ptr_eq(a, b),
            (HostValue::AbortSignal(a), HostValue::AbortSignal(b)) => a.same_signal(b),
            (HostValue::Iterator(a), HostValue::Iterator(b)) => Rc::ptr_eq(a, b),
            (HostValue::Global(a), HostValue::Global(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `String(value)`.
    pub fn to_display_string(&self) -> String {
        match self {
            HostValue::Undefined => "undefined".to_string(),
            HostValue::Null => "null".to_string(),
            HostValue::Bool(b) => b.to_string(),
            HostValue::Number(n) => format_number(*n),
            HostValue::String(s) => s.to_string(),
            HostValue::Symbol(description) => match description {
                Some(d) => format!("Symbol({})", d),
                None => "Symbol()".to_string(),
            },
            HostValue::Bytes(bytes) => bytes
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(","),
            HostValue::Array(items) => match items.try_borrow() {
                Ok(items) => items
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.to_display_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                Err(_) => String::new(),
            },
            HostValue::Error(err) => {
                if err.message.is_empty() {
                    err.name.clone()
                } else {
                    format!("{}: {}", err.name, err.message)
                }
            }
            HostValue::Function(_) => "function () { [native code] }".to_string(),
            other => format!("[object {}]", other.class_name()),
        }
    }

    /// Runtime class name, the `X` in `[object X]`.
    pub fn class_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "Undefined",
            HostValue::Null => "Null",
            HostValue::Bool(_) => "Boolean",
            HostValue::Number(_) => "Number",
            HostValue::String(_) => "String",
            HostValue::Symbol(_) => "Symbol",
            HostValue::Global(scope) => scope.kind.class_name(),
            other => other.kind_name(),
        }
    }

    /// Convert a property key value to the string used for lookups.
    pub fn to_property_key(&self) -> String {
        self.to_display_string()
    }

    /// Build a host value from parsed JSON.
    pub fn from_json(value: &Value) -> HostValue {
        match value {
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => HostValue::from(s.as_str()),
            Value::Array(items) => {
                HostValue::new_array(items.iter().map(HostValue::from_json).collect())
            }
            Value::Object(map) => {
                let object = PlainObject::default();
                for (key, item) in map {
                    object.set(key, HostValue::from_json(item));
                }
                HostValue::Object(Rc::new(object))
            }
        }
    }

    /// `JSON.stringify`-compatible conversion.
    ///
    /// Returns `Ok(None)` where `JSON.stringify` would return `undefined`
    /// (undefined, functions and symbols at the top level).
    pub fn to_json(&self) -> Result<Option<Value>, JsonError> {
        let mut ancestors = Vec::new();
        json_value(self, &mut ancestors)
    }

    /// `JSON.stringify(value)` as text.
    pub fn stringify(&self) -> Result<Option<String>, JsonError> {
        Ok(self.to_json()?.map(|json| json.to_string()))
    }
}

/// Failure converting a value to JSON.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JsonError {
    #[error("Converting circular structure to JSON")]
    Circular,
}

fn json_value(value: &HostValue, ancestors: &mut Vec<usize>) -> Result<Option<Value>, JsonError> {
    let json = match value {
        HostValue::Undefined | HostValue::Function(_) | HostValue::Symbol(_) => return Ok(None),
        HostValue::Null => Value::Null,
        HostValue::Bool(b) => Value::Bool(*b),
        HostValue::Number(n) => json_number(*n),
        HostValue::String(s) => Value::String(s.to_string()),
        HostValue::Bytes(bytes) => {
            let mut map = Map::new();
            for (index, byte) in bytes.iter().enumerate() {
                map.insert(index.to_string(), Value::from(*byte));
            }
            Value::Object(map)
        }
        HostValue::Array(items) => {
            let id = Rc::as_ptr(items) as *const () as usize;
            enter(ancestors, id)?;
            let items = items.borrow().clone();
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(json_value(item, ancestors)?.unwrap_or(Value::Null));
            }
            ancestors.pop();
            Value::Array(out)
        }
        HostValue::Object(object) => {
            let id = Rc::as_ptr(object) as *const () as usize;
            json_object(object, id, ancestors)?
        }
        HostValue::Global(scope) => {
            let id = Rc::as_ptr(scope) as *const () as usize;
            json_object(&scope.props, id, ancestors)?
        }
        HostValue::Error(_)
        | HostValue::Promise(_)
        | HostValue::Headers(_)
        | HostValue::Request(_)
        | HostValue::Response(_)
        | HostValue::AbortController(_)
        | HostValue::AbortSignal(_)
        | HostValue::Iterator(_) => Value::Object(Map::new()),
    };
    Ok(Some(json))
}

fn json_object(object: &PlainObject, id: usize, ancestors: &mut Vec<usize>) -> Result<Value, JsonError> {
    enter(ancestors, id)?;
    let mut map = Map::new();
    for (key, item) in object.entries() {
        if let Some(json) = json_value(&item, ancestors)? {
            map.insert(key, json);
        }
    }
    ancestors.pop();
    Ok(Value::Object(map))
}

fn enter(ancestors: &mut Vec<usize>, id: usize) -> Result<(), JsonError> {
    if ancestors.contains(&id) {
        return Err(JsonError::Circular);
    }
    ancestors.push(id);
    Ok(())
}

fn json_number(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Number formatting matching the host's `String(number)` for common values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Insertion-ordered property bag backing plain objects.
#[derive(Default)]
pub struct PlainObject {
    props: RefCell<Vec<(String, HostValue)>>,
}

impl PlainObject {
    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.props
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &str) -> bool {
        self.props.borrow().iter().any(|(k, _)| k == key)
    }

    /// Insert or overwrite, keeping the original insertion position.
    ///
    /// The displaced value is returned so it is dropped outside the borrow.
    pub fn set(&self, key: &str, value: HostValue) -> Option<HostValue> {
        let mut props = self.props.borrow_mut();
        if let Some(slot) = props.iter_mut().find(|(k, _)| k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        props.push((key.to_string(), value));
        None
    }

    pub fn entries(&self) -> Vec<(String, HostValue)> {
        self.props.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.borrow().is_empty()
    }
}

/// An error object.
#[derive(Debug, Clone)]
pub struct HostError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl HostError {
    pub fn new(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn at(mut self, origin: &str) -> Self {
        self.stack = Some(format!("    at {}", origin));
        self
    }
}

/// A one-shot iterator over a snapshot of a list.
#[derive(Default)]
pub struct ListIterator {
    remaining: RefCell<VecDeque<HostValue>>,
}

impl ListIterator {
    pub fn new(items: Vec<HostValue>) -> Self {
        Self {
            remaining: RefCell::new(items.into()),
        }
    }

    /// The `{ value, done }` record `next()` returns.
    pub fn next_result(&self) -> HostValue {
        let next = self.remaining.borrow_mut().pop_front();
        let result = PlainObject::default();
        match next {
            Some(value) => {
                result.set("value", value);
                result.set("done", HostValue::Bool(false));
            }
            None => {
                result.set("value", HostValue::Undefined);
                result.set("done", HostValue::Bool(true));
            }
        }
        HostValue::Object(Rc::new(result))
    }
}

/// One of the ambient global scopes (`globalThis`, `window`, ...).
pub struct GlobalScope {
    pub kind: GlobalScopeKind,
    pub props: PlainObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_matches_host_rendering() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn test_stringify_skips_undefined_members() {
        let object = HostValue::new_object();
        if let HostValue::Object(o) = &object {
            o.set("a", HostValue::Number(1.0));
            o.set("skip", HostValue::Undefined);
            o.set("list", HostValue::new_array(vec![HostValue::Undefined, "x".into()]));
        }
        assert_eq!(
            object.stringify().unwrap().as_deref(),
            Some(r#"{"a":1,"list":[null,"x"]}"#)
        );
        assert_eq!(HostValue::Undefined.stringify().unwrap(), None);
    }

    #[test]
    fn test_stringify_detects_cycles() {
        let array = Rc::new(RefCell::new(Vec::new()));
        let value = HostValue::Array(array.clone());
        array.borrow_mut().push(value.clone());

        assert_eq!(value.stringify(), Err(JsonError::Circular));

        // break the cycle so the test does not leak
        array.borrow_mut().clear();
    }

    #[test]
    fn test_shared_child_is_not_a_cycle() {
        let child = HostValue::new_array(vec![HostValue::Number(1.0)]);
        let parent = HostValue::new_array(vec![child.clone(), child]);
        assert_eq!(parent.stringify().unwrap().as_deref(), Some("[[1],[1]]"));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let json: Value = serde_json::from_str(r#"{"b":1,"a":[true,null,"s"]}"#).unwrap();
        let value = HostValue::from_json(&json);
        assert_eq!(value.stringify().unwrap().as_deref(), Some(r#"{"b":1,"a":[true,null,"s"]}"#));
    }

    #[test]
    fn test_stringify_keeps_insertion_order() {
        let body = HostValue::new_object();
        if let HostValue::Object(object) = &body {
            object.set("model", HostValue::from("y"));
            object.set("contents", HostValue::from("x"));
        }
        assert_eq!(body.stringify().unwrap().as_deref(), Some(r#"{"model":"y","contents":"x"}"#));

        let bytes = HostValue::Bytes(Rc::from((0u8..11).collect::<Vec<_>>()));
        let json = bytes.stringify().unwrap().unwrap();
        assert!(json.starts_with(r#"{"0":0,"1":1,"2":2"#));
        assert!(json.ends_with(r#""10":10}"#));
    }

    #[test]
    fn test_object_set_overwrites_in_place() {
        let object = PlainObject::default();
        object.set("first", HostValue::Number(1.0));
        object.set("second", HostValue::Number(2.0));
        let previous = object.set("first", HostValue::Number(3.0));

        assert!(matches!(previous, Some(HostValue::Number(n)) if n == 1.0));
        let keys: Vec<String> = object.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["first", "second"]);
    }

    #[test]
    fn test_list_iterator_ends_with_done() {
        let iter = ListIterator::new(vec![HostValue::from("a")]);
        let first = iter.next_result().to_json().unwrap().unwrap();
        assert_eq!(first, serde_json::json!({"value": "a", "done": false}));
        let end = iter.next_result().to_json().unwrap().unwrap();
        assert_eq!(end, serde_json::json!({"done": true}));
    }

    #[test]
    fn test_truthiness() {
        assert!(!HostValue::from("").is_truthy());
        assert!(!HostValue::Number(f64::NAN).is_truthy());
        assert!(HostValue::new_object().is_truthy());
        assert!(HostValue::Number(-1.0).is_truthy());
    }

    #[test]
    fn test_typeof_object_classification() {
        assert!(HostValue::new_object().is_object());
        assert!(HostValue::new_array(vec![]).is_object());
        assert!(!HostValue::Null.is_object());
        assert!(!HostValue::from("s").is_object());
    }

    #[test]
    fn test_strict_equals_uses_identity_for_objects() {
        let a = HostValue::new_object();
        let b = HostValue::new_object();
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
        assert!(HostValue::from("x").strict_equals(&HostValue::from("x")));
    }
}
