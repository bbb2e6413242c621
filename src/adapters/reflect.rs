// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Object construction, property access, calls and iteration.
//!
//! Property access works on a small fixed object model: plain objects and
//! the global scope carry arbitrary properties, the other host objects
//! expose a read-only set of accessors.

use std::rc::Rc;

use crate::bridge::abi::{throw, Completion, ModuleHost};
use crate::bridge::debug::catching;
use crate::bridge::functions::{call_function, Builtin, HostFunction};
use crate::bridge::handles::{alloc_handle, get};
use crate::bridge::strings;
use crate::bridge::value::HostValue;
use crate::errors::BridgeResult;

fn is_iterator_symbol(key: &HostValue) -> bool {
    matches!(key, HostValue::Symbol(Some(description)) if &**description == "Symbol.iterator")
}

/// The well-known `Symbol.iterator`.
pub fn iterator_symbol() -> HostValue {
    HostValue::Symbol(Some(Rc::from("Symbol.iterator")))
}

fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

/// `target[key]`.
pub fn get_property(target: &HostValue, key: &HostValue) -> Result<HostValue, HostValue> {
    if target.is_nullish() {
        return Err(HostValue::error(
            "TypeError",
            format!(
                "Cannot read properties of {} (reading '{}')",
                target.to_display_string(),
                key.to_property_key()
            ),
        ));
    }

    if is_iterator_symbol(key) {
        return Ok(match target {
            HostValue::Array(_) | HostValue::Headers(_) => {
                HostValue::Function(HostFunction::Builtin(Builtin::Values))
            }
            _ => HostValue::Undefined,
        });
    }

    let name = key.to_property_key();
    let value = match target {
        HostValue::Object(object) => object.get(&name),
        HostValue::Global(scope) => scope.props.get(&name),
        HostValue::Array(items) => {
            if name == "length" {
                Some(HostValue::Number(items.borrow().len() as f64))
            } else {
                array_index(&name).and_then(|i| items.borrow().get(i).cloned())
            }
        }
        HostValue::Bytes(bytes) => {
            if name == "length" {
                Some(HostValue::Number(bytes.len() as f64))
            } else {
                array_index(&name).and_then(|i| bytes.get(i).map(|b| HostValue::Number(*b as f64)))
            }
        }
        HostValue::String(text) if name == "length" => {
            Some(HostValue::Number(text.encode_utf16().count() as f64))
        }
        HostValue::Error(error) => match name.as_str() {
            "name" => Some(error.name.as_str().into()),
            "message" => Some(error.message.as_str().into()),
            "stack" => error.stack.as_deref().map(HostValue::from),
            _ => None,
        },
        HostValue::Function(function) if name == "name" => Some(function.name().unwrap_or("").into()),
        HostValue::Response(response) => match name.as_str() {
            "status" => Some(HostValue::Number(response.status as f64)),
            "ok" => Some(HostValue::Bool(response.ok())),
            "url" => Some(response.url.as_str().into()),
            "headers" => Some(HostValue::Headers(response.headers.clone())),
            "bodyUsed" => Some(HostValue::Bool(response.body_used())),
            _ => None,
        },
        HostValue::Request(request) => match name.as_str() {
            "method" => Some(request.method.as_str().into()),
            "url" => Some(request.url.as_str().into()),
            "headers" => Some(HostValue::Headers(request.headers.clone())),
            "credentials" => Some(request.credentials.as_str().into()),
            "mode" => Some(request.mode.as_str().into()),
            _ => None,
        },
        HostValue::AbortController(controller) if name == "signal" => {
            Some(HostValue::AbortSignal(controller.signal.clone()))
        }
        HostValue::AbortSignal(signal) => match name.as_str() {
            "aborted" => Some(HostValue::Bool(signal.aborted())),
            "reason" => Some(signal.reason()),
            _ => None,
        },
        HostValue::Iterator(_) if name == "next" => {
            Some(HostValue::Function(HostFunction::Builtin(Builtin::IteratorNext)))
        }
        _ => None,
    };
    Ok(value.unwrap_or(HostValue::Undefined))
}

/// `key in target`.
pub fn has_property(target: &HostValue, key: &HostValue) -> Result<bool, HostValue> {
    require_object(target, "has")?;
    let name = key.to_property_key();
    Ok(match target {
        HostValue::Object(object) => object.has(&name),
        HostValue::Global(scope) => scope.props.has(&name),
        HostValue::Array(items) => {
            name == "length" || array_index(&name).is_some_and(|i| i < items.borrow().len())
        }
        _ => !get_property(target, key)?.is_undefined(),
    })
}

/// `target[key] = value`. Returns whether the property was stored.
///
/// Host objects other than plain objects, arrays and the global scope have
/// no writable properties.
pub fn set_property(target: &HostValue, key: &HostValue, value: HostValue) -> Result<bool, HostValue> {
    if target.is_nullish() {
        return Err(HostValue::error(
            "TypeError",
            format!(
                "Cannot set properties of {} (setting '{}')",
                target.to_display_string(),
                key.to_property_key()
            ),
        ));
    }
    let name = key.to_property_key();
    let displaced = match target {
        HostValue::Object(object) => object.set(&name, value),
        HostValue::Global(scope) => scope.props.set(&name, value),
        HostValue::Array(items) => match array_index(&name) {
            Some(index) => {
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    items.resize(index + 1, HostValue::Undefined);
                }
                Some(std::mem::replace(&mut items[index], value))
            }
            None => return Ok(false),
        },
        _ => return Ok(false),
    };
    drop(displaced);
    Ok(true)
}

fn require_object(target: &HostValue, operation: &str) -> Result<(), HostValue> {
    if target.is_object() || target.is_function() {
        Ok(())
    } else {
        Err(HostValue::error(
            "TypeError",
            format!("Reflect.{} called on non-object", operation),
        ))
    }
}

/// `new Object()`.
pub fn new_object<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<u32> {
    alloc_handle(host, HostValue::new_object())
}

/// `target[key] = value`, throwing into the module on a nullish target.
pub fn set<H: ModuleHost + ?Sized>(host: &mut H, target: u32, key: u32, value: u32) -> BridgeResult<()> {
    let target = get(host, target)?;
    let key = get(host, key)?;
    let value = get(host, value)?;
    set_property(&target, &key, value).map_err(|e| throw(host, e))?;
    Ok(())
}

/// `Reflect.get(target, key)`.
pub fn reflect_get<H: ModuleHost + ?Sized>(host: &mut H, target: u32, key: u32) -> BridgeResult<u32> {
    catching(host, |host| {
        let target = get(host, target)?;
        let key = get(host, key)?;
        require_object(&target, "get").map_err(|e| throw(host, e))?;
        let value = get_property(&target, &key).map_err(|e| throw(host, e))?;
        alloc_handle(host, value)
    })
}

/// `Reflect.has(target, key)`.
pub fn reflect_has<H: ModuleHost + ?Sized>(host: &mut H, target: u32, key: u32) -> BridgeResult<i32> {
    catching(host, |host| {
        let target = get(host, target)?;
        let key = get(host, key)?;
        let found = has_property(&target, &key).map_err(|e| throw(host, e))?;
        Ok(found as i32)
    })
}

/// `Reflect.set(target, key, value)`.
pub fn reflect_set<H: ModuleHost + ?Sized>(
    host: &mut H,
    target: u32,
    key: u32,
    value: u32,
) -> BridgeResult<i32> {
    catching(host, |host| {
        let target = get(host, target)?;
        let key = get(host, key)?;
        let value = get(host, value)?;
        require_object(&target, "set").map_err(|e| throw(host, e))?;
        let stored = set_property(&target, &key, value).map_err(|e| throw(host, e))?;
        Ok(stored as i32)
    })
}

/// `JSON.stringify(value)`; `undefined` when there is no JSON form.
pub fn stringify<H: ModuleHost + ?Sized>(host: &mut H, value: u32) -> BridgeResult<u32> {
    catching(host, |host| {
        let value = get(host, value)?;
        match value.stringify() {
            Ok(Some(json)) => alloc_handle(host, HostValue::from(json)),
            Ok(None) => Ok(crate::bridge::HANDLE_UNDEFINED),
            Err(e) => Err(throw(host, HostValue::error("TypeError", e.to_string()))),
        }
    })
}

fn call_with<H: ModuleHost + ?Sized>(
    host: &mut H,
    function: u32,
    this: u32,
    args: &[u32],
) -> BridgeResult<u32> {
    let callee = get(host, function)?;
    let this = get(host, this)?;
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(get(host, *arg)?);
    }
    let Some(callee) = callee.as_function().cloned() else {
        let error = HostValue::error(
            "TypeError",
            format!("{} is not a function", crate::bridge::debug::describe(&callee)),
        );
        return Err(throw(host, error));
    };
    match call_function(host, &callee, &this, &values)? {
        Completion::Normal(value) => alloc_handle(host, value),
        Completion::Throw(error) => Err(throw(host, error)),
    }
}

/// `function.call(this)`.
pub fn call0<H: ModuleHost + ?Sized>(host: &mut H, function: u32, this: u32) -> BridgeResult<u32> {
    catching(host, |host| call_with(host, function, this, &[]))
}

/// `function.call(this, arg)`.
pub fn call1<H: ModuleHost + ?Sized>(host: &mut H, function: u32, this: u32, arg: u32) -> BridgeResult<u32> {
    catching(host, |host| call_with(host, function, this, &[arg]))
}

/// `new Function(source)`.
///
/// Only the global scope probe `return this` can be compiled; any other
/// source throws, as under a policy that forbids code generation.
pub fn new_function<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<u32> {
    let source = strings::decode(host, ptr, len)?;
    let body = source.trim().trim_end_matches(';').trim_end();
    if body == "return this" {
        return alloc_handle(host, HostValue::Function(HostFunction::Builtin(Builtin::ReturnThis)));
    }
    Err(throw(
        host,
        HostValue::error(
            "EvalError",
            "Code generation from strings disallowed for this context",
        ),
    ))
}

/// `Symbol.iterator`.
pub fn iterator<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<u32> {
    alloc_handle(host, iterator_symbol())
}

/// `iterator.next`, the method itself.
pub fn next_property<H: ModuleHost + ?Sized>(host: &mut H, iterator: u32) -> BridgeResult<u32> {
    let iterator = get(host, iterator)?;
    let next = get_property(&iterator, &HostValue::from("next")).map_err(|e| throw(host, e))?;
    alloc_handle(host, next)
}

/// `iterator.next()`.
pub fn next<H: ModuleHost + ?Sized>(host: &mut H, iterator: u32) -> BridgeResult<u32> {
    catching(host, |host| {
        let target = get(host, iterator)?;
        let method = get_property(&target, &HostValue::from("next")).map_err(|e| throw(host, e))?;
        let Some(method) = method.as_function().cloned() else {
            return Err(throw(
                host,
                HostValue::error("TypeError", "iterator.next is not a function"),
            ));
        };
        match call_function(host, &method, &target, &[])? {
            Completion::Normal(value) => alloc_handle(host, value),
            Completion::Throw(error) => Err(throw(host, error)),
        }
    })
}

/// `result.done`.
pub fn done<H: ModuleHost + ?Sized>(host: &mut H, result: u32) -> BridgeResult<i32> {
    let result = get(host, result)?;
    let done = get_property(&result, &HostValue::from("done")).map_err(|e| throw(host, e))?;
    Ok(done.is_truthy() as i32)
}

/// `result.value`.
pub fn value<H: ModuleHost + ?Sized>(host: &mut H, result: u32) -> BridgeResult<u32> {
    let result = get(host, result)?;
    let value = get_property(&result, &HostValue::from("value")).map_err(|e| throw(host, e))?;
    alloc_handle(host, value)
}
